use super::{AdmissionEngine, MAX_WRITE_ATTEMPTS};
use crate::domain::admin_log::{ACTION_UPDATE_APPLICATION, AdminLogEntry};
use crate::domain::application::{ApplicationId, ApplicationRecord};
use crate::domain::status::{ApplicationStatus, PaymentStatus};
use crate::error::{AdmissionError, Result};
use chrono::Duration;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Narrows an administrator listing. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub admission_period: Option<String>,
    pub grade: Option<String>,
    /// Case-insensitive substring of the student name, guardian names,
    /// primary email or application id.
    pub search: Option<String>,
}

impl ApplicationFilter {
    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        if self.status.is_some_and(|s| s != record.status) {
            return false;
        }
        if self.payment_status.is_some_and(|s| s != record.payment_status) {
            return false;
        }
        if let Some(period) = &self.admission_period
            && period != &record.admission_period
        {
            return false;
        }
        if let Some(grade) = &self.grade
            && !record
                .profile
                .grade
                .as_deref()
                .is_some_and(|g| g.eq_ignore_ascii_case(grade))
        {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => search_haystack(record).contains(&term.to_lowercase()),
            _ => true,
        }
    }
}

fn search_haystack(record: &ApplicationRecord) -> String {
    let profile = &record.profile;
    [
        profile.student_display_name(),
        profile.student_name_ar.clone(),
        profile.father.name.clone(),
        profile.mother.name.clone(),
        Some(profile.primary_email.clone()),
        Some(record.id.to_string()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n")
    .to_lowercase()
}

/// 1-based page number and page size, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

impl<T> Page<T> {
    fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        let items = all
            .into_iter()
            .skip((request.page - 1).saturating_mul(request.limit))
            .take(request.limit)
            .collect();
        Self {
            items,
            page: request.page,
            limit: request.limit,
            total,
            pages: total.div_ceil(request.limit),
        }
    }
}

/// Administrator edit. Absent fields are left alone; an empty string clears
/// a text field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationUpdate {
    pub status: Option<ApplicationStatus>,
    pub test_result: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_payment_status: BTreeMap<String, usize>,
    pub submitted_last_7_days: usize,
}

fn newest_first(records: &mut [ApplicationRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn clearable(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl AdmissionEngine {
    pub async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Page<ApplicationRecord>> {
        let records = self.export_applications(filter).await?;
        Ok(Page::slice(records, page))
    }

    /// Every matching record, newest first.
    pub async fn export_applications(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>> {
        let mut records: Vec<_> = self
            .applications
            .all()
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        newest_first(&mut records);
        Ok(records)
    }

    pub async fn get_application(&self, id: ApplicationId) -> Result<ApplicationRecord> {
        self.applications
            .get(id)
            .await?
            .ok_or_else(|| AdmissionError::ApplicationNotFound(id.to_string()))
    }

    /// Applies an administrator edit and records it in the admin log.
    ///
    /// Status changes must be allowed by the transition table; a rejected
    /// change leaves the record and the log untouched.
    pub async fn update_application(
        &self,
        id: ApplicationId,
        update: ApplicationUpdate,
        actor: &str,
    ) -> Result<ApplicationRecord> {
        let now = self.now();
        let mut saved = None;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut record = self.get_application(id).await?;
            let previous_status = record.status;

            if let Some(status) = update.status {
                record.set_status(status, now)?;
            }
            if let Some(result) = update.test_result.clone() {
                record.test_result = clearable(result);
            }
            if let Some(notes) = update.admin_notes.clone() {
                record.admin_notes = clearable(notes);
            }
            record.updated_at = now;

            match self.applications.update(record).await {
                Ok(record) => {
                    saved = Some((previous_status, record));
                    break;
                }
                Err(e) if e.is_write_race() => {
                    debug!(attempt, error = %e, "Retrying administrator update");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let (previous_status, record) = saved.ok_or(AdmissionError::ConcurrentUpdate(id))?;

        self.admin_log
            .append(AdminLogEntry::new(
                ACTION_UPDATE_APPLICATION,
                json!({
                    "application_id": record.id,
                    "previous_status": previous_status,
                    "status": record.status,
                    "test_result": update.test_result,
                    "admin_notes": update.admin_notes,
                }),
                actor,
                now,
            ))
            .await?;

        info!(
            application_id = %record.id,
            actor,
            from = %previous_status,
            to = %record.status,
            "Application updated by administrator"
        );
        Ok(record)
    }

    pub async fn admission_stats(&self) -> Result<AdmissionStats> {
        let records = self.applications.all().await?;
        let week_ago = self.now() - Duration::days(7);

        let mut by_status: BTreeMap<String, usize> = ApplicationStatus::ALL
            .iter()
            .map(|s| (s.label().to_string(), 0))
            .collect();
        let mut by_payment_status: BTreeMap<String, usize> = [
            PaymentStatus::Pending,
            PaymentStatus::Initiated,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
        ]
        .iter()
        .map(|s| (s.label().to_string(), 0))
        .collect();

        let mut submitted_last_7_days = 0;
        for record in &records {
            *by_status.entry(record.status.label().to_string()).or_default() += 1;
            *by_payment_status
                .entry(record.payment_status.label().to_string())
                .or_default() += 1;
            if record.created_at >= week_ago {
                submitted_last_7_days += 1;
            }
        }

        Ok(AdmissionStats {
            total: records.len(),
            by_status,
            by_payment_status,
            submitted_last_7_days,
        })
    }

    pub async fn admin_logs(&self, page: PageRequest) -> Result<Page<AdminLogEntry>> {
        Ok(Page::slice(self.admin_log.all().await?, page))
    }
}
