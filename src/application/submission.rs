use super::{AdmissionEngine, MAX_WRITE_ATTEMPTS, mask_email};
use crate::domain::application::{ApplicationId, ApplicationRecord, email_key};
use crate::domain::profile::ApplicantProfile;
use crate::error::{AdmissionError, Result, StoreError};
use tracing::{debug, info, warn};

impl AdmissionEngine {
    /// Creates an application from a submitted form.
    ///
    /// Every field error is reported together. A second submission for the
    /// same email and admission period fails with `DUPLICATE_APPLICATION`;
    /// the store decides that atomically.
    pub async fn submit(&self, profile: ApplicantProfile) -> Result<ApplicationRecord> {
        let profile = profile.normalized();
        profile.validate()?;

        let period = profile
            .academic_year
            .clone()
            .unwrap_or_else(|| self.settings.admission_period.clone());
        let record = ApplicationRecord::new(profile, period, self.now());

        match self.applications.insert(record.clone()).await {
            Ok(()) => {
                info!(
                    application_id = %record.id,
                    email = %mask_email(record.primary_email()),
                    period = %record.admission_period,
                    "Application submitted"
                );
                Ok(record)
            }
            Err(StoreError::Conflict { email, period }) => {
                warn!(email = %mask_email(&email), %period, "Duplicate application rejected");
                Err(AdmissionError::Duplicate { email, period })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes an application the applicant has not acted on yet.
    ///
    /// Only records still awaiting a test slot with no payment activity can
    /// be withdrawn, and only by their own email address. The state check
    /// and the delete are tied to the same record version.
    pub async fn withdraw(&self, id: ApplicationId, email: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(AdmissionError::MissingEmail);
        }

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let record = self
                .applications
                .get(id)
                .await?
                .filter(|r| r.email_key() == email_key(email))
                .ok_or_else(|| AdmissionError::ApplicationNotFound(id.to_string()))?;

            if !record.is_pending_self_service() {
                return Err(AdmissionError::InvalidState(format!(
                    "application is '{}' with payment '{}' and can no longer be withdrawn",
                    record.status, record.payment_status
                )));
            }

            match self.applications.delete(id, record.version).await {
                Ok(true) => {
                    info!(application_id = %id, email = %mask_email(email), "Application withdrawn");
                    return Ok(());
                }
                Ok(false) => return Err(AdmissionError::ApplicationNotFound(id.to_string())),
                Err(e) if e.is_write_race() => {
                    debug!(attempt, error = %e, "Retrying withdrawal");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AdmissionError::ConcurrentUpdate(id))
    }
}
