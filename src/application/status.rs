use super::AdmissionEngine;
use crate::domain::application::ApplicationRecord;
use crate::domain::progress::{NextStep, Progress};
use crate::error::{AdmissionError, Result};
use serde::Serialize;

/// What the applicant dashboard shows for one email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub progress: Progress,
    pub next_step: NextStep,
    pub application: Option<ApplicationRecord>,
}

impl AdmissionEngine {
    /// Read-only projection used to route the applicant to their next step.
    /// An email with no application is not an error.
    pub async fn application_status(&self, email: &str) -> Result<StatusView> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AdmissionError::MissingEmail);
        }

        let application = self.locate_by_email(email).await?;
        let progress = Progress::of(application.as_ref());
        Ok(StatusView {
            progress,
            next_step: progress.next_step(),
            application,
        })
    }
}
