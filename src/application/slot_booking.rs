use super::{AdmissionEngine, MAX_WRITE_ATTEMPTS, mask_email};
use crate::domain::application::ApplicationRecord;
use crate::error::{AdmissionError, Result};
use tracing::{debug, info};

impl AdmissionEngine {
    /// Attaches a test slot to the applicant's record.
    ///
    /// The slot is validated before any lookup, so a bad hour or date never
    /// touches the store. Re-booking replaces the previous slot and leaves
    /// every other field as the store currently has it.
    pub async fn book_test_slot(&self, email: &str, date: &str, time: &str) -> Result<ApplicationRecord> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AdmissionError::MissingEmail);
        }

        let slot = self
            .settings
            .slot_policy
            .validate(date, time, self.clock.today())?;

        let mut contended = None;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut record = self
                .locate_by_email(email)
                .await?
                .ok_or_else(|| AdmissionError::FormNotFound(email.to_string()))?;

            if record.status.is_terminal() {
                return Err(AdmissionError::InvalidState(format!(
                    "application is already '{}'",
                    record.status
                )));
            }

            let id = record.id;
            let rebooked = record.has_test_slot();
            record.book_test_slot(slot, self.now())?;

            match self.applications.update(record).await {
                Ok(saved) => {
                    info!(
                        application_id = %saved.id,
                        email = %mask_email(email),
                        date = %slot.date,
                        time = %slot.time.format("%H:%M"),
                        rebooked,
                        "Test slot booked"
                    );
                    return Ok(saved);
                }
                Err(e) if e.is_write_race() => {
                    debug!(attempt, error = %e, "Retrying test slot booking");
                    contended = Some(id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(contended.map_or_else(
            || AdmissionError::FormNotFound(email.to_string()),
            AdmissionError::ConcurrentUpdate,
        ))
    }
}
