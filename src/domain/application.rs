use super::amount::Amount;
use super::payment::PaymentIntent;
use super::profile::ApplicantProfile;
use super::slot::TestSlot;
use super::status::{ApplicationStatus, PaymentStatus};
use crate::error::AdmissionError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight characters of the hyphenated form, used in merchant references.
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(8).collect()
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ApplicationId {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| AdmissionError::ApplicationNotFound(s.to_string()))
    }
}

/// Lower-cased, trimmed email used for lookups and duplicate detection.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Outcome of applying a gateway notification to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentUpdate {
    Applied,
    Unchanged,
    Rejected,
}

/// One admission application: the submitted form plus its lifecycle fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub admission_period: String,
    pub profile: ApplicantProfile,
    pub status: ApplicationStatus,
    pub test_date: Option<NaiveDate>,
    pub test_time: Option<NaiveTime>,
    pub test_result: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_transaction_id: Option<String>,
    pub merchant_reference_id: Option<String>,
    pub payment_amount: Option<Amount>,
    pub payment_currency: Option<String>,
    pub payment_url: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every write; an update must carry the version
    /// it was read at.
    #[serde(default)]
    pub version: u64,
}

impl ApplicationRecord {
    pub fn new(profile: ApplicantProfile, admission_period: String, now: DateTime<Utc>) -> Self {
        Self {
            id: ApplicationId::generate(),
            admission_period,
            profile,
            status: ApplicationStatus::AwaitingTestSlot,
            test_date: None,
            test_time: None,
            test_result: None,
            payment_status: PaymentStatus::Pending,
            payment_transaction_id: None,
            merchant_reference_id: None,
            payment_amount: None,
            payment_currency: None,
            payment_url: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn primary_email(&self) -> &str {
        &self.profile.primary_email
    }

    pub fn email_key(&self) -> String {
        email_key(&self.profile.primary_email)
    }

    /// A slot only counts once both date and time are set.
    pub fn has_test_slot(&self) -> bool {
        self.test_date.is_some() && self.test_time.is_some()
    }

    pub fn test_slot(&self) -> Option<TestSlot> {
        Some(TestSlot {
            date: self.test_date?,
            time: self.test_time?,
        })
    }

    pub fn has_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Still editable by the applicant: nothing booked, nothing paid.
    pub fn is_pending_self_service(&self) -> bool {
        self.status == ApplicationStatus::AwaitingTestSlot
            && self.payment_status == PaymentStatus::Pending
    }

    pub fn set_status(&mut self, next: ApplicationStatus, now: DateTime<Utc>) -> Result<(), AdmissionError> {
        if !self.status.can_transition_to(next) {
            return Err(AdmissionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Replaces any previous slot and marks the application as booked.
    pub fn book_test_slot(&mut self, slot: TestSlot, now: DateTime<Utc>) -> Result<(), AdmissionError> {
        self.set_status(ApplicationStatus::TestSlotBooked, now)?;
        self.test_date = Some(slot.date);
        self.test_time = Some(slot.time);
        Ok(())
    }

    /// The intent stored by a previous initiation, if one is still open.
    pub fn open_payment_intent(&self) -> Option<PaymentIntent> {
        if self.payment_status != PaymentStatus::Initiated {
            return None;
        }
        Some(PaymentIntent {
            intent_id: self.payment_transaction_id.clone()?,
            payment_url: self.payment_url.clone()?,
        })
    }

    pub fn record_payment_intent(
        &mut self,
        intent: &PaymentIntent,
        merchant_reference_id: String,
        amount: Amount,
        currency: String,
        now: DateTime<Utc>,
    ) -> Result<(), AdmissionError> {
        if !self.payment_status.can_transition_to(PaymentStatus::Initiated) {
            return Err(AdmissionError::InvalidState(format!(
                "cannot initiate a payment while payment status is {}",
                self.payment_status
            )));
        }
        self.payment_status = PaymentStatus::Initiated;
        self.payment_transaction_id = Some(intent.intent_id.clone());
        self.payment_url = Some(intent.payment_url.clone());
        self.merchant_reference_id = Some(merchant_reference_id);
        self.payment_amount = Some(amount);
        self.payment_currency = Some(currency);
        self.updated_at = now;
        Ok(())
    }

    /// Applies a gateway outcome. Repeating the current outcome is a no-op;
    /// moves the payment table does not allow are ignored.
    pub fn apply_payment_outcome(&mut self, outcome: PaymentStatus, now: DateTime<Utc>) -> PaymentUpdate {
        if self.payment_status == outcome {
            PaymentUpdate::Unchanged
        } else if self.payment_status.can_transition_to(outcome) {
            self.payment_status = outcome;
            self.updated_at = now;
            PaymentUpdate::Applied
        } else {
            PaymentUpdate::Rejected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::profile::Guardian;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 12, 8, 0, 0).unwrap()
    }

    fn record() -> ApplicationRecord {
        let profile = ApplicantProfile {
            primary_email: "Parent@Example.com".into(),
            student_first_name: Some("Laila".into()),
            student_last_name: Some("Hassan".into()),
            father: Guardian {
                name: Some("Omar".into()),
                phone: Some("+20 100 555 1234".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        ApplicationRecord::new(profile, "2025-2026".into(), now())
    }

    fn slot(day: u32, hour: u32) -> TestSlot {
        TestSlot {
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        }
    }

    fn intent(id: &str) -> PaymentIntent {
        PaymentIntent {
            intent_id: id.into(),
            payment_url: format!("https://pay/{id}"),
        }
    }

    #[test]
    fn test_new_record_defaults() {
        let record = record();
        assert_eq!(record.status, ApplicationStatus::AwaitingTestSlot);
        assert_eq!(record.payment_status, PaymentStatus::Pending);
        assert!(!record.has_test_slot());
        assert!(record.is_pending_self_service());
        assert_eq!(record.email_key(), "parent@example.com");
    }

    #[test]
    fn test_rebooking_replaces_slot() {
        let mut record = record();
        record.book_test_slot(slot(12, 10), now()).unwrap();
        record.book_test_slot(slot(14, 11), now()).unwrap();

        assert_eq!(record.status, ApplicationStatus::TestSlotBooked);
        assert_eq!(record.test_slot(), Some(slot(14, 11)));
    }

    #[test]
    fn test_booking_blocked_for_terminal_status() {
        let mut record = record();
        record.status = ApplicationStatus::Rejected;

        let result = record.book_test_slot(slot(12, 10), now());
        assert!(matches!(result, Err(AdmissionError::InvalidTransition { .. })));
        assert_eq!(record.test_date, None);
        assert_eq!(record.status, ApplicationStatus::Rejected);
    }

    #[test]
    fn test_payment_intent_lifecycle() {
        let mut record = record();
        assert_eq!(record.open_payment_intent(), None);

        record
            .record_payment_intent(
                &intent("PI123"),
                "ADM_1_abcd".into(),
                Amount::new(dec!(5000)).unwrap(),
                "EGP".into(),
                now(),
            )
            .unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Initiated);
        assert_eq!(record.open_payment_intent(), Some(intent("PI123")));

        assert_eq!(
            record.apply_payment_outcome(PaymentStatus::Paid, now()),
            PaymentUpdate::Applied
        );
        assert_eq!(
            record.apply_payment_outcome(PaymentStatus::Paid, now()),
            PaymentUpdate::Unchanged
        );
        assert_eq!(
            record.apply_payment_outcome(PaymentStatus::Failed, now()),
            PaymentUpdate::Rejected
        );
        assert!(record.has_paid());
        assert_eq!(record.open_payment_intent(), None);
    }

    #[test]
    fn test_cannot_reinitiate_after_paid() {
        let mut record = record();
        record.payment_status = PaymentStatus::Paid;
        let result = record.record_payment_intent(
            &intent("PI999"),
            "ADM_2_abcd".into(),
            Amount::new(dec!(20)).unwrap(),
            "EGP".into(),
            now(),
        );
        assert!(matches!(result, Err(AdmissionError::InvalidState(_))));
        assert_eq!(record.payment_transaction_id, None);
    }

    #[test]
    fn test_short_id_prefix() {
        let id = ApplicationId::generate();
        assert_eq!(id.short().len(), 8);
        assert!(id.to_string().starts_with(&id.short()));
    }
}
