use super::application::ApplicationRecord;
use serde::{Deserialize, Serialize};

/// The applicant-facing page the workflow routes to next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    Submission,
    SlotBooking,
    Payment,
    Documents,
}

/// Coarse progress flags derived from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub has_form: bool,
    pub has_test_slot: bool,
    pub has_paid: bool,
}

impl Progress {
    pub fn of(record: Option<&ApplicationRecord>) -> Self {
        match record {
            None => Self::default(),
            Some(record) => Self {
                has_form: true,
                has_test_slot: record.has_test_slot(),
                has_paid: record.has_paid(),
            },
        }
    }

    /// Linear decision chain: the first missing step wins.
    pub fn next_step(&self) -> NextStep {
        if !self.has_form {
            NextStep::Submission
        } else if !self.has_test_slot {
            NextStep::SlotBooking
        } else if !self.has_paid {
            NextStep::Payment
        } else {
            NextStep::Documents
        }
    }
}
