use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of an application.
///
/// Serialized as the human-readable label shown to parents and administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "Awaiting Test Slot")]
    AwaitingTestSlot,
    #[serde(rename = "Test Slot Booked")]
    TestSlotBooked,
    #[serde(rename = "Test Scheduled")]
    TestScheduled,
    #[serde(rename = "Test Completed")]
    TestCompleted,
    #[serde(rename = "Passed")]
    Passed,
    #[serde(rename = "Failed")]
    Failed,
    #[serde(rename = "Pending Review")]
    PendingReview,
    #[serde(rename = "Admitted")]
    Admitted,
    #[serde(rename = "Rejected")]
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [Self; 9] = [
        Self::AwaitingTestSlot,
        Self::TestSlotBooked,
        Self::TestScheduled,
        Self::TestCompleted,
        Self::Passed,
        Self::Failed,
        Self::PendingReview,
        Self::Admitted,
        Self::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::AwaitingTestSlot => "Awaiting Test Slot",
            Self::TestSlotBooked => "Test Slot Booked",
            Self::TestScheduled => "Test Scheduled",
            Self::TestCompleted => "Test Completed",
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::PendingReview => "Pending Review",
            Self::Admitted => "Admitted",
            Self::Rejected => "Rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Admitted | Self::Rejected)
    }

    /// States reachable from `self` in a single step.
    pub const fn successors(self) -> &'static [Self] {
        use ApplicationStatus::*;
        match self {
            AwaitingTestSlot => &[TestSlotBooked, PendingReview, Rejected],
            TestSlotBooked => &[TestScheduled, TestCompleted, PendingReview, Rejected],
            TestScheduled => &[TestSlotBooked, TestCompleted, PendingReview, Rejected],
            TestCompleted => &[Passed, Failed, PendingReview],
            Passed => &[Admitted, PendingReview, Rejected],
            Failed => &[PendingReview, Rejected],
            PendingReview => &[
                TestScheduled,
                TestCompleted,
                Passed,
                Failed,
                Admitted,
                Rejected,
            ],
            Admitted | Rejected => &[],
        }
    }

    /// Re-asserting the current state is always allowed; it lets a slot be
    /// re-booked and lets administrators edit notes without a status change.
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next || self.successors().contains(&next)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    /// Accepts the display label or any spacing/casing of it
    /// (`"Test Slot Booked"`, `"test_slot_booked"`, `"TEST-SLOT-BOOKED"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = squash(s);
        Self::ALL
            .into_iter()
            .find(|status| squash(status.label()) == wanted)
            .ok_or_else(|| format!("unknown application status '{s}'"))
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Initiated,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Initiated => "initiated",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    /// Maps a gateway notification status: `SUCCESS` (any casing) is paid,
    /// everything else is a failure.
    pub fn from_gateway_status(status: &str) -> Self {
        if status.trim().eq_ignore_ascii_case("SUCCESS") {
            Self::Paid
        } else {
            Self::Failed
        }
    }

    /// A failed intent may still settle: the payer can retry on the same
    /// hosted page and the gateway then reports success for that intent.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Initiated)
                | (Self::Failed, Self::Initiated)
                | (Self::Initiated, Self::Paid)
                | (Self::Initiated, Self::Failed)
                | (Self::Failed, Self::Paid)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "" => Ok(Self::Pending),
            "initiated" => Ok(Self::Initiated),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}
