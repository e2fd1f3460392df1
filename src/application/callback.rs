use super::{AdmissionEngine, MAX_WRITE_ATTEMPTS};
use crate::domain::application::PaymentUpdate;
use crate::domain::status::PaymentStatus;
use crate::error::{AdmissionError, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Asynchronous gateway notification about a payment intent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The record moved to this payment status.
    Applied(PaymentStatus),
    /// The record already had this status.
    Unchanged(PaymentStatus),
    /// The move is not allowed from the record's current status.
    Ignored {
        current: PaymentStatus,
        reported: PaymentStatus,
    },
    /// No record carries the intent id.
    Unmatched,
}

impl AdmissionEngine {
    /// Applies a gateway notification to the record holding the intent.
    ///
    /// `SUCCESS` (any casing) means paid and anything else means failed. The
    /// match on the intent id is exact, whitespace included. Every outcome
    /// except a missing intent id is acknowledged, so the gateway can
    /// redeliver freely.
    pub async fn handle_payment_callback(&self, notification: PaymentNotification) -> Result<CallbackOutcome> {
        let intent_id = notification
            .payment_intent_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(AdmissionError::MissingPaymentIntentId)?;
        let reported = PaymentStatus::from_gateway_status(notification.status.as_deref().unwrap_or_default());

        let mut contended = None;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(mut record) = self.applications.find_by_transaction_id(intent_id).await? else {
                warn!(payment_intent_id = %intent_id, %reported, "Callback for unknown payment intent");
                return Ok(CallbackOutcome::Unmatched);
            };

            let id = record.id;
            let current = record.payment_status;
            let outcome = match record.apply_payment_outcome(reported, self.now()) {
                PaymentUpdate::Applied => match self.applications.update(record).await {
                    Ok(_) => CallbackOutcome::Applied(reported),
                    Err(e) if e.is_write_race() => {
                        debug!(attempt, error = %e, "Retrying payment callback");
                        contended = Some(id);
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
                PaymentUpdate::Unchanged => CallbackOutcome::Unchanged(reported),
                PaymentUpdate::Rejected => {
                    warn!(
                        application_id = %id,
                        payment_intent_id = %intent_id,
                        %current,
                        %reported,
                        "Ignoring payment callback"
                    );
                    CallbackOutcome::Ignored { current, reported }
                }
            };

            info!(
                application_id = %id,
                payment_intent_id = %intent_id,
                transaction_id = notification.transaction_id.as_deref().unwrap_or("-"),
                gateway_status = notification.status.as_deref().unwrap_or("-"),
                ?outcome,
                "Payment callback processed"
            );
            return Ok(outcome);
        }

        contended.map_or(Ok(CallbackOutcome::Unmatched), |id| {
            Err(AdmissionError::ConcurrentUpdate(id))
        })
    }
}
