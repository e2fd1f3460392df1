use super::{AdmissionEngine, MAX_WRITE_ATTEMPTS, mask_email};
use crate::domain::amount::Amount;
use crate::domain::application::ApplicationRecord;
use crate::domain::payment::{Customer, PaymentIntent, PaymentIntentRequest, merchant_reference};
use crate::domain::status::PaymentStatus;
use crate::error::{AdmissionError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

/// A payment-initiation request as sent by the browser.
///
/// Both fields stay loosely typed so that a wrong type is reported with its
/// own error code instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiatePayment {
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
}

/// Where to send the payer, and the references the callback will carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub payment_url: String,
    pub payment_intent_id: String,
    pub merchant_reference_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    /// True when an open intent was returned instead of creating one.
    pub reused: bool,
}

impl PaymentSession {
    fn open(record: &ApplicationRecord, intent: PaymentIntent, default_amount: Amount, currency: &str) -> Self {
        Self {
            payment_url: intent.payment_url,
            payment_intent_id: intent.intent_id,
            merchant_reference_id: record.merchant_reference_id.clone().unwrap_or_default(),
            amount: record.payment_amount.unwrap_or(default_amount).value(),
            currency: record
                .payment_currency
                .clone()
                .unwrap_or_else(|| currency.to_string()),
            reused: true,
        }
    }
}

fn required_email(value: Option<&Value>) -> Result<&str> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err(AdmissionError::MissingEmail),
        Some(Value::String(s)) if s.is_empty() => Err(AdmissionError::MissingEmail),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        Some(_) => Err(AdmissionError::InvalidEmail),
    }
}

impl AdmissionEngine {
    /// Opens a hosted payment page for the applicant's fee.
    ///
    /// Checks run in a fixed order and each stops the request before the
    /// next: email, amount, gateway configuration, record lookup, record
    /// state, billable name. The gateway is only called once all pass.
    ///
    /// While a previous intent is still open it is returned as is; a paid
    /// record yields `ALREADY_PAID`; a failed one may start over.
    pub async fn initiate_payment(&self, request: InitiatePayment) -> Result<PaymentSession> {
        let payment = &self.settings.payment;

        let email = required_email(request.email.as_ref())?;
        let amount = Amount::coerce(request.amount.as_ref(), payment.default_fee)?;
        let resolved = payment.resolve().inspect_err(|e| {
            error!(error = %e, "Payment gateway is not configured");
        })?;

        let mut record = self
            .applications
            .find_by_email_ignore_case(email)
            .await?
            .ok_or_else(|| AdmissionError::FormNotFound(email.to_string()))?;

        if record.status.is_terminal() {
            return Err(AdmissionError::InvalidState(format!(
                "application is already '{}'",
                record.status
            )));
        }
        if record.payment_status == PaymentStatus::Paid {
            return Err(AdmissionError::AlreadyPaid);
        }
        if let Some(intent) = record.open_payment_intent() {
            info!(
                application_id = %record.id,
                payment_intent_id = %intent.intent_id,
                "Returning open payment intent"
            );
            return Ok(PaymentSession::open(&record, intent, amount, &payment.currency));
        }

        let name = record
            .profile
            .student_display_name()
            .ok_or(AdmissionError::MissingStudentName)?;

        let now = self.now();
        let merchant_reference_id = merchant_reference(now.timestamp_millis(), &record.id.short());
        let intent_request = PaymentIntentRequest {
            amount,
            currency: payment.currency.clone(),
            customer: Customer {
                name,
                email: record.primary_email().to_string(),
                phone_country_code: payment.phone_country_code.clone(),
                phone_number: record.profile.guardian_phone().map(str::to_string),
            },
            item_description: payment.item_description.clone(),
            merchant_reference_id: merchant_reference_id.clone(),
            callback_url: resolved.callback_url,
        };

        let started = Instant::now();
        let intent = self
            .gateway
            .create_payment_intent(&resolved.credentials, &intent_request)
            .await
            .inspect_err(|e| {
                warn!(
                    application_id = %record.id,
                    %merchant_reference_id,
                    error = %e,
                    "Payment intent creation failed"
                );
            })?;

        let saved = self
            .persist_payment_intent(record, &intent, &merchant_reference_id, amount, now)
            .await
            .inspect_err(|e| {
                // The gateway already holds an intent no record knows about.
                error!(
                    payment_intent_id = %intent.intent_id,
                    %merchant_reference_id,
                    error = %e,
                    "Failed to persist payment intent"
                );
            })?;

        if saved.payment_transaction_id.as_deref() != Some(intent.intent_id.as_str())
            && let Some(open) = saved.open_payment_intent()
        {
            warn!(
                application_id = %saved.id,
                orphaned_intent_id = %intent.intent_id,
                payment_intent_id = %open.intent_id,
                "Concurrent initiation won, returning its intent"
            );
            return Ok(PaymentSession::open(&saved, open, amount, &payment.currency));
        }

        info!(
            application_id = %saved.id,
            email = %mask_email(email),
            payment_intent_id = %intent.intent_id,
            %merchant_reference_id,
            %amount,
            duration_ms = started.elapsed().as_millis() as u64,
            "Payment initiated"
        );

        Ok(PaymentSession {
            payment_url: intent.payment_url,
            payment_intent_id: intent.intent_id,
            merchant_reference_id,
            amount: amount.value(),
            currency: payment.currency.clone(),
            reused: false,
        })
    }
}

impl AdmissionEngine {
    /// Stores a freshly created intent on the record, re-reading it when
    /// another request wrote first. A record that meanwhile gained an open
    /// intent of its own is returned unchanged.
    async fn persist_payment_intent(
        &self,
        mut record: ApplicationRecord,
        intent: &PaymentIntent,
        merchant_reference_id: &str,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<ApplicationRecord> {
        let id = record.id;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            if record.has_paid() {
                return Err(AdmissionError::AlreadyPaid);
            }
            if record.open_payment_intent().is_some() {
                return Ok(record);
            }

            record.record_payment_intent(
                intent,
                merchant_reference_id.to_string(),
                amount,
                self.settings.payment.currency.clone(),
                now,
            )?;
            match self.applications.update(record).await {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_write_race() => {
                    debug!(attempt, error = %e, "Retrying payment intent write");
                }
                Err(e) => return Err(e.into()),
            }

            record = self
                .applications
                .get(id)
                .await?
                .ok_or_else(|| AdmissionError::ApplicationNotFound(id.to_string()))?;
        }
        Err(AdmissionError::ConcurrentUpdate(id))
    }
}
