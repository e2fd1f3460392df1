use crate::domain::payment::{GatewayCredentials, PaymentIntent, PaymentIntentRequest};
use crate::domain::ports::PaymentGateway;
use crate::error::GatewayError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info};

pub const DEFAULT_ENDPOINT: &str =
    "https://api.merchant.geidea.net/payment-intent/api/v1/direct/eInvoice";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Geidea "direct eInvoice" client.
///
/// Issues one `POST` per intent with Basic auth and a bounded timeout; a
/// timeout is reported as [`GatewayError::Timeout`], never as success.
#[derive(Clone)]
pub struct GeideaGateway {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl GeideaGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceBody<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    customer: CustomerBody<'a>,
    e_invoice_details: InvoiceDetails<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerBody<'a> {
    name: &'a str,
    email: &'a str,
    phone_country_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceDetails<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    grand_total: Decimal,
    extra_charges_type: &'static str,
    invoice_discount_type: &'static str,
    e_invoice_items: Vec<InvoiceItem<'a>>,
    merchant_reference_id: &'a str,
    callback_url: &'a str,
    r#type: &'static str,
    language: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceItem<'a> {
    description: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    quantity: u32,
    item_discount_type: &'static str,
    tax_type: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    total: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentResponse {
    payment_intent_id: Option<String>,
    payment_url: Option<String>,
}

impl<'a> InvoiceBody<'a> {
    fn from_request(request: &'a PaymentIntentRequest) -> Self {
        let amount = request.amount.value();
        Self {
            amount,
            currency: &request.currency,
            customer: CustomerBody {
                name: &request.customer.name,
                email: &request.customer.email,
                phone_country_code: &request.customer.phone_country_code,
                phone_number: request.customer.phone_number.as_deref(),
            },
            e_invoice_details: InvoiceDetails {
                subtotal: amount,
                grand_total: amount,
                extra_charges_type: "Amount",
                invoice_discount_type: "Amount",
                e_invoice_items: vec![InvoiceItem {
                    description: &request.item_description,
                    price: amount,
                    quantity: 1,
                    item_discount_type: "Amount",
                    tax_type: "Amount",
                    total: amount,
                }],
                merchant_reference_id: &request.merchant_reference_id,
                callback_url: &request.callback_url,
                r#type: "Detailed",
                language: "EN",
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for GeideaGateway {
    async fn create_payment_intent(
        &self,
        credentials: &GatewayCredentials,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        let body = InvoiceBody::from_request(request);
        let started = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(
                credentials.api_key.expose_secret(),
                Some(credentials.api_password.expose_secret()),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;
        info!(
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            merchant_reference_id = %request.merchant_reference_id,
            "Payment gateway responded"
        );

        let parsed: Option<serde_json::Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            error!(status = status.as_u16(), body = %text, "Payment gateway rejected intent");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: parsed.unwrap_or(serde_json::Value::String(text)),
            });
        }

        let value = parsed.ok_or_else(|| {
            GatewayError::InvalidResponse(format!("body is not JSON: {}", truncate(&text, 200)))
        })?;
        let intent: IntentResponse = serde_json::from_value(value)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        match (intent.payment_intent_id, intent.payment_url) {
            (Some(intent_id), Some(payment_url)) if !intent_id.is_empty() => Ok(PaymentIntent {
                intent_id,
                payment_url,
            }),
            _ => Err(GatewayError::InvalidResponse(
                "response lacks paymentIntentId or paymentUrl".to_string(),
            )),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::Amount;
    use crate::domain::payment::Customer;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request() -> PaymentIntentRequest {
        PaymentIntentRequest {
            amount: Amount::new(dec!(5000)).unwrap(),
            currency: "EGP".into(),
            customer: Customer {
                name: "Laila Hassan".into(),
                email: "a@x.com".into(),
                phone_country_code: "+20".into(),
                phone_number: None,
            },
            item_description: "Admission Fee".into(),
            merchant_reference_id: "ADM_1_abcdef12".into(),
            callback_url: "https://school.example/payment-callback".into(),
        }
    }

    #[test]
    fn test_invoice_body_shape() {
        let request = request();
        let body = serde_json::to_value(InvoiceBody::from_request(&request)).unwrap();

        assert_eq!(body["amount"], json!(5000.0));
        assert_eq!(body["currency"], "EGP");
        assert_eq!(body["customer"]["name"], "Laila Hassan");
        assert!(body["customer"].get("phoneNumber").is_none());

        let details = &body["eInvoiceDetails"];
        assert_eq!(details["merchantReferenceId"], "ADM_1_abcdef12");
        assert_eq!(details["callbackUrl"], "https://school.example/payment-callback");
        assert_eq!(details["type"], "Detailed");
        assert_eq!(details["eInvoiceItems"][0]["quantity"], 1);
        assert_eq!(details["eInvoiceItems"][0]["total"], json!(5000.0));
    }
}
