use super::amount::Amount;
use secrecy::SecretString;

/// Credentials for HTTP Basic authentication against the payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub api_key: SecretString,
    pub api_password: SecretString,
}

/// Customer identity sent with an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone_country_code: String,
    pub phone_number: Option<String>,
}

/// Everything the gateway needs to open a hosted payment page.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntentRequest {
    pub amount: Amount,
    pub currency: String,
    pub customer: Customer,
    pub item_description: String,
    pub merchant_reference_id: String,
    pub callback_url: String,
}

/// A gateway payment intent: the id the callback will carry and the page to
/// redirect the payer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub payment_url: String,
}

/// `ADM_{unix_millis}_{first 8 chars of the application id}`.
pub fn merchant_reference(timestamp_millis: i64, short_id: &str) -> String {
    format!("ADM_{timestamp_millis}_{short_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merchant_reference_format() {
        assert_eq!(
            merchant_reference(1_760_000_000_000, "3f2a9c1e"),
            "ADM_1760000000000_3f2a9c1e"
        );
    }
}
