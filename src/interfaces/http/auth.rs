use crate::error::AdmissionError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION_V1: &str = "v1";
const MAX_TOKEN_LEN: usize = 512;
pub const SIGNATURE_HEADER: &str = "x-signature";

/// The single administrator account, password stored as a SHA-256 digest.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password_sha256: [u8; 32],
}

impl AdminCredentials {
    pub fn from_hex(email: impl Into<String>, password_sha256_hex: &str) -> Result<Self, hex::FromHexError> {
        let mut password_sha256 = [0u8; 32];
        hex::decode_to_slice(password_sha256_hex.trim(), &mut password_sha256)?;
        Ok(Self {
            email: email.into(),
            password_sha256,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks administrator session tokens.
///
/// A token is `v1.<base64url claims>.<base64url HMAC-SHA256>`; the claims
/// carry the administrator email and an expiry in unix seconds.
pub struct AdminAuth {
    admin: Option<AdminCredentials>,
    session_secret: SecretString,
    ttl: Duration,
}

impl AdminAuth {
    pub fn new(admin: Option<AdminCredentials>, session_secret: SecretString, ttl: Duration) -> Self {
        Self {
            admin,
            session_secret,
            ttl,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.admin.is_some()
    }

    fn mac(&self) -> Result<HmacSha256, AdmissionError> {
        HmacSha256::new_from_slice(self.session_secret.expose_secret().as_bytes())
            .map_err(|e| AdmissionError::Internal(e.to_string()))
    }

    pub fn login(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<IssuedToken, AdmissionError> {
        let admin = self
            .admin
            .as_ref()
            .ok_or_else(|| AdmissionError::Unauthorized("admin login is not configured".into()))?;

        let digest = Sha256::digest(password.as_bytes());
        let password_ok: bool = digest.as_slice().ct_eq(&admin.password_sha256).into();
        let email_ok = admin.email.eq_ignore_ascii_case(email.trim());
        if !(password_ok && email_ok) {
            return Err(AdmissionError::Unauthorized("invalid credentials".into()));
        }

        self.issue(&admin.email, now)
    }

    pub fn issue(&self, subject: &str, now: DateTime<Utc>) -> Result<IssuedToken, AdmissionError> {
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
        };
        let claims_bytes =
            serde_json::to_vec(&claims).map_err(|e| AdmissionError::Internal(e.to_string()))?;
        let claims_part = URL_SAFE_NO_PAD.encode(claims_bytes);

        let mut mac = self.mac()?;
        mac.update(claims_part.as_bytes());
        let sig_part = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{TOKEN_VERSION_V1}.{claims_part}.{sig_part}"),
            expires_at,
        })
    }

    /// Returns the administrator the token was issued to.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<String, AdmissionError> {
        let invalid = || AdmissionError::Unauthorized("invalid or expired token".into());

        if token.len() > MAX_TOKEN_LEN {
            return Err(invalid());
        }
        let mut parts = token.split('.');
        let (Some(TOKEN_VERSION_V1), Some(claims_part), Some(sig_part), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let mut mac = self.mac()?;
        mac.update(claims_part.as_bytes());
        let signature = URL_SAFE_NO_PAD.decode(sig_part).map_err(|_| invalid())?;
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let claims_bytes = URL_SAFE_NO_PAD.decode(claims_part).map_err(|_| invalid())?;
        let claims: SessionClaims = serde_json::from_slice(&claims_bytes).map_err(|_| invalid())?;
        if claims.exp <= now.timestamp() {
            return Err(invalid());
        }
        Ok(claims.sub)
    }
}

/// Checks the `x-signature` header on gateway callbacks: lower-case hex of
/// HMAC-SHA256 over the raw request body.
pub struct CallbackVerifier {
    secret: SecretString,
}

impl CallbackVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self) -> Result<HmacSha256, AdmissionError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| AdmissionError::Internal(e.to_string()))
    }

    pub fn sign(&self, body: &[u8]) -> Result<String, AdmissionError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), AdmissionError> {
        let signature = signature.ok_or(AdmissionError::InvalidSignature)?;
        let expected = hex::decode(signature.trim()).map_err(|_| AdmissionError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| AdmissionError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PASSWORD_SHA256: &str = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"; // "password"

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 12, 9, 0, 0).unwrap()
    }

    fn auth() -> AdminAuth {
        AdminAuth::new(
            Some(AdminCredentials::from_hex("admin@school.example", PASSWORD_SHA256).unwrap()),
            SecretString::from("session-secret".to_string()),
            Duration::minutes(30),
        )
    }

    #[test]
    fn test_login_and_verify() {
        let auth = auth();
        let issued = auth.login("Admin@School.example", "password", now()).unwrap();
        assert_eq!(issued.expires_at, now() + Duration::minutes(30));
        assert_eq!(
            auth.verify(&issued.token, now()).unwrap(),
            "admin@school.example"
        );
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let auth = auth();
        assert!(matches!(
            auth.login("admin@school.example", "Password", now()),
            Err(AdmissionError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.login("someone@school.example", "password", now()),
            Err(AdmissionError::Unauthorized(_))
        ));

        let unconfigured = AdminAuth::new(None, SecretString::from("s".to_string()), Duration::minutes(5));
        assert!(!unconfigured.is_configured());
        assert!(unconfigured.login("admin@school.example", "password", now()).is_err());
    }

    #[test]
    fn test_token_expiry_and_tampering() {
        let auth = auth();
        let issued = auth.issue("admin@school.example", now()).unwrap();

        assert!(auth.verify(&issued.token, now() + Duration::minutes(30)).is_err());

        let mut tampered = issued.token.clone();
        tampered.push('A');
        assert!(auth.verify(&tampered, now()).is_err());

        let other = AdminAuth::new(None, SecretString::from("other".to_string()), Duration::minutes(30));
        assert!(other.verify(&issued.token, now()).is_err());
        assert!(auth.verify("v1.only-two", now()).is_err());
    }

    #[test]
    fn test_callback_signature() {
        let verifier = CallbackVerifier::new(SecretString::from("hook-secret".to_string()));
        let body = br#"{"paymentIntentId":"PI123","status":"SUCCESS"}"#;
        let signature = verifier.sign(body).unwrap();

        assert!(verifier.verify(body, Some(&signature)).is_ok());
        assert!(matches!(
            verifier.verify(b"{}", Some(&signature)),
            Err(AdmissionError::InvalidSignature)
        ));
        assert!(matches!(
            verifier.verify(body, None),
            Err(AdmissionError::InvalidSignature)
        ));
        assert!(matches!(
            verifier.verify(body, Some("zz")),
            Err(AdmissionError::InvalidSignature)
        ));
    }
}
