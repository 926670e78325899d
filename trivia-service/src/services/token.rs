use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::TokenConfig;
use crate::services::ServiceError;

const ALGORITHM: Algorithm = Algorithm::HS512;

/// Purpose of a token, carried in the `sub` claim. A token issued for one
/// purpose never validates for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Verification,
    LoginWithEmail,
    Refresh,
}

impl TokenKind {
    pub fn subject(self) -> &'static str {
        match self {
            TokenKind::Access => "api_access_token",
            TokenKind::Verification => "verify_token",
            TokenKind::LoginWithEmail => "login_with_email_token",
            TokenKind::Refresh => "refresh_token",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub user: i64,
}

/// HMAC-signed token issuer and validator.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_expiry_minutes: i64,
    verification_token_expiry_minutes: i64,
    login_email_token_expiry_minutes: i64,
    refresh_token_expiry_minutes: i64,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret_key.expose_secret().as_bytes();

        tracing::info!(issuer = %config.issuer, "Token service initialized with HS512");

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            verification_token_expiry_minutes: config.verification_token_expiry_minutes,
            login_email_token_expiry_minutes: config.login_email_token_expiry_minutes,
            refresh_token_expiry_minutes: config.refresh_token_expiry_minutes,
        }
    }

    fn expiry_minutes(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_token_expiry_minutes,
            TokenKind::Verification => self.verification_token_expiry_minutes,
            TokenKind::LoginWithEmail => self.login_email_token_expiry_minutes,
            TokenKind::Refresh => self.refresh_token_expiry_minutes,
        }
    }

    fn issue(&self, kind: TokenKind, user_id: i64, ttl: Duration) -> Result<String, ServiceError> {
        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: kind.subject().to_string(),
            exp: Utc::now()
                .checked_add_signed(ttl)
                .ok_or_else(|| ServiceError::Signing("token expiry out of range".to_string()))?
                .timestamp(),
            user: user_id,
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Signing(e.to_string()))
    }

    pub fn generate_token(&self, kind: TokenKind, user_id: i64) -> Result<String, ServiceError> {
        let ttl = Duration::try_minutes(self.expiry_minutes(kind))
            .ok_or_else(|| ServiceError::Signing("token expiry out of range".to_string()))?;
        self.issue(kind, user_id, ttl)
    }

    pub fn generate_access_token(&self, user_id: i64) -> Result<String, ServiceError> {
        self.generate_token(TokenKind::Access, user_id)
    }

    pub fn generate_verification_token(&self, user_id: i64) -> Result<String, ServiceError> {
        self.generate_token(TokenKind::Verification, user_id)
    }

    pub fn generate_login_with_email_token(&self, user_id: i64) -> Result<String, ServiceError> {
        self.generate_token(TokenKind::LoginWithEmail, user_id)
    }

    pub fn generate_refresh_token(&self, user_id: i64) -> Result<String, ServiceError> {
        self.generate_token(TokenKind::Refresh, user_id)
    }

    /// Verify signature, expiry, issuer and purpose, returning the embedded
    /// user id. Every failure collapses to [`ServiceError::InvalidToken`].
    pub fn validate_token(&self, token: &str, expected: TokenKind) -> Result<i64, ServiceError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.sub = Some(expected.subject().to_string());

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.user)
            .map_err(|e| {
                tracing::debug!(error = %e, kind = expected.subject(), "Token rejected");
                ServiceError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn config(secret: &str) -> TokenConfig {
        TokenConfig {
            secret_key: Secret::new(secret.to_string()),
            issuer: "trivia-service".to_string(),
            access_token_expiry_minutes: 59,
            verification_token_expiry_minutes: 1440,
            login_email_token_expiry_minutes: 15,
            refresh_token_expiry_minutes: 10080,
        }
    }

    fn service() -> TokenService {
        TokenService::new(&config("0123456789abcdef0123456789abcdef"))
    }

    #[test]
    fn test_round_trip_for_each_kind() {
        let service = service();
        for kind in [
            TokenKind::Access,
            TokenKind::Verification,
            TokenKind::LoginWithEmail,
            TokenKind::Refresh,
        ] {
            let token = service.generate_token(kind, 42).unwrap();
            assert_eq!(service.validate_token(&token, kind).unwrap(), 42);
        }
    }

    #[test]
    fn test_claims_shape() {
        let service = service();
        let token = service.generate_access_token(7).unwrap();

        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&["trivia-service"]);
        let data = decode::<TokenClaims>(&token, &service.decoding_key, &validation).unwrap();

        assert_eq!(data.header.alg, Algorithm::HS512);
        assert_eq!(data.claims.sub, "api_access_token");
        assert_eq!(data.claims.user, 7);
        let ttl = data.claims.exp - Utc::now().timestamp();
        assert!(ttl > 58 * 60 && ttl <= 59 * 60);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let service = service();
        let verify = service.generate_verification_token(1).unwrap();
        let login = service.generate_login_with_email_token(1).unwrap();
        let refresh = service.generate_refresh_token(1).unwrap();

        assert!(service.validate_token(&verify, TokenKind::Access).is_err());
        assert!(service.validate_token(&login, TokenKind::Access).is_err());
        assert!(service.validate_token(&refresh, TokenKind::Access).is_err());
        assert!(service.validate_token(&login, TokenKind::Verification).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = service();
        let token = service
            .issue(TokenKind::Access, 1, Duration::seconds(-5))
            .unwrap();

        let err = service.validate_token(&token, TokenKind::Access).unwrap_err();
        assert_eq!(err.to_string(), "JWT could not be validated");
    }

    #[test]
    fn test_out_of_range_expiry_is_signing_error() {
        let mut huge = config("0123456789abcdef0123456789abcdef");
        huge.access_token_expiry_minutes = i64::MAX / 2;
        huge.refresh_token_expiry_minutes = 1_000_000_000_000;
        let service = TokenService::new(&huge);

        assert!(matches!(
            service.generate_access_token(1),
            Err(ServiceError::Signing(_))
        ));
        assert!(matches!(
            service.generate_refresh_token(1),
            Err(ServiceError::Signing(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service().generate_access_token(1).unwrap();
        let other = TokenService::new(&config("fedcba9876543210fedcba9876543210"));

        assert!(matches!(
            other.validate_token(&token, TokenKind::Access),
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let token = service().generate_access_token(1).unwrap();
        let mut other_config = config("0123456789abcdef0123456789abcdef");
        other_config.issuer = "someone-else".to_string();

        assert!(TokenService::new(&other_config)
            .validate_token(&token, TokenKind::Access)
            .is_err());
    }

    #[test]
    fn test_garbage_and_empty_rejected() {
        let service = service();
        for token in ["", "not.a.jwt", "abc"] {
            let err = service.validate_token(token, TokenKind::Access).unwrap_err();
            assert_eq!(err.to_string(), "JWT could not be validated");
        }
    }

    #[test]
    fn test_unsigned_token_rejected() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

        let service = service();
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"iss":"trivia-service","sub":"api_access_token","exp":{},"user":1}}"#,
            Utc::now().timestamp() + 600
        ));
        let token = format!("{}.{}.", header, payload);

        assert!(service.validate_token(&token, TokenKind::Access).is_err());
    }
}
