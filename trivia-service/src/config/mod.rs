//! Service configuration loaded from the environment.
//!
//! Two values are operationally sensitive: `JWT_SECRET_KEY` signs every token
//! and `AUTH_HASH_PEPPER` is mixed into every stored password hash. Rotating
//! the secret logs every user out; rotating the pepper makes every existing
//! password hash unverifiable, so users must go through email-link login and
//! set a new password.

use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Minimum accepted length for the signing secret and the pepper.
const MIN_SECRET_LENGTH: usize = 32;
/// One year.
const MAX_TOKEN_EXPIRY_MINUTES: i64 = 525_600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub token: TokenConfig,
    pub password: PasswordConfig,
    pub email: EmailConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret_key: Secret<String>,
    pub issuer: String,
    pub access_token_expiry_minutes: i64,
    pub verification_token_expiry_minutes: i64,
    pub login_email_token_expiry_minutes: i64,
    pub refresh_token_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub pepper: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: Secret<String>,
    pub from_address: String,
    /// Product name used as the subject prefix.
    pub app_name: String,
    /// Public origin used to build links in outgoing emails.
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub login_email_attempts: u32,
    pub login_email_window_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AppConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("trivia-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            token: TokenConfig {
                secret_key: Secret::new(get_env("JWT_SECRET_KEY", None, is_prod)?),
                issuer: get_env("JWT_ISSUER", Some("trivia-service"), is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "59",
                    is_prod,
                )?,
                verification_token_expiry_minutes: parse_env(
                    "JWT_VERIFICATION_TOKEN_EXPIRY_MINUTES",
                    "1440",
                    is_prod,
                )?,
                login_email_token_expiry_minutes: parse_env(
                    "JWT_LOGIN_EMAIL_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
                refresh_token_expiry_minutes: parse_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_MINUTES",
                    "10080",
                    is_prod,
                )?,
            },
            password: PasswordConfig {
                pepper: Secret::new(get_env("AUTH_HASH_PEPPER", None, is_prod)?),
            },
            email: EmailConfig {
                smtp_host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                smtp_port: parse_env("SMTP_PORT", "587", is_prod)?,
                smtp_user: get_env("SMTP_USER", None, is_prod)?,
                smtp_password: Secret::new(get_env("SMTP_PASSWORD", None, is_prod)?),
                from_address: get_env(
                    "EMAIL_FROM_ADDRESS",
                    Some("do-not-reply@localhost"),
                    is_prod,
                )?,
                app_name: get_env("EMAIL_APP_NAME", Some("Open Trivia Online"), is_prod)?,
                base_url: get_env("APP_BASE_URL", Some("http://localhost:3000"), is_prod)?
                    .trim_end_matches('/')
                    .to_string(),
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                secure_cookies: parse_env("SECURE_COOKIES", "false", is_prod)?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "10", is_prod)?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900", is_prod)?,
                register_attempts: parse_env("RATE_LIMIT_REGISTER_ATTEMPTS", "5", is_prod)?,
                register_window_seconds: parse_env(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    "3600",
                    is_prod,
                )?,
                login_email_attempts: parse_env("RATE_LIMIT_LOGIN_EMAIL_ATTEMPTS", "5", is_prod)?,
                login_email_window_seconds: parse_env(
                    "RATE_LIMIT_LOGIN_EMAIL_WINDOW_SECONDS",
                    "3600",
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        let expiries = [
            ("JWT_ACCESS_TOKEN_EXPIRY_MINUTES", self.token.access_token_expiry_minutes),
            (
                "JWT_VERIFICATION_TOKEN_EXPIRY_MINUTES",
                self.token.verification_token_expiry_minutes,
            ),
            (
                "JWT_LOGIN_EMAIL_TOKEN_EXPIRY_MINUTES",
                self.token.login_email_token_expiry_minutes,
            ),
            ("JWT_REFRESH_TOKEN_EXPIRY_MINUTES", self.token.refresh_token_expiry_minutes),
        ];
        for (key, minutes) in expiries {
            if minutes <= 0 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} must be positive",
                    key
                )));
            }
            if minutes > MAX_TOKEN_EXPIRY_MINUTES {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} must not exceed {} minutes",
                    key,
                    MAX_TOKEN_EXPIRY_MINUTES
                )));
            }
        }

        if self.token.secret_key.expose_secret().len() < MIN_SECRET_LENGTH {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET_KEY must be at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }

        if self.password.pepper.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "AUTH_HASH_PEPPER must not be empty"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.password.pepper.expose_secret().len() < MIN_SECRET_LENGTH {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "AUTH_HASH_PEPPER must be at least {} characters in production",
                    MIN_SECRET_LENGTH
                )));
            }

            if !self.security.secure_cookies {
                tracing::warn!("SECURE_COOKIES is disabled in production");
            }
        }

        Ok(())
    }

    /// The access cookie lives exactly as long as the token it carries.
    pub fn access_cookie_max_age_seconds(&self) -> i64 {
        self.token.access_token_expiry_minutes.saturating_mul(60)
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
