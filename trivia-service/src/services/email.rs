use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::EmailConfig;

const PLAIN_TEXT_FALLBACK: &str =
    "This email requires an HTML capable client. Please enable HTML to view it.";

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), AppError>;
}

/// A rendered message ready to hand to an [`EmailProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
}

/// Builds the account emails. Links point at the public origin so the
/// recipient lands on this service's `/auth/*` endpoints.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    app_name: String,
    base_url: String,
}

impl EmailTemplates {
    pub fn new(app_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/auth/verify?token={}", self.base_url, token)
    }

    pub fn login_link(&self, token: &str) -> String {
        format!("{}/auth/login-with-email?token={}", self.base_url, token)
    }

    pub fn new_user(&self, token: &str) -> RenderedEmail {
        RenderedEmail {
            subject: format!("{} - Verify Your Account", self.app_name),
            html_body: format!(
                r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Welcome to {}!</h2>
        <p>Please verify your account by <a href="{}">Clicking Here!</a></p>
        <p style="color: #666; font-size: 12px;">If you didn't request this, please ignore this email.</p>
    </body>
</html>"###,
                self.app_name,
                self.verification_link(token)
            ),
        }
    }

    pub fn login(&self, token: &str) -> RenderedEmail {
        RenderedEmail {
            subject: format!("{} - Login Email", self.app_name),
            html_body: format!(
                r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Sign in to {}</h2>
        <p>You can log in by <a href="{}">Clicking Here!</a></p>
        <p style="color: #666; font-size: 12px;">This link expires shortly. If you didn't request this, please ignore this email.</p>
    </body>
</html>"###,
                self.app_name,
                self.login_link(token)
            ),
        }
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(
            config.smtp_user.clone(),
            config.smtp_password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.smtp_host, port = config.smtp_port, "Email service initialized");

        Ok(Self { mailer })
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        let email = Message::builder()
            .from(from.parse().map_err(|e: lettre::address::AddressError| {
                AppError::EmailError(format!("invalid from address: {}", e))
            })?)
            .to(to.parse().map_err(|e: lettre::address::AddressError| {
                AppError::EmailError(format!("invalid recipient address: {}", e))
            })?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(PLAIN_TEXT_FALLBACK.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        // SMTP transport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

/// A message captured by [`MockEmailService`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Records every message instead of sending it. Can be told to fail.
#[derive(Default)]
pub struct MockEmailService {
    sent: Mutex<Vec<SentEmail>>,
    fail: Mutex<bool>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        if let Ok(mut f) = self.fail.lock() {
            *f = fail;
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<SentEmail> {
        self.sent().pop()
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        if *self
            .fail
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock email mutex poisoned: {}", e)))?
        {
            return Err(AppError::EmailError("mock provider refused the message".to_string()));
        }

        self.sent
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock email mutex poisoned: {}", e)))?
            .push(SentEmail {
                from: from.to_string(),
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
        Ok(())
    }
}

/// Pull the `token` query value out of the first link in an email body.
#[cfg(test)]
pub(crate) fn extract_token(html_body: &str) -> Option<String> {
    let start = html_body.find("?token=")? + "?token=".len();
    let rest = &html_body[start..];
    let end = rest.find('"').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}
