use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

use crate::{
    dtos::auth::LoginResponse,
    models::{User, ROLE_PLAYER},
    services::{
        email::EmailTemplates, EmailProvider, ServiceError, TokenKind, TokenService, UserStore,
    },
    utils::{Password, PasswordHashString, PasswordHasher},
};

/// Input for [`AuthService::register_new_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

/// Account workflows: registration, verification, email-link login,
/// password login and password change.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    email: Arc<dyn EmailProvider>,
    tokens: TokenService,
    hasher: PasswordHasher,
    templates: EmailTemplates,
    from_address: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Decode `Basic base64(email:password)`. The password may itself contain `:`.
fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (email, password) = decoded.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        email: Arc<dyn EmailProvider>,
        tokens: TokenService,
        hasher: PasswordHasher,
        templates: EmailTemplates,
        from_address: String,
    ) -> Self {
        Self {
            users,
            email,
            tokens,
            hasher,
            templates,
            from_address,
        }
    }

    async fn hash(&self, password: String) -> Result<PasswordHashString, ServiceError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&Password::new(password)))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, ServiceError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || {
            hasher.validate_password(&Password::new(password), &PasswordHashString::new(hash))
        })
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?
    }

    pub async fn register_new_user(&self, req: NewUser) -> Result<User, ServiceError> {
        let email = normalize_email(&req.email);
        let display_name = req.display_name.trim();
        if display_name.is_empty() {
            return Err(ServiceError::Validation("display name is required".to_string()));
        }

        match self.users.find_by_email(&email).await {
            Ok(Some(_)) => return Err(ServiceError::EmailAlreadyRegistered),
            Ok(None) => {}
            // A failed lookup is treated as "no such account"; the insert
            // below still rejects real duplicates.
            Err(e) => tracing::warn!(error = %e, "Email lookup failed during registration"),
        }

        let password_hash = self.hash(req.password).await?;

        let user = self
            .users
            .create(
                &email,
                display_name,
                Some(password_hash.as_str()),
                ROLE_PLAYER,
            )
            .await
            .map_err(ServiceError::Database)?;

        tracing::info!(user_id = user.id, "User registered");

        let token = self.tokens.generate_verification_token(user.id).map_err(|e| {
            tracing::error!(user_id = user.id, error = %e, "Failed to sign verification token");
            ServiceError::VerificationEmailFailed
        })?;

        let message = self.templates.new_user(&token);
        if let Err(e) = self
            .email
            .send(&self.from_address, &user.email, &message.subject, &message.html_body)
            .await
        {
            tracing::error!(user_id = user.id, error = %e, "Verification email failed to send");
            return Err(ServiceError::VerificationEmailFailed);
        }

        Ok(user)
    }

    pub async fn send_login_email(&self, email: &str) -> Result<User, ServiceError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await
            .map_err(ServiceError::Database)?
            .ok_or(ServiceError::UserNotFound)?;

        if user.is_banned {
            return Err(ServiceError::Forbidden("user is banned".to_string()));
        }

        let token = self.tokens.generate_login_with_email_token(user.id)?;

        let message = self.templates.login(&token);
        if let Err(e) = self
            .email
            .send(&self.from_address, &user.email, &message.subject, &message.html_body)
            .await
        {
            tracing::error!(user_id = user.id, error = %e, "Login email failed to send");
            return Err(ServiceError::LoginEmailFailed);
        }

        tracing::info!(user_id = user.id, "Login email sent");
        Ok(user)
    }

    /// Flip the verified flag for the account named by a verification token.
    /// Repeating it is harmless.
    pub async fn verify_new_user(&self, token: &str) -> Result<i64, ServiceError> {
        let user_id = self
            .tokens
            .validate_token(token, TokenKind::Verification)
            .map_err(|_| ServiceError::TokenNotVerified)?;

        self.users
            .mark_verified(user_id)
            .await
            .map_err(ServiceError::Database)?;

        tracing::info!(user_id, "User verified");
        Ok(user_id)
    }

    /// Accept a login-with-email link. Following the link proves control of
    /// the mailbox, so the account is marked verified as well.
    pub async fn verify_login_link(&self, token: &str) -> Result<i64, ServiceError> {
        let user_id = self
            .tokens
            .validate_token(token, TokenKind::LoginWithEmail)
            .map_err(|_| ServiceError::TokenNotVerified)?;

        self.users
            .mark_verified(user_id)
            .await
            .map_err(ServiceError::Database)?;

        Ok(user_id)
    }

    pub async fn login_with_email_link(&self, user_id: i64) -> Result<LoginResponse, ServiceError> {
        let access_token = self.tokens.generate_access_token(user_id).map_err(|e| {
            tracing::error!(user_id, error = %e, "Email-link login failed");
            ServiceError::LoginFailed
        })?;

        self.users.update_last_login(user_id).await.map_err(|e| {
            tracing::error!(user_id, error = %e, "Email-link login failed");
            ServiceError::LoginFailed
        })?;

        tracing::info!(user_id, "User logged in with email link");
        Ok(LoginResponse { access_token })
    }

    /// Password login from an `Authorization: Basic` header. Every failure is
    /// the same [`ServiceError::LoginFailed`].
    pub async fn login(&self, authorization: &str) -> Result<LoginResponse, ServiceError> {
        let (email, password) = parse_basic_auth(authorization).ok_or_else(|| {
            tracing::debug!("Malformed basic authorization header");
            ServiceError::LoginFailed
        })?;

        let user = match self.users.find_by_email(&normalize_email(&email)).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::debug!("Login for unknown email");
                return Err(ServiceError::LoginFailed);
            }
            Err(e) => {
                tracing::error!(error = %e, "User lookup failed during login");
                return Err(ServiceError::LoginFailed);
            }
        };

        let stored_hash = user.password_hash.clone().ok_or_else(|| {
            tracing::debug!(user_id = user.id, "Account has no password set");
            ServiceError::LoginFailed
        })?;

        match self.verify(password, stored_hash).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(user_id = user.id, "Login rejected: wrong password");
                return Err(ServiceError::LoginFailed);
            }
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "Password verification failed");
                return Err(ServiceError::LoginFailed);
            }
        }

        let access_token = self.tokens.generate_access_token(user.id).map_err(|e| {
            tracing::error!(user_id = user.id, error = %e, "Failed to sign access token");
            ServiceError::LoginFailed
        })?;

        self.users.update_last_login(user.id).await.map_err(|e| {
            tracing::error!(user_id = user.id, error = %e, "Failed to record last login");
            ServiceError::LoginFailed
        })?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginResponse { access_token })
    }

    pub async fn update_user_password(
        &self,
        user_id: i64,
        new_password: String,
    ) -> Result<i64, ServiceError> {
        let password_hash = self.hash(new_password).await?;

        self.users
            .update_password_hash(user_id, password_hash.as_str())
            .await
            .map_err(ServiceError::Database)?;

        tracing::info!(user_id, "Password updated");
        Ok(user_id)
    }
}
