use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use service_core::error::AppError;
use std::sync::Arc;

use crate::{
    models::{AuthorizedUser, ROLE_ADMIN},
    services::{error::NOT_AUTHORIZED, ServiceError, TokenKind, TokenService, UserStore},
    AppState,
};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Resolves the caller behind an `access_token` cookie and decides whether
/// they may proceed.
#[derive(Clone)]
pub struct Authorizer {
    tokens: TokenService,
    users: Arc<dyn UserStore>,
}

impl Authorizer {
    pub fn new(tokens: TokenService, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    /// Checks run in a fixed order and stop at the first failure. Missing or
    /// bad credentials are `Unauthenticated`; an archived, unverified or
    /// wrong-role account gets one shared `Forbidden` message; a banned
    /// account's message carries the ban reason. An empty `required_roles`
    /// admits any role.
    pub async fn authorize(
        &self,
        jar: &CookieJar,
        required_roles: &[&str],
    ) -> Result<AuthorizedUser, ServiceError> {
        let token = jar.get(ACCESS_TOKEN_COOKIE).ok_or_else(|| {
            tracing::debug!("Authorization rejected: no access cookie");
            ServiceError::Unauthenticated
        })?;

        let user_id = self
            .tokens
            .validate_token(token.value(), TokenKind::Access)
            .map_err(|_| {
                tracing::debug!("Authorization rejected: invalid access token");
                ServiceError::Unauthenticated
            })?;

        let user = match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id, "Authorization rejected: user not found");
                return Err(ServiceError::Unauthenticated);
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Authorization rejected: user lookup failed");
                return Err(ServiceError::Unauthenticated);
            }
        };

        if user.is_archived {
            tracing::info!(user_id, "Authorization rejected: account archived");
            return Err(ServiceError::Forbidden(NOT_AUTHORIZED.to_string()));
        }

        if !user.is_verified {
            tracing::info!(user_id, "Authorization rejected: account not verified");
            return Err(ServiceError::Forbidden(NOT_AUTHORIZED.to_string()));
        }

        if user.is_banned {
            tracing::info!(user_id, "Authorization rejected: account banned");
            return Err(ServiceError::Forbidden(format!(
                "user is banned. Reason - {}",
                user.ban_reason.as_deref().unwrap_or_default()
            )));
        }

        if !required_roles.is_empty() && !required_roles.contains(&user.user_type_key.as_str()) {
            tracing::info!(
                user_id,
                role = %user.user_type_key,
                "Authorization rejected: role not allowed"
            );
            return Err(ServiceError::Forbidden(NOT_AUTHORIZED.to_string()));
        }

        Ok(AuthorizedUser::from(&user))
    }
}

/// Layer for routes restricted to administrators. The resolved caller is
/// stored in request extensions.
pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = state.authorizer.authorize(&jar, &[ROLE_ADMIN]).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Extractor for any verified, active caller. Reuses a caller already
/// resolved by [`require_admin`].
pub struct AuthUser(pub AuthorizedUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthorizedUser>() {
            return Ok(AuthUser(user.clone()));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let user = state.authorizer.authorize(&jar, &[]).await?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::models::{User, ROLE_PLAYER, ROLE_SUPPORT};
    use crate::services::MemoryUserStore;
    use axum_extra::extract::cookie::Cookie;
    use secrecy::Secret;

    struct Harness {
        users: Arc<MemoryUserStore>,
        tokens: TokenService,
        authorizer: Authorizer,
    }

    fn harness() -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let tokens = TokenService::new(&TokenConfig {
            secret_key: Secret::new("0123456789abcdef0123456789abcdef".to_string()),
            issuer: "trivia-service".to_string(),
            access_token_expiry_minutes: 59,
            verification_token_expiry_minutes: 1440,
            login_email_token_expiry_minutes: 15,
            refresh_token_expiry_minutes: 10080,
        });
        let authorizer = Authorizer::new(tokens.clone(), users.clone());
        Harness {
            users,
            tokens,
            authorizer,
        }
    }

    fn seed(h: &Harness, id: i64, role: &str, tweak: impl FnOnce(&mut User)) -> CookieJar {
        let mut user = User::new(
            id,
            format!("user{}@example.com", id),
            format!("User {}", id),
            None,
            role.to_string(),
        );
        user.is_verified = true;
        tweak(&mut user);
        h.users.upsert(user).unwrap();

        let token = h.tokens.generate_access_token(id).unwrap();
        CookieJar::new().add(Cookie::new(ACCESS_TOKEN_COOKIE, token))
    }

    #[tokio::test]
    async fn test_authorizes_verified_user() {
        let h = harness();
        let jar = seed(&h, 1, ROLE_PLAYER, |_| {});

        let ctx = h.authorizer.authorize(&jar, &[]).await.unwrap();
        assert_eq!(ctx.id, 1);
        assert_eq!(ctx.email, "user1@example.com");
        assert_eq!(ctx.username, "User 1");
        assert!(!ctx.is_admin && !ctx.is_support);
    }

    #[tokio::test]
    async fn test_missing_and_invalid_credentials() {
        let h = harness();
        seed(&h, 1, ROLE_PLAYER, |_| {});

        let empty = CookieJar::new();
        let garbage = CookieJar::new().add(Cookie::new(ACCESS_TOKEN_COOKIE, "garbage"));
        let wrong_kind = CookieJar::new().add(Cookie::new(
            ACCESS_TOKEN_COOKIE,
            h.tokens.generate_verification_token(1).unwrap(),
        ));
        let unknown_user = CookieJar::new().add(Cookie::new(
            ACCESS_TOKEN_COOKIE,
            h.tokens.generate_access_token(404).unwrap(),
        ));

        for jar in [empty, garbage, wrong_kind, unknown_user] {
            let err = h.authorizer.authorize(&jar, &[]).await.unwrap_err();
            assert!(matches!(err, ServiceError::Unauthenticated));
            assert_eq!(err.to_string(), NOT_AUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_unauthenticated() {
        let h = harness();
        let jar = seed(&h, 1, ROLE_PLAYER, |_| {});
        h.users.set_failing(true);

        let err = h.authorizer.authorize(&jar, &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_account_state_rejections_share_message() {
        let h = harness();
        let archived = seed(&h, 1, ROLE_PLAYER, |u| u.is_archived = true);
        let unverified = seed(&h, 2, ROLE_PLAYER, |u| u.is_verified = false);
        let wrong_role = seed(&h, 3, ROLE_PLAYER, |_| {});

        for (jar, roles) in [
            (archived, &[][..]),
            (unverified, &[][..]),
            (wrong_role, &[ROLE_ADMIN][..]),
        ] {
            let err = h.authorizer.authorize(&jar, roles).await.unwrap_err();
            assert!(matches!(err, ServiceError::Forbidden(ref m) if m == NOT_AUTHORIZED));
        }
    }

    #[tokio::test]
    async fn test_banned_message_includes_reason() {
        let h = harness();
        let jar = seed(&h, 1, ROLE_PLAYER, |u| {
            u.is_banned = true;
            u.ban_reason = Some("cheating".to_string());
        });

        let err = h.authorizer.authorize(&jar, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "user is banned. Reason - cheating");
    }

    #[tokio::test]
    async fn test_archived_checked_before_ban() {
        let h = harness();
        let jar = seed(&h, 1, ROLE_PLAYER, |u| {
            u.is_archived = true;
            u.is_banned = true;
            u.ban_reason = Some("cheating".to_string());
        });

        let err = h.authorizer.authorize(&jar, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), NOT_AUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_role_gate() {
        let h = harness();
        let admin = seed(&h, 1, ROLE_ADMIN, |_| {});
        let ctx = h.authorizer.authorize(&admin, &[ROLE_ADMIN]).await.unwrap();
        assert!(ctx.is_admin);

        for (id, role) in [(2, ROLE_SUPPORT), (3, ROLE_PLAYER), (4, ""), (5, "Admin"), (6, "root")] {
            let jar = seed(&h, id, role, |_| {});
            assert!(
                h.authorizer.authorize(&jar, &[ROLE_ADMIN]).await.is_err(),
                "role {:?} passed the admin gate",
                role
            );
        }
    }

    #[tokio::test]
    async fn test_support_flag() {
        let h = harness();
        let jar = seed(&h, 1, ROLE_SUPPORT, |_| {});
        let ctx = h
            .authorizer
            .authorize(&jar, &[ROLE_ADMIN, ROLE_SUPPORT])
            .await
            .unwrap();
        assert!(ctx.is_support && !ctx.is_admin);
    }
}
