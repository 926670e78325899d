pub mod auth;

pub use auth::{require_admin, AuthUser, Authorizer, ACCESS_TOKEN_COOKIE};
