use service_core::error::AppError;
use thiserror::Error;

/// Message returned for every token validation failure.
pub const TOKEN_VALIDATION_FAILED: &str = "JWT could not be validated";

/// Message returned for every failure on the request-authorization path
/// except the ban case.
pub const NOT_AUTHORIZED: &str = "you are not authorized to perform this request";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{}", NOT_AUTHORIZED)]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{}", TOKEN_VALIDATION_FAILED)]
    InvalidToken,

    #[error("the token could not be verified")]
    TokenNotVerified,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("stored password hash is malformed")]
    CorruptPasswordHash,

    #[error("there was an issue trying to log this user in")]
    LoginFailed,

    #[error("a user already exists with the specified email")]
    EmailAlreadyRegistered,

    #[error("question already exists")]
    DuplicateQuestion,

    #[error("wrong answer already exists")]
    DuplicateWrongAnswer,

    #[error("the user was created but the verification email failed to send")]
    VerificationEmailFailed,

    #[error("the login by email failed to send")]
    LoginEmailFailed,

    #[error("user not found")]
    UserNotFound,

    #[error("{0} not found")]
    NotFound(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Signing(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::Unauthenticated => {
                AppError::Unauthorized(anyhow::anyhow!(NOT_AUTHORIZED))
            }
            ServiceError::InvalidToken => {
                AppError::Unauthorized(anyhow::anyhow!(TOKEN_VALIDATION_FAILED))
            }
            e @ (ServiceError::TokenNotVerified
            | ServiceError::LoginFailed
            | ServiceError::CorruptPasswordHash) => {
                AppError::Unauthorized(anyhow::anyhow!(e.to_string()))
            }
            ServiceError::Forbidden(e) => AppError::Forbidden(anyhow::anyhow!(e)),
            e @ (ServiceError::EmailAlreadyRegistered
            | ServiceError::DuplicateQuestion
            | ServiceError::DuplicateWrongAnswer) => {
                AppError::Conflict(anyhow::anyhow!(e.to_string()))
            }
            e @ ServiceError::VerificationEmailFailed => {
                AppError::PartialFailure(anyhow::anyhow!(e.to_string()))
            }
            e @ ServiceError::LoginEmailFailed => {
                AppError::ServiceUnavailable(anyhow::anyhow!(e.to_string()))
            }
            e @ (ServiceError::UserNotFound | ServiceError::NotFound(_)) => {
                AppError::NotFound(anyhow::anyhow!(e.to_string()))
            }
        }
    }
}
