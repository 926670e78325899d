use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use secrecy::{ExposeSecret, Secret};

use crate::services::ServiceError;

pub const MIN_PASSWORD_LENGTH: usize = 10;

// Fixed cost so every stored hash is produced with the same work factor.
const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(**redacted**)")
    }
}

/// Encoded Argon2 PHC string; embeds salt and cost parameters.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Peppered Argon2id hasher. The pepper is appended to the password before
/// hashing and verification.
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: Secret<String>,
}

impl PasswordHasher {
    pub fn new(pepper: Secret<String>) -> Self {
        Self { pepper }
    }

    fn argon2() -> Result<Argon2<'static>, ServiceError> {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn peppered(&self, password: &Password) -> Vec<u8> {
        let mut input = Vec::with_capacity(password.as_str().len() + self.pepper.expose_secret().len());
        input.extend_from_slice(password.as_str().as_bytes());
        input.extend_from_slice(self.pepper.expose_secret().as_bytes());
        input
    }

    pub fn hash_password(&self, password: &Password) -> Result<PasswordHashString, ServiceError> {
        if password.as_str().is_empty() {
            return Err(ServiceError::Validation("password cannot be empty".to_string()));
        }
        if password.as_str().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ServiceError::Validation(format!(
                "password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = Self::argon2()?
            .hash_password(&self.peppered(password), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(PasswordHashString::new(hash))
    }

    /// Returns `Ok(false)` on mismatch and an error only when the stored hash
    /// cannot be parsed.
    pub fn validate_password(
        &self,
        password: &Password,
        password_hash: &PasswordHashString,
    ) -> Result<bool, ServiceError> {
        let parsed_hash = PasswordHash::new(password_hash.as_str())
            .map_err(|_| ServiceError::CorruptPasswordHash)?;

        Ok(Self::argon2()?
            .verify_password(&self.peppered(password), &parsed_hash)
            .is_ok())
    }
}
