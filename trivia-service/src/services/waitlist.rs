use std::sync::Arc;

use crate::models::WaitlistEntry;
use crate::services::{ServiceError, WaitlistStore};

const MIN_EMAIL_LENGTH: usize = 5;

#[derive(Clone)]
pub struct WaitlistService {
    store: Arc<dyn WaitlistStore>,
}

impl WaitlistService {
    pub fn new(store: Arc<dyn WaitlistStore>) -> Self {
        Self { store }
    }

    pub async fn create_waitlist_entry(&self, email: &str) -> Result<WaitlistEntry, ServiceError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ServiceError::Validation("email cannot be empty".to_string()));
        }
        if email.chars().count() < MIN_EMAIL_LENGTH {
            return Err(ServiceError::Validation(format!(
                "email must be at least {} characters long",
                MIN_EMAIL_LENGTH
            )));
        }

        let entry = self.store.create(email).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to store waitlist entry");
            ServiceError::Database(e)
        })?;

        tracing::info!(entry_id = entry.id, "Waitlist entry created");
        Ok(entry)
    }
}
