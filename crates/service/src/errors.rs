use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Required input fields were absent or null.
    #[error("Missing {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },
    #[error("{0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl ServiceError {
    pub fn account_not_found(id: &str) -> Self {
        Self::NotFound(format!("Account id: {} is not found", id))
    }

    pub fn name_not_found(name: &str) -> Self {
        Self::NotFound(format!("Account under name: {} is not found", name))
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(e: redis::RedisError) -> Self {
        Self::Storage(e.to_string())
    }
}
