//! Local storage effect trait
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `presence-effects` (filesystem), `presence-testkit` (memory)
//!
//! `store` must be atomic: a reader never observes a partially written value,
//! even after a crash mid-write.

use crate::PresenceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Storage operation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StorageError {
    /// Key rejected by the backend
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// Detail
        reason: String,
    },
    /// Write failed
    #[error("Write failed: {0}")]
    WriteFailed(String),
    /// Read failed
    #[error("Read failed: {0}")]
    ReadFailed(String),
    /// Delete failed
    #[error("Delete failed: {0}")]
    DeleteFailed(String),
}

impl From<StorageError> for PresenceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey { reason } => PresenceError::invalid(reason),
            other => PresenceError::storage(other.to_string()),
        }
    }
}

/// Key/value storage for small local records.
#[async_trait]
pub trait StorageEffects: Send + Sync {
    /// Atomically replace the value under `key`.
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Value under `key`, if any.
    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Delete `key`. Returns whether a value existed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// Whether `key` holds a value.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.retrieve(key).await?.is_some())
    }
}
