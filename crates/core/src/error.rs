// Central Error Type for the Coordinator

use crate::domain::{DomainError, TransactionId};
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Expected during idempotent redelivery: the branch was already
    /// completed and its row removed by an earlier attempt
    #[error("No such transaction: {0}")]
    NoSuchTransaction(TransactionId),

    #[error("Transaction already exists: {0}")]
    DuplicateTransaction(TransactionId),

    /// Optimistic-lock rejection: the stored version no longer matches
    #[error("Version conflict on transaction {id} (expected version {expected})")]
    VersionConflict { id: TransactionId, expected: i64 },

    #[error("No handler registered for {target}::{method}")]
    HandlerNotFound { target: String, method: String },

    #[error("Handler signature mismatch for {target}::{method}")]
    HandlerSignatureMismatch { target: String, method: String },

    /// Recoverable: the durable row remains for a later recovery sweep
    #[error("Confirm phase failed: {0}")]
    ConfirmFailed(#[source] Box<AppError>),

    /// Recoverable: the durable row remains for a later recovery sweep
    #[error("Cancel phase failed: {0}")]
    CancelFailed(#[source] Box<AppError>),

    #[error("Async dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Participant error: {0}")]
    Participant(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// From implementation for infra crates (to avoid circular dependency)
impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Database(err)
    }
}

// Note: sqlx::Error conversion is handled in infra-sqlite
// by converting to AppError::Database(String)
