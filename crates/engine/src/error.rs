//! The module contains the error the engine can throw.
//!
//! The errors follow the ledger taxonomy:
//!
//! - [`InvalidAmount`] / [`Validation`] for user-correctable input.
//! - [`KeyNotFound`] when a referenced entity does not exist (any more).
//! - [`ImmutableField`] when editing a locked field of a split transaction.
//! - [`EmptyImport`] / [`PartialCommit`] for CSV imports.
//! - [`PendingDependency`] when a value the computation depends on is not
//!   loaded yet.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`Validation`]: EngineError::Validation
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`ImmutableField`]: EngineError::ImmutableField
//!  [`EmptyImport`]: EngineError::EmptyImport
//!  [`PartialCommit`]: EngineError::PartialCommit
//!  [`PendingDependency`]: EngineError::PendingDependency
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// A CSV row that could not be written to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedRow {
    /// 1-based line number in the uploaded file.
    pub line: usize,
    pub reason: String,
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Immutable field: {0}")]
    ImmutableField(String),
    #[error("Nothing to import: {0}")]
    EmptyImport(String),
    #[error("Import partially committed: {} of {} rows written", committed.len(), committed.len() + failed.len())]
    PartialCommit {
        committed: Vec<Uuid>,
        failed: Vec<FailedRow>,
    },
    #[error("Pending dependency: {0}")]
    PendingDependency(String),
    #[error("Document storage failed: {0}")]
    Storage(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::ImmutableField(a), Self::ImmutableField(b)) => a == b,
            (Self::EmptyImport(a), Self::EmptyImport(b)) => a == b,
            (
                Self::PartialCommit {
                    committed: a,
                    failed: fa,
                },
                Self::PartialCommit {
                    committed: b,
                    failed: fb,
                },
            ) => a == b && fa == fb,
            (Self::PendingDependency(a), Self::PendingDependency(b)) => a == b,
            (Self::Storage(a), Self::Storage(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}
