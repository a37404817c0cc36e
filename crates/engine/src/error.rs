//! The module contains the errors the engine can throw.
//!
//! Errors fall in four families:
//!
//! - validation errors ([`InvalidAmount`], [`InvalidName`], [`DuplicateGoal`],
//!   [`InsufficientFunds`], ...) returned before any state is touched;
//! - persistence errors ([`Store`], [`Database`]) returned after the local
//!   state has already been updated;
//! - format errors ([`BackupFormat`]) returned before any destructive action;
//! - invariant violations ([`MissingGeneralSavings`]).
//!
//! Balance drift is never an error: it is recorded on the offending
//! transaction as `is_valid = false`.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidName`]: EngineError::InvalidName
//!  [`DuplicateGoal`]: EngineError::DuplicateGoal
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`Store`]: EngineError::Store
//!  [`Database`]: EngineError::Database
//!  [`BackupFormat`]: EngineError::BackupFormat
//!  [`MissingGeneralSavings`]: EngineError::MissingGeneralSavings
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("An active quest named \"{0}\" already exists")]
    DuplicateGoal(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("\"{0}\" cannot be deleted")]
    GoalNotDeletable(String),
    #[error("\"{0}\" is archived")]
    GoalArchived(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("General Savings goal is missing")]
    MissingGeneralSavings,
    #[error("Invalid or outdated backup file format: {0}")]
    BackupFormat(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl EngineError {
    /// `true` for errors raised by the ledger store, after the local state
    /// was already changed.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Database(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::DuplicateGoal(a), Self::DuplicateGoal(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::GoalNotDeletable(a), Self::GoalNotDeletable(b)) => a == b,
            (Self::GoalArchived(a), Self::GoalArchived(b)) => a == b,
            (Self::InvalidOperation(a), Self::InvalidOperation(b)) => a == b,
            (Self::MissingGeneralSavings, Self::MissingGeneralSavings) => true,
            (Self::BackupFormat(a), Self::BackupFormat(b)) => a == b,
            (Self::Store(a), Self::Store(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            (Self::Json(a), Self::Json(b)) => a.to_string() == b.to_string(),
            (Self::Csv(a), Self::Csv(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
