//! The module contains the error the engine can throw.
//!
//! The errors fall in two classes:
//!
//! - user errors, reported back to whoever sent the command:
//!   [`Validation`], [`State`] and [`NotFound`];
//! - infrastructure errors, raised when the group's files cannot be read or
//!   written: [`Io`], [`Json`], [`Csv`] and [`CorruptLedger`].
//!
//!  [`Validation`]: EngineError::Validation
//!  [`State`]: EngineError::State
//!  [`NotFound`]: EngineError::NotFound
//!  [`Io`]: EngineError::Io
//!  [`Json`]: EngineError::Json
//!  [`Csv`]: EngineError::Csv
//!  [`CorruptLedger`]: EngineError::CorruptLedger
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed amount, ratio or user name.
    #[error("{0}")]
    Validation(String),
    /// The operation is not allowed in the current registry lifecycle phase.
    #[error("{0}")]
    State(String),
    /// A user reference did not resolve.
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("corrupt ledger: {0}")]
    CorruptLedger(String),
}

impl EngineError {
    /// Returns `true` for errors caused by the command itself rather than by
    /// the storage underneath.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::State(_) | Self::NotFound(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::State(a), Self::State(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::Json(a), Self::Json(b)) => a.to_string() == b.to_string(),
            (Self::Csv(a), Self::Csv(b)) => a.to_string() == b.to_string(),
            (Self::CorruptLedger(a), Self::CorruptLedger(b)) => a == b,
            _ => false,
        }
    }
}
