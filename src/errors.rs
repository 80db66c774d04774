//! Unified error type for the engine.
//!
//! Every fallible operation returns [`Result`]. Variants are grouped into the
//! caller-facing taxonomy by [`Error::kind`], which the HTTP layer maps onto
//! status codes.

use crate::entities::settlement::SettlementStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Caller-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or inconsistent input, detected before any write.
    Validation,
    /// A referenced record does not exist in the caller's scope.
    NotFound,
    /// A state-transition race or a duplicate write.
    Conflict,
    /// Storage failure; the caller may retry.
    Persistence,
    /// Configuration or environment problems.
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name used in API responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Persistence => "persistence",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Integer conversion error: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    #[error("Invalid {field}: {amount} {reason}")]
    InvalidAmount {
        field: String,
        amount: Decimal,
        reason: String,
    },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("A split needs at least one participant")]
    EmptyParticipants,

    #[error("{label} sum to {computed:.2}, expected {expected:.2}", label = sum_label(.field))]
    SumMismatch {
        field: String,
        computed: Decimal,
        expected: Decimal,
    },

    #[error("Percentage {value} at position {index} is outside 0..=100")]
    PercentageOutOfRange { index: usize, value: Decimal },

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("A settlement cannot be paid by a party to itself")]
    SameParty,

    #[error("Missing X-Owner-Id header")]
    MissingOwner,

    #[error("Transaction {id} not found")]
    TransactionNotFound { id: i64 },

    #[error("Transaction {id} is not a split parent")]
    SplitNotFound { id: i64 },

    #[error("Person {id} not found")]
    PersonNotFound { id: i64 },

    #[error("Account {id} not found")]
    AccountNotFound { id: i64 },

    #[error("Group {id} not found")]
    GroupNotFound { id: i64 },

    #[error("Settlement {id} not found")]
    SettlementNotFound { id: i64 },

    #[error("Transaction {id} is already split")]
    AlreadySplit { id: i64 },

    #[error("Settlement {id} is already {status}")]
    SettlementNotPending { id: i64, status: SettlementStatus },

    #[error("Request with idempotency key '{key}' is already being processed")]
    DuplicateRequest { key: String },
}

impl Error {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount { .. }
            | Self::Validation { .. }
            | Self::EmptyParticipants
            | Self::SumMismatch { .. }
            | Self::PercentageOutOfRange { .. }
            | Self::CurrencyMismatch { .. }
            | Self::SameParty
            | Self::MissingOwner => ErrorKind::Validation,
            Self::TransactionNotFound { .. }
            | Self::SplitNotFound { .. }
            | Self::PersonNotFound { .. }
            | Self::AccountNotFound { .. }
            | Self::GroupNotFound { .. }
            | Self::SettlementNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadySplit { .. }
            | Self::SettlementNotPending { .. }
            | Self::DuplicateRequest { .. } => ErrorKind::Conflict,
            Self::Database(_) => ErrorKind::Persistence,
            Self::Config { .. } | Self::Io(_) | Self::EnvVar(_) | Self::IntConversion(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Name of the offending request field, when one can be pinned down.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidAmount { field, .. }
            | Self::Validation { field, .. }
            | Self::SumMismatch { field, .. } => Some(field),
            Self::EmptyParticipants => Some("personIds"),
            Self::PercentageOutOfRange { .. } => Some("percentages"),
            Self::CurrencyMismatch { .. } => Some("currency"),
            Self::SameParty => Some("toPersonId"),
            _ => None,
        }
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn sum_label(field: &str) -> &str {
    match field {
        "customAmounts" => "custom amounts",
        other => other,
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
