//! # Database and Ledger Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Adds context and categorization                             │
//! │       │                                                                 │
//! │       │        CoreError (validation, stock, balance)                  │
//! │       │             │                                                   │
//! │       ▼             ▼                                                   │
//! │  LedgerError ← The one taxonomy workflow callers handle                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UI maps ErrorCode + message to a dialog                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `LedgerError` returned from a workflow means the unit of work was
//! rolled back: the ledgers are exactly as they were before the call.

use serde::Serialize;
use thiserror::Error;

use shopkeep_core::{CoreError, Money, ValidationError};

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Bill referencing a deleted wholesaler
    /// - Payment event referencing a missing cash movement
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, negative pending).
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// SQLite reported the database as busy or locked.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Commit or rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type / busy
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <expr>"
                // "database is locked" / "database table is locked" (SQLITE_BUSY / SQLITE_LOCKED)
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("is locked") || msg.contains("database is busy") {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Failures surfaced by ledgers and workflows.
///
/// ## User Workflow
/// ```text
/// update_sale(qty 3 → 8)
///      │
///      ▼
/// InsufficientStock { available: 5, requested: 8 }
///      │
///      ▼
/// shortfall() = 3 units  →  gym UI: "Only 5 left. Sell anyway?"
///                           customer UI: "Only 5 left."
/// ```
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Bad input; the store was never touched.
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Insufficient stock for {product} at {price}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        price: Money,
        available: i64,
        requested: i64,
    },

    #[error("Insufficient shop balance: balance {balance}, debit {requested}")]
    InsufficientBalance { balance: Money, requested: Money },

    #[error("{entity} not found: {id}")]
    RecordNotFound { entity: String, id: String },

    #[error("Expense row has more than one non-zero amount: {fields:?}")]
    MultipleNonZeroAmounts { fields: Vec<String> },

    /// The record changed since the caller read it, or SQLite reported a
    /// lock conflict.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[source] DbError),
}

/// Shortfall reported with stock and balance failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "missing")]
pub enum Shortfall {
    Units(i64),
    Money(Money),
}

/// Machine-readable error codes for the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    InsufficientStock,
    InsufficientBalance,
    RecordNotFound,
    MultipleNonZeroAmounts,
    ConcurrentModification,
    PersistenceFailed,
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::RecordNotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::ValidationFailed(_) => ErrorCode::ValidationFailed,
            LedgerError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            LedgerError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            LedgerError::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            LedgerError::MultipleNonZeroAmounts { .. } => ErrorCode::MultipleNonZeroAmounts,
            LedgerError::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            LedgerError::PersistenceFailed(_) => ErrorCode::PersistenceFailed,
        }
    }

    /// What is missing for the operation to go through, when that is known.
    pub fn shortfall(&self) -> Option<Shortfall> {
        match self {
            LedgerError::InsufficientStock {
                available,
                requested,
                ..
            } => Some(Shortfall::Units(requested - available)),
            LedgerError::InsufficientBalance { balance, requested } => {
                Some(Shortfall::Money(*requested - *balance))
            }
            _ => None,
        }
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                product,
                price,
                available,
                requested,
            } => LedgerError::InsufficientStock {
                product,
                price,
                available,
                requested,
            },
            CoreError::InsufficientBalance { balance, requested } => {
                LedgerError::InsufficientBalance { balance, requested }
            }
            CoreError::MultipleNonZeroAmounts { fields } => {
                LedgerError::MultipleNonZeroAmounts { fields }
            }
            CoreError::Validation(e) => LedgerError::ValidationFailed(e),
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LedgerError::RecordNotFound { entity, id },
            DbError::Busy(message) => LedgerError::ConcurrentModification(message),
            other => LedgerError::PersistenceFailed(other),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

/// Result type for ledger and workflow operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================
