//! # Error Types
//!
//! Domain-specific error types for shopkeep-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  shopkeep-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule failures (stock, balance, ...)   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  shopkeep-db errors (separate crate)                                   │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── LedgerError      - What callers of a workflow see                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations detected by pure domain logic.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough units in a price tier to satisfy an allocation.
    ///
    /// ## When This Occurs
    /// ```text
    /// allocate("Whey", ₹100, qty 6)
    ///      │
    ///      ▼
    /// lots at ₹100: [#1: 2, #4: 3]  → 5 available
    ///      │
    ///      ▼
    /// InsufficientStock { available: 5, requested: 6 }
    ///      │
    ///      ▼
    /// No row is touched; caller may abort or (gym workflow) override.
    /// ```
    #[error("Insufficient stock for {product} at {price}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        price: Money,
        available: i64,
        requested: i64,
    },

    /// A debit would take the shop balance below zero.
    #[error("Insufficient shop balance: balance {balance}, debit {requested}")]
    InsufficientBalance { balance: Money, requested: Money },

    /// A legacy expense row carried more than one non-zero amount column.
    #[error("Expense row has more than one non-zero amount: {fields:?}")]
    MultipleNonZeroAmounts { fields: Vec<String> },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store access; a workflow that fails validation has
/// not opened a transaction yet.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// An amount exceeds the limit allowed for it (e.g. paid > final bill).
    #[error("{field} of {amount} exceeds the allowed {limit}")]
    ExceedsLimit {
        field: String,
        amount: Money,
        limit: Money,
    },

    /// Invalid format (e.g., invalid UUID, malformed mobile number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Operation not allowed in the record's current state.
    #[error("{field}: {reason}")]
    InvalidState { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::ExceedsLimit`].
    pub fn exceeds(field: impl Into<String>, amount: Money, limit: Money) -> Self {
        ValidationError::ExceedsLimit {
            field: field.into(),
            amount,
            limit,
        }
    }

    /// A derived amount (price × quantity, a sum of totals) does not fit
    /// in the money range.
    pub fn too_large(field: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min: 0,
            max: i64::MAX,
        }
    }

    /// Shorthand for [`ValidationError::InvalidState`].
    pub fn invalid_state(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidState {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
