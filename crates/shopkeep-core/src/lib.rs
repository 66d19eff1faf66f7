//! # shopkeep-core: Pure Business Logic for Shopkeep
//!
//! This crate is the **arithmetic and rulebook** of the shop ledger. It
//! contains every calculation the ledgers depend on as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopkeep Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              UI layer (external: forms, tables, PDFs)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 shopkeep-db (workflows + ledgers)               │   │
//! │  │   SaleWorkflow, PurchaseWorkflow, StockLedger, CashLedger       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ shopkeep-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌──────────┐ │   │
//! │  │  │  money  │ │  types  │ │allocation│ │ billing │ │ expense  │ │   │
//! │  │  │  Money  │ │SaleRec. │ │ FIFO plan│ │ totals  │ │ sum type │ │   │
//! │  │  └─────────┘ └─────────┘ └──────────┘ └─────────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (paise, no floating point)
//! - [`types`] - Persisted entities (StockUnit, SaleRecord, CashMovement, ...)
//! - [`allocation`] - FIFO allocation planning over stock lots
//! - [`billing`] - Sale and wholesaler-bill totals
//! - [`expense`] - Expense entries as a tagged variant
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use shopkeep_core::money::Money;
//! use shopkeep_core::types::DiscountRate;
//!
//! let selling_price = Money::from_cents(25_000); // ₹250.00
//! let gross = selling_price.multiply_quantity(4);
//! let final_bill = gross.apply_discount(DiscountRate::from_percentage(10.0));
//!
//! assert_eq!(final_bill.cents(), 90_000); // ₹900.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod billing;
pub mod error;
pub mod expense;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity accepted for a single sale line or purchase batch.
///
/// ## Business Reason
/// Every purchased unit becomes its own stock row, so an accidental
/// "1000000" typed into a form would insert a million rows.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Length of a valid mobile number (local format, no country code).
pub const MOBILE_NUMBER_DIGITS: usize = 10;
