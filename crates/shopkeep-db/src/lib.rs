//! # shopkeep-db: Ledgers and Workflows for Shopkeep
//!
//! This crate keeps stock, bills, payments and the shop's cash consistent
//! with each other. It uses SQLite for storage with sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopkeep Data Flow                               │
//! │                                                                         │
//! │  UI action (sell 3 × Whey)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   shopkeep-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  workflow/      SaleWorkflow · PurchaseWorkflow · Expenses      │   │
//! │  │       │                                                         │   │
//! │  │       ▼                                                         │   │
//! │  │  ledger/        StockLedger · CashLedger · PaymentTracker       │   │
//! │  │       │                                                         │   │
//! │  │       ▼                                                         │   │
//! │  │  repository/    sale · bill · expense rows                      │   │
//! │  │       │                                                         │   │
//! │  │       ▼                                                         │   │
//! │  │  UnitOfWork ── one write lock + one SQLite transaction          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and the [`Database`] handle
//! - [`config`] - `shopkeep.toml` + environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`unit_of_work`] - Transaction boundary shared by every workflow
//! - [`ledger`] - Stock ledger, cash ledger, payment tracker
//! - [`repository`] - Row access for sales, bills and expenses
//! - [`workflow`] - Sale, purchase and expense orchestration
//! - [`error`] - Database and ledger error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopkeep_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/shop.db")).await?;
//!
//! let sale = db.sales().add_sale(input).await?;
//! let balance = db.cash().current_balance().await?;
//! let left = db.stock().available("Whey", Money::from_rupees(100)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;
pub mod workflow;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::ShopConfig;
pub use error::{DbError, ErrorCode, LedgerError, LedgerResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

pub use ledger::cash::CashLedger;
pub use ledger::payment::{PaymentTracker, Reconciliation};
pub use ledger::stock::{Allocation, Replenishment, StockLedger};
pub use workflow::expense::ExpenseWorkflow;
pub use workflow::purchase::PurchaseWorkflow;
pub use workflow::sale::SaleWorkflow;

pub use shopkeep_core::allocation::ShortfallPolicy;
