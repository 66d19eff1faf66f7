//! # Ledgers
//!
//! The three shared books every workflow writes through.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StockLedger     units per (product, price tier), FIFO by row id       │
//! │  CashLedger      signed movements; balance = SUM(amount)               │
//! │  PaymentTracker  payment events + cached paid / pending on parents     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each ledger has two faces:
//! - `*_in(conn, ...)` associated functions that run on a caller's
//!   [`UnitOfWork`](crate::UnitOfWork) connection, so a workflow can combine
//!   several ledger steps in one transaction.
//! - Methods on the ledger handle that open their own unit of work (writes)
//!   or read from the pool (queries).

pub mod cash;
pub mod payment;
pub mod stock;
