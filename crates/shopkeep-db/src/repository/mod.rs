//! # Repository Module
//!
//! Row-level access for the shop tables. No business rules live here:
//! totals, FIFO and balance checks belong to the ledgers and workflows.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleRepository                                                         │
//! │  ├── get_by_id(&self, id)          ← pool, read-only, for display       │
//! │  ├── list(&self, channel)                                               │
//! │  │                                                                      │
//! │  ├── find_in(conn, id)             ← unit-of-work connection            │
//! │  ├── insert_in(conn, &record)                                           │
//! │  ├── update_in(conn, &record)                                           │
//! │  └── delete_in(conn, id)                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! `*_in` functions never open their own transaction; they run inside the
//! caller's [`UnitOfWork`](crate::UnitOfWork).
//!
//! ## Available Repositories
//!
//! - [`SaleRepository`] - Customer and gym-client sale rows
//! - [`BillRepository`] - Wholesalers, bills and product batches
//! - [`PaymentEventRepository`] - Payments against sales and bills
//! - [`ExpenseRepository`] - Shop expenses

pub mod bill;
pub mod expense;
pub mod payment;
pub mod sale;

pub use bill::BillRepository;
pub use expense::ExpenseRepository;
pub use payment::PaymentEventRepository;
pub use sale::SaleRepository;

use uuid::Uuid;

/// Generates a new entity ID.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
