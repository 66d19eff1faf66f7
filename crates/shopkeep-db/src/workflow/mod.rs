//! # Workflows
//!
//! Orchestration of the ledgers for one user action each.
//!
//! ## Shape Of Every Workflow
//! ```text
//! validate input            ─► ValidationFailed, store never touched
//!      │
//!      ▼
//! db.begin(label)           ─► write lock + transaction
//!      │
//!      ├── stock   (allocate / restore / replenish)
//!      ├── rows    (sale, bill, batch, expense)
//!      └── cash    (payment, refund, expense)    ← always after stock
//!      │
//!      ▼
//! uow.finish(result)        ─► commit, or roll back everything
//! ```
//!
//! Updates restore the old effect in full and then apply the new one inside
//! the same unit of work; they never patch a diff.

pub mod expense;
pub mod purchase;
pub mod sale;
