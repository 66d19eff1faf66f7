//! # Payment Tracker
//!
//! Payments against sales (money in) and wholesaler bills (money out), and
//! the paid / pending amounts cached on each parent.
//!
//! ## Recording A Payment
//! ```text
//! record_payment(Sale s-1, ₹600)
//!      │
//!      ▼
//! load s-1 settlement ─► final ₹1000, paid ₹400, pending ₹600
//!      │
//!      ├── 0 < 600 ≤ pending ?  no → ValidationFailed
//!      ▼
//! CashLedger::post_in(+₹600 sale_payment)     (bill: −₹600, balance-checked)
//!      │
//!      ▼
//! payment_events += { +600, pending_after 0, cash_movement_id }
//!      │
//!      ▼
//! s-1: paid ₹1000, pending ₹0, status paid, net profit recomputed
//! ```
//!
//! ## Source Of Truth
//! The event history is authoritative; cached parent fields must always
//! satisfy `Σ events = amount_paid` and `total − amount_paid = pending`
//! ([`PaymentTracker::reconcile`] checks both).

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info};

use shopkeep_core::billing::Settlement;
use shopkeep_core::validation::validate_payment_amount;
use shopkeep_core::{
    CashMovementDraft, Money, MovementKind, PaymentEvent, PaymentMode, PaymentParent,
    PaymentStatus, ValidationError,
};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::cash::CashLedger;
use crate::pool::Database;
use crate::repository::{new_id, BillRepository, PaymentEventRepository, SaleRepository};

/// Cached totals of a parent compared with its event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub parent: PaymentParent,
    /// Final bill of a sale, bill amount of a bill.
    pub total: Money,
    /// Σ amount over the parent's payment events.
    pub events_total: Money,
    pub recorded_paid: Money,
    pub recorded_pending: Money,
    pub recorded_status: PaymentStatus,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.events_total == self.recorded_paid
            && self.total - self.recorded_paid == self.recorded_pending
            && self.recorded_status == PaymentStatus::from_pending(self.recorded_pending)
    }
}

/// Handle to the payment tracker.
#[derive(Debug, Clone)]
pub struct PaymentTracker {
    db: Database,
}

impl PaymentTracker {
    pub fn new(db: Database) -> Self {
        PaymentTracker { db }
    }

    // -------------------------------------------------------------------------
    // Unit-of-work operations
    // -------------------------------------------------------------------------

    /// Posts the cash side of a payment and appends its event.
    ///
    /// `amount` is signed: positive is a payment, negative a refund. The
    /// cash direction follows the parent (sales bring money in, bills take
    /// it out). Parent fields are NOT touched; callers store the settlement.
    pub async fn insert_event_in(
        conn: &mut SqliteConnection,
        parent: &PaymentParent,
        amount: Money,
        date: NaiveDate,
        mode: PaymentMode,
        pending_after: Money,
    ) -> LedgerResult<PaymentEvent> {
        let kind = movement_kind(parent, amount);
        let draft = CashMovementDraft::new(
            parent.cash_effect(amount),
            kind,
            date,
            format!("{:?} {}", kind, parent.id()),
        );
        let movement = CashLedger::post_in(&mut *conn, &draft).await?;

        let event = PaymentEvent {
            id: new_id(),
            parent_kind: parent.kind(),
            parent_id: parent.id().to_string(),
            amount_paid_cents: amount.cents(),
            paid_date: date,
            payment_mode: mode,
            pending_amount_after_cents: pending_after.cents(),
            cash_movement_id: Some(movement.id),
            created_at: Utc::now(),
        };
        PaymentEventRepository::insert_in(conn, &event).await?;

        Ok(event)
    }

    /// Records a payment of `amount` against `parent`.
    ///
    /// ## Errors
    /// - `amount ≤ 0` or `amount > pending` → `ValidationFailed`
    /// - bill payment larger than the shop balance → `InsufficientBalance`
    pub async fn record_in(
        conn: &mut SqliteConnection,
        parent: &PaymentParent,
        amount: Money,
        date: NaiveDate,
        mode: PaymentMode,
    ) -> LedgerResult<PaymentEvent> {
        validate_payment_amount(amount)?;

        let current = load_settlement_in(&mut *conn, parent).await?;
        if amount > current.pending {
            return Err(ValidationError::exceeds("payment amount", amount, current.pending).into());
        }
        let next = current.apply(amount)?;

        let event = Self::insert_event_in(&mut *conn, parent, amount, date, mode, next.pending).await?;
        store_settlement_in(conn, parent, &next).await?;

        Ok(event)
    }

    /// Corrects the amount and date of a recorded payment.
    ///
    /// `new pending = pending + old amount − new amount`. The linked cash
    /// movement is corrected in place and the pending snapshots of later
    /// events shift by the same difference.
    pub async fn update_in(
        conn: &mut SqliteConnection,
        payment_id: &str,
        new_amount: Money,
        new_date: NaiveDate,
    ) -> LedgerResult<PaymentEvent> {
        validate_payment_amount(new_amount)?;

        let mut event = PaymentEventRepository::find_in(&mut *conn, payment_id).await?;
        if !event.amount().is_positive() {
            return Err(ValidationError::invalid_state(
                "payment",
                "refund entries are produced by sale and bill edits and cannot be edited",
            )
            .into());
        }

        let parent = event.parent();
        let old_amount = event.amount();
        let current = load_settlement_in(&mut *conn, &parent).await?;
        if new_amount > current.pending + old_amount {
            return Err(ValidationError::exceeds(
                "payment amount",
                new_amount,
                current.pending + old_amount,
            )
            .into());
        }
        let next = current.apply(new_amount - old_amount)?;

        if let Some(movement_id) = &event.cash_movement_id {
            CashLedger::correct_in(&mut *conn, movement_id, parent.cash_effect(new_amount), new_date)
                .await?;
        }

        let pending_shift = old_amount - new_amount;
        event.amount_paid_cents = new_amount.cents();
        event.paid_date = new_date;
        event.pending_amount_after_cents += pending_shift.cents();
        PaymentEventRepository::update_in(&mut *conn, &event).await?;
        let shifted = PaymentEventRepository::shift_later_pending_in(&mut *conn, &event, pending_shift).await?;

        store_settlement_in(conn, &parent, &next).await?;

        debug!(
            id = payment_id,
            old = %old_amount,
            new = %new_amount,
            later_events = shifted,
            "Payment corrected"
        );

        Ok(event)
    }

    // -------------------------------------------------------------------------
    // Standalone operations
    // -------------------------------------------------------------------------

    pub async fn record_payment(
        &self,
        parent: &PaymentParent,
        amount: Money,
        date: NaiveDate,
        mode: PaymentMode,
    ) -> LedgerResult<PaymentEvent> {
        let mut uow = self.db.begin("record_payment").await?;
        let result = Self::record_in(uow.conn(), parent, amount, date, mode).await;
        let event = uow.finish(result).await?;

        info!(
            parent_id = parent.id(),
            amount = %amount,
            pending = event.pending_amount_after_cents,
            "Payment recorded"
        );
        Ok(event)
    }

    pub async fn update_payment(
        &self,
        payment_id: &str,
        new_amount: Money,
        new_date: NaiveDate,
    ) -> LedgerResult<PaymentEvent> {
        let mut uow = self.db.begin("update_payment").await?;
        let result = Self::update_in(uow.conn(), payment_id, new_amount, new_date).await;
        let event = uow.finish(result).await?;

        info!(id = payment_id, amount = %new_amount, "Payment updated");
        Ok(event)
    }

    /// Payment events of one sale or bill, oldest first.
    pub async fn history(&self, parent: &PaymentParent) -> LedgerResult<Vec<PaymentEvent>> {
        Ok(PaymentEventRepository::list_for_parent(self.db.pool(), parent).await?)
    }

    /// Recomputes a parent's paid amount from its events and compares it
    /// with the cached fields.
    pub async fn reconcile(&self, parent: &PaymentParent) -> LedgerResult<Reconciliation> {
        let recorded = match parent {
            PaymentParent::Sale(id) => SaleRepository::new(self.db.pool().clone())
                .get_by_id(id)
                .await?
                .map(|sale| (sale.final_bill(), sale.amount_paid(), sale.pending_amount(), sale.status))
                .ok_or_else(|| LedgerError::not_found("Sale", id))?,
            PaymentParent::Bill(id) => BillRepository::new(self.db.pool().clone())
                .get_bill(id)
                .await?
                .map(|bill| (bill.bill_amount(), bill.amount_paid(), bill.pending_amount(), bill.status))
                .ok_or_else(|| LedgerError::not_found("Bill", id))?,
        };
        let (total, recorded_paid, recorded_pending, recorded_status) = recorded;

        let events_total = PaymentEventRepository::sum_for_parent(self.db.pool(), parent).await?;

        Ok(Reconciliation {
            parent: parent.clone(),
            total,
            events_total,
            recorded_paid,
            recorded_pending,
            recorded_status,
        })
    }
}

// =============================================================================
// Parent Access
// =============================================================================

fn movement_kind(parent: &PaymentParent, amount: Money) -> MovementKind {
    match (parent, amount.is_negative()) {
        (PaymentParent::Sale(_), false) => MovementKind::SalePayment,
        (PaymentParent::Sale(_), true) => MovementKind::SaleRefund,
        (PaymentParent::Bill(_), false) => MovementKind::BillPayment,
        (PaymentParent::Bill(_), true) => MovementKind::BillRefund,
    }
}

/// Current paid / pending split of a sale or bill.
pub(crate) async fn load_settlement_in(
    conn: &mut SqliteConnection,
    parent: &PaymentParent,
) -> LedgerResult<Settlement> {
    let settlement = match parent {
        PaymentParent::Sale(id) => {
            let sale = SaleRepository::find_in(conn, id).await?;
            Settlement {
                total: sale.final_bill(),
                amount_paid: sale.amount_paid(),
                pending: sale.pending_amount(),
                status: sale.status,
            }
        }
        PaymentParent::Bill(id) => {
            let bill = BillRepository::find_bill_in(conn, id).await?;
            Settlement {
                total: bill.bill_amount(),
                amount_paid: bill.amount_paid(),
                pending: bill.pending_amount(),
                status: bill.status,
            }
        }
    };
    Ok(settlement)
}

pub(crate) async fn store_settlement_in(
    conn: &mut SqliteConnection,
    parent: &PaymentParent,
    settlement: &Settlement,
) -> LedgerResult<()> {
    match parent {
        PaymentParent::Sale(id) => SaleRepository::update_settlement_in(conn, id, settlement).await?,
        PaymentParent::Bill(id) => {
            BillRepository::update_bill_settlement_in(conn, id, settlement).await?
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
