//! # Purchase Workflow
//!
//! Wholesaler bills: stock in, money out.
//!
//! ## Bill Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WholesalerBill  (Acme Nutrition, 2026-03-01)                           │
//! │  ├── ProductBatch  Whey      10 × ₹100  = ₹1000  ─► 10 stock units     │
//! │  ├── ProductBatch  Creatine   4 × ₹150  =  ₹600  ─►  4 stock units     │
//! │  ├── shipping                              ₹50                          │
//! │  └── bill amount                         ₹1650                          │
//! │                                                                         │
//! │  paid ₹650 ─► cash −₹650 (balance-checked) ─► pending ₹1000             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Compensations
//! - Changing or removing a batch withdraws its units first. Units already
//!   sold cannot be withdrawn: `InsufficientStock` unless the caller passes
//!   [`ShortfallPolicy::Proceed`].
//! - Lowering the amount paid on a bill posts a refund inflow; deleting a
//!   bill refunds everything paid on it.
//! - A batch change that leaves the bill worth less than what was already
//!   paid is refused (`ValidationFailed`); lower the payment first.

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteConnection;
use tracing::info;

use shopkeep_core::allocation::ShortfallPolicy;
use shopkeep_core::billing::{BillTotals, Settlement};
use shopkeep_core::validation::{
    validate_batch_input, validate_bill_input, validate_bill_update, validate_wholesaler_input,
};
use shopkeep_core::{
    BatchInput, BillInput, BillUpdate, CashMovementDraft, Money, MovementKind, PaymentParent,
    ProductBatch, ValidationError, Wholesaler, WholesalerBill, WholesalerInput,
};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::cash::CashLedger;
use crate::ledger::payment::PaymentTracker;
use crate::ledger::stock::{Replenishment, StockLedger};
use crate::pool::Database;
use crate::repository::{new_id, BillRepository, PaymentEventRepository};

/// Handle to the purchase workflow.
#[derive(Debug, Clone)]
pub struct PurchaseWorkflow {
    db: Database,
}

impl PurchaseWorkflow {
    pub fn new(db: Database) -> Self {
        PurchaseWorkflow { db }
    }

    fn repository(&self) -> BillRepository {
        BillRepository::new(self.db.pool().clone())
    }

    // =========================================================================
    // Wholesalers
    // =========================================================================

    pub async fn add_wholesaler(&self, input: WholesalerInput) -> LedgerResult<Wholesaler> {
        validate_wholesaler_input(&input)?;

        let wholesaler = Wholesaler {
            id: new_id(),
            name: input.name.trim().to_string(),
            mobile: input.mobile,
            address: input.address,
            created_at: Utc::now(),
        };

        let mut uow = self.db.begin("add_wholesaler").await?;
        let result = BillRepository::insert_wholesaler_in(uow.conn(), &wholesaler)
            .await
            .map_err(LedgerError::from);
        uow.finish(result).await?;

        info!(id = %wholesaler.id, name = %wholesaler.name, "Wholesaler added");
        Ok(wholesaler)
    }

    pub async fn list_wholesalers(&self) -> LedgerResult<Vec<Wholesaler>> {
        Ok(self.repository().list_wholesalers().await?)
    }

    // =========================================================================
    // Bills
    // =========================================================================

    /// Records a bill, stocks every batch and pays the initial amount.
    pub async fn add_bill(&self, input: BillInput) -> LedgerResult<WholesalerBill> {
        let totals = validate_bill_input(&input)?;

        let mut uow = self.db.begin("add_bill").await?;
        let result = add_bill_in(uow.conn(), &input, &totals).await;
        let bill = uow.finish(result).await?;

        info!(
            id = %bill.id,
            batches = input.batches.len(),
            bill_amount = %bill.bill_amount(),
            amount_paid = %bill.amount_paid(),
            "Bill added"
        );
        Ok(bill)
    }

    /// Edits date, shipping and amount paid of a bill.
    ///
    /// `previous_amount` is the amount paid the caller started from; if the
    /// stored value differs the edit fails with `ConcurrentModification`.
    pub async fn update_bill(
        &self,
        bill_id: &str,
        update: BillUpdate,
        previous_amount: Money,
    ) -> LedgerResult<WholesalerBill> {
        validate_bill_update(&update)?;

        let mut uow = self.db.begin("update_bill").await?;
        let result = update_bill_in(uow.conn(), bill_id, &update, previous_amount).await;
        let bill = uow.finish(result).await?;

        info!(id = bill_id, amount_paid = %bill.amount_paid(), "Bill updated");
        Ok(bill)
    }

    /// Deletes a bill with its batches, takes its units back out of stock and
    /// refunds what was paid.
    pub async fn delete_bill(&self, bill_id: &str, policy: ShortfallPolicy) -> LedgerResult<()> {
        let mut uow = self.db.begin("delete_bill").await?;
        let result = delete_bill_in(uow.conn(), bill_id, policy, Utc::now().date_naive()).await;
        let refunded = uow.finish(result).await?;

        info!(id = bill_id, refunded = %refunded, "Bill deleted");
        Ok(())
    }

    pub async fn get_bill(&self, bill_id: &str) -> LedgerResult<WholesalerBill> {
        self.repository()
            .get_bill(bill_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Bill", bill_id))
    }

    pub async fn list_bills(&self, wholesaler_id: Option<&str>) -> LedgerResult<Vec<WholesalerBill>> {
        Ok(self.repository().list_bills(wholesaler_id).await?)
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Adds a batch to an existing bill; the bill amount and pending grow.
    pub async fn add_product_to_bill(
        &self,
        bill_id: &str,
        batch: BatchInput,
    ) -> LedgerResult<ProductBatch> {
        validate_batch_input(&batch)?;

        let mut uow = self.db.begin("add_product_to_bill").await?;
        let result = add_product_in(uow.conn(), bill_id, &batch).await;
        let batch = uow.finish(result).await?;

        info!(id = %batch.id, bill_id, product = %batch.product_name, "Batch added to bill");
        Ok(batch)
    }

    /// Replaces a batch: its old units are withdrawn, the new ones stocked.
    pub async fn update_product(
        &self,
        batch_id: &str,
        batch: BatchInput,
        policy: ShortfallPolicy,
    ) -> LedgerResult<ProductBatch> {
        validate_batch_input(&batch)?;

        let mut uow = self.db.begin("update_product").await?;
        let result = update_product_in(uow.conn(), batch_id, &batch, policy).await;
        let batch = uow.finish(result).await?;

        info!(id = batch_id, quantity = batch.ordered_quantity, "Batch updated");
        Ok(batch)
    }

    /// Removes a batch from its bill and its units from stock.
    pub async fn delete_product(&self, batch_id: &str, policy: ShortfallPolicy) -> LedgerResult<()> {
        let mut uow = self.db.begin("delete_product").await?;
        let result = delete_product_in(uow.conn(), batch_id, policy).await;
        uow.finish(result).await?;

        info!(id = batch_id, "Batch deleted");
        Ok(())
    }

    pub async fn batches(&self, bill_id: &str) -> LedgerResult<Vec<ProductBatch>> {
        Ok(self.repository().batches(bill_id).await?)
    }
}

// =============================================================================
// Unit-of-Work Steps
// =============================================================================

async fn add_bill_in(
    conn: &mut SqliteConnection,
    input: &BillInput,
    totals: &BillTotals,
) -> LedgerResult<WholesalerBill> {
    BillRepository::find_wholesaler_in(&mut *conn, &input.wholesaler_id).await?;

    let now = Utc::now();
    let bill = WholesalerBill {
        id: new_id(),
        wholesaler_id: input.wholesaler_id.clone(),
        bill_date: input.bill_date,
        shipping_charges_cents: totals.shipping_charges.cents(),
        bill_amount_cents: totals.bill_amount.cents(),
        amount_paid_cents: totals.settlement.amount_paid.cents(),
        pending_amount_cents: totals.settlement.pending.cents(),
        status: totals.settlement.status,
        created_at: now,
        updated_at: now,
    };
    BillRepository::insert_bill_in(&mut *conn, &bill).await?;

    for batch in &input.batches {
        stock_batch_in(&mut *conn, &bill.id, bill.bill_date, batch).await?;
    }

    if input.amount_paid.is_positive() {
        PaymentTracker::insert_event_in(
            conn,
            &PaymentParent::Bill(bill.id.clone()),
            input.amount_paid,
            input.bill_date,
            input.payment_mode,
            totals.settlement.pending,
        )
        .await?;
    }

    Ok(bill)
}

async fn update_bill_in(
    conn: &mut SqliteConnection,
    bill_id: &str,
    update: &BillUpdate,
    previous_amount: Money,
) -> LedgerResult<WholesalerBill> {
    let existing = BillRepository::find_bill_in(&mut *conn, bill_id).await?;

    if existing.amount_paid() != previous_amount {
        return Err(LedgerError::ConcurrentModification(format!(
            "bill {} now has {} paid, edit started from {}",
            bill_id,
            existing.amount_paid(),
            previous_amount
        )));
    }

    let batch_totals = BillRepository::batch_totals_in(&mut *conn, bill_id).await?;
    let totals = BillTotals::compute(batch_totals, update.shipping_charges, update.amount_paid)?;

    let bill = WholesalerBill {
        bill_date: update.bill_date,
        shipping_charges_cents: totals.shipping_charges.cents(),
        bill_amount_cents: totals.bill_amount.cents(),
        amount_paid_cents: totals.settlement.amount_paid.cents(),
        pending_amount_cents: totals.settlement.pending.cents(),
        status: totals.settlement.status,
        updated_at: Utc::now(),
        ..existing.clone()
    };
    BillRepository::update_bill_in(&mut *conn, &bill).await?;

    let delta = update.amount_paid - existing.amount_paid();
    if !delta.is_zero() {
        PaymentTracker::insert_event_in(
            conn,
            &PaymentParent::Bill(bill.id.clone()),
            delta,
            update.bill_date,
            update.payment_mode,
            totals.settlement.pending,
        )
        .await?;
    }

    Ok(bill)
}

/// Returns the amount refunded.
async fn delete_bill_in(
    conn: &mut SqliteConnection,
    bill_id: &str,
    policy: ShortfallPolicy,
    date: NaiveDate,
) -> LedgerResult<Money> {
    let bill = BillRepository::find_bill_in(&mut *conn, bill_id).await?;
    let batches = BillRepository::batches_in(&mut *conn, bill_id).await?;

    for batch in &batches {
        StockLedger::withdraw_batch_in(&mut *conn, batch, policy).await?;
    }

    PaymentEventRepository::delete_for_parent_in(&mut *conn, &PaymentParent::Bill(bill_id.to_string()))
        .await?;
    for batch in &batches {
        BillRepository::delete_batch_in(&mut *conn, &batch.id).await?;
    }
    BillRepository::delete_bill_in(&mut *conn, bill_id).await?;

    let refund = bill.amount_paid();
    if refund.is_positive() {
        CashLedger::post_in(
            conn,
            &CashMovementDraft::new(
                refund,
                MovementKind::BillRefund,
                date,
                format!("Refund for deleted bill {}", bill_id),
            ),
        )
        .await?;
    }

    Ok(refund)
}

async fn add_product_in(
    conn: &mut SqliteConnection,
    bill_id: &str,
    input: &BatchInput,
) -> LedgerResult<ProductBatch> {
    let bill = BillRepository::find_bill_in(&mut *conn, bill_id).await?;
    let batch = stock_batch_in(&mut *conn, &bill.id, bill.bill_date, input).await?;
    resettle_bill_in(conn, &bill).await?;
    Ok(batch)
}

async fn update_product_in(
    conn: &mut SqliteConnection,
    batch_id: &str,
    input: &BatchInput,
    policy: ShortfallPolicy,
) -> LedgerResult<ProductBatch> {
    let existing = BillRepository::find_batch_in(&mut *conn, batch_id).await?;
    let bill = owning_bill_in(&mut *conn, &existing).await?;

    StockLedger::withdraw_batch_in(&mut *conn, &existing, policy).await?;

    let batch = ProductBatch {
        product_name: input.product_name.clone(),
        ordered_quantity: input.quantity,
        per_unit_price_cents: input.per_unit_price.cents(),
        expiry_date: input.expiry_date,
        total_cents: input.total()?.cents(),
        ..existing
    };
    BillRepository::update_batch_in(&mut *conn, &batch).await?;
    StockLedger::replenish_in(&mut *conn, &batch_replenishment(&batch, bill.bill_date)).await?;

    resettle_bill_in(conn, &bill).await?;
    Ok(batch)
}

async fn delete_product_in(
    conn: &mut SqliteConnection,
    batch_id: &str,
    policy: ShortfallPolicy,
) -> LedgerResult<()> {
    let batch = BillRepository::find_batch_in(&mut *conn, batch_id).await?;
    let bill = owning_bill_in(&mut *conn, &batch).await?;

    StockLedger::withdraw_batch_in(&mut *conn, &batch, policy).await?;
    BillRepository::delete_batch_in(&mut *conn, batch_id).await?;

    resettle_bill_in(conn, &bill).await?;
    Ok(())
}

/// Inserts a batch row and stocks its units.
async fn stock_batch_in(
    conn: &mut SqliteConnection,
    bill_id: &str,
    bill_date: NaiveDate,
    input: &BatchInput,
) -> LedgerResult<ProductBatch> {
    let batch = ProductBatch {
        id: new_id(),
        bill_id: Some(bill_id.to_string()),
        product_name: input.product_name.clone(),
        ordered_quantity: input.quantity,
        per_unit_price_cents: input.per_unit_price.cents(),
        expiry_date: input.expiry_date,
        total_cents: input.total()?.cents(),
        created_at: Utc::now(),
    };
    BillRepository::insert_batch_in(&mut *conn, &batch).await?;
    StockLedger::replenish_in(conn, &batch_replenishment(&batch, bill_date)).await?;
    Ok(batch)
}

fn batch_replenishment(batch: &ProductBatch, bill_date: NaiveDate) -> Replenishment {
    Replenishment::new(
        batch.product_name.as_str(),
        batch.price(),
        batch.ordered_quantity,
        bill_date,
    )
    .expiring(batch.expiry_date)
    .for_batch(batch.id.as_str())
}

async fn owning_bill_in(
    conn: &mut SqliteConnection,
    batch: &ProductBatch,
) -> LedgerResult<WholesalerBill> {
    let bill_id = batch.bill_id.as_deref().ok_or_else(|| {
        ValidationError::invalid_state("product batch", format!("{} is not on a bill", batch.id))
    })?;
    Ok(BillRepository::find_bill_in(conn, bill_id).await?)
}

/// Recomputes the bill amount from its batches and re-splits paid / pending.
async fn resettle_bill_in(conn: &mut SqliteConnection, bill: &WholesalerBill) -> LedgerResult<Settlement> {
    let batch_totals = BillRepository::batch_totals_in(&mut *conn, &bill.id).await?;
    let settlement = BillTotals::compute(
        batch_totals,
        Money::from_cents(bill.shipping_charges_cents),
        bill.amount_paid(),
    )?
    .settlement;

    BillRepository::update_bill_settlement_in(conn, &bill.id, &settlement).await?;
    Ok(settlement)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use shopkeep_core::{DiscountRate, PaymentMode, PaymentStatus, SaleChannel, SaleInput};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn rs(rupees: i64) -> Money {
        Money::from_rupees(rupees)
    }

    fn batch(product: &str, quantity: i64, rupees: i64) -> BatchInput {
        BatchInput {
            product_name: product.to_string(),
            quantity,
            per_unit_price: rs(rupees),
            expiry_date: Some(day(28)),
        }
    }

    async fn shop(cash: i64) -> (Database, Wholesaler) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        if cash > 0 {
            db.cash()
                .post(&CashMovementDraft::new(rs(cash), MovementKind::Deposit, day(1), "opening"))
                .await
                .unwrap();
        }
        let wholesaler = db
            .purchases()
            .add_wholesaler(WholesalerInput {
                name: "Acme Nutrition".to_string(),
                mobile: Some("9123456780".to_string()),
                address: Some("MG Road".to_string()),
            })
            .await
            .unwrap();
        (db, wholesaler)
    }

    fn bill_input(wholesaler: &Wholesaler, paid: i64, batches: Vec<BatchInput>) -> BillInput {
        BillInput {
            wholesaler_id: wholesaler.id.clone(),
            bill_date: day(2),
            shipping_charges: rs(50),
            amount_paid: rs(paid),
            payment_mode: PaymentMode::BankTransfer,
            batches,
        }
    }

    async fn available(db: &Database, product: &str, rupees: i64) -> i64 {
        db.stock().available(product, rs(rupees)).await.unwrap()
    }

    async fn sell(db: &Database, product: &str, quantity: i64, buying: i64) {
        db.sales()
            .add_sale(SaleInput {
                channel: SaleChannel::Customer,
                party_name: None,
                mobile: None,
                product_name: product.to_string(),
                quantity,
                buying_price: rs(buying),
                selling_price: rs(buying * 2),
                discount: DiscountRate::zero(),
                amount_paid: Money::zero(),
                payment_mode: PaymentMode::Cash,
                sale_date: day(3),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_bill_stocks_batches_and_pays() {
        let (db, wholesaler) = shop(2000).await;
        let purchases = db.purchases();

        let bill = purchases
            .add_bill(bill_input(
                &wholesaler,
                650,
                vec![batch("Whey", 10, 100), batch("Creatine", 4, 150)],
            ))
            .await
            .unwrap();

        assert_eq!(bill.bill_amount(), rs(1650));
        assert_eq!(bill.pending_amount(), rs(1000));
        assert_eq!(bill.status, PaymentStatus::Pending);
        assert_eq!(available(&db, "Whey", 100).await, 10);
        assert_eq!(available(&db, "Creatine", 150).await, 4);
        assert_eq!(db.cash().current_balance().await.unwrap(), rs(1350));

        let batches = purchases.batches(&bill.id).await.unwrap();
        assert_eq!(batches.len(), 2);
        let units = db.stock().history("Whey").await.unwrap();
        assert!(units.iter().all(|u| u.batch_id.as_deref() == Some(batches[0].id.as_str())));
        assert!(units.iter().all(|u| u.purchase_date == day(2)));
        assert!(units.iter().all(|u| u.expiry_date == Some(day(28))));

        let parent = PaymentParent::Bill(bill.id.clone());
        let events = db.payments().history(&parent).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount(), rs(650));
    }

    #[tokio::test]
    async fn test_unaffordable_bill_is_not_recorded() {
        let (db, wholesaler) = shop(100).await;

        let err = db
            .purchases()
            .add_bill(bill_input(&wholesaler, 500, vec![batch("Whey", 5, 100)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(err.shortfall(), Some(crate::error::Shortfall::Money(rs(400))));

        assert_eq!(available(&db, "Whey", 100).await, 0);
        assert!(db.purchases().list_bills(None).await.unwrap().is_empty());
        assert_eq!(db.cash().current_balance().await.unwrap(), rs(100));
    }

    #[tokio::test]
    async fn test_add_bill_requires_known_wholesaler() {
        let (db, mut wholesaler) = shop(0).await;
        wholesaler.id = new_id();

        assert!(matches!(
            db.purchases()
                .add_bill(bill_input(&wholesaler, 0, vec![batch("Whey", 1, 100)]))
                .await,
            Err(LedgerError::RecordNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_product_raises_bill_amount() {
        let (db, wholesaler) = shop(0).await;
        let purchases = db.purchases();
        let bill = purchases
            .add_bill(bill_input(&wholesaler, 0, vec![batch("Whey", 2, 100)]))
            .await
            .unwrap();

        purchases
            .add_product_to_bill(&bill.id, batch("Bar", 10, 20))
            .await
            .unwrap();

        let bill = purchases.get_bill(&bill.id).await.unwrap();
        assert_eq!(bill.bill_amount(), rs(450));
        assert_eq!(bill.pending_amount(), rs(450));
        assert_eq!(available(&db, "Bar", 20).await, 10);
    }

    #[tokio::test]
    async fn test_bill_amount_beyond_money_range_is_rejected() {
        let (db, wholesaler) = shop(0).await;
        let purchases = db.purchases();
        let bill = purchases
            .add_bill(bill_input(&wholesaler, 0, vec![batch("Whey", 2, 100)]))
            .await
            .unwrap();

        let mut huge = batch("Bar", 1, 0);
        huge.per_unit_price = Money::from_cents(i64::MAX - 100);
        assert!(matches!(
            purchases.add_product_to_bill(&bill.id, huge.clone()).await,
            Err(LedgerError::ValidationFailed(ValidationError::OutOfRange { .. }))
        ));

        huge.quantity = 2;
        assert!(matches!(
            purchases.add_product_to_bill(&bill.id, huge).await,
            Err(LedgerError::ValidationFailed(ValidationError::OutOfRange { .. }))
        ));

        assert_eq!(purchases.batches(&bill.id).await.unwrap().len(), 1);
        assert_eq!(purchases.get_bill(&bill.id).await.unwrap().bill_amount(), rs(250));
        assert_eq!(db.stock().available("Bar", Money::from_cents(i64::MAX - 100)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_product_swaps_units() {
        let (db, wholesaler) = shop(0).await;
        let purchases = db.purchases();
        let bill = purchases
            .add_bill(bill_input(&wholesaler, 0, vec![batch("Whey", 5, 100)]))
            .await
            .unwrap();
        let batch_id = purchases.batches(&bill.id).await.unwrap()[0].id.clone();

        let updated = purchases
            .update_product(&batch_id, batch("Whey", 3, 110), ShortfallPolicy::Reject)
            .await
            .unwrap();

        assert_eq!(updated.total(), rs(330));
        assert_eq!(available(&db, "Whey", 100).await, 0);
        assert_eq!(available(&db, "Whey", 110).await, 3);
        assert_eq!(purchases.get_bill(&bill.id).await.unwrap().bill_amount(), rs(380));
    }

    #[tokio::test]
    async fn test_delete_product_with_sold_units() {
        let (db, wholesaler) = shop(0).await;
        let purchases = db.purchases();
        let bill = purchases
            .add_bill(bill_input(&wholesaler, 0, vec![batch("Whey", 3, 100), batch("Bar", 1, 20)]))
            .await
            .unwrap();
        let whey_batch = purchases.batches(&bill.id).await.unwrap()[0].id.clone();
        sell(&db, "Whey", 2, 100).await;

        match purchases.delete_product(&whey_batch, ShortfallPolicy::Reject).await {
            Err(LedgerError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 1);
                assert_eq!(requested, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(purchases.batches(&bill.id).await.unwrap().len(), 2);

        purchases
            .delete_product(&whey_batch, ShortfallPolicy::Proceed)
            .await
            .unwrap();
        assert_eq!(available(&db, "Whey", 100).await, 0);
        assert_eq!(purchases.batches(&bill.id).await.unwrap().len(), 1);
        assert_eq!(purchases.get_bill(&bill.id).await.unwrap().bill_amount(), rs(70));

        // Sold units stay as history, unlinked from the deleted batch
        let units = db.stock().history("Whey").await.unwrap();
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u.batch_id.is_none()));
    }

    #[tokio::test]
    async fn test_delete_product_below_paid_amount_refused() {
        let (db, wholesaler) = shop(1000).await;
        let purchases = db.purchases();
        let bill = purchases
            .add_bill(bill_input(&wholesaler, 500, vec![batch("Whey", 4, 100), batch("Bar", 10, 20)]))
            .await
            .unwrap();
        let whey_batch = purchases.batches(&bill.id).await.unwrap()[0].id.clone();

        assert!(matches!(
            purchases.delete_product(&whey_batch, ShortfallPolicy::Reject).await,
            Err(LedgerError::ValidationFailed(_))
        ));
        assert_eq!(available(&db, "Whey", 100).await, 4);
    }

    #[tokio::test]
    async fn test_update_bill_paid_delta() {
        let (db, wholesaler) = shop(2000).await;
        let purchases = db.purchases();
        let bill = purchases
            .add_bill(bill_input(&wholesaler, 200, vec![batch("Whey", 10, 100)]))
            .await
            .unwrap();
        let update = |paid: i64| BillUpdate {
            bill_date: day(4),
            shipping_charges: rs(50),
            amount_paid: rs(paid),
            payment_mode: PaymentMode::Upi,
        };

        // Stale starting point
        assert!(matches!(
            purchases.update_bill(&bill.id, update(900), rs(100)).await,
            Err(LedgerError::ConcurrentModification(_))
        ));

        let updated = purchases.update_bill(&bill.id, update(900), rs(200)).await.unwrap();
        assert_eq!(updated.pending_amount(), rs(150));
        assert_eq!(updated.bill_date, day(4));
        assert_eq!(db.cash().current_balance().await.unwrap(), rs(1100));

        let updated = purchases.update_bill(&bill.id, update(300), rs(900)).await.unwrap();
        assert_eq!(updated.pending_amount(), rs(750));
        assert_eq!(db.cash().current_balance().await.unwrap(), rs(1700));

        // Cannot pay more than the bill
        assert!(matches!(
            purchases.update_bill(&bill.id, update(1051), rs(300)).await,
            Err(LedgerError::ValidationFailed(_))
        ));

        let kinds: Vec<MovementKind> = db.cash().history().await.unwrap().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MovementKind::Deposit,
                MovementKind::BillPayment,
                MovementKind::BillPayment,
                MovementKind::BillRefund
            ]
        );
        assert!(db
            .payments()
            .reconcile(&PaymentParent::Bill(bill.id.clone()))
            .await
            .unwrap()
            .is_consistent());
    }

    #[tokio::test]
    async fn test_delete_bill_withdraws_and_refunds() {
        let (db, wholesaler) = shop(2000).await;
        let purchases = db.purchases();
        let bill = purchases
            .add_bill(bill_input(&wholesaler, 600, vec![batch("Whey", 5, 100), batch("Bar", 5, 20)]))
            .await
            .unwrap();
        assert_eq!(db.cash().current_balance().await.unwrap(), rs(1400));

        purchases.delete_bill(&bill.id, ShortfallPolicy::Reject).await.unwrap();

        assert_eq!(db.cash().current_balance().await.unwrap(), rs(2000));
        assert_eq!(available(&db, "Whey", 100).await, 0);
        assert_eq!(available(&db, "Bar", 20).await, 0);
        assert!(matches!(
            purchases.get_bill(&bill.id).await,
            Err(LedgerError::RecordNotFound { .. })
        ));
        assert!(purchases.batches(&bill.id).await.unwrap().is_empty());
        assert!(db
            .payments()
            .history(&PaymentParent::Bill(bill.id.clone()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_wholesalers_and_bills() {
        let (db, wholesaler) = shop(0).await;
        let purchases = db.purchases();
        purchases
            .add_bill(bill_input(&wholesaler, 0, vec![batch("Whey", 1, 100)]))
            .await
            .unwrap();

        let wholesalers = purchases.list_wholesalers().await.unwrap();
        assert_eq!(wholesalers.len(), 1);
        assert_eq!(wholesalers[0].name, "Acme Nutrition");

        assert_eq!(purchases.list_bills(Some(&wholesaler.id)).await.unwrap().len(), 1);
        assert!(purchases.list_bills(Some("someone-else")).await.unwrap().is_empty());
    }
}
