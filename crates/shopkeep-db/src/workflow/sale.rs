//! # Sale Workflow
//!
//! Customer and gym-client sales: stock out, money in.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_sale                                                               │
//! │    validate ─► allocate qty @ buying price ─► insert row                │
//! │             ─► paid > 0 ? post inflow + payment event ─► commit         │
//! │                                                                         │
//! │  update_sale(id, input, previous_amount, policy)                        │
//! │    load row ─► amount_paid == previous_amount ? else Concurrent...      │
//! │             ─► replenish OLD qty @ OLD buying price (full restore)      │
//! │             ─► allocate NEW qty @ NEW buying price                      │
//! │                  customer: shortfall rejected                           │
//! │                  gym client: shortfall allowed with Proceed             │
//! │             ─► rewrite row                                              │
//! │             ─► paid delta > 0 ? inflow + payment event                  │
//! │                paid delta < 0 ? refund outflow + negative event         │
//! │             ─► commit                                                   │
//! │                                                                         │
//! │  delete_sale                                                            │
//! │    restore stock ─► delete events ─► delete row                         │
//! │             ─► paid > 0 ? refund outflow ─► commit                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteConnection;
use tracing::{info, warn};

use shopkeep_core::allocation::ShortfallPolicy;
use shopkeep_core::billing::SaleTotals;
use shopkeep_core::validation::validate_sale_input;
use shopkeep_core::{
    CashMovementDraft, Money, MovementKind, PaymentParent, SaleChannel, SaleInput, SaleRecord,
    ValidationError,
};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::cash::CashLedger;
use crate::ledger::payment::PaymentTracker;
use crate::ledger::stock::{Replenishment, StockLedger};
use crate::pool::Database;
use crate::repository::{new_id, PaymentEventRepository, SaleRepository};

/// Handle to the sale workflow.
#[derive(Debug, Clone)]
pub struct SaleWorkflow {
    db: Database,
}

impl SaleWorkflow {
    pub fn new(db: Database) -> Self {
        SaleWorkflow { db }
    }

    fn repository(&self) -> SaleRepository {
        SaleRepository::new(self.db.pool().clone())
    }

    /// Records a sale.
    ///
    /// ## Errors
    /// - `ValidationFailed` for bad input (nothing touched)
    /// - `InsufficientStock` when the price tier cannot cover the quantity
    pub async fn add_sale(&self, input: SaleInput) -> LedgerResult<SaleRecord> {
        let totals = validate_sale_input(&input)?;

        let mut uow = self.db.begin("add_sale").await?;
        let result = add_sale_in(uow.conn(), &input, &totals).await;
        let sale = uow.finish(result).await?;

        info!(
            id = %sale.id,
            channel = ?sale.channel,
            product = %sale.product_name,
            quantity = sale.quantity,
            final_bill = %sale.final_bill(),
            "Sale added"
        );
        Ok(sale)
    }

    /// Replaces a sale with `input`.
    ///
    /// `previous_amount` is the amount paid the caller saw when the edit
    /// started; a different stored value means someone else changed the
    /// sale meanwhile. `policy` only has an effect on gym-client sales.
    pub async fn update_sale(
        &self,
        id: &str,
        input: SaleInput,
        previous_amount: Money,
        policy: ShortfallPolicy,
    ) -> LedgerResult<SaleRecord> {
        let totals = validate_sale_input(&input)?;

        let mut uow = self.db.begin("update_sale").await?;
        let result = update_sale_in(uow.conn(), id, &input, &totals, previous_amount, policy).await;
        let sale = uow.finish(result).await?;

        info!(
            id = %sale.id,
            quantity = sale.quantity,
            amount_paid = %sale.amount_paid(),
            "Sale updated"
        );
        Ok(sale)
    }

    /// [`Self::update_sale`] with the shop's configured gym-client policy,
    /// for callers that do not ask the operator.
    pub async fn update_sale_with_default_policy(
        &self,
        id: &str,
        input: SaleInput,
        previous_amount: Money,
    ) -> LedgerResult<SaleRecord> {
        let policy = self.db.gym_shortfall();
        self.update_sale(id, input, previous_amount, policy).await
    }

    /// Deletes a sale, restoring its stock and refunding what was paid.
    ///
    /// The full quantity comes back, including any units a gym-client
    /// update took past available stock.
    pub async fn delete_sale(&self, id: &str) -> LedgerResult<()> {
        let mut uow = self.db.begin("delete_sale").await?;
        let result = delete_sale_in(uow.conn(), id, today()).await;
        let refunded = uow.finish(result).await?;

        info!(id, refunded = %refunded, "Sale deleted");
        Ok(())
    }

    pub async fn get_sale(&self, id: &str) -> LedgerResult<SaleRecord> {
        self.repository()
            .get_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", id))
    }

    /// Sales newest first; `None` lists both channels.
    pub async fn list_sales(&self, channel: Option<SaleChannel>) -> LedgerResult<Vec<SaleRecord>> {
        Ok(self.repository().list(channel).await?)
    }
}

// =============================================================================
// Unit-of-Work Steps
// =============================================================================

async fn add_sale_in(
    conn: &mut SqliteConnection,
    input: &SaleInput,
    totals: &SaleTotals,
) -> LedgerResult<SaleRecord> {
    StockLedger::allocate_in(
        &mut *conn,
        &input.product_name,
        input.buying_price,
        input.quantity,
        ShortfallPolicy::Reject,
    )
    .await?;

    let now = Utc::now();
    let sale = build_record(new_id(), input, totals, now);
    SaleRepository::insert_in(&mut *conn, &sale).await?;

    if input.amount_paid.is_positive() {
        PaymentTracker::insert_event_in(
            conn,
            &PaymentParent::Sale(sale.id.clone()),
            input.amount_paid,
            input.sale_date,
            input.payment_mode,
            totals.settlement.pending,
        )
        .await?;
    }

    Ok(sale)
}

async fn update_sale_in(
    conn: &mut SqliteConnection,
    id: &str,
    input: &SaleInput,
    totals: &SaleTotals,
    previous_amount: Money,
    policy: ShortfallPolicy,
) -> LedgerResult<SaleRecord> {
    let existing = SaleRepository::find_in(&mut *conn, id).await?;

    if existing.amount_paid() != previous_amount {
        return Err(LedgerError::ConcurrentModification(format!(
            "sale {} now has {} paid, edit started from {}",
            id,
            existing.amount_paid(),
            previous_amount
        )));
    }
    if existing.channel != input.channel {
        return Err(ValidationError::invalid_state(
            "channel",
            "a sale cannot move between customer and gym-client",
        )
        .into());
    }

    // Full restore of the old effect before anything new is applied
    StockLedger::replenish_in(
        &mut *conn,
        &Replenishment::new(
            existing.product_name.as_str(),
            existing.buying_price(),
            existing.quantity,
            today(),
        ),
    )
    .await?;

    let policy = match existing.channel {
        SaleChannel::Customer => ShortfallPolicy::Reject,
        SaleChannel::GymClient => policy,
    };
    let allocation = StockLedger::allocate_in(
        &mut *conn,
        &input.product_name,
        input.buying_price,
        input.quantity,
        policy,
    )
    .await?;
    if !allocation.is_complete() {
        warn!(
            id,
            product = %input.product_name,
            missing = allocation.shortfall(),
            "Gym sale updated past available stock"
        );
    }

    let sale = build_record(existing.id.clone(), input, totals, existing.created_at);
    SaleRepository::update_in(&mut *conn, &sale).await?;

    let delta = input.amount_paid - existing.amount_paid();
    if !delta.is_zero() {
        PaymentTracker::insert_event_in(
            conn,
            &PaymentParent::Sale(sale.id.clone()),
            delta,
            input.sale_date,
            input.payment_mode,
            totals.settlement.pending,
        )
        .await?;
    }

    Ok(sale)
}

/// Returns the amount refunded.
async fn delete_sale_in(conn: &mut SqliteConnection, id: &str, date: NaiveDate) -> LedgerResult<Money> {
    let existing = SaleRepository::find_in(&mut *conn, id).await?;

    // Oversold units are not tracked per sale
    if existing.channel == SaleChannel::GymClient {
        warn!(
            id,
            product = %existing.product_name,
            quantity = existing.quantity,
            "Restoring full quantity of gym sale, including any oversold units"
        );
    }
    StockLedger::replenish_in(
        &mut *conn,
        &Replenishment::new(
            existing.product_name.as_str(),
            existing.buying_price(),
            existing.quantity,
            date,
        ),
    )
    .await?;

    PaymentEventRepository::delete_for_parent_in(&mut *conn, &PaymentParent::Sale(id.to_string()))
        .await?;
    SaleRepository::delete_in(&mut *conn, id).await?;

    let refund = existing.amount_paid();
    if refund.is_positive() {
        CashLedger::post_in(
            conn,
            &CashMovementDraft::new(
                -refund,
                MovementKind::SaleRefund,
                date,
                format!("Refund for deleted sale {}", id),
            ),
        )
        .await?;
    }

    Ok(refund)
}

fn build_record(
    id: String,
    input: &SaleInput,
    totals: &SaleTotals,
    created_at: DateTime<Utc>,
) -> SaleRecord {
    SaleRecord {
        id,
        channel: input.channel,
        party_name: input.party_name.clone(),
        mobile: input.mobile.clone(),
        product_name: input.product_name.clone(),
        quantity: input.quantity,
        buying_price_cents: input.buying_price.cents(),
        selling_price_cents: input.selling_price.cents(),
        total_amount_cents: totals.total_amount.cents(),
        discount_bps: i64::from(input.discount.bps()),
        final_bill_cents: totals.final_bill.cents(),
        net_profit_cents: totals.net_profit.cents(),
        payment_mode: input.payment_mode,
        sale_date: input.sale_date,
        amount_paid_cents: totals.settlement.amount_paid.cents(),
        pending_amount_cents: totals.settlement.pending.cents(),
        status: totals.settlement.status,
        created_at,
        updated_at: Utc::now(),
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use shopkeep_core::{DiscountRate, PaymentMode, PaymentStatus};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn rs(rupees: i64) -> Money {
        Money::from_rupees(rupees)
    }

    fn sale_input(channel: SaleChannel, quantity: i64, buying: i64, paid: i64) -> SaleInput {
        SaleInput {
            channel,
            party_name: Some("Meera".to_string()),
            mobile: Some("9876543210".to_string()),
            product_name: "Whey".to_string(),
            quantity,
            buying_price: rs(buying),
            selling_price: rs(200),
            discount: DiscountRate::zero(),
            amount_paid: rs(paid),
            payment_mode: PaymentMode::Cash,
            sale_date: day(5),
        }
    }

    async fn shop(stock: &[(i64, i64)], cash: i64) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for &(rupees, qty) in stock {
            db.stock()
                .replenish(&Replenishment::new("Whey", rs(rupees), qty, day(1)))
                .await
                .unwrap();
        }
        if cash > 0 {
            db.cash()
                .post(&CashMovementDraft::new(rs(cash), MovementKind::Deposit, day(1), "opening"))
                .await
                .unwrap();
        }
        db
    }

    async fn available(db: &Database, rupees: i64) -> i64 {
        db.stock().available("Whey", rs(rupees)).await.unwrap()
    }

    async fn balance(db: &Database) -> Money {
        db.cash().current_balance().await.unwrap()
    }

    #[tokio::test]
    async fn test_add_sale_allocates_and_collects() {
        let db = shop(&[(100, 5)], 0).await;

        let sale = db
            .sales()
            .add_sale(sale_input(SaleChannel::Customer, 3, 100, 450))
            .await
            .unwrap();

        assert_eq!(sale.final_bill(), rs(600));
        assert_eq!(sale.pending_amount(), rs(150));
        assert_eq!(sale.status, PaymentStatus::Pending);
        assert_eq!(sale.net_profit_cents, rs(150).cents());
        assert_eq!(available(&db, 100).await, 2);
        assert_eq!(balance(&db).await, rs(450));

        let events = db.payments().history(&PaymentParent::Sale(sale.id.clone())).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pending_amount_after_cents, rs(150).cents());
    }

    #[tokio::test]
    async fn test_unpaid_sale_posts_no_cash() {
        let db = shop(&[(100, 1)], 0).await;
        let sale = db
            .sales()
            .add_sale(sale_input(SaleChannel::Customer, 1, 100, 0))
            .await
            .unwrap();

        assert!(balance(&db).await.is_zero());
        assert!(db.cash().history().await.unwrap().is_empty());
        assert!(db
            .payments()
            .history(&PaymentParent::Sale(sale.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_failed_add_sale_changes_nothing() {
        let db = shop(&[(100, 2)], 300).await;
        let sales = db.sales();

        // Not enough stock
        assert!(matches!(
            sales.add_sale(sale_input(SaleChannel::Customer, 3, 100, 600)).await,
            Err(LedgerError::InsufficientStock { .. })
        ));
        // Paid more than the bill
        assert!(matches!(
            sales.add_sale(sale_input(SaleChannel::Customer, 1, 100, 201)).await,
            Err(LedgerError::ValidationFailed(_))
        ));
        // Bad mobile
        let mut input = sale_input(SaleChannel::Customer, 1, 100, 0);
        input.mobile = Some("12345".to_string());
        assert!(matches!(sales.add_sale(input).await, Err(LedgerError::ValidationFailed(_))));

        assert_eq!(available(&db, 100).await, 2);
        assert_eq!(balance(&db).await, rs(300));
        assert!(sales.list_sales(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sale_total_beyond_money_range_is_rejected() {
        let price = Money::from_cents(i64::MAX / 10);
        let db = shop(&[], 50).await;
        db.stock()
            .replenish(&Replenishment::new("Whey", price, 100, day(1)))
            .await
            .unwrap();

        let mut input = sale_input(SaleChannel::Customer, 100, 0, 0);
        input.buying_price = price;
        input.selling_price = price;

        assert!(matches!(
            db.sales().add_sale(input).await,
            Err(LedgerError::ValidationFailed(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(db.stock().available("Whey", price).await.unwrap(), 100);
        assert_eq!(balance(&db).await, rs(50));
        assert!(db.sales().list_sales(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_restores_old_tier_and_allocates_new() {
        let db = shop(&[(50, 3), (60, 10)], 0).await;
        let sales = db.sales();
        let sale = sales
            .add_sale(sale_input(SaleChannel::Customer, 3, 50, 0))
            .await
            .unwrap();

        let stored = sales.get_sale(&sale.id).await.unwrap();
        let before_50 = available(&db, 50).await;
        let before_60 = available(&db, 60).await;

        sales
            .update_sale(
                &sale.id,
                sale_input(SaleChannel::Customer, 5, 60, 0),
                Money::zero(),
                ShortfallPolicy::Reject,
            )
            .await
            .unwrap();

        assert_eq!(available(&db, 50).await, before_50 + 3);
        assert_eq!(available(&db, 60).await, before_60 - 5);

        let updated = sales.get_sale(&sale.id).await.unwrap();
        assert_eq!(updated.quantity, 5);
        assert_eq!(updated.buying_price(), rs(60));
        assert_eq!(updated.created_at, stored.created_at);
    }

    #[tokio::test]
    async fn test_customer_update_never_oversells() {
        let db = shop(&[(100, 2)], 0).await;
        let sales = db.sales();
        let sale = sales
            .add_sale(sale_input(SaleChannel::Customer, 2, 100, 0))
            .await
            .unwrap();

        let err = sales
            .update_sale(
                &sale.id,
                sale_input(SaleChannel::Customer, 5, 100, 0),
                Money::zero(),
                ShortfallPolicy::Proceed,
            )
            .await
            .unwrap_err();
        match err {
            LedgerError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // The restore was rolled back with the rest
        assert_eq!(available(&db, 100).await, 0);
        assert_eq!(sales.get_sale(&sale.id).await.unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_gym_update_may_proceed_past_stock() {
        let db = shop(&[(100, 2)], 0).await;
        let sales = db.sales();
        let sale = sales
            .add_sale(sale_input(SaleChannel::GymClient, 2, 100, 0))
            .await
            .unwrap();

        assert!(sales
            .update_sale(
                &sale.id,
                sale_input(SaleChannel::GymClient, 5, 100, 0),
                Money::zero(),
                ShortfallPolicy::Reject,
            )
            .await
            .is_err());

        let updated = sales
            .update_sale(
                &sale.id,
                sale_input(SaleChannel::GymClient, 5, 100, 0),
                Money::zero(),
                ShortfallPolicy::Proceed,
            )
            .await
            .unwrap();
        assert_eq!(updated.quantity, 5);
        assert_eq!(available(&db, 100).await, 0);
    }

    #[tokio::test]
    async fn test_default_policy_comes_from_config() {
        let strict = shop(&[(100, 2)], 0).await;
        let sale = strict
            .sales()
            .add_sale(sale_input(SaleChannel::GymClient, 2, 100, 0))
            .await
            .unwrap();
        assert!(matches!(
            strict
                .sales()
                .update_sale_with_default_policy(
                    &sale.id,
                    sale_input(SaleChannel::GymClient, 5, 100, 0),
                    Money::zero(),
                )
                .await,
            Err(LedgerError::InsufficientStock { .. })
        ));

        let config = DbConfig::in_memory().gym_shortfall(ShortfallPolicy::Proceed);
        let lenient = Database::new(config).await.unwrap();
        lenient
            .stock()
            .replenish(&Replenishment::new("Whey", rs(100), 2, day(1)))
            .await
            .unwrap();
        let sales = lenient.sales();
        let sale = sales
            .add_sale(sale_input(SaleChannel::GymClient, 2, 100, 0))
            .await
            .unwrap();
        let updated = sales
            .update_sale_with_default_policy(
                &sale.id,
                sale_input(SaleChannel::GymClient, 5, 100, 0),
                Money::zero(),
            )
            .await
            .unwrap();
        assert_eq!(updated.quantity, 5);
        assert_eq!(available(&lenient, 100).await, 0);
    }

    #[tokio::test]
    async fn test_delete_oversold_gym_sale_restores_full_quantity() {
        let db = shop(&[(100, 2)], 0).await;
        let sales = db.sales();
        let sale = sales
            .add_sale(sale_input(SaleChannel::GymClient, 2, 100, 0))
            .await
            .unwrap();
        sales
            .update_sale(
                &sale.id,
                sale_input(SaleChannel::GymClient, 5, 100, 0),
                Money::zero(),
                ShortfallPolicy::Proceed,
            )
            .await
            .unwrap();
        assert_eq!(available(&db, 100).await, 0);

        sales.delete_sale(&sale.id).await.unwrap();

        // All five units come back, not just the two that were on hand
        assert_eq!(available(&db, 100).await, 5);
    }

    #[tokio::test]
    async fn test_stale_previous_amount_is_concurrent_modification() {
        let db = shop(&[(100, 2)], 0).await;
        let sales = db.sales();
        let sale = sales
            .add_sale(sale_input(SaleChannel::Customer, 1, 100, 50))
            .await
            .unwrap();

        let err = sales
            .update_sale(
                &sale.id,
                sale_input(SaleChannel::Customer, 1, 100, 200),
                rs(40),
                ShortfallPolicy::Reject,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrentModification(_)));
        assert_eq!(balance(&db).await, rs(50));
    }

    #[tokio::test]
    async fn test_paid_delta_posts_payment_or_refund() {
        let db = shop(&[(100, 5)], 0).await;
        let sales = db.sales();
        let sale = sales
            .add_sale(sale_input(SaleChannel::Customer, 5, 100, 400))
            .await
            .unwrap();
        let parent = PaymentParent::Sale(sale.id.clone());

        // 400 → 1000: ₹600 more collected
        sales
            .update_sale(
                &sale.id,
                sale_input(SaleChannel::Customer, 5, 100, 1000),
                rs(400),
                ShortfallPolicy::Reject,
            )
            .await
            .unwrap();
        assert_eq!(balance(&db).await, rs(1000));

        // 1000 → 300: ₹700 handed back
        let updated = sales
            .update_sale(
                &sale.id,
                sale_input(SaleChannel::Customer, 5, 100, 300),
                rs(1000),
                ShortfallPolicy::Reject,
            )
            .await
            .unwrap();
        assert_eq!(balance(&db).await, rs(300));
        assert_eq!(updated.pending_amount(), rs(700));

        let events = db.payments().history(&parent).await.unwrap();
        let amounts: Vec<Money> = events.iter().map(|e| e.amount()).collect();
        assert_eq!(amounts, vec![rs(400), rs(600), rs(-700)]);

        let kinds: Vec<MovementKind> = db.cash().history().await.unwrap().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MovementKind::SalePayment, MovementKind::SalePayment, MovementKind::SaleRefund]
        );

        assert!(db.payments().reconcile(&parent).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_delete_sale_restores_stock_and_refunds() {
        let db = shop(&[(100, 3)], 0).await;
        let sales = db.sales();
        let sale = sales
            .add_sale(sale_input(SaleChannel::GymClient, 2, 100, 400))
            .await
            .unwrap();

        sales.delete_sale(&sale.id).await.unwrap();

        assert_eq!(available(&db, 100).await, 3);
        assert!(balance(&db).await.is_zero());
        assert!(matches!(
            sales.get_sale(&sale.id).await,
            Err(LedgerError::RecordNotFound { .. })
        ));
        assert!(db
            .payments()
            .history(&PaymentParent::Sale(sale.id.clone()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_sale_refund_needs_balance() {
        let db = shop(&[(100, 1)], 0).await;
        let sale = db
            .sales()
            .add_sale(sale_input(SaleChannel::Customer, 1, 100, 200))
            .await
            .unwrap();
        db.cash()
            .post(&CashMovementDraft::new(rs(-150), MovementKind::Withdrawal, day(6), "owner"))
            .await
            .unwrap();

        assert!(matches!(
            db.sales().delete_sale(&sale.id).await,
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(available(&db, 100).await, 0);
        assert!(db.sales().get_sale(&sale.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_sales_by_channel() {
        let db = shop(&[(100, 3)], 0).await;
        let sales = db.sales();
        sales.add_sale(sale_input(SaleChannel::Customer, 1, 100, 0)).await.unwrap();
        sales.add_sale(sale_input(SaleChannel::GymClient, 1, 100, 0)).await.unwrap();
        sales.add_sale(sale_input(SaleChannel::GymClient, 1, 100, 0)).await.unwrap();

        assert_eq!(sales.list_sales(None).await.unwrap().len(), 3);
        assert_eq!(sales.list_sales(Some(SaleChannel::GymClient)).await.unwrap().len(), 2);
        assert_eq!(sales.list_sales(Some(SaleChannel::Customer)).await.unwrap().len(), 1);
    }
}
