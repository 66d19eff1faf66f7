//! # Stock Ledger
//!
//! Per-unit inventory keyed by (product, price tier).
//!
//! ## Row Model
//! ```text
//! stock_units (product "Whey" at ₹100)
//! ┌────┬──────────┬──────────────────┐
//! │ id │ quantity │ purchase_date    │
//! ├────┼──────────┼──────────────────┤
//! │ 11 │    0     │ 2026-01-04       │  ← sold, kept as history
//! │ 12 │    1     │ 2026-01-04       │  ← next to go (FIFO)
//! │ 19 │    1     │ 2026-02-10       │
//! │ 20 │    1     │ 2026-02-10       │
//! └────┴──────────┴──────────────────┘
//! available("Whey", ₹100) = 3
//! ```
//!
//! - `replenish` inserts one row per unit (quantity 1).
//! - `allocate` plans the whole draw first (see
//!   [`shopkeep_core::allocation`]) and only then issues UPDATEs, so a
//!   rejected allocation writes nothing.
//! - Product names match case-insensitively (`COLLATE NOCASE`); price tiers
//!   match exactly and are never mixed.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Executor, Sqlite};
use tracing::{debug, info, warn};

use shopkeep_core::allocation::{AllocationPlan, Lot, LotDraw, ShortfallPolicy};
use shopkeep_core::validation::{validate_price, validate_product_name, validate_quantity};
use shopkeep_core::{Money, ProductBatch, StockLevel, StockUnit};

use crate::error::{DbResult, LedgerResult};
use crate::pool::Database;

// =============================================================================
// Types
// =============================================================================

/// Units to add to stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replenishment {
    pub product_name: String,
    pub price: Money,
    pub quantity: i64,
    pub purchase_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    /// Purchase batch the units belong to; `None` for restocks.
    pub batch_id: Option<String>,
}

impl Replenishment {
    pub fn new(
        product_name: impl Into<String>,
        price: Money,
        quantity: i64,
        purchase_date: NaiveDate,
    ) -> Self {
        Replenishment {
            product_name: product_name.into(),
            price,
            quantity,
            purchase_date,
            expiry_date: None,
            batch_id: None,
        }
    }

    pub fn expiring(mut self, expiry_date: Option<NaiveDate>) -> Self {
        self.expiry_date = expiry_date;
        self
    }

    pub fn for_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }
}

/// Units taken from stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub product_name: String,
    pub price: Money,
    pub requested: i64,
    pub allocated: i64,
    pub draws: Vec<LotDraw>,
}

impl Allocation {
    fn from_plan(product_name: &str, price: Money, plan: AllocationPlan) -> Self {
        Allocation {
            product_name: product_name.to_string(),
            price,
            requested: plan.requested,
            allocated: plan.allocated,
            draws: plan.draws,
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.allocated == self.requested
    }

    /// Units that were requested but did not exist (only non-zero when the
    /// caller allowed a shortfall).
    #[inline]
    pub fn shortfall(&self) -> i64 {
        self.requested - self.allocated
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Handle to the stock ledger.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
}

impl StockLedger {
    pub fn new(db: Database) -> Self {
        StockLedger { db }
    }

    // -------------------------------------------------------------------------
    // Unit-of-work operations
    // -------------------------------------------------------------------------

    /// Takes `quantity` units of `product` at `price`, oldest rows first.
    ///
    /// ## Errors
    /// - `InsufficientStock` when the tier holds fewer units and `policy` is
    ///   [`ShortfallPolicy::Reject`]; no row is touched.
    pub async fn allocate_in(
        conn: &mut SqliteConnection,
        product_name: &str,
        price: Money,
        quantity: i64,
        policy: ShortfallPolicy,
    ) -> LedgerResult<Allocation> {
        validate_product_name(product_name)?;
        validate_price("price", price)?;
        validate_quantity(quantity)?;

        let lots: Vec<Lot> = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT id, quantity
            FROM stock_units
            WHERE product_name = ?1
              AND per_unit_price_cents = ?2
              AND quantity > 0
            ORDER BY id
            "#,
        )
        .bind(product_name)
        .bind(price.cents())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|(id, remaining)| Lot { id, remaining })
        .collect();

        let plan = AllocationPlan::build(&lots, quantity, policy, product_name, price)?;
        if !plan.is_complete() {
            warn!(
                product = product_name,
                price = %price,
                requested = quantity,
                allocated = plan.allocated,
                "Allocating past available stock"
            );
        }

        apply_draws(conn, price, &plan.draws).await?;

        debug!(
            product = product_name,
            price = %price,
            allocated = plan.allocated,
            rows = plan.draws.len(),
            "Stock allocated"
        );

        Ok(Allocation::from_plan(product_name, price, plan))
    }

    /// Inserts one row per unit; returns the new row ids in FIFO order.
    pub async fn replenish_in(
        conn: &mut SqliteConnection,
        replenishment: &Replenishment,
    ) -> LedgerResult<Vec<i64>> {
        validate_product_name(&replenishment.product_name)?;
        validate_price("price", replenishment.price)?;
        validate_quantity(replenishment.quantity)?;

        let mut ids = Vec::with_capacity(replenishment.quantity as usize);
        for _ in 0..replenishment.quantity {
            let result = sqlx::query(
                r#"
                INSERT INTO stock_units (
                    product_name, per_unit_price_cents, quantity, total_amount_cents,
                    purchase_date, expiry_date, batch_id
                ) VALUES (?1, ?2, 1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&replenishment.product_name)
            .bind(replenishment.price.cents())
            .bind(replenishment.purchase_date)
            .bind(replenishment.expiry_date)
            .bind(&replenishment.batch_id)
            .execute(&mut *conn)
            .await?;
            ids.push(result.last_insert_rowid());
        }

        debug!(
            product = %replenishment.product_name,
            price = %replenishment.price,
            quantity = replenishment.quantity,
            batch_id = ?replenishment.batch_id,
            "Stock replenished"
        );

        Ok(ids)
    }

    pub async fn available_in(
        conn: &mut SqliteConnection,
        product_name: &str,
        price: Money,
    ) -> LedgerResult<i64> {
        Ok(sum_available(conn, product_name, price).await?)
    }

    /// Takes a purchase batch's units back out of stock.
    ///
    /// Units still linked to the batch go first; if some were sold, the
    /// rest comes from other units of the same tier, newest first (units of
    /// one tier are interchangeable). When the tier cannot cover the batch,
    /// the batch's units were sold: `InsufficientStock` unless `policy` is
    /// [`ShortfallPolicy::Proceed`].
    pub async fn withdraw_batch_in(
        conn: &mut SqliteConnection,
        batch: &ProductBatch,
        policy: ShortfallPolicy,
    ) -> LedgerResult<Allocation> {
        let price = batch.price();

        let lots: Vec<Lot> = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT id, quantity
            FROM stock_units
            WHERE product_name = ?1
              AND per_unit_price_cents = ?2
              AND quantity > 0
            ORDER BY CASE WHEN batch_id = ?3 THEN 0 ELSE 1 END, id DESC
            "#,
        )
        .bind(&batch.product_name)
        .bind(price.cents())
        .bind(&batch.id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(|(id, remaining)| Lot { id, remaining })
        .collect();

        let plan = AllocationPlan::build(
            &lots,
            batch.ordered_quantity,
            policy,
            &batch.product_name,
            price,
        )?;
        if !plan.is_complete() {
            warn!(
                batch_id = %batch.id,
                product = %batch.product_name,
                missing = plan.shortfall(),
                "Withdrawing batch with units already sold"
            );
        }

        apply_draws(conn, price, &plan.draws).await?;

        debug!(
            batch_id = %batch.id,
            withdrawn = plan.allocated,
            "Batch withdrawn from stock"
        );

        Ok(Allocation::from_plan(&batch.product_name, price, plan))
    }

    // -------------------------------------------------------------------------
    // Standalone operations
    // -------------------------------------------------------------------------

    /// Allocates in its own unit of work. Shortfalls are always rejected.
    pub async fn allocate(
        &self,
        product_name: &str,
        price: Money,
        quantity: i64,
    ) -> LedgerResult<Allocation> {
        let mut uow = self.db.begin("stock_allocate").await?;
        let result = Self::allocate_in(
            uow.conn(),
            product_name,
            price,
            quantity,
            ShortfallPolicy::Reject,
        )
        .await;
        uow.finish(result).await
    }

    pub async fn replenish(&self, replenishment: &Replenishment) -> LedgerResult<Vec<i64>> {
        let mut uow = self.db.begin("stock_replenish").await?;
        let result = Self::replenish_in(uow.conn(), replenishment).await;
        let ids = uow.finish(result).await?;

        info!(
            product = %replenishment.product_name,
            quantity = replenishment.quantity,
            "Stock added"
        );
        Ok(ids)
    }

    /// Units available for one (product, price tier).
    pub async fn available(&self, product_name: &str, price: Money) -> LedgerResult<i64> {
        Ok(sum_available(self.db.pool(), product_name, price).await?)
    }

    /// Every row ever held for `product_name`, FIFO order, exhausted rows
    /// included.
    pub async fn history(&self, product_name: &str) -> LedgerResult<Vec<StockUnit>> {
        let units = sqlx::query_as::<_, StockUnit>(
            r#"
            SELECT id, product_name, per_unit_price_cents, quantity, total_amount_cents,
                   purchase_date, expiry_date, batch_id
            FROM stock_units
            WHERE product_name = ?1
            ORDER BY id
            "#,
        )
        .bind(product_name)
        .fetch_all(self.db.pool())
        .await?;

        Ok(units)
    }

    /// Available units per product and price tier (tiers with stock only).
    pub async fn levels(&self) -> LedgerResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT product_name, per_unit_price_cents, SUM(quantity) AS available
            FROM stock_units
            GROUP BY product_name, per_unit_price_cents
            HAVING SUM(quantity) > 0
            ORDER BY product_name, per_unit_price_cents
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(levels)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn sum_available<'e, E>(executor: E, product_name: &str, price: Money) -> DbResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let available: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(quantity), 0)
        FROM stock_units
        WHERE product_name = ?1 AND per_unit_price_cents = ?2
        "#,
    )
    .bind(product_name)
    .bind(price.cents())
    .fetch_one(executor)
    .await?;

    Ok(available)
}

async fn apply_draws(conn: &mut SqliteConnection, price: Money, draws: &[LotDraw]) -> DbResult<()> {
    for draw in draws {
        sqlx::query(
            r#"
            UPDATE stock_units
            SET quantity = ?1, total_amount_cents = ?2
            WHERE id = ?3
            "#,
        )
        .bind(draw.remaining_after)
        .bind(price.multiply_quantity(draw.remaining_after).cents())
        .bind(draw.unit_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
