//! # Bill Repository
//!
//! Wholesalers, the bills they issue and the product batches on each bill.
//!
//! ```text
//! wholesalers ──1:N──► wholesaler_bills ──1:N──► product_batches
//!                                                      │
//!                                 stock_units.batch_id ┘ (SET NULL on delete)
//! ```

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use shopkeep_core::billing::Settlement;
use shopkeep_core::{Money, ProductBatch, Wholesaler, WholesalerBill};

use crate::error::{DbError, DbResult};

const BILL_COLUMNS: &str = r#"
    id, wholesaler_id, bill_date, shipping_charges_cents, bill_amount_cents,
    amount_paid_cents, pending_amount_cents, status, created_at, updated_at
"#;

const BATCH_COLUMNS: &str = r#"
    id, bill_id, product_name, ordered_quantity, per_unit_price_cents,
    expiry_date, total_cents, created_at
"#;

/// Repository for wholesaler, bill and batch rows.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    // =========================================================================
    // Wholesalers
    // =========================================================================

    pub async fn list_wholesalers(&self) -> DbResult<Vec<Wholesaler>> {
        let wholesalers = sqlx::query_as::<_, Wholesaler>(
            "SELECT id, name, mobile, address, created_at FROM wholesalers ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(wholesalers)
    }

    pub async fn insert_wholesaler_in(
        conn: &mut SqliteConnection,
        wholesaler: &Wholesaler,
    ) -> DbResult<()> {
        debug!(id = %wholesaler.id, name = %wholesaler.name, "Inserting wholesaler");

        sqlx::query(
            r#"
            INSERT INTO wholesalers (id, name, mobile, address, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&wholesaler.id)
        .bind(&wholesaler.name)
        .bind(&wholesaler.mobile)
        .bind(&wholesaler.address)
        .bind(wholesaler.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn find_wholesaler_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Wholesaler> {
        sqlx::query_as::<_, Wholesaler>(
            "SELECT id, name, mobile, address, created_at FROM wholesalers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Wholesaler", id))
    }

    // =========================================================================
    // Bills
    // =========================================================================

    pub async fn get_bill(&self, id: &str) -> DbResult<Option<WholesalerBill>> {
        fetch_bill(&self.pool, id).await
    }

    /// Bills newest first, optionally for one wholesaler.
    pub async fn list_bills(&self, wholesaler_id: Option<&str>) -> DbResult<Vec<WholesalerBill>> {
        let bills = sqlx::query_as::<_, WholesalerBill>(&format!(
            "SELECT {BILL_COLUMNS} FROM wholesaler_bills \
             WHERE ?1 IS NULL OR wholesaler_id = ?1 \
             ORDER BY bill_date DESC, created_at DESC"
        ))
        .bind(wholesaler_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bills)
    }

    pub async fn find_bill_in(conn: &mut SqliteConnection, id: &str) -> DbResult<WholesalerBill> {
        fetch_bill(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Bill", id))
    }

    pub async fn insert_bill_in(conn: &mut SqliteConnection, bill: &WholesalerBill) -> DbResult<()> {
        debug!(id = %bill.id, wholesaler_id = %bill.wholesaler_id, "Inserting bill");

        sqlx::query(
            r#"
            INSERT INTO wholesaler_bills (
                id, wholesaler_id, bill_date, shipping_charges_cents, bill_amount_cents,
                amount_paid_cents, pending_amount_cents, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&bill.id)
        .bind(&bill.wholesaler_id)
        .bind(bill.bill_date)
        .bind(bill.shipping_charges_cents)
        .bind(bill.bill_amount_cents)
        .bind(bill.amount_paid_cents)
        .bind(bill.pending_amount_cents)
        .bind(bill.status)
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Rewrites the header and settlement of an existing bill.
    pub async fn update_bill_in(conn: &mut SqliteConnection, bill: &WholesalerBill) -> DbResult<()> {
        debug!(id = %bill.id, "Updating bill");

        let result = sqlx::query(
            r#"
            UPDATE wholesaler_bills SET
                bill_date = ?2, shipping_charges_cents = ?3, bill_amount_cents = ?4,
                amount_paid_cents = ?5, pending_amount_cents = ?6, status = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&bill.id)
        .bind(bill.bill_date)
        .bind(bill.shipping_charges_cents)
        .bind(bill.bill_amount_cents)
        .bind(bill.amount_paid_cents)
        .bind(bill.pending_amount_cents)
        .bind(bill.status)
        .bind(bill.updated_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Bill", &bill.id));
        }
        Ok(())
    }

    /// Stores a new bill amount together with the resulting paid / pending split.
    pub async fn update_bill_settlement_in(
        conn: &mut SqliteConnection,
        id: &str,
        settlement: &Settlement,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE wholesaler_bills SET
                bill_amount_cents = ?2, amount_paid_cents = ?3,
                pending_amount_cents = ?4, status = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(settlement.total.cents())
        .bind(settlement.amount_paid.cents())
        .bind(settlement.pending.cents())
        .bind(settlement.status)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Bill", id));
        }
        Ok(())
    }

    pub async fn delete_bill_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id, "Deleting bill");

        sqlx::query("DELETE FROM wholesaler_bills WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Product Batches
    // =========================================================================

    /// Batches of one bill in the order they were added.
    pub async fn batches(&self, bill_id: &str) -> DbResult<Vec<ProductBatch>> {
        fetch_batches(&self.pool, bill_id).await
    }

    pub async fn batches_in(conn: &mut SqliteConnection, bill_id: &str) -> DbResult<Vec<ProductBatch>> {
        fetch_batches(conn, bill_id).await
    }

    pub async fn find_batch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<ProductBatch> {
        sqlx::query_as::<_, ProductBatch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM product_batches WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product batch", id))
    }

    /// Batch totals of a bill, in insertion order. Summed by the caller with
    /// overflow checks.
    pub async fn batch_totals_in(conn: &mut SqliteConnection, bill_id: &str) -> DbResult<Vec<Money>> {
        let totals: Vec<i64> = sqlx::query_scalar(
            "SELECT total_cents FROM product_batches WHERE bill_id = ?1 ORDER BY rowid",
        )
        .bind(bill_id)
        .fetch_all(conn)
        .await?;

        Ok(totals.into_iter().map(Money::from_cents).collect())
    }

    pub async fn insert_batch_in(conn: &mut SqliteConnection, batch: &ProductBatch) -> DbResult<()> {
        debug!(id = %batch.id, bill_id = ?batch.bill_id, product = %batch.product_name, "Inserting batch");

        sqlx::query(
            r#"
            INSERT INTO product_batches (
                id, bill_id, product_name, ordered_quantity, per_unit_price_cents,
                expiry_date, total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.bill_id)
        .bind(&batch.product_name)
        .bind(batch.ordered_quantity)
        .bind(batch.per_unit_price_cents)
        .bind(batch.expiry_date)
        .bind(batch.total_cents)
        .bind(batch.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn update_batch_in(conn: &mut SqliteConnection, batch: &ProductBatch) -> DbResult<()> {
        debug!(id = %batch.id, "Updating batch");

        sqlx::query(
            r#"
            UPDATE product_batches SET
                product_name = ?2, ordered_quantity = ?3, per_unit_price_cents = ?4,
                expiry_date = ?5, total_cents = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.product_name)
        .bind(batch.ordered_quantity)
        .bind(batch.per_unit_price_cents)
        .bind(batch.expiry_date)
        .bind(batch.total_cents)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn delete_batch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id, "Deleting batch");

        sqlx::query("DELETE FROM product_batches WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

async fn fetch_bill<'e, E>(executor: E, id: &str) -> DbResult<Option<WholesalerBill>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let bill = sqlx::query_as::<_, WholesalerBill>(&format!(
        "SELECT {BILL_COLUMNS} FROM wholesaler_bills WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(bill)
}

async fn fetch_batches<'e, E>(executor: E, bill_id: &str) -> DbResult<Vec<ProductBatch>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let batches = sqlx::query_as::<_, ProductBatch>(&format!(
        "SELECT {BATCH_COLUMNS} FROM product_batches WHERE bill_id = ?1 ORDER BY rowid"
    ))
    .bind(bill_id)
    .fetch_all(executor)
    .await?;

    Ok(batches)
}
