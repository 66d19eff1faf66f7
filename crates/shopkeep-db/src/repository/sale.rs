//! # Sale Repository
//!
//! Rows of `sale_records`: one product line sold to a customer or a gym
//! client.
//!
//! ## Cached Settlement Fields
//! ```text
//! sale_records                         payment_events (source of truth)
//! ┌───────────────────────────┐        ┌──────────────────────────────┐
//! │ final_bill_cents    1000  │        │ +400  pending after 600      │
//! │ amount_paid_cents    700  │ ◄─SUM──│ +300  pending after 300      │
//! │ pending_amount_cents 300  │        └──────────────────────────────┘
//! │ status           pending  │
//! │ net_profit_cents  (paid − buying × qty)                            │
//! └───────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use shopkeep_core::billing::Settlement;
use shopkeep_core::{SaleChannel, SaleRecord};

use crate::error::{DbError, DbResult};

const SALE_COLUMNS: &str = r#"
    id, channel, party_name, mobile, product_name, quantity,
    buying_price_cents, selling_price_cents, total_amount_cents, discount_bps,
    final_bill_cents, net_profit_cents, payment_mode, sale_date,
    amount_paid_cents, pending_amount_cents, status, created_at, updated_at
"#;

/// Repository for sale rows.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleRecord>> {
        fetch_sale(&self.pool, id).await
    }

    /// Sales newest first, optionally restricted to one channel.
    pub async fn list(&self, channel: Option<SaleChannel>) -> DbResult<Vec<SaleRecord>> {
        let sales = match channel {
            Some(channel) => {
                sqlx::query_as::<_, SaleRecord>(&format!(
                    "SELECT {SALE_COLUMNS} FROM sale_records WHERE channel = ?1 \
                     ORDER BY sale_date DESC, created_at DESC"
                ))
                .bind(channel)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SaleRecord>(&format!(
                    "SELECT {SALE_COLUMNS} FROM sale_records \
                     ORDER BY sale_date DESC, created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(sales)
    }

    // -------------------------------------------------------------------------
    // Unit-of-work functions
    // -------------------------------------------------------------------------

    /// Loads a sale or fails with `NotFound`.
    pub async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<SaleRecord> {
        fetch_sale(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    pub async fn insert_in(conn: &mut SqliteConnection, sale: &SaleRecord) -> DbResult<()> {
        debug!(id = %sale.id, product = %sale.product_name, quantity = sale.quantity, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sale_records (
                id, channel, party_name, mobile, product_name, quantity,
                buying_price_cents, selling_price_cents, total_amount_cents, discount_bps,
                final_bill_cents, net_profit_cents, payment_mode, sale_date,
                amount_paid_cents, pending_amount_cents, status, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19
            )
            "#,
        )
        .bind(&sale.id)
        .bind(sale.channel)
        .bind(&sale.party_name)
        .bind(&sale.mobile)
        .bind(&sale.product_name)
        .bind(sale.quantity)
        .bind(sale.buying_price_cents)
        .bind(sale.selling_price_cents)
        .bind(sale.total_amount_cents)
        .bind(sale.discount_bps)
        .bind(sale.final_bill_cents)
        .bind(sale.net_profit_cents)
        .bind(sale.payment_mode)
        .bind(sale.sale_date)
        .bind(sale.amount_paid_cents)
        .bind(sale.pending_amount_cents)
        .bind(sale.status)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Rewrites every editable column of an existing sale.
    pub async fn update_in(conn: &mut SqliteConnection, sale: &SaleRecord) -> DbResult<()> {
        debug!(id = %sale.id, "Updating sale");

        let result = sqlx::query(
            r#"
            UPDATE sale_records SET
                channel = ?2, party_name = ?3, mobile = ?4, product_name = ?5, quantity = ?6,
                buying_price_cents = ?7, selling_price_cents = ?8, total_amount_cents = ?9,
                discount_bps = ?10, final_bill_cents = ?11, net_profit_cents = ?12,
                payment_mode = ?13, sale_date = ?14, amount_paid_cents = ?15,
                pending_amount_cents = ?16, status = ?17, updated_at = ?18
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(sale.channel)
        .bind(&sale.party_name)
        .bind(&sale.mobile)
        .bind(&sale.product_name)
        .bind(sale.quantity)
        .bind(sale.buying_price_cents)
        .bind(sale.selling_price_cents)
        .bind(sale.total_amount_cents)
        .bind(sale.discount_bps)
        .bind(sale.final_bill_cents)
        .bind(sale.net_profit_cents)
        .bind(sale.payment_mode)
        .bind(sale.sale_date)
        .bind(sale.amount_paid_cents)
        .bind(sale.pending_amount_cents)
        .bind(sale.status)
        .bind(sale.updated_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", &sale.id));
        }
        Ok(())
    }

    /// Stores a new paid / pending split and the profit that follows from it.
    pub async fn update_settlement_in(
        conn: &mut SqliteConnection,
        id: &str,
        settlement: &Settlement,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sale_records SET
                amount_paid_cents = ?2,
                pending_amount_cents = ?3,
                status = ?4,
                net_profit_cents = ?2 - buying_price_cents * quantity,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(settlement.amount_paid.cents())
        .bind(settlement.pending.cents())
        .bind(settlement.status)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }
        Ok(())
    }

    pub async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id, "Deleting sale");

        sqlx::query("DELETE FROM sale_records WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

async fn fetch_sale<'e, E>(executor: E, id: &str) -> DbResult<Option<SaleRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sale = sqlx::query_as::<_, SaleRecord>(&format!(
        "SELECT {SALE_COLUMNS} FROM sale_records WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(sale)
}
