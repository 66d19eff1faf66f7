//! # Payment Event Repository
//!
//! `payment_events` rows, ordered by insertion (`rowid`). A parent is a
//! sale or a bill; there is no foreign key on `parent_id` since it points at
//! one of two tables.

use sqlx::sqlite::SqliteConnection;
use sqlx::{Executor, Sqlite};
use tracing::debug;

use shopkeep_core::{Money, PaymentEvent, PaymentParent};

use crate::error::{DbError, DbResult};

const EVENT_COLUMNS: &str = r#"
    id, parent_kind, parent_id, amount_paid_cents, paid_date, payment_mode,
    pending_amount_after_cents, cash_movement_id, created_at
"#;

/// Repository for payment event rows.
pub struct PaymentEventRepository;

impl PaymentEventRepository {
    /// Events of one parent in the order they happened.
    pub async fn list_for_parent<'e, E>(executor: E, parent: &PaymentParent) -> DbResult<Vec<PaymentEvent>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let events = sqlx::query_as::<_, PaymentEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM payment_events \
             WHERE parent_kind = ?1 AND parent_id = ?2 ORDER BY rowid"
        ))
        .bind(parent.kind())
        .bind(parent.id())
        .fetch_all(executor)
        .await?;

        Ok(events)
    }

    /// Σ amount over a parent's events (refunds count negative).
    pub async fn sum_for_parent<'e, E>(executor: E, parent: &PaymentParent) -> DbResult<Money>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let cents: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_paid_cents), 0)
            FROM payment_events
            WHERE parent_kind = ?1 AND parent_id = ?2
            "#,
        )
        .bind(parent.kind())
        .bind(parent.id())
        .fetch_one(executor)
        .await?;

        Ok(Money::from_cents(cents))
    }

    pub async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<PaymentEvent> {
        sqlx::query_as::<_, PaymentEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM payment_events WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Payment", id))
    }

    pub async fn insert_in(conn: &mut SqliteConnection, event: &PaymentEvent) -> DbResult<()> {
        debug!(
            id = %event.id,
            parent_id = %event.parent_id,
            amount = event.amount_paid_cents,
            "Inserting payment event"
        );

        sqlx::query(
            r#"
            INSERT INTO payment_events (
                id, parent_kind, parent_id, amount_paid_cents, paid_date, payment_mode,
                pending_amount_after_cents, cash_movement_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&event.id)
        .bind(event.parent_kind)
        .bind(&event.parent_id)
        .bind(event.amount_paid_cents)
        .bind(event.paid_date)
        .bind(event.payment_mode)
        .bind(event.pending_amount_after_cents)
        .bind(&event.cash_movement_id)
        .bind(event.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Rewrites amount, date and pending snapshot of one event.
    pub async fn update_in(conn: &mut SqliteConnection, event: &PaymentEvent) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_events SET
                amount_paid_cents = ?2, paid_date = ?3, pending_amount_after_cents = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&event.id)
        .bind(event.amount_paid_cents)
        .bind(event.paid_date)
        .bind(event.pending_amount_after_cents)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Adds `delta` to the pending snapshot of every event of the same parent
    /// recorded after `event`.
    pub async fn shift_later_pending_in(
        conn: &mut SqliteConnection,
        event: &PaymentEvent,
        delta: Money,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payment_events
            SET pending_amount_after_cents = pending_amount_after_cents + ?1
            WHERE parent_kind = ?2
              AND parent_id = ?3
              AND rowid > (SELECT rowid FROM payment_events WHERE id = ?4)
            "#,
        )
        .bind(delta.cents())
        .bind(event.parent_kind)
        .bind(&event.parent_id)
        .bind(&event.id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_for_parent_in(conn: &mut SqliteConnection, parent: &PaymentParent) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM payment_events WHERE parent_kind = ?1 AND parent_id = ?2")
            .bind(parent.kind())
            .bind(parent.id())
            .execute(conn)
            .await?;

        debug!(parent_id = parent.id(), deleted = result.rows_affected(), "Payment events deleted");
        Ok(result.rows_affected())
    }
}
