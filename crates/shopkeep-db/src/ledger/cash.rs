//! # Cash Ledger
//!
//! The shop's cash position as an append-only list of signed movements.
//!
//! ## Balance Is Derived
//! ```text
//! cash_movements                          shop_balance (view)
//! ┌──────────────┬─────────┐
//! │ deposit      │ +5000   │
//! │ sale_payment │  +675   │  ── SUM ──►  ₹4,425
//! │ bill_payment │ -1250   │
//! └──────────────┴─────────┘
//! ```
//!
//! ## Non-Negative Invariant
//! A debit re-reads the balance on the unit-of-work connection and is
//! refused if it would take the balance below zero. Because every unit of
//! work holds the database write lock, no other debit can slip in between
//! the check and the insert.
//!
//! ## Corrections
//! - [`CashLedger::reverse`] posts the negation as a new row (audit trail
//!   kept). A movement can be reversed once.
//! - [`CashLedger::correct_in_place`] rewrites a movement's amount and date.
//!   It exists for data-entry fixes only; payment edits use it so the
//!   payment and its movement stay one-to-one.

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Executor, Sqlite};
use tracing::{debug, info};
use uuid::Uuid;

use shopkeep_core::validation::validate_description;
use shopkeep_core::{CashMovement, CashMovementDraft, Money, MovementKind, ValidationError};

use crate::error::{DbError, DbResult, LedgerError, LedgerResult};
use crate::pool::Database;

const MOVEMENT_COLUMNS: &str =
    "id, amount_cents, kind, movement_date, description, reverses_id, created_at";

/// Handle to the cash ledger.
#[derive(Debug, Clone)]
pub struct CashLedger {
    db: Database,
}

impl CashLedger {
    pub fn new(db: Database) -> Self {
        CashLedger { db }
    }

    // -------------------------------------------------------------------------
    // Unit-of-work operations
    // -------------------------------------------------------------------------

    pub async fn balance_in(conn: &mut SqliteConnection) -> LedgerResult<Money> {
        Ok(read_balance(conn).await?)
    }

    /// Appends a movement.
    ///
    /// ## Errors
    /// - zero amount → `ValidationFailed`
    /// - debit larger than the balance → `InsufficientBalance`
    pub async fn post_in(
        conn: &mut SqliteConnection,
        draft: &CashMovementDraft,
    ) -> LedgerResult<CashMovement> {
        insert_movement(conn, draft, None).await
    }

    /// Posts the negation of `movement_id`.
    pub async fn reverse_in(
        conn: &mut SqliteConnection,
        movement_id: &str,
        date: NaiveDate,
        description: &str,
    ) -> LedgerResult<CashMovement> {
        let original = find_movement(&mut *conn, movement_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Cash movement", movement_id))?;

        let already: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cash_movements WHERE reverses_id = ?1")
                .bind(movement_id)
                .fetch_one(&mut *conn)
                .await?;
        if already > 0 {
            return Err(ValidationError::invalid_state(
                "cash movement",
                format!("{} has already been reversed", movement_id),
            )
            .into());
        }

        let draft = CashMovementDraft::new(
            -original.amount(),
            MovementKind::Reversal,
            date,
            description,
        );
        insert_movement(conn, &draft, Some(movement_id)).await
    }

    /// Rewrites the amount and date of an existing movement.
    ///
    /// The non-negative balance check applies to the corrected ledger.
    pub async fn correct_in(
        conn: &mut SqliteConnection,
        movement_id: &str,
        new_amount: Money,
        new_date: NaiveDate,
    ) -> LedgerResult<CashMovement> {
        if new_amount.is_zero() {
            return Err(ValidationError::MustBeNonZero {
                field: "cash movement amount".to_string(),
            }
            .into());
        }

        let mut movement = find_movement(&mut *conn, movement_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Cash movement", movement_id))?;

        let change = new_amount
            .checked_add(-movement.amount())
            .ok_or_else(|| ValidationError::too_large("cash movement amount"))?;
        check_balance_after(&mut *conn, change).await?;

        sqlx::query(
            r#"
            UPDATE cash_movements
            SET amount_cents = ?1, movement_date = ?2
            WHERE id = ?3
            "#,
        )
        .bind(new_amount.cents())
        .bind(new_date)
        .bind(movement_id)
        .execute(&mut *conn)
        .await?;

        debug!(
            id = movement_id,
            old = %movement.amount(),
            new = %new_amount,
            "Cash movement corrected in place"
        );

        movement.amount_cents = new_amount.cents();
        movement.movement_date = new_date;
        Ok(movement)
    }

    // -------------------------------------------------------------------------
    // Standalone operations
    // -------------------------------------------------------------------------

    /// `SUM(amount)` over every movement; zero for an empty ledger.
    pub async fn current_balance(&self) -> LedgerResult<Money> {
        Ok(read_balance(self.db.pool()).await?)
    }

    pub async fn post(&self, draft: &CashMovementDraft) -> LedgerResult<CashMovement> {
        let mut uow = self.db.begin("cash_post").await?;
        let result = Self::post_in(uow.conn(), draft).await;
        let movement = uow.finish(result).await?;

        info!(
            id = %movement.id,
            amount = %movement.amount(),
            kind = ?movement.kind,
            "Cash movement posted"
        );
        Ok(movement)
    }

    pub async fn reverse(
        &self,
        movement_id: &str,
        date: NaiveDate,
        description: &str,
    ) -> LedgerResult<CashMovement> {
        let mut uow = self.db.begin("cash_reverse").await?;
        let result = Self::reverse_in(uow.conn(), movement_id, date, description).await;
        let movement = uow.finish(result).await?;

        info!(id = %movement.id, reverses = movement_id, "Cash movement reversed");
        Ok(movement)
    }

    /// Data-entry fix: changes a movement's amount and date in place.
    pub async fn correct_in_place(
        &self,
        movement_id: &str,
        new_amount: Money,
        new_date: NaiveDate,
    ) -> LedgerResult<CashMovement> {
        let mut uow = self.db.begin("cash_correct").await?;
        let result = Self::correct_in(uow.conn(), movement_id, new_amount, new_date).await;
        uow.finish(result).await
    }

    pub async fn get(&self, movement_id: &str) -> LedgerResult<CashMovement> {
        find_movement(self.db.pool(), movement_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Cash movement", movement_id))
    }

    /// Every movement in ledger order.
    pub async fn history(&self) -> LedgerResult<Vec<CashMovement>> {
        let movements = sqlx::query_as::<_, CashMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM cash_movements ORDER BY rowid"
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(movements)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn read_balance<'e, E>(executor: E) -> DbResult<Money>
where
    E: Executor<'e, Database = Sqlite>,
{
    let cents: i64 = sqlx::query_scalar("SELECT balance_cents FROM shop_balance")
        .fetch_one(executor)
        .await?;
    Ok(Money::from_cents(cents))
}

async fn find_movement<'e, E>(executor: E, movement_id: &str) -> DbResult<Option<CashMovement>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let movement = sqlx::query_as::<_, CashMovement>(&format!(
        "SELECT {MOVEMENT_COLUMNS} FROM cash_movements WHERE id = ?1"
    ))
    .bind(movement_id)
    .fetch_optional(executor)
    .await?;

    Ok(movement)
}

/// The balance must stay non-negative and within the money range.
async fn check_balance_after(conn: &mut SqliteConnection, change: Money) -> LedgerResult<()> {
    let balance = read_balance(conn).await?;
    match balance.checked_add(change) {
        Some(after) if after.is_negative() => Err(LedgerError::InsufficientBalance {
            balance,
            requested: change.abs(),
        }),
        Some(_) => Ok(()),
        None => Err(ValidationError::too_large("shop balance").into()),
    }
}

async fn insert_movement(
    conn: &mut SqliteConnection,
    draft: &CashMovementDraft,
    reverses_id: Option<&str>,
) -> LedgerResult<CashMovement> {
    if draft.amount.is_zero() {
        return Err(ValidationError::MustBeNonZero {
            field: "cash movement amount".to_string(),
        }
        .into());
    }
    validate_description(&draft.description)?;

    check_balance_after(&mut *conn, draft.amount).await?;

    let movement = CashMovement {
        id: Uuid::new_v4().to_string(),
        amount_cents: draft.amount.cents(),
        kind: draft.kind,
        movement_date: draft.date,
        description: draft.description.clone(),
        reverses_id: reverses_id.map(str::to_string),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO cash_movements (
            id, amount_cents, kind, movement_date, description, reverses_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&movement.id)
    .bind(movement.amount_cents)
    .bind(movement.kind)
    .bind(movement.movement_date)
    .bind(&movement.description)
    .bind(&movement.reverses_id)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await
    .map_err(DbError::from)?;

    debug!(
        id = %movement.id,
        amount = %draft.amount,
        kind = ?draft.kind,
        "Cash movement inserted"
    );

    Ok(movement)
}

// =============================================================================
// Unit Tests
// =============================================================================
