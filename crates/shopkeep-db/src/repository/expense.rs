//! # Expense Repository

use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use shopkeep_core::expense::Expense;

use crate::error::{DbError, DbResult};

const EXPENSE_COLUMNS: &str =
    "id, kind, amount_cents, description, expense_date, cash_movement_id, created_at";

#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Expenses newest first.
    pub async fn list(&self) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses ORDER BY expense_date DESC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    pub async fn find_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Expense> {
        sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Expense", id))
    }

    pub async fn insert_in(conn: &mut SqliteConnection, expense: &Expense) -> DbResult<()> {
        debug!(id = %expense.id, kind = expense.kind.as_str(), "Inserting expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, kind, amount_cents, description, expense_date, cash_movement_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&expense.id)
        .bind(expense.kind)
        .bind(expense.amount_cents)
        .bind(&expense.description)
        .bind(expense.expense_date)
        .bind(&expense.cash_movement_id)
        .bind(expense.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id, "Deleting expense");

        sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
