//! # Expense Workflow
//!
//! Shop expenses are plain outflows with a kind attached. Each expense row
//! keeps the id of the movement that paid it.
//!
//! Legacy rows came with one amount column per kind; they are decoded with
//! [`ExpenseEntry::from_columns`] and refused when more than one column is
//! non-zero.

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteConnection;
use tracing::info;

use shopkeep_core::expense::{Expense, ExpenseColumns, ExpenseEntry};
use shopkeep_core::validation::validate_description;
use shopkeep_core::{CashMovementDraft, MovementKind};

use crate::error::LedgerResult;
use crate::ledger::cash::CashLedger;
use crate::pool::Database;
use crate::repository::{new_id, ExpenseRepository};

#[derive(Debug, Clone)]
pub struct ExpenseWorkflow {
    db: Database,
}

impl ExpenseWorkflow {
    pub fn new(db: Database) -> Self {
        ExpenseWorkflow { db }
    }

    /// Pays an expense out of the shop balance.
    ///
    /// ## Errors
    /// - zero or negative amount → `ValidationFailed`
    /// - amount larger than the balance → `InsufficientBalance`
    pub async fn add_expense(&self, entry: ExpenseEntry, date: NaiveDate) -> LedgerResult<Expense> {
        entry.validate()?;
        validate_description(&entry.description)?;

        let mut uow = self.db.begin("add_expense").await?;
        let result = add_expense_in(uow.conn(), &entry, date).await;
        let expense = uow.finish(result).await?;

        info!(
            id = %expense.id,
            kind = expense.kind.as_str(),
            amount = %expense.amount(),
            "Expense added"
        );
        Ok(expense)
    }

    /// Imports one legacy multi-column expense row.
    pub async fn import_legacy_expense(
        &self,
        columns: &ExpenseColumns,
        date: NaiveDate,
        description: &str,
    ) -> LedgerResult<Expense> {
        let entry = ExpenseEntry::from_columns(columns, description)?;
        self.add_expense(entry, date).await
    }

    /// Deletes an expense and puts its amount back into the shop balance.
    pub async fn delete_expense(&self, id: &str) -> LedgerResult<()> {
        let mut uow = self.db.begin("delete_expense").await?;
        let result = delete_expense_in(uow.conn(), id).await;
        uow.finish(result).await?;

        info!(id, "Expense deleted");
        Ok(())
    }

    pub async fn list_expenses(&self) -> LedgerResult<Vec<Expense>> {
        Ok(ExpenseRepository::new(self.db.pool().clone()).list().await?)
    }
}

async fn add_expense_in(
    conn: &mut SqliteConnection,
    entry: &ExpenseEntry,
    date: NaiveDate,
) -> LedgerResult<Expense> {
    let movement = CashLedger::post_in(
        &mut *conn,
        &CashMovementDraft::new(
            -entry.amount,
            MovementKind::Expense,
            date,
            format!("{} expense", entry.kind.as_str()),
        ),
    )
    .await?;

    let expense = Expense {
        id: new_id(),
        kind: entry.kind,
        amount_cents: entry.amount.cents(),
        description: entry.description.clone(),
        expense_date: date,
        cash_movement_id: Some(movement.id),
        created_at: Utc::now(),
    };
    ExpenseRepository::insert_in(conn, &expense).await?;

    Ok(expense)
}

async fn delete_expense_in(conn: &mut SqliteConnection, id: &str) -> LedgerResult<()> {
    let expense = ExpenseRepository::find_in(&mut *conn, id).await?;

    CashLedger::post_in(
        &mut *conn,
        &CashMovementDraft::new(
            expense.amount(),
            MovementKind::ExpenseRefund,
            Utc::now().date_naive(),
            format!("Refund for deleted {} expense", expense.kind.as_str()),
        ),
    )
    .await?;
    ExpenseRepository::delete_in(conn, id).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::pool::DbConfig;
    use shopkeep_core::expense::ExpenseKind;
    use shopkeep_core::Money;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    async fn funded(rupees: i64) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.cash()
            .post(&CashMovementDraft::new(
                Money::from_rupees(rupees),
                MovementKind::Deposit,
                day(1),
                "opening",
            ))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_add_and_delete_expense() {
        let db = funded(5000).await;
        let expenses = db.expenses();

        let rent = ExpenseEntry::new(ExpenseKind::Rent, Money::from_rupees(3000), "April rent").unwrap();
        let expense = expenses.add_expense(rent, day(2)).await.unwrap();

        assert_eq!(db.cash().current_balance().await.unwrap(), Money::from_rupees(2000));
        let movement = db
            .cash()
            .get(expense.cash_movement_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(movement.amount(), Money::from_rupees(-3000));
        assert_eq!(movement.kind, MovementKind::Expense);

        expenses.delete_expense(&expense.id).await.unwrap();
        assert_eq!(db.cash().current_balance().await.unwrap(), Money::from_rupees(5000));
        assert!(expenses.list_expenses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expense_beyond_balance_rejected() {
        let db = funded(100).await;

        let salary = ExpenseEntry::new(ExpenseKind::Salary, Money::from_rupees(150), "").unwrap();
        let err = db.expenses().add_expense(salary, day(2)).await.unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert!(db.expenses().list_expenses().await.unwrap().is_empty());
        assert_eq!(db.cash().current_balance().await.unwrap(), Money::from_rupees(100));
    }

    #[tokio::test]
    async fn test_non_positive_literal_entry_rejected() {
        let db = funded(100).await;

        for cents in [0, -500] {
            let entry = ExpenseEntry {
                kind: ExpenseKind::Rent,
                amount: Money::from_cents(cents),
                description: String::new(),
            };
            assert!(matches!(
                db.expenses().add_expense(entry, day(2)).await,
                Err(LedgerError::ValidationFailed(_))
            ));
        }

        assert!(db.expenses().list_expenses().await.unwrap().is_empty());
        assert_eq!(db.cash().history().await.unwrap().len(), 1);
        assert_eq!(db.cash().current_balance().await.unwrap(), Money::from_rupees(100));
    }

    #[tokio::test]
    async fn test_import_legacy_expense() {
        let db = funded(1000).await;
        let expenses = db.expenses();

        let single = ExpenseColumns {
            light: Money::from_rupees(400),
            ..Default::default()
        };
        let expense = expenses
            .import_legacy_expense(&single, day(3), "March electricity")
            .await
            .unwrap();
        assert_eq!(expense.kind, ExpenseKind::Light);
        assert_eq!(expense.amount(), Money::from_rupees(400));

        let mixed = ExpenseColumns {
            water: Money::from_rupees(50),
            internet: Money::from_rupees(70),
            ..Default::default()
        };
        match expenses.import_legacy_expense(&mixed, day(3), "").await {
            Err(LedgerError::MultipleNonZeroAmounts { fields }) => {
                assert_eq!(fields, vec!["water".to_string(), "internet".to_string()]);
            }
            other => panic!("expected MultipleNonZeroAmounts, got {other:?}"),
        }

        assert_eq!(expenses.list_expenses().await.unwrap().len(), 1);
        assert_eq!(db.cash().current_balance().await.unwrap(), Money::from_rupees(600));
    }

    #[tokio::test]
    async fn test_delete_unknown_expense() {
        let db = funded(10).await;
        assert!(matches!(
            db.expenses().delete_expense("missing").await,
            Err(LedgerError::RecordNotFound { .. })
        ));
    }
}
