//! # Shop Expenses
//!
//! Running costs (rent, electricity, salaries, ...) paid out of the shop
//! balance.
//!
//! ## One Kind Per Entry
//! ```text
//! Legacy row shape (one column per kind, "only one should be set"):
//! ┌──────┬───────┬─────────────┬────────┬───────┬──────────┬───────┐
//! │ rent │ light │ maintenance │ salary │ water │ internet │ other │
//! ├──────┼───────┼─────────────┼────────┼───────┼──────────┼───────┤
//! │ 5000 │   0   │      0      │   0    │   0   │    0     │   0   │  ✓
//! │ 5000 │  800  │      0      │   0    │   0   │    0     │   0   │  ✗ ambiguous
//! └──────┴───────┴─────────────┴────────┴───────┴──────────┴───────┘
//!
//! Here: ExpenseEntry { kind: Rent, amount: ₹5000, description }
//! ```
//! The ambiguous case cannot be expressed as an [`ExpenseEntry`]; it can only
//! be met when decoding [`ExpenseColumns`], which refuses it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    Rent,
    /// Electricity bill.
    Light,
    Maintenance,
    Salary,
    Water,
    Internet,
    Other,
}

impl ExpenseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseKind::Rent => "rent",
            ExpenseKind::Light => "light",
            ExpenseKind::Maintenance => "maintenance",
            ExpenseKind::Salary => "salary",
            ExpenseKind::Water => "water",
            ExpenseKind::Internet => "internet",
            ExpenseKind::Other => "other",
        }
    }
}

/// A single expense: exactly one kind and one amount.
///
/// Entries built by hand or deserialized skip [`ExpenseEntry::new`]; the
/// expense workflow calls [`ExpenseEntry::validate`] again before posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExpenseEntry {
    pub kind: ExpenseKind,
    pub amount: Money,
    pub description: String,
}

impl ExpenseEntry {
    pub fn new(kind: ExpenseKind, amount: Money, description: impl Into<String>) -> CoreResult<Self> {
        let entry = ExpenseEntry {
            kind,
            amount,
            description: description.into(),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// The amount must be positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: format!("{} amount", self.kind.as_str()),
            });
        }
        Ok(())
    }

    /// Decodes a legacy multi-column expense row.
    ///
    /// ## Errors
    /// - more than one non-zero column → `MultipleNonZeroAmounts`
    /// - every column zero → `Required`
    pub fn from_columns(columns: &ExpenseColumns, description: impl Into<String>) -> CoreResult<Self> {
        let non_zero: Vec<(ExpenseKind, Money)> = columns
            .entries()
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .collect();

        match non_zero.as_slice() {
            [] => Err(ValidationError::Required {
                field: "expense amount".to_string(),
            }
            .into()),
            [(kind, amount)] => ExpenseEntry::new(*kind, *amount, description),
            many => Err(CoreError::MultipleNonZeroAmounts {
                fields: many.iter().map(|(k, _)| k.as_str().to_string()).collect(),
            }),
        }
    }
}

/// The legacy bill-expense row: one nullable amount per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExpenseColumns {
    pub rent: Money,
    pub light: Money,
    pub maintenance: Money,
    pub salary: Money,
    pub water: Money,
    pub internet: Money,
    pub other: Money,
}

impl ExpenseColumns {
    fn entries(&self) -> [(ExpenseKind, Money); 7] {
        [
            (ExpenseKind::Rent, self.rent),
            (ExpenseKind::Light, self.light),
            (ExpenseKind::Maintenance, self.maintenance),
            (ExpenseKind::Salary, self.salary),
            (ExpenseKind::Water, self.water),
            (ExpenseKind::Internet, self.internet),
            (ExpenseKind::Other, self.other),
        ]
    }
}

/// A persisted expense and the cash movement that paid it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub kind: ExpenseKind,
    pub amount_cents: i64,
    pub description: String,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    pub cash_movement_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Expense {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_column_decodes() {
        let columns = ExpenseColumns {
            light: Money::from_rupees(800),
            ..Default::default()
        };
        let entry = ExpenseEntry::from_columns(&columns, "March electricity").unwrap();
        assert_eq!(entry.kind, ExpenseKind::Light);
        assert_eq!(entry.amount, Money::from_rupees(800));
    }

    #[test]
    fn test_multiple_columns_rejected() {
        let columns = ExpenseColumns {
            rent: Money::from_rupees(5000),
            salary: Money::from_rupees(12000),
            ..Default::default()
        };
        match ExpenseEntry::from_columns(&columns, "") {
            Err(CoreError::MultipleNonZeroAmounts { fields }) => {
                assert_eq!(fields, vec!["rent".to_string(), "salary".to_string()]);
            }
            other => panic!("expected MultipleNonZeroAmounts, got {other:?}"),
        }
    }

    #[test]
    fn test_all_zero_rejected() {
        let err = ExpenseEntry::from_columns(&ExpenseColumns::default(), "").unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Required { .. })));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        assert!(ExpenseEntry::new(ExpenseKind::Rent, Money::zero(), "").is_err());
        assert!(ExpenseEntry::new(ExpenseKind::Rent, Money::from_cents(-1), "").is_err());

        let literal = ExpenseEntry {
            kind: ExpenseKind::Water,
            amount: Money::zero(),
            description: String::new(),
        };
        assert!(matches!(literal.validate(), Err(ValidationError::MustBePositive { .. })));
    }
}
