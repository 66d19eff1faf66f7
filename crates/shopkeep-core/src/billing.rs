//! # Billing Calculations
//!
//! Totals for sales and wholesaler bills, and the paid/pending split both
//! share.
//!
//! ## Sale Math
//! ```text
//! selling price × quantity           = total amount
//! total amount − discount            = final bill
//! final bill − amount paid           = pending amount   (must be ≥ 0)
//! amount paid − buying price × qty   = net profit       (may be negative)
//! ```
//!
//! ## Bill Math
//! ```text
//! Σ (batch qty × batch price) + shipping = bill amount
//! bill amount − Σ payments              = pending amount (must be ≥ 0)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{DiscountRate, PaymentStatus};

// =============================================================================
// Settlement
// =============================================================================

/// How much of a total is paid and how much is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub total: Money,
    pub amount_paid: Money,
    pub pending: Money,
    pub status: PaymentStatus,
}

impl Settlement {
    /// Splits `total` into paid and pending.
    ///
    /// ## Errors
    /// - `amount_paid` negative → `OutOfRange`
    /// - `amount_paid > total` → `ExceedsLimit` (pending would go negative)
    pub fn compute(total: Money, amount_paid: Money) -> CoreResult<Self> {
        if amount_paid.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "amount paid".to_string(),
                min: 0,
                max: total.cents(),
            }
            .into());
        }

        if amount_paid > total {
            return Err(ValidationError::exceeds("amount paid", amount_paid, total).into());
        }

        let pending = total - amount_paid;
        Ok(Settlement {
            total,
            amount_paid,
            pending,
            status: PaymentStatus::from_pending(pending),
        })
    }

    /// Settlement after an extra `delta` is paid (negative = refunded).
    pub fn apply(&self, delta: Money) -> CoreResult<Self> {
        Settlement::compute(self.total, self.amount_paid + delta)
    }
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Every derived money field of a sale record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub total_amount: Money,
    pub final_bill: Money,
    pub net_profit: Money,
    pub settlement: Settlement,
}

impl SaleTotals {
    pub fn compute(
        selling_price: Money,
        quantity: i64,
        discount: DiscountRate,
        buying_price: Money,
        amount_paid: Money,
    ) -> CoreResult<Self> {
        let total_amount = selling_price
            .checked_multiply_quantity(quantity)
            .ok_or_else(|| ValidationError::too_large("sale total"))?;
        let final_bill = total_amount.apply_discount(discount);
        let settlement = Settlement::compute(final_bill, amount_paid)?;

        Ok(SaleTotals {
            total_amount,
            final_bill,
            net_profit: net_profit(amount_paid, buying_price, quantity)?,
            settlement,
        })
    }
}

/// Profit realised so far on a sale: what was collected minus cost.
pub fn net_profit(amount_paid: Money, buying_price: Money, quantity: i64) -> CoreResult<Money> {
    let cost = buying_price
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| ValidationError::too_large("sale cost"))?;
    Ok(amount_paid - cost)
}

// =============================================================================
// Bill Totals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillTotals {
    pub batches_total: Money,
    pub shipping_charges: Money,
    pub bill_amount: Money,
    pub settlement: Settlement,
}

impl BillTotals {
    pub fn compute<I>(batch_totals: I, shipping_charges: Money, amount_paid: Money) -> CoreResult<Self>
    where
        I: IntoIterator<Item = Money>,
    {
        let batches_total = batch_totals
            .into_iter()
            .try_fold(Money::zero(), |acc, total| acc.checked_add(total))
            .ok_or_else(|| ValidationError::too_large("bill amount"))?;
        let bill_amount = batches_total
            .checked_add(shipping_charges)
            .ok_or_else(|| ValidationError::too_large("bill amount"))?;
        let settlement = Settlement::compute(bill_amount, amount_paid)?;

        Ok(BillTotals {
            batches_total,
            shipping_charges,
            bill_amount,
            settlement,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
