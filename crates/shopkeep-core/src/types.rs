//! # Domain Types
//!
//! Persisted entities and workflow inputs used throughout Shopkeep.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Wholesaler ──1:N──► WholesalerBill ──1:N──► ProductBatch              │
//! │                            │                      │                     │
//! │                            │                      └──1:N──► StockUnit   │
//! │                            │                                  ▲         │
//! │                            ▼                                  │         │
//! │                      PaymentEvent ◄──1:N── SaleRecord ── allocates     │
//! │                            │                                            │
//! │                            └──1:1──► CashMovement ──SUM──► balance     │
//! │                                           ▲                             │
//! │                              Expense ─────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! - Stock units use an INTEGER autoincrement id: insertion order IS the
//!   FIFO order allocation walks.
//! - Every other entity uses a UUID v4 string.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// Discount represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 10000 bps = 100% (the whole line is free).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Upper bound: a 100% discount.
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a discount from a percentage as typed into a form.
    pub fn from_percentage(pct: f64) -> Self {
        DiscountRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

// =============================================================================
// Enumerations
// =============================================================================

/// Which counter a sale was rung up at.
///
/// Gym-client sales may proceed past a low-stock warning on edit; customer
/// sales never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleChannel {
    Customer,
    GymClient,
}

/// Settlement state of a sale or bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing left to pay.
    Paid,
    /// Some amount still pending.
    Pending,
}

impl PaymentStatus {
    /// Status implied by a pending amount.
    pub fn from_pending(pending: Money) -> Self {
        if pending.is_positive() {
            PaymentStatus::Pending
        } else {
            PaymentStatus::Paid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
    BankTransfer,
    Cheque,
}

/// Kind of record a payment event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Sale,
    Bill,
}

/// Why a cash movement was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Owner puts cash into the shop.
    Deposit,
    /// Owner takes cash out of the shop.
    Withdrawal,
    SalePayment,
    SaleRefund,
    /// Payment made to a wholesaler (outflow).
    BillPayment,
    /// Money returned by a wholesaler (inflow).
    BillRefund,
    Expense,
    ExpenseRefund,
    /// Negation of an earlier movement.
    Reversal,
}

// =============================================================================
// Stock
// =============================================================================

/// One stock row: `quantity` units of a product at one purchase price.
///
/// Replenishment always inserts rows of quantity 1; allocation walks rows by
/// ascending id and decrements `quantity` (exhausted rows stay at 0).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockUnit {
    pub id: i64,
    pub product_name: String,
    pub per_unit_price_cents: i64,
    pub quantity: i64,
    /// Always `quantity × per_unit_price_cents`.
    pub total_amount_cents: i64,
    #[ts(as = "String")]
    pub purchase_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// Batch the unit was purchased in; `None` for restocks from reversals.
    pub batch_id: Option<String>,
}

impl StockUnit {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.per_unit_price_cents)
    }
}

/// Units currently available for one (product, price tier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLevel {
    pub product_name: String,
    pub per_unit_price_cents: i64,
    pub available: i64,
}

// =============================================================================
// Purchasing
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Wholesaler {
    pub id: String,
    pub name: String,
    pub mobile: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A purchase from a wholesaler.
///
/// `bill_amount_cents` = Σ batch totals + shipping, maintained by the
/// purchase workflow whenever batches change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WholesalerBill {
    pub id: String,
    pub wholesaler_id: String,
    #[ts(as = "String")]
    pub bill_date: NaiveDate,
    pub shipping_charges_cents: i64,
    pub bill_amount_cents: i64,
    pub amount_paid_cents: i64,
    pub pending_amount_cents: i64,
    pub status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl WholesalerBill {
    #[inline]
    pub fn bill_amount(&self) -> Money {
        Money::from_cents(self.bill_amount_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    #[inline]
    pub fn pending_amount(&self) -> Money {
        Money::from_cents(self.pending_amount_cents)
    }
}

/// Units of one product bought together on a bill.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductBatch {
    pub id: String,
    pub bill_id: Option<String>,
    pub product_name: String,
    pub ordered_quantity: i64,
    pub per_unit_price_cents: i64,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ProductBatch {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.per_unit_price_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sales
// =============================================================================

/// A customer or gym-client sale of one product line.
///
/// `buying_price_cents` snapshots the price tier the units were allocated
/// from; it is what gets restored on edit or delete.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleRecord {
    pub id: String,
    pub channel: SaleChannel,
    pub party_name: Option<String>,
    pub mobile: Option<String>,
    pub product_name: String,
    pub quantity: i64,
    pub buying_price_cents: i64,
    pub selling_price_cents: i64,
    /// selling price × quantity, before discount.
    pub total_amount_cents: i64,
    pub discount_bps: i64,
    pub final_bill_cents: i64,
    /// amount paid − buying price × quantity.
    pub net_profit_cents: i64,
    pub payment_mode: PaymentMode,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub amount_paid_cents: i64,
    pub pending_amount_cents: i64,
    pub status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SaleRecord {
    #[inline]
    pub fn buying_price(&self) -> Money {
        Money::from_cents(self.buying_price_cents)
    }

    #[inline]
    pub fn final_bill(&self) -> Money {
        Money::from_cents(self.final_bill_cents)
    }

    #[inline]
    pub fn amount_paid(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    #[inline]
    pub fn pending_amount(&self) -> Money {
        Money::from_cents(self.pending_amount_cents)
    }
}

// =============================================================================
// Payments
// =============================================================================

/// The record a payment is made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentParent {
    Sale(String),
    Bill(String),
}

impl PaymentParent {
    pub fn kind(&self) -> ParentKind {
        match self {
            PaymentParent::Sale(_) => ParentKind::Sale,
            PaymentParent::Bill(_) => ParentKind::Bill,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PaymentParent::Sale(id) | PaymentParent::Bill(id) => id,
        }
    }

    /// Signed cash effect of paying `amount` against this parent.
    ///
    /// Customers pay the shop (inflow); the shop pays wholesalers (outflow).
    pub fn cash_effect(&self, amount: Money) -> Money {
        match self {
            PaymentParent::Sale(_) => amount,
            PaymentParent::Bill(_) => -amount,
        }
    }

    pub fn from_parts(kind: ParentKind, id: impl Into<String>) -> Self {
        match kind {
            ParentKind::Sale => PaymentParent::Sale(id.into()),
            ParentKind::Bill => PaymentParent::Bill(id.into()),
        }
    }
}

/// One payment (or refund, when negative) against a sale or bill.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentEvent {
    pub id: String,
    pub parent_kind: ParentKind,
    pub parent_id: String,
    pub amount_paid_cents: i64,
    #[ts(as = "String")]
    pub paid_date: NaiveDate,
    pub payment_mode: PaymentMode,
    /// Parent's pending amount right after this event.
    pub pending_amount_after_cents: i64,
    pub cash_movement_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl PaymentEvent {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_paid_cents)
    }

    pub fn parent(&self) -> PaymentParent {
        PaymentParent::from_parts(self.parent_kind, self.parent_id.clone())
    }
}

// =============================================================================
// Cash
// =============================================================================

/// A signed entry in the cash ledger. Positive = money into the shop.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub amount_cents: i64,
    pub kind: MovementKind,
    #[ts(as = "String")]
    pub movement_date: NaiveDate,
    pub description: String,
    /// Set when this movement negates an earlier one.
    pub reverses_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// A movement about to be posted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashMovementDraft {
    pub amount: Money,
    pub kind: MovementKind,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub description: String,
}

impl CashMovementDraft {
    pub fn new(
        amount: Money,
        kind: MovementKind,
        date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        CashMovementDraft {
            amount,
            kind,
            date,
            description: description.into(),
        }
    }
}

// =============================================================================
// Workflow Inputs
// =============================================================================

/// Everything the sale form submits.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleInput {
    pub channel: SaleChannel,
    pub party_name: Option<String>,
    pub mobile: Option<String>,
    pub product_name: String,
    pub quantity: i64,
    /// Price tier the units are drawn from.
    pub buying_price: Money,
    pub selling_price: Money,
    pub discount: DiscountRate,
    pub amount_paid: Money,
    pub payment_mode: PaymentMode,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
}

/// One product line on a wholesaler bill.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchInput {
    pub product_name: String,
    pub quantity: i64,
    pub per_unit_price: Money,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
}

impl BatchInput {
    /// quantity × per-unit price; `OutOfRange` when it does not fit.
    pub fn total(&self) -> Result<Money, ValidationError> {
        self.per_unit_price
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| ValidationError::too_large("batch total"))
    }
}

/// A new wholesaler bill with its initial batches.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BillInput {
    pub wholesaler_id: String,
    #[ts(as = "String")]
    pub bill_date: NaiveDate,
    pub shipping_charges: Money,
    pub amount_paid: Money,
    pub payment_mode: PaymentMode,
    pub batches: Vec<BatchInput>,
}

/// Header edit of an existing bill.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BillUpdate {
    #[ts(as = "String")]
    pub bill_date: NaiveDate,
    pub shipping_charges: Money,
    pub amount_paid: Money,
    pub payment_mode: PaymentMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WholesalerInput {
    pub name: String,
    pub mobile: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
