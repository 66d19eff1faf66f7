//! # Validation Module
//!
//! Input validation for every workflow entry point.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI forms (external)                                          │
//! │  └── Immediate feedback, may be bypassed by tests or scripts           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Runs before a unit of work is opened                              │
//! │  └── A failure here never touches the store                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (quantity >= 0), CHECK (pending_amount_cents >= 0)          │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::billing::{BillTotals, SaleTotals};
use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{BatchInput, BillInput, BillUpdate, DiscountRate, SaleInput, WholesalerInput};
use crate::{MAX_LINE_QUANTITY, MOBILE_NUMBER_DIGITS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use shopkeep_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Whey Protein 1kg").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_name("product name", name)
}

/// Validates a customer / gym-client / wholesaler name.
pub fn validate_party_name(name: &str) -> ValidationResult<()> {
    validate_name("name", name)
}

fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a free-text description (may be empty).
pub fn validate_description(description: &str) -> ValidationResult<()> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(())
}

/// Validates a mobile number.
///
/// ## Rules
/// - Exactly 10 characters, all ASCII digits
///
/// ## Example
/// ```rust
/// use shopkeep_core::validation::validate_mobile;
///
/// assert!(validate_mobile("9876543210").is_ok());
/// assert!(validate_mobile("98765 43210").is_err());
/// assert!(validate_mobile("+919876543210").is_err());
/// ```
pub fn validate_mobile(mobile: &str) -> ValidationResult<()> {
    if mobile.len() != MOBILE_NUMBER_DIGITS || !mobile.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "mobile".to_string(),
            reason: format!("must be exactly {} digits", MOBILE_NUMBER_DIGITS),
        });
    }
    Ok(())
}

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use shopkeep_core::validation::validate_uuid;
///
/// assert!(validate_uuid("bill id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("bill id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (free samples).
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a discount: 0% to 100%.
pub fn validate_discount(discount: DiscountRate) -> ValidationResult<()> {
    if discount.bps() > DiscountRate::MAX_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount (bps)".to_string(),
            min: 0,
            max: DiscountRate::MAX_BPS as i64,
        });
    }
    Ok(())
}

/// Validates a payment amount: must be strictly positive.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Workflow Input Validators
// =============================================================================

/// Validates a sale form and returns the derived totals.
///
/// ## Checks (in order)
/// ```text
/// product name ─► quantity ─► prices ─► discount ─► mobile / name
///      ─► amount paid ≤ final bill (via SaleTotals)
/// ```
pub fn validate_sale_input(input: &SaleInput) -> CoreResult<SaleTotals> {
    validate_product_name(&input.product_name)?;
    validate_quantity(input.quantity)?;
    validate_price("buying price", input.buying_price)?;
    validate_price("selling price", input.selling_price)?;
    validate_discount(input.discount)?;

    if let Some(name) = &input.party_name {
        validate_party_name(name)?;
    }
    if let Some(mobile) = &input.mobile {
        validate_mobile(mobile)?;
    }

    SaleTotals::compute(
        input.selling_price,
        input.quantity,
        input.discount,
        input.buying_price,
        input.amount_paid,
    )
}

pub fn validate_batch_input(batch: &BatchInput) -> ValidationResult<()> {
    validate_product_name(&batch.product_name)?;
    validate_quantity(batch.quantity)?;
    validate_price("per unit price", batch.per_unit_price)?;
    batch.total()?;
    Ok(())
}

/// Validates a new bill and returns its totals.
pub fn validate_bill_input(input: &BillInput) -> CoreResult<BillTotals> {
    validate_uuid("wholesaler id", &input.wholesaler_id)?;
    validate_price("shipping charges", input.shipping_charges)?;
    for batch in &input.batches {
        validate_batch_input(batch)?;
    }

    let batch_totals = input
        .batches
        .iter()
        .map(BatchInput::total)
        .collect::<Result<Vec<_>, _>>()?;

    BillTotals::compute(
        batch_totals,
        input.shipping_charges,
        input.amount_paid,
    )
}

/// Field-level checks of a bill header edit. The paid/pending split is
/// checked by the workflow once it knows the current batch total.
pub fn validate_bill_update(update: &BillUpdate) -> ValidationResult<()> {
    validate_price("shipping charges", update.shipping_charges)?;
    validate_price("amount paid", update.amount_paid)?;
    Ok(())
}

pub fn validate_wholesaler_input(input: &WholesalerInput) -> ValidationResult<()> {
    validate_party_name(&input.name)?;
    if let Some(mobile) = &input.mobile {
        validate_mobile(mobile)?;
    }
    if let Some(address) = &input.address {
        validate_description(address)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::{PaymentMode, SaleChannel};
    use chrono::NaiveDate;

    fn sale() -> SaleInput {
        SaleInput {
            channel: SaleChannel::Customer,
            party_name: Some("Asha".to_string()),
            mobile: Some("9876543210".to_string()),
            product_name: "Whey".to_string(),
            quantity: 2,
            buying_price: Money::from_rupees(100),
            selling_price: Money::from_rupees(150),
            discount: DiscountRate::zero(),
            amount_paid: Money::from_rupees(300),
            payment_mode: PaymentMode::Cash,
            sale_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_mobile() {
        assert!(validate_mobile("0123456789").is_ok());
        assert!(validate_mobile("123456789").is_err());
        assert!(validate_mobile("12345678901").is_err());
        assert!(validate_mobile("12345abcde").is_err());
        // Non-ASCII digits are not accepted
        assert!(validate_mobile("١٢٣٤٥٦٧٨٩٠").is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(DiscountRate::from_bps(0)).is_ok());
        assert!(validate_discount(DiscountRate::from_bps(10_000)).is_ok());
        assert!(validate_discount(DiscountRate::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_sale_input() {
        let totals = validate_sale_input(&sale()).unwrap();
        assert_eq!(totals.final_bill, Money::from_rupees(300));
        assert!(totals.settlement.pending.is_zero());
    }

    #[test]
    fn test_sale_input_rejections() {
        let mut input = sale();
        input.mobile = Some("12345".to_string());
        assert!(validate_sale_input(&input).is_err());

        let mut input = sale();
        input.selling_price = Money::from_cents(-1);
        assert!(validate_sale_input(&input).is_err());

        let mut input = sale();
        input.amount_paid = Money::from_rupees(301);
        assert!(matches!(
            validate_sale_input(&input),
            Err(CoreError::Validation(ValidationError::ExceedsLimit { .. }))
        ));

        let mut input = sale();
        input.product_name = "  ".to_string();
        assert!(validate_sale_input(&input).is_err());
    }

    #[test]
    fn test_validate_bill_input() {
        let input = BillInput {
            wholesaler_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            bill_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            shipping_charges: Money::from_rupees(40),
            amount_paid: Money::from_rupees(1040),
            payment_mode: PaymentMode::BankTransfer,
            batches: vec![BatchInput {
                product_name: "Creatine".to_string(),
                quantity: 10,
                per_unit_price: Money::from_rupees(100),
                expiry_date: None,
            }],
        };
        let totals = validate_bill_input(&input).unwrap();
        assert_eq!(totals.bill_amount, Money::from_rupees(1040));
        assert!(totals.settlement.pending.is_zero());

        let mut bad = input.clone();
        bad.wholesaler_id = "w-1".to_string();
        assert!(validate_bill_input(&bad).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }

    #[test]
    fn test_sale_totals_out_of_money_range() {
        let mut input = sale();
        input.selling_price = Money::from_cents(i64::MAX / 10);
        input.quantity = 100;
        input.amount_paid = Money::zero();
        assert!(matches!(
            validate_sale_input(&input),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let mut input = sale();
        input.buying_price = Money::from_cents(i64::MAX / 2);
        assert!(matches!(
            validate_sale_input(&input),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }
}
