//! # Seed Data Generator
//!
//! Populates a development database with a small but complete shop:
//! opening cash, a wholesaler, one purchase bill and a few sales.
//!
//! ## Usage
//! ```bash
//! # Database from shopkeep.toml / environment / platform default
//! cargo run -p shopkeep-db --bin seed
//!
//! # Specify database path
//! cargo run -p shopkeep-db --bin seed -- --db ./data/shop.db
//!
//! # Explicit config file
//! cargo run -p shopkeep-db --bin seed -- --config ./shopkeep.toml
//! ```

use std::env;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shopkeep_core::{
    BatchInput, BillInput, CashMovementDraft, DiscountRate, Money, MovementKind, PaymentMode,
    SaleChannel, SaleInput, WholesalerInput,
};
use shopkeep_db::{Database, ShopConfig};

/// (product, quantity, per-unit buying price in rupees, selling price)
const PRODUCTS: &[(&str, i64, i64, i64)] = &[
    ("Whey Protein 1kg", 10, 2400, 3200),
    ("Creatine 250g", 12, 900, 1300),
    ("Protein Bar", 40, 60, 100),
    ("Shaker Bottle", 15, 150, 300),
];

const OPENING_BALANCE_RUPEES: i64 = 50_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,shopkeep=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Shopkeep Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (overrides config)");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = ShopConfig::load(config_path.as_deref())?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(path = ?config.database.path, "Opening database");
    let db = Database::new(config.to_db_config()).await?;

    if !db.cash().history().await?.is_empty() {
        warn!("Database already has cash movements; skipping seed to avoid duplicates");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    let bill_date = today - Duration::days(7);

    db.cash()
        .post(&CashMovementDraft::new(
            Money::from_rupees(OPENING_BALANCE_RUPEES),
            MovementKind::Deposit,
            bill_date,
            "Opening balance",
        ))
        .await?;

    let wholesaler = db
        .purchases()
        .add_wholesaler(WholesalerInput {
            name: "Acme Nutrition Distributors".to_string(),
            mobile: Some("9876543210".to_string()),
            address: Some("12 Market Road".to_string()),
        })
        .await?;

    let batches: Vec<BatchInput> = PRODUCTS
        .iter()
        .map(|(name, quantity, buying, _)| BatchInput {
            product_name: name.to_string(),
            quantity: *quantity,
            per_unit_price: Money::from_rupees(*buying),
            expiry_date: Some(today + Duration::days(365)),
        })
        .collect();

    let bill = db
        .purchases()
        .add_bill(BillInput {
            wholesaler_id: wholesaler.id.clone(),
            bill_date,
            shipping_charges: Money::from_rupees(500),
            amount_paid: Money::from_rupees(30_000),
            payment_mode: PaymentMode::BankTransfer,
            batches,
        })
        .await?;

    info!(
        bill_id = %bill.id,
        amount = %bill.bill_amount(),
        pending = %bill.pending_amount(),
        "Seeded purchase bill"
    );

    for (index, (name, _, buying, selling)) in PRODUCTS.iter().enumerate() {
        let quantity = (index as i64 % 3) + 1;
        let selling_price = Money::from_rupees(*selling);
        let channel = if index % 2 == 0 {
            SaleChannel::Customer
        } else {
            SaleChannel::GymClient
        };

        let sale = db
            .sales()
            .add_sale(SaleInput {
                channel,
                party_name: Some(format!("Member {}", index + 1)),
                mobile: None,
                product_name: name.to_string(),
                quantity,
                buying_price: Money::from_rupees(*buying),
                selling_price,
                discount: DiscountRate::from_bps(500),
                amount_paid: Money::from_cents(selling_price.multiply_quantity(quantity).cents() / 2),
                payment_mode: PaymentMode::Cash,
                sale_date: today,
            })
            .await?;

        info!(sale_id = %sale.id, product = name, pending = %sale.pending_amount(), "Seeded sale");
    }

    info!(
        balance = %db.cash().current_balance().await?,
        tiers = db.stock().levels().await?.len(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
