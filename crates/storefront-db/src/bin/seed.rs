//! # Seed Data Generator
//!
//! Populates a development database with a small fashion catalog and a few
//! coupons.
//!
//! ## Usage
//! ```bash
//! cargo run -p storefront-db --bin seed
//! cargo run -p storefront-db --bin seed -- --db ./data/checkout.db
//! ```
//!
//! ## Generated Data
//! - One product per (style, fabric) pair, id `{STYLE}-{FABRIC}`, price
//!   ₦4,500 to ₦29,500, stock 0 to 24
//! - Coupons `WELCOME10` (10%), `VIP25` (25%), `FLAT500` (fixed ₦500, not
//!   honored at checkout) and `EXPIRED15` (inactive)

use std::env;

use rust_decimal::Decimal;
use storefront_core::{Coupon, Discount, Money};
use storefront_db::{Database, DbConfig, NewProduct};
use tracing::{info, warn};

const STYLES: &[(&str, &str)] = &[
    ("DRS", "Wrap Dress"),
    ("KFT", "Kaftan"),
    ("BUB", "Buba"),
    ("SKT", "Pencil Skirt"),
    ("SHT", "Shirt"),
    ("JMP", "Jumpsuit"),
];

const FABRICS: &[(&str, &str)] = &[
    ("ANK", "Ankara"),
    ("ADR", "Adire"),
    ("ASO", "Aso Oke"),
    ("LIN", "Linen"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    storefront_db::init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./storefront_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./storefront_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(path = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.catalog().count_active().await?;
    if existing > 0 {
        warn!(existing, "Catalog already populated; delete the database file to regenerate");
        return Ok(());
    }

    let mut generated = 0usize;
    for (style_idx, (style_code, style)) in STYLES.iter().enumerate() {
        for (fabric_idx, (fabric_code, fabric)) in FABRICS.iter().enumerate() {
            let seed = style_idx * FABRICS.len() + fabric_idx;
            let product = NewProduct::new(
                format!("{style_code}-{fabric_code}"),
                format!("{fabric} {style}"),
                Money::from_major(4_500 + ((seed as i64 * 1_700) % 25_000)),
                ((seed * 7) % 25) as i64,
            );

            if let Err(e) = db.catalog().upsert(&product).await {
                warn!(id = %product.id, error = %e, "Failed to insert product");
                continue;
            }
            generated += 1;
        }
    }
    info!(generated, "Products seeded");

    let coupons = [
        ("WELCOME10", "percentage", Decimal::from(10), true),
        ("VIP25", "percentage", Decimal::from(25), true),
        ("FLAT500", "amount", Decimal::from(500), true),
        ("EXPIRED15", "percentage", Decimal::from(15), false),
    ];
    for (code, kind, value, is_active) in coupons {
        let coupon = Coupon {
            code: code.to_string(),
            discount: Discount::from_parts(kind, value),
            is_active,
        };
        db.coupons().insert(&coupon).await?;
    }
    info!(count = coupons.len(), "Coupons seeded");

    db.close().await;
    info!("Seed complete");
    Ok(())
}
