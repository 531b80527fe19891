//! # Seed Data Generator
//!
//! Populates the database with a development catalog and slot calendar.
//!
//! ## Usage
//! ```bash
//! # Seed with defaults
//! cargo run -p bazaar-db --bin seed
//!
//! # Specify database path
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db
//! ```
//!
//! ## Generated Data
//! - A retail catalog (homeware, apparel, accessories) with a mix of
//!   full-price, percentage-discounted, and fixed-discounted products
//! - Bookable resources (fitting rooms, styling chairs) with capacities
//! - A handful of promo codes

use chrono::{Duration, Utc};
use std::env;
use uuid::Uuid;

use bazaar_core::{DiscountKind, Product, PromoCode, Resource};
use bazaar_db::{Database, DbConfig};

/// (sku, title, price_cents, discount_kind, discount_value, stock)
const PRODUCTS: &[(&str, &str, i64, DiscountKind, i64, i64)] = &[
    ("MUG-330", "Ceramic Mug 330ml", 1099, DiscountKind::None, 0, 120),
    ("MUG-500", "Ceramic Mug 500ml", 1399, DiscountKind::None, 0, 80),
    ("GLS-250", "Tumbler Glass 250ml", 699, DiscountKind::Percentage, 1000, 200),
    ("PLT-27", "Dinner Plate 27cm", 1599, DiscountKind::None, 0, 150),
    ("BWL-18", "Serving Bowl 18cm", 1299, DiscountKind::Fixed, 200, 90),
    ("TEE-S", "Logo Tee Small", 2499, DiscountKind::None, 0, 40),
    ("TEE-M", "Logo Tee Medium", 2499, DiscountKind::None, 0, 60),
    ("TEE-L", "Logo Tee Large", 2499, DiscountKind::Percentage, 1500, 55),
    ("CAP-1", "Canvas Cap", 1899, DiscountKind::None, 0, 75),
    ("TOTE-1", "Canvas Tote Bag", 1499, DiscountKind::Percentage, 2000, 110),
    ("SCRF-1", "Wool Scarf", 3499, DiscountKind::Fixed, 500, 30),
    ("CNDL-1", "Soy Candle 200g", 1799, DiscountKind::None, 0, 95),
    ("CNDL-2", "Soy Candle 400g", 2599, DiscountKind::None, 0, 45),
    ("NTBK-A5", "Linen Notebook A5", 999, DiscountKind::None, 0, 300),
    ("PEN-1", "Brass Pen", 2199, DiscountKind::Percentage, 500, 60),
];

/// (code, discount_kind, discount_value, min_order_cents, max_discount_cents, usage_limit)
const PROMO_CODES: &[(&str, DiscountKind, i64, i64, Option<i64>, Option<i64>)] = &[
    ("WELCOME10", DiscountKind::Percentage, 1000, 0, Some(1500), None),
    ("SAVE20", DiscountKind::Percentage, 2000, 5000, Some(3000), None),
    ("FIVEOFF", DiscountKind::Fixed, 500, 2500, None, Some(100)),
];

/// (name, capacity)
const RESOURCES: &[(&str, i64)] = &[
    ("Fitting Room 1", 1),
    ("Fitting Room 2", 1),
    ("Styling Chair A", 1),
    ("Styling Chair B", 1),
    ("Workshop Table", 4),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./bazaar_dev.db");

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
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./bazaar_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bazaar Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding catalog...");

    let now = Utc::now();
    for (sku, title, price_cents, discount_kind, discount_value, stock) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            title: title.to_string(),
            description: None,
            price_cents: *price_cents,
            discount_kind: *discount_kind,
            discount_value: *discount_value,
            stock_count: *stock,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", product.sku, e);
        }
    }
    println!("  {} products", PRODUCTS.len());

    println!("Seeding slot calendar...");
    for (name, capacity) in RESOURCES {
        let resource = Resource {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            capacity: *capacity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = db.resources().insert(&resource).await {
            eprintln!("Failed to insert {}: {}", resource.name, e);
        }
    }
    println!("  {} resources", RESOURCES.len());

    println!("Seeding promo codes...");
    for (code, discount_kind, discount_value, min_order, max_discount, usage_limit) in PROMO_CODES {
        let promo = PromoCode {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            description: None,
            discount_kind: *discount_kind,
            discount_value: *discount_value,
            min_order_cents: *min_order,
            max_discount_cents: *max_discount,
            usage_limit: *usage_limit,
            usage_count: 0,
            valid_from: now,
            valid_until: now + Duration::days(90),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = db.promo_codes().insert(&promo).await {
            eprintln!("Failed to insert {}: {}", promo.code, e);
        }
    }
    println!("  {} promo codes", PROMO_CODES.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
