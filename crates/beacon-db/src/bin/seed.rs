//! # Seed Data Generator
//!
//! Populates the database with a demo warehouse for development.
//!
//! ## Usage
//! ```bash
//! # Default layout: 3 racks × 2 sides × 6 pigeonholes + 1 bin per side
//! cargo run -p beacon-db --bin seed
//!
//! # More racks
//! cargo run -p beacon-db --bin seed -- --racks 5
//!
//! # Specify database path
//! cargo run -p beacon-db --bin seed -- --db ./data/beacon.db
//! ```
//!
//! ## Generated Data
//! - Cells `R{n}-S{m}-P{k}` and one bin `R{n}-S{m}-BIN1` per side
//! - Items `ITEM-001` .. `ITEM-012` spread deterministically over pigeonholes
//! - Orders `SO-100` onwards, some retrievable from one side, some not yet
//! - Pending stock requests `ST-001` onwards

use std::env;

use beacon_core::{
    CellKind, Order, OrderLine, StockRequest, StorageCell, DEFAULT_BIN_CAPACITY,
    DEFAULT_PIGEONHOLE_CAPACITY,
};
use beacon_db::{Database, DbConfig};

const SIDES: &[&str] = &["S1", "S2"];
const SLOTS_PER_SIDE: usize = 6;
const ITEM_COUNT: usize = 12;

fn item(n: usize) -> String {
    format!("ITEM-{:03}", n % ITEM_COUNT + 1)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut racks: usize = 3;
    let mut db_path = String::from("./beacon_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--racks" | "-r" => {
                if i + 1 < args.len() {
                    racks = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Beacon Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -r, --racks <N>    Number of racks to generate (default: 3)");
                println!("  -d, --db <PATH>    Database file path (default: ./beacon_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Beacon Seed Data Generator");
    println!("==========================");
    println!("Database: {}", db_path);
    println!("Racks:    {}", racks);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.cells().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} cells", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // -------------------------------------------------------------------------
    // Cells
    // -------------------------------------------------------------------------
    let mut cells = 0;
    let mut n = 0;
    for rack in 1..=racks {
        for side in SIDES {
            for slot in 1..=SLOTS_PER_SIDE {
                let id = format!("R{}-{}-P{}", rack, side, slot);
                let cell = StorageCell::new(id, CellKind::Pigeonhole, DEFAULT_PIGEONHOLE_CAPACITY)?
                    .with_item(item(n), (n % 4 + 1) as i64)
                    .with_item(item(n + 5), (n % 3) as i64);
                db.cells().insert(&cell).await?;
                cells += 1;
                n += 1;
            }

            let bin = StorageCell::new(format!("R{}-{}-BIN1", rack, side), CellKind::Bin, DEFAULT_BIN_CAPACITY)?;
            db.cells().insert(&bin).await?;
            cells += 1;
        }
    }
    println!("✓ Created {} cells", cells);

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------
    let orders = [
        Order::new("SO-100", vec![OrderLine::new(item(0), 1), OrderLine::new(item(1), 1)]),
        Order::new("SO-101", vec![OrderLine::new(item(2), 2)]),
        Order::new("SO-102", vec![OrderLine::new(item(3), 3), OrderLine::new(item(9), 1)]),
        Order::new("SO-103", vec![OrderLine::new(item(4), 50)]),
    ];
    for order in &orders {
        if let Err(e) = db.orders().insert(order).await {
            eprintln!("Failed to insert {}: {}", order.order_no, e);
        }
    }
    db.orders().assign_bin("SO-100", "R1-S1-BIN1").await?;
    println!("✓ Created {} orders", orders.len());

    // -------------------------------------------------------------------------
    // Stock requests
    // -------------------------------------------------------------------------
    for k in 0..4 {
        let request = StockRequest::new(format!("ST-{:03}", k + 1), item(k * 2), (k + 1) as i64);
        db.stock().insert(&request).await?;
    }
    println!("✓ Created 4 stock requests");

    let retrievable = beacon_core::allocation::retrievable_orders(
        &db.orders().list_unfulfilled().await?,
        &db.cells().list().await?,
    );
    println!();
    println!("Retrievable now:");
    for plan in retrievable {
        println!("  {} from {}", plan.order_no, plan.zone);
    }

    db.close().await;
    println!();
    println!("✓ Seed complete");
    Ok(())
}
