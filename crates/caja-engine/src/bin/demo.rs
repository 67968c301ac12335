//! # Lifecycle Demo
//!
//! Seeds two tenants and walks the full order lifecycle end to end:
//! sale registration, manual status changes, returns reconciliation and a
//! rejection compensating a full refund.
//!
//! ## Usage
//! ```bash
//! # Run against the default database file
//! cargo run -p caja-engine --bin demo
//!
//! # Specify database path
//! cargo run -p caja-engine --bin demo -- --db ./data/caja.db
//! ```
//!
//! Safe to run repeatedly: tenants and products are seeded once, every run
//! registers fresh sales and folios just keep counting up.

use std::env;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use caja_core::{
    Fulfillment, ItemCondition, OperatingMode, PaymentInput, PaymentLine, PaymentMethod, Product,
    SaleStatus, Tenant,
};
use caja_db::{Database, DbConfig};
use caja_engine::{
    CreateReturnRequest, CreateSaleRequest, RefundInput, RefundLineInput, ReturnDecision,
    ReturnItemInput, ReturnsReconciler, SaleItemInput, SaleLedger,
};

const ABARROTES: &str = "tnt-abarrotes";
const TAQUERIA: &str = "tnt-taqueria";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./caja_demo.db");

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
                println!("Caja POS Lifecycle Demo");
                println!();
                println!("Usage: demo [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./caja_demo.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Caja POS Lifecycle Demo");
    println!("=======================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let (total, applied) = caja_db::migrations::migration_status(db.pool()).await?;
    println!("✓ Connected ({}/{} migrations applied)", applied, total);

    seed(&db).await?;

    let ledger = SaleLedger::new(db.clone());
    let returns = ReturnsReconciler::new(db.clone());

    // -------------------------------------------------------------------
    // A grocery tenant that sells from stock
    // -------------------------------------------------------------------
    println!();
    println!("Abarrotes (sells from stock)");
    println!("----------------------------");

    let sale = ledger
        .create_sale(CreateSaleRequest {
            tenant_id: ABARROTES.to_string(),
            store_id: Some("store-centro".to_string()),
            created_by: "cajero-1".to_string(),
            items: vec![
                item(Some("prd-cola"), "Refresco Cola 600ml", 4, 2_500),
                item(Some("prd-chips"), "Papas Saladas", 2, 1_500),
            ],
            total_cents: 13_000,
            discount_cents: 0,
            payment: PaymentInput::Mixed {
                lines: vec![
                    PaymentLine {
                        method: PaymentMethod::Cash,
                        amount_cents: 8_000,
                        received_cents: Some(10_000),
                    },
                    PaymentLine {
                        method: PaymentMethod::Card,
                        amount_cents: 5_000,
                        received_cents: None,
                    },
                ],
            },
            fulfillment: Fulfillment::Counter,
            delivery_assignee: None,
        })
        .await?;
    println!(
        "✓ Sale folio {} for {} ({} payment lines) -> {}",
        sale.sale.folio,
        sale.sale.total(),
        sale.payments.len(),
        sale.sale.status
    );
    print_stock(&db, ABARROTES, "prd-cola").await?;

    // Partial return: two colas come back sellable.
    let partial = returns
        .create_return(CreateReturnRequest {
            tenant_id: ABARROTES.to_string(),
            sale_id: sale.sale.id.clone(),
            processed_by: "encargado-1".to_string(),
            items: vec![returned("Refresco Cola 600ml", 2, ItemCondition::New)],
            refund_amount_cents: 5_000,
            refund: RefundInput::Mixed {
                lines: vec![RefundLineInput {
                    method: PaymentMethod::Cash,
                    amount_cents: 5_000,
                }],
            },
        })
        .await?;
    println!(
        "✓ Return folio {} refunds {} -> sale is {} ({} returned so far)",
        partial.sale_return.folio,
        partial.sale_return.refund_amount(),
        partial.sale_updated.status,
        partial.sale_updated.total_returned(),
    );
    print_stock(&db, ABARROTES, "prd-cola").await?;

    // Second return covers the rest of the sale.
    let rest = returns
        .create_return(CreateReturnRequest {
            tenant_id: ABARROTES.to_string(),
            sale_id: sale.sale.id.clone(),
            processed_by: "encargado-1".to_string(),
            items: vec![
                returned("Refresco Cola 600ml", 2, ItemCondition::New),
                returned("Papas Saladas", 2, ItemCondition::Damaged),
            ],
            refund_amount_cents: 8_000,
            refund: RefundInput::Mixed {
                lines: vec![
                    RefundLineInput {
                        method: PaymentMethod::Cash,
                        amount_cents: 3_000,
                    },
                    RefundLineInput {
                        method: PaymentMethod::Card,
                        amount_cents: 5_000,
                    },
                ],
            },
        })
        .await?;
    println!(
        "✓ Return folio {} refunds {} -> sale is {}",
        rest.sale_return.folio,
        rest.sale_return.refund_amount(),
        rest.sale_updated.status,
    );

    // Supervisor rejects the second return: refund comes back out,
    // the sale reverts, and the restocked colas leave stock again.
    let rejected = returns
        .decide_return(ABARROTES, &rest.sale_return.id, ReturnDecision::Rejected)
        .await?;
    let after = ledger.get_sale(ABARROTES, &sale.sale.id).await?;
    println!(
        "✓ Return folio {} rejected -> sale back to {} ({} returned)",
        rejected.folio,
        after.sale.status,
        after.sale.total_returned(),
    );
    print_stock(&db, ABARROTES, "prd-cola").await?;

    let approved = returns
        .decide_return(ABARROTES, &partial.sale_return.id, ReturnDecision::Approved)
        .await?;
    println!("✓ Return folio {} approved", approved.folio);

    // -------------------------------------------------------------------
    // A taqueria that prepares on demand
    // -------------------------------------------------------------------
    println!();
    println!("Taqueria (prepares on demand)");
    println!("-----------------------------");

    let order = ledger
        .create_sale(CreateSaleRequest {
            tenant_id: TAQUERIA.to_string(),
            store_id: Some("sucursal-sur".to_string()),
            created_by: "cajero-9".to_string(),
            items: vec![item(Some("prd-tacos"), "Orden de Tacos", 3, 6_000)],
            total_cents: 18_000,
            discount_cents: 0,
            payment: PaymentInput::Single {
                method: PaymentMethod::Card,
            },
            fulfillment: Fulfillment::Delivery,
            delivery_assignee: Some("repartidor-2".to_string()),
        })
        .await?;
    println!(
        "✓ Sale folio {} starts as {} (assignee: {})",
        order.sale.folio,
        order.sale.status,
        order.sale.delivery_assignee.as_deref().unwrap_or("-"),
    );
    print_stock(&db, TAQUERIA, "prd-tacos").await?;

    let mut current = order.sale;
    for target in [
        SaleStatus::ListoParaEnvio,
        SaleStatus::Enviado,
        SaleStatus::EntregadoYCobrado,
    ] {
        current = ledger.update_status(TAQUERIA, &current.id, target).await?;
        println!("✓ Moved to {}", current.status);
    }

    // Cancelling a settled sale is refused by the lifecycle guard.
    match ledger
        .update_status(TAQUERIA, &current.id, SaleStatus::Cancelada)
        .await
    {
        Err(err) => println!("✓ Guard refused cancellation: {}", err),
        Ok(_) => println!("⚠ cancellation unexpectedly accepted"),
    }

    // A card sale may refund in cash.
    let goodwill = returns
        .create_return(CreateReturnRequest {
            tenant_id: TAQUERIA.to_string(),
            sale_id: current.id.clone(),
            processed_by: "gerente-1".to_string(),
            items: vec![returned("Orden de Tacos", 1, ItemCondition::New)],
            refund_amount_cents: 6_000,
            refund: RefundInput::Single {
                method: PaymentMethod::Cash,
            },
        })
        .await?;
    println!(
        "✓ Card sale refunded {} in cash -> sale is {}",
        goodwill.sale_return.refund_amount(),
        goodwill.sale_updated.status,
    );

    // -------------------------------------------------------------------
    // Ledger summary
    // -------------------------------------------------------------------
    println!();
    println!("Summary");
    println!("-------");
    for tenant in [ABARROTES, TAQUERIA] {
        let sales = ledger.list_sales(tenant, 50).await?;
        println!("  {}: {} sales on record", tenant, sales.len());
        for sale in &sales {
            let sale_returns = returns.list_returns_for_sale(tenant, &sale.id).await?;
            println!(
                "    folio {:>3}  {:>10}  {:<22} returns: {}",
                sale.folio,
                sale.total().to_string(),
                sale.status.to_string(),
                sale_returns.len(),
            );
        }
    }

    let discrepancies = db.products().list_discrepancies(ABARROTES).await?;
    println!("  stock discrepancies recorded: {}", discrepancies.len());

    println!();
    println!("✓ Demo complete!");

    Ok(())
}

/// Log filter: RUST_LOG wins, otherwise info with debug for caja crates.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caja=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Seeds tenants and products once; later runs reuse them.
async fn seed(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    if db.tenants().get_by_id(ABARROTES).await?.is_some() {
        println!("✓ Tenants already seeded");
        return Ok(());
    }

    let now = Utc::now();
    db.tenants()
        .insert(&Tenant {
            id: ABARROTES.to_string(),
            name: "Abarrotes La Esquina".to_string(),
            mode: OperatingMode::SellFromStock,
            created_at: now,
        })
        .await?;
    db.tenants()
        .insert(&Tenant {
            id: TAQUERIA.to_string(),
            name: "Taqueria El Fogon".to_string(),
            mode: OperatingMode::PrepareOnDemand,
            created_at: now,
        })
        .await?;

    for (tenant, id, name, price, stock) in [
        (ABARROTES, "prd-cola", "Refresco Cola 600ml", 2_500, Some(50)),
        (ABARROTES, "prd-chips", "Papas Saladas", 1_500, Some(40)),
        (TAQUERIA, "prd-tacos", "Orden de Tacos", 6_000, Some(99)),
    ] {
        db.products()
            .insert(&Product {
                id: id.to_string(),
                tenant_id: tenant.to_string(),
                sku: id.to_uppercase(),
                name: name.to_string(),
                price_cents: price,
                stock,
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await?;
    }

    println!("✓ Seeded 2 tenants and 3 products");
    Ok(())
}

fn item(product_id: Option<&str>, name: &str, quantity: i64, price: i64) -> SaleItemInput {
    SaleItemInput {
        product_id: product_id.map(str::to_string),
        name: name.to_string(),
        quantity,
        unit_price_cents: price,
    }
}

fn returned(name: &str, quantity: i64, condition: ItemCondition) -> ReturnItemInput {
    ReturnItemInput {
        product_id: None,
        name: name.to_string(),
        quantity,
        refund_unit_price_cents: None,
        reason: None,
        condition,
    }
}

async fn print_stock(
    db: &Database,
    tenant: &str,
    product_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(product) = db.products().get_by_id(tenant, product_id).await? {
        match product.stock {
            Some(stock) => println!("  stock {}: {}", product.name, stock),
            None => println!("  stock {}: untracked", product.name),
        }
    }
    Ok(())
}
