//! Basic xbrlkit usage example
//!
//! This example demonstrates the simplest way to use xbrlkit:
//! - Initialize the client
//! - Query the latest filings of one country
//! - Walk from filings to their entities and validation messages
//!
//! Run with: `RUST_LOG=xbrlkit=info cargo run --example basic_usage`

use std::error::Error;
use tracing_subscriber::EnvFilter;
use xbrlkit::{FilingQuery, FilingsOperations, ScopeFlags, Xbrl};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let xbrl = Xbrl::new("xbrlkit Example user@example.com")?;

    println!("=== xbrlkit Basic Usage Example ===\n");

    let query = FilingQuery::new()
        .filter("country", "FI")
        .sort(["-added_time"])
        .max_size(Some(5))
        .flags(ScopeFlags::GET_ENTITY | ScopeFlags::GET_VALIDATION_MESSAGES);
    let filings = xbrl.get_filings(&query).await?;
    println!("Retrieved {} filings\n", filings.len());

    for filing in &filings {
        println!("{filing}");
        if let Some(entity) = filing.entity() {
            println!("  entity: {} ({})", entity.name.as_deref().unwrap_or("-"), entity.api_id);
        }
        if let Some(messages) = filing.validation_messages() {
            println!("  validation messages: {}", messages.len());
            for message in messages.iter().filter(|m| m.calc_reported_sum.is_some()).take(3) {
                println!(
                    "    {} reported {:?} computed {:?}",
                    message.calc_line_item.as_deref().unwrap_or("-"),
                    message.calc_reported_sum,
                    message.calc_computed_sum
                );
            }
        }
    }

    println!("\nAPI requests made: {}", xbrlkit::api_request_count());
    Ok(())
}
