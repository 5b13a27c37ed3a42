//! Exports filings of the Nordic countries into an SQLite database.
//!
//! Run with: `cargo run --example sqlite_export -- nordic.db`

use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xbrlkit::{FilingQuery, FilingsOperations, ScopeFlags, Xbrl};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("nordic.db"));

    let xbrl = Xbrl::new("xbrlkit Example user@example.com")?;
    let query = FilingQuery::new()
        .filter("country", vec!["DK", "FI", "IS", "NO", "SE"])
        .filter("last_end_date", 2023)
        .max_size(Some(500))
        .flags(ScopeFlags::GET_ENTITY | ScopeFlags::GET_VALIDATION_MESSAGES);

    // update mode appends to an earlier export
    xbrl.to_sqlite(&query, &path, true).await?;
    println!("Wrote {}", path.display());

    let unaccessed = xbrlkit::unaccessed_key_paths();
    if !unaccessed.is_empty() {
        println!("\nFields in the responses this client does not read:");
        for (class, key_path) in unaccessed {
            println!("  {class}: {key_path}");
        }
    }
    Ok(())
}
