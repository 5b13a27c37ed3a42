//! Compares the filings of two queries with set operations.
//!
//! Run with: `cargo run --example filing_sets`

use std::error::Error;
use xbrlkit::{ColumnOptions, FilingQuery, FilingsOperations, ScopeFlags, Xbrl};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let xbrl = Xbrl::new("xbrlkit Example user@example.com")?;

    let recent = xbrl
        .get_filings(
            &FilingQuery::new()
                .filter("country", "SE")
                .sort(["-added_time"])
                .max_size(Some(50))
                .flags(ScopeFlags::GET_ENTITY),
        )
        .await?;
    let clean = xbrl
        .get_filings(
            &FilingQuery::new()
                .filter("country", "SE")
                .filter("error_count", 0)
                .max_size(Some(200))
                .flags(ScopeFlags::GET_ENTITY),
        )
        .await?;

    let recent_clean = &recent & &clean;
    let recent_with_errors = &recent - &clean;
    println!("recent: {}", recent.len());
    println!("recent without errors: {}", recent_clean.len());
    println!("recent with errors: {}", recent_with_errors.len());
    println!("entities with errors: {}", recent_with_errors.entities().len());

    let columns = recent_with_errors.get_data_columns(None, &ColumnOptions::new().with_entity(true));
    for (name, values) in columns.iter().take(5) {
        println!("{name}: {:?}", values.iter().take(3).collect::<Vec<_>>());
    }
    Ok(())
}
