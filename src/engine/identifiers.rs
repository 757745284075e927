//! Human-readable identifier generation.

use chrono::{Datelike, NaiveDate};

use crate::error::EngineResult;
use crate::models::OrganizationId;
use crate::store::Store;

/// Formats `PREFIX + YEAR + zero-padded sequence`.
///
/// # Example
///
/// ```
/// use daycare_billing::engine::format_identifier;
///
/// assert_eq!(format_identifier("CH", 2026, 7, 4), "CH20260007");
/// assert_eq!(format_identifier("PAY", 2026, 12345, 4), "PAY202612345");
/// ```
pub fn format_identifier(prefix: &str, year: i32, sequence: u64, width: usize) -> String {
    format!("{}{}{:0width$}", prefix, year, sequence, width = width)
}

/// Draws the next identifier for `prefix` from the store's sequence for the
/// year of `date`.
pub async fn next_identifier(
    store: &dyn Store,
    org: &OrganizationId,
    prefix: &str,
    date: NaiveDate,
    width: usize,
) -> EngineResult<String> {
    let year = date.year();
    let sequence = store.next_sequence(org, prefix, year).await?;
    Ok(format_identifier(prefix, year, sequence, width))
}
