//! Rate CSV export
//!
//! Exports use the Excel tab dialect: tab delimiter, CRLF line endings,
//! minimal quoting, and a fixed `prefix, destination, retail_rate` header.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::Write;
use std::path::Path;
use voipbill_core::error::Result;
use voipbill_core::types::RateRow;

/// Download name used by the web export
pub const EXPORT_FILENAME: &str = "call_rate.csv";

/// Header row of every rate export
pub const EXPORT_HEADER: [&str; 3] = ["prefix", "destination", "retail_rate"];

/// Write rates as tab-separated CSV to any writer
pub fn write_rates_csv<W: Write>(writer: W, rows: &[RateRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(Terminator::CRLF)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer);

    wtr.write_record(EXPORT_HEADER)?;
    for row in rows {
        wtr.write_record([
            row.prefix.as_str(),
            row.destination.as_str(),
            row.retail_rate.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render rates as CSV bytes
pub fn rates_csv_bytes(rows: &[RateRow]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_rates_csv(&mut buf, rows)?;
    Ok(buf)
}

/// Write rates as CSV to a file
pub fn export_rates_to_path(path: &Path, rows: &[RateRow]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_rates_csv(file, rows)
}
