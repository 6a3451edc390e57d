//! Terminal output formatting for voipbill
//!
//! Table and JSON formatters for billing reports, rate listings and
//! simulator results.

pub mod output;

pub use output::{JsonFormatter, OutputFormatter, TableFormatter, get_formatter};
