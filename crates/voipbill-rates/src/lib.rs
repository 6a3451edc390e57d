//! Rate listing, export and simulation for voipbill
//!
//! This crate talks to the rate API, turns its bracketed list body into
//! [`RateRow`](voipbill_core::RateRow)s, writes rate exports and answers
//! "what would this call cost" from a rate book.

pub mod client;
pub mod csv_export;
pub mod engine;
pub mod parser;

pub use client::{Credentials, RateApiClient, RateQuery};
pub use engine::{RateBook, RetailQuote, SimulationRow};
pub use parser::{encode_rate_list, parse_rate_list};
