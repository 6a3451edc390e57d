//! Core types, errors, and utilities for voipbill
//!
//! This crate provides the foundational types shared by the rate,
//! analytics, terminal and web crates: the error type, rate and billing
//! domain types, timezone configuration and form date helpers.

pub mod aggregation_types;
pub mod dates;
pub mod error;
pub mod timezone;
pub mod types;

// Re-export commonly used types
pub use error::{BillingError, Result};
pub use types::{AccountCode, DayKey, RateRow, SortOrder, SwitchId, VoipPlanId};
