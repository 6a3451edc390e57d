//! Error types for voipbill
//!
//! This module defines the error type used throughout the voipbill crates.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! # Example
//!
//! ```
//! use voipbill_core::error::{BillingError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to BillingError
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::types::VoipPlanId;

/// Main error type for voipbill operations
///
/// Covers everything from IO and parsing failures to upstream rate API
/// errors and malformed analytic documents.
#[derive(Error, Debug)]
pub enum BillingError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The rate API answered with a non-success status
    #[error("Rate API returned {status}: {message}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Rate API body could not be parsed
    #[error("Rate list parse error at offset {offset}: {message}")]
    RateParse {
        /// Byte offset into the body
        offset: usize,
        /// What was expected
        message: String,
    },

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid timezone
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Aggregation result document is missing fields or has bad values
    #[error("Invalid analytic document: {0}")]
    InvalidDocument(String),

    /// Aggregation pipeline uses something the store cannot evaluate
    #[error("Unsupported pipeline stage: {0}")]
    UnsupportedStage(String),

    /// VoIP plan id not present in the rate book
    #[error("Unknown VoIP plan: {0}")]
    UnknownVoipPlan(VoipPlanId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience type alias for Results in voipbill
///
/// # Example
///
/// ```
/// use voipbill_core::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, BillingError>;
