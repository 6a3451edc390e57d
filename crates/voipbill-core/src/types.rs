//! Core domain types for voipbill
//!
//! Strongly-typed wrappers for the identifiers that flow between the web
//! views, the rate API and the analytic store, plus the rate row shared by
//! listing, session caching and CSV export.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BillingError, Result};

/// Customer account code used to scope billing reports
///
/// # Examples
/// ```
/// use voipbill_core::types::AccountCode;
///
/// let code = AccountCode::new("12345");
/// assert_eq!(code.as_str(), "12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountCode(String);

impl AccountCode {
    /// Create a new AccountCode from any string-like type
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Switch identifier; zero means "all switches"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(i64);

impl SwitchId {
    pub const ALL: SwitchId = SwitchId(0);

    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Whether this id selects every switch
    pub fn is_all(&self) -> bool {
        self.0 == 0
    }
}

impl FromStr for SwitchId {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::ALL);
        }
        trimmed
            .parse::<i64>()
            .map(Self)
            .map_err(|_| BillingError::InvalidArgument(format!("switch must be an integer: {s}")))
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// VoIP plan identifier attached to a user profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoipPlanId(u32);

impl VoipPlanId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VoipPlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the retail rate listing
///
/// `retail_rate` is kept as the literal text the rate API sent so that
/// exports reproduce it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub prefix: String,
    pub destination: String,
    pub retail_rate: String,
}

impl RateRow {
    pub fn new(
        prefix: impl Into<String>,
        destination: impl Into<String>,
        retail_rate: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            destination: destination.into(),
            retail_rate: retail_rate.into(),
        }
    }

    /// Numeric value of the retail rate, if it parses
    pub fn retail_rate_value(&self) -> Option<f64> {
        self.retail_rate.trim().parse().ok()
    }
}

/// Sort direction as understood by the rate API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Wire value for the `sort_order` query parameter
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ASC" | "" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(BillingError::InvalidArgument(format!("Invalid sort order: {s}"))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// Columns the rate listing can be sorted by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSortField {
    #[default]
    Prefix,
    RetailRate,
    Destination,
}

impl RateSortField {
    pub const ALL: [RateSortField; 3] = [Self::Prefix, Self::RetailRate, Self::Destination];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::RetailRate => "retail_rate",
            Self::Destination => "destination",
        }
    }
}

impl FromStr for RateSortField {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "prefix" => Ok(Self::Prefix),
            "retail_rate" => Ok(Self::RetailRate),
            "destination" => Ok(Self::Destination),
            _ => Err(BillingError::InvalidArgument(format!("Invalid sort field: {s}"))),
        }
    }
}

impl fmt::Display for RateSortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar day derived from an analytic document id
///
/// Daily analytic ids start with the day as `YYYYMMDD`; whatever follows
/// (switch, account code) is ignored for bucketing.
///
/// # Examples
/// ```
/// use voipbill_core::types::DayKey;
///
/// let day = DayKey::from_analytic_id("20130302_1_1234").unwrap();
/// assert_eq!(day.to_string(), "2013-03-02");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn inner(&self) -> &NaiveDate {
        &self.0
    }

    /// Parse the leading `YYYYMMDD` of an aggregation `_id`
    pub fn from_analytic_id(id: &str) -> Result<Self> {
        let head = id.get(0..8).ok_or_else(|| {
            BillingError::InvalidDocument(format!("_id too short for a day key: {id:?}"))
        })?;
        NaiveDate::parse_from_str(head, "%Y%m%d")
            .map(Self)
            .map_err(|_| BillingError::InvalidDocument(format!("_id is not a date: {id:?}")))
    }

    pub fn format(&self, fmt: &str) -> String {
        self.0.format(fmt).to_string()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
