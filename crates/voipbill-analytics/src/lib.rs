//! Billing analytics for voipbill
//!
//! Builds aggregation pipelines over the daily analytic collection, runs
//! them through an [`AnalyticStore`](store::AnalyticStore) and reshapes the
//! results into daily and hourly billing reports.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use voipbill_analytics::{
//!     pipeline::{BillingQuery, DAILY_ANALYTIC},
//!     report::BillingReporter,
//!     store::InMemoryAnalyticStore,
//! };
//! use voipbill_core::{dates::day_range, timezone::TimezoneConfig};
//!
//! # async fn example() -> voipbill_core::Result<()> {
//! let store = Arc::new(InMemoryAnalyticStore::new());
//! store.load_jsonl(DAILY_ANALYTIC, "daily_analytic.jsonl".as_ref()).await?;
//!
//! let reporter = BillingReporter::new(store, DAILY_ANALYTIC, TimezoneConfig::default());
//! let (start, end) = day_range(chrono::NaiveDate::from_ymd_opt(2013, 3, 1).unwrap());
//! let daily = reporter.daily_report(&BillingQuery::new(start, end)).await?;
//! # Ok(())
//! # }
//! ```

pub mod pipeline;
pub mod report;
pub mod store;

pub use pipeline::{BillingQuery, pipeline_daily_billing_report, pipeline_hourly_billing_report};
pub use report::{BillingReporter, aggregate_daily, aggregate_hourly};
pub use store::{AnalyticStore, InMemoryAnalyticStore};
