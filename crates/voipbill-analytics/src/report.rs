//! Daily and hourly billing reports
//!
//! Grouped analytic documents are reshaped into chart-ready structures:
//!
//! - Daily: one bucket per day keyed by the epoch milliseconds of local
//!   midnight, buy and sell costs summed, ascending by key.
//! - Hourly: per-day dense 24-slot buy and sell arrays keyed by `YYYY-MM-DD`.
//!
//! Costs may arrive as JSON numbers or numeric strings.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use voipbill_analytics::report::aggregate_daily;
//! use voipbill_core::timezone::TimezoneConfig;
//!
//! let docs = vec![json!({
//!     "_id": "20130301",
//!     "buy_cost_per_day": 1.5,
//!     "sell_cost_per_day": "2.25",
//! })];
//! let buckets = aggregate_daily(&docs, &TimezoneConfig::utc()).unwrap();
//! assert_eq!(buckets[0].timestamp_ms, 1_362_096_000_000);
//! assert_eq!(buckets[0].sell_cost_per_day, 2.25);
//! ```

use crate::pipeline::{BillingQuery, pipeline_daily_billing_report, pipeline_hourly_billing_report};
use crate::store::AnalyticStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use voipbill_core::aggregation_types::{DailyBillingBucket, HourlyBillingReport, HourlyCosts};
use voipbill_core::error::{BillingError, Result};
use voipbill_core::timezone::TimezoneConfig;
use voipbill_core::types::DayKey;

fn document_id(doc: &Value) -> Result<&str> {
    doc.get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| BillingError::InvalidDocument(format!("document has no string _id: {doc}")))
}

/// Read a cost that may be a number or a numeric string
fn cost_value(value: &Value, field: &str) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| BillingError::InvalidDocument(format!("{field} is not a number: {value}")))
}

fn cost_field(doc: &Value, field: &str) -> Result<f64> {
    let value = doc
        .get(field)
        .ok_or_else(|| BillingError::InvalidDocument(format!("document is missing {field}")))?;
    cost_value(value, field)
}

struct DailyAccumulator {
    date: DayKey,
    buy_cost: f64,
    sell_cost: f64,
}

impl DailyAccumulator {
    fn new(date: DayKey) -> Self {
        Self {
            date,
            buy_cost: 0.0,
            sell_cost: 0.0,
        }
    }

    fn add(&mut self, buy: f64, sell: f64) {
        self.buy_cost += buy;
        self.sell_cost += sell;
    }

    fn into_bucket(self, timestamp_ms: i64) -> DailyBillingBucket {
        DailyBillingBucket {
            timestamp_ms,
            date: self.date,
            buy_cost_per_day: self.buy_cost,
            sell_cost_per_day: self.sell_cost,
        }
    }
}

/// Reshape daily grouped documents into buckets keyed by local midnight
///
/// Documents mapping to the same key are summed, and the result is ordered
/// by key ascending regardless of input order.
pub fn aggregate_daily(docs: &[Value], timezone: &TimezoneConfig) -> Result<Vec<DailyBillingBucket>> {
    let mut buckets: BTreeMap<i64, DailyAccumulator> = BTreeMap::new();

    for doc in docs {
        let day = DayKey::from_analytic_id(document_id(doc)?)?;
        let buy = cost_field(doc, "buy_cost_per_day")?;
        let sell = cost_field(doc, "sell_cost_per_day")?;

        let key = timezone.midnight_millis(*day.inner());
        buckets
            .entry(key)
            .or_insert_with(|| DailyAccumulator::new(day))
            .add(buy, sell);
    }

    Ok(buckets
        .into_iter()
        .map(|(key, acc)| acc.into_bucket(key))
        .collect())
}

/// Add every hour map found in `value` onto `costs`
///
/// `value` is either one `{hour: cost}` map or an array of them, as produced
/// by a `$push` accumulator.
fn overlay_hours(costs: &mut HourlyCosts, value: &Value, field: &str, day: &str) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                overlay_hours(costs, item, field, day)?;
            }
        }
        Value::Object(hours) => {
            for (hour, cost) in hours {
                let slot = hour.trim().parse::<usize>().map_err(|_| {
                    BillingError::InvalidDocument(format!("{field} has non-numeric hour '{hour}'"))
                })?;
                let cost = cost_value(cost, field)?;
                if !costs.add(slot, cost) {
                    warn!("Ignoring {} hour {} outside 0-23 on {}", field, slot, day);
                }
            }
        }
        Value::Null => {}
        other => {
            return Err(BillingError::InvalidDocument(format!(
                "{field} must be an hour map, got {other}"
            )));
        }
    }
    Ok(())
}

/// Reshape hourly grouped documents into dense per-day hour arrays
///
/// Every day present gets all 24 hours, zero where no cost was recorded.
/// Documents sharing a day accumulate.
pub fn aggregate_hourly(docs: &[Value]) -> Result<HourlyBillingReport> {
    let mut report = HourlyBillingReport::default();

    for doc in docs {
        let day = DayKey::from_analytic_id(document_id(doc)?)?.to_string();

        let buy = report
            .total_buy_record
            .entry(day.clone())
            .or_insert_with(HourlyCosts::zeroed);
        if let Some(value) = doc.get("buy_cost_per_hour") {
            overlay_hours(buy, value, "buy_cost_per_hour", &day)?;
        }

        let sell = report
            .total_sell_record
            .entry(day.clone())
            .or_insert_with(HourlyCosts::zeroed);
        if let Some(value) = doc.get("sell_cost_per_hour") {
            overlay_hours(sell, value, "sell_cost_per_hour", &day)?;
        }
    }

    Ok(report)
}

/// Runs billing pipelines against a store and shapes the results
pub struct BillingReporter {
    store: Arc<dyn AnalyticStore>,
    collection: String,
    timezone: TimezoneConfig,
}

impl BillingReporter {
    pub fn new(
        store: Arc<dyn AnalyticStore>,
        collection: impl Into<String>,
        timezone: TimezoneConfig,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            timezone,
        }
    }

    pub fn timezone(&self) -> &TimezoneConfig {
        &self.timezone
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether the analytic collection holds any documents
    pub async fn has_records(&self) -> Result<bool> {
        Ok(self.store.count(&self.collection).await? > 0)
    }

    pub async fn daily_report(&self, query: &BillingQuery) -> Result<Vec<DailyBillingBucket>> {
        debug!("Aggregate daily billing analytic");
        let pipeline = pipeline_daily_billing_report(query);

        debug!("Before Aggregate");
        let docs = self.store.aggregate(&self.collection, &pipeline).await?;
        debug!("After Aggregate");

        aggregate_daily(&docs, &self.timezone)
    }

    pub async fn hourly_report(&self, query: &BillingQuery) -> Result<HourlyBillingReport> {
        debug!("Aggregate hourly billing analytic");
        let pipeline = pipeline_hourly_billing_report(query);

        debug!("Before Aggregate");
        let docs = self.store.aggregate(&self.collection, &pipeline).await?;
        debug!("After Aggregate");

        aggregate_hourly(&docs)
    }
}
