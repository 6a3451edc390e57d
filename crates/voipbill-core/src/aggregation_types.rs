//! Aggregation data types for voipbill
//!
//! Pure data structures for daily and hourly billing summaries.
//! These types have no dependencies on the analytic store.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use crate::types::DayKey;

/// Number of hour slots in an hourly bucket
pub const HOURS_PER_DAY: usize = 24;

/// Buy and sell cost for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBillingBucket {
    /// Epoch milliseconds of local midnight
    pub timestamp_ms: i64,
    /// Calendar day of the bucket
    pub date: DayKey,
    /// Cumulative carrier cost
    pub buy_cost_per_day: f64,
    /// Cumulative retail cost
    pub sell_cost_per_day: f64,
}

/// Dense per-hour costs for one day, hours 0 through 23
///
/// Serializes as a map keyed by hour so the JSON shape matches what report
/// consumers expect (`{"0": 1.5, "1": 0.0, ...}`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HourlyCosts([f64; HOURS_PER_DAY]);

impl HourlyCosts {
    /// All 24 hours set to zero
    pub fn zeroed() -> Self {
        Self([0.0; HOURS_PER_DAY])
    }

    /// Add `cost` to `hour`; returns false when the hour is out of range
    pub fn add(&mut self, hour: usize, cost: f64) -> bool {
        match self.0.get_mut(hour) {
            Some(slot) => {
                *slot += cost;
                true
            }
            None => false,
        }
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0.iter().copied().enumerate()
    }
}

impl Index<usize> for HourlyCosts {
    type Output = f64;

    fn index(&self, hour: usize) -> &f64 {
        &self.0[hour]
    }
}

impl IndexMut<usize> for HourlyCosts {
    fn index_mut(&mut self, hour: usize) -> &mut f64 {
        &mut self.0[hour]
    }
}

impl Serialize for HourlyCosts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(HOURS_PER_DAY))?;
        for (hour, cost) in self.iter() {
            map.serialize_entry(&hour, &cost)?;
        }
        map.end()
    }
}

/// Hourly buy and sell records keyed by `YYYY-MM-DD`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HourlyBillingReport {
    pub total_buy_record: BTreeMap<String, HourlyCosts>,
    pub total_sell_record: BTreeMap<String, HourlyCosts>,
}

impl HourlyBillingReport {
    pub fn is_empty(&self) -> bool {
        self.total_buy_record.is_empty() && self.total_sell_record.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = &String> {
        self.total_buy_record.keys()
    }
}

/// Buy/sell totals across a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingTotals {
    pub buy_cost: f64,
    pub sell_cost: f64,
}

impl BillingTotals {
    pub fn from_daily(buckets: &[DailyBillingBucket]) -> Self {
        let mut totals = Self::default();
        for bucket in buckets {
            totals.buy_cost += bucket.buy_cost_per_day;
            totals.sell_cost += bucket.sell_cost_per_day;
        }
        totals
    }

    pub fn from_hourly(report: &HourlyBillingReport) -> Self {
        Self {
            buy_cost: report.total_buy_record.values().map(HourlyCosts::total).sum(),
            sell_cost: report.total_sell_record.values().map(HourlyCosts::total).sum(),
        }
    }

    /// Retail minus carrier cost
    pub fn margin(&self) -> f64 {
        self.sell_cost - self.buy_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_costs_add_and_bounds() {
        let mut costs = HourlyCosts::zeroed();
        assert!(costs.add(0, 1.5));
        assert!(costs.add(23, 2.0));
        assert!(costs.add(23, 0.5));
        assert!(!costs.add(24, 9.0));
        assert_eq!(costs[0], 1.5);
        assert_eq!(costs[23], 2.5);
        assert_eq!(costs.total(), 4.0);
    }

    #[test]
    fn test_hourly_costs_serializes_dense_map() {
        let mut costs = HourlyCosts::zeroed();
        costs[5] = 3.25;
        let value = serde_json::to_value(costs).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 24);
        assert_eq!(map["0"], 0.0);
        assert_eq!(map["5"], 3.25);
        assert_eq!(map["23"], 0.0);
    }

    #[test]
    fn test_totals_margin() {
        let day = DayKey::new(chrono::NaiveDate::from_ymd_opt(2013, 3, 1).unwrap());
        let buckets = vec![
            DailyBillingBucket {
                timestamp_ms: 0,
                date: day,
                buy_cost_per_day: 1.0,
                sell_cost_per_day: 1.5,
            },
            DailyBillingBucket {
                timestamp_ms: 86_400_000,
                date: day,
                buy_cost_per_day: 2.0,
                sell_cost_per_day: 3.0,
            },
        ];
        let totals = BillingTotals::from_daily(&buckets);
        assert_eq!(totals.buy_cost, 3.0);
        assert_eq!(totals.sell_cost, 4.5);
        assert_eq!(totals.margin(), 1.5);
    }
}
