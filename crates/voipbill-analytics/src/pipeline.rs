//! Aggregation pipeline construction
//!
//! Daily analytic documents carry their day as the first eight characters of
//! `_id`, so both reports group on `$substr(_id, 0, 8)`.

use chrono::NaiveDateTime;
use serde_json::{Map, Value, json};
use voipbill_core::dates::format_datetime;
use voipbill_core::types::{AccountCode, SwitchId};

/// Default name of the daily analytic collection
pub const DAILY_ANALYTIC: &str = "daily_analytic";

/// Filter shared by the daily and hourly billing reports
#[derive(Debug, Clone, PartialEq)]
pub struct BillingQuery {
    /// Inclusive lower bound on `metadata.date`
    pub start: NaiveDateTime,
    /// Exclusive upper bound on `metadata.date`
    pub end: NaiveDateTime,
    pub switch_id: SwitchId,
    /// Restricts results to one account; `None` for superusers
    pub accountcode: Option<AccountCode>,
}

impl BillingQuery {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            switch_id: SwitchId::ALL,
            accountcode: None,
        }
    }

    pub fn with_switch(mut self, switch_id: SwitchId) -> Self {
        self.switch_id = switch_id;
        self
    }

    pub fn with_accountcode(mut self, accountcode: Option<AccountCode>) -> Self {
        self.accountcode = accountcode;
        self
    }

    /// The `$match` condition for this query
    pub fn match_document(&self) -> Value {
        let mut cond = Map::new();
        if !self.switch_id.is_all() {
            cond.insert("metadata.switch_id".to_string(), json!(self.switch_id.value()));
        }
        cond.insert(
            "metadata.date".to_string(),
            json!({
                "$gte": format_datetime(&self.start),
                "$lt": format_datetime(&self.end),
            }),
        );
        if let Some(code) = &self.accountcode {
            cond.insert("metadata.accountcode".to_string(), json!(code.as_str()));
        }
        Value::Object(cond)
    }
}

fn day_of_id() -> Value {
    json!({ "$substr": ["$_id", 0, 8] })
}

/// Pipeline summing buy and sell cost per day
pub fn pipeline_daily_billing_report(query: &BillingQuery) -> Vec<Value> {
    vec![
        json!({ "$match": query.match_document() }),
        json!({
            "$group": {
                "_id": day_of_id(),
                "buy_cost_per_day": { "$sum": "$buy_cost_per_day" },
                "sell_cost_per_day": { "$sum": "$sell_cost_per_day" },
            }
        }),
        json!({
            "$project": {
                "buy_cost_per_day": 1,
                "sell_cost_per_day": 1,
            }
        }),
        json!({ "$sort": { "_id": 1 } }),
    ]
}

/// Pipeline collecting the per-hour cost maps of each day
pub fn pipeline_hourly_billing_report(query: &BillingQuery) -> Vec<Value> {
    vec![
        json!({ "$match": query.match_document() }),
        json!({
            "$group": {
                "_id": day_of_id(),
                "buy_cost_per_hour": { "$push": "$buy_cost_per_hour" },
                "sell_cost_per_hour": { "$push": "$sell_cost_per_hour" },
            }
        }),
        json!({ "$sort": { "_id": 1 } }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use voipbill_core::dates::day_range;

    fn query() -> BillingQuery {
        let (start, end) = day_range(chrono::NaiveDate::from_ymd_opt(2013, 3, 1).unwrap());
        BillingQuery::new(start, end)
    }

    #[test]
    fn test_match_document_for_superuser_all_switches() {
        let cond = query().match_document();
        let map = cond.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(cond["metadata.date"]["$gte"], "2013-03-01T00:00:00.000000");
        assert_eq!(cond["metadata.date"]["$lt"], "2013-03-01T23:59:59.999999");
    }

    #[test]
    fn test_match_document_with_switch_and_account() {
        let cond = query()
            .with_switch(SwitchId::new(2))
            .with_accountcode(Some(AccountCode::new("1000")))
            .match_document();
        assert_eq!(cond["metadata.switch_id"], 2);
        assert_eq!(cond["metadata.accountcode"], "1000");
    }

    #[test]
    fn test_daily_pipeline_shape() {
        let pipeline = pipeline_daily_billing_report(&query());
        let stages: Vec<&str> = pipeline
            .iter()
            .map(|s| s.as_object().unwrap().keys().next().unwrap().as_str())
            .collect();
        assert_eq!(stages, vec!["$match", "$group", "$project", "$sort"]);
        assert_eq!(pipeline[1]["$group"]["buy_cost_per_day"]["$sum"], "$buy_cost_per_day");
    }

    #[test]
    fn test_hourly_pipeline_pushes_hour_maps() {
        let pipeline = pipeline_hourly_billing_report(&query());
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline[1]["$group"]["sell_cost_per_hour"]["$push"], "$sell_cost_per_hour");
        assert_eq!(pipeline[1]["$group"]["_id"]["$substr"][2], 8);
    }
}
