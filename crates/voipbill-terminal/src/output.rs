//! Output formatting module for voipbill
//!
//! This module provides formatters for displaying billing data in different formats:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output and integration with other tools
//!
//! # Examples
//!
//! ```no_run
//! use voipbill_terminal::output::get_formatter;
//! use voipbill_core::aggregation_types::{BillingTotals, DailyBillingBucket};
//! use voipbill_core::types::DayKey;
//! use chrono::NaiveDate;
//!
//! let buckets = vec![DailyBillingBucket {
//!     timestamp_ms: 1_362_096_000_000,
//!     date: DayKey::new(NaiveDate::from_ymd_opt(2013, 3, 1).unwrap()),
//!     buy_cost_per_day: 1.5,
//!     sell_cost_per_day: 2.25,
//! }];
//! let totals = BillingTotals::from_daily(&buckets);
//!
//! let formatter = get_formatter(false);
//! println!("{}", formatter.format_daily(&buckets, &totals));
//! ```

use colored::Colorize;
use prettytable::{Cell, Row, Table, format, row};
use serde_json::json;
use voipbill_core::aggregation_types::{
    BillingTotals, DailyBillingBucket, HOURS_PER_DAY, HourlyBillingReport,
};
use voipbill_core::types::RateRow;
use voipbill_rates::engine::SimulationRow;

/// Trait for output formatters
///
/// Implementations can provide different output formats (table, JSON, CSV, etc.).
pub trait OutputFormatter {
    /// Format the daily billing report with totals
    fn format_daily(&self, data: &[DailyBillingBucket], totals: &BillingTotals) -> String;

    /// Format the hourly billing report with totals
    fn format_hourly(&self, report: &HourlyBillingReport, totals: &BillingTotals) -> String;

    /// Format a rate listing
    fn format_rates(&self, rates: &[RateRow]) -> String;

    /// Format the simulator result for a dialed number
    fn format_simulation(&self, destination_no: &str, rows: &[SimulationRow]) -> String;
}

/// Table formatter for human-readable output
pub struct TableFormatter {
    /// Whether to color the margin summary (respects NO_COLOR)
    colored_output: bool,
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            colored_output: std::env::var("NO_COLOR").is_err(),
        }
    }

    /// Formatter that never emits ANSI escapes
    pub fn plain() -> Self {
        Self {
            colored_output: false,
        }
    }

    fn format_currency(amount: f64) -> String {
        format!("${amount:.2}")
    }

    fn format_rate(rate: f64) -> String {
        format!("{rate:.4}")
    }

    fn new_table() -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table
    }

    fn format_totals_row(totals: &BillingTotals) -> Row {
        row![
            b -> "TOTAL",
            b -> Self::format_currency(totals.buy_cost),
            b -> Self::format_currency(totals.sell_cost),
            b -> Self::format_currency(totals.margin())
        ]
    }

    fn margin_line(&self, totals: &BillingTotals) -> String {
        let text = format!("Margin: {}", Self::format_currency(totals.margin()));
        if !self.colored_output {
            return text;
        }
        if totals.margin() < 0.0 {
            text.red().bold().to_string()
        } else {
            text.green().to_string()
        }
    }
}

impl OutputFormatter for TableFormatter {
    fn format_daily(&self, data: &[DailyBillingBucket], totals: &BillingTotals) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![b -> "Date", b -> "Buy Cost", b -> "Sell Cost", b -> "Margin"]);

        for bucket in data {
            table.add_row(row![
                bucket.date.format("%Y-%m-%d"),
                r -> Self::format_currency(bucket.buy_cost_per_day),
                r -> Self::format_currency(bucket.sell_cost_per_day),
                r -> Self::format_currency(bucket.sell_cost_per_day - bucket.buy_cost_per_day)
            ]);
        }

        table.add_row(Row::new(vec![Cell::new(""); 4]));
        table.add_row(Self::format_totals_row(totals));

        let mut output = table.to_string();
        output.push_str(&self.margin_line(totals));
        output.push('\n');
        output
    }

    fn format_hourly(&self, report: &HourlyBillingReport, totals: &BillingTotals) -> String {
        let mut output = String::new();

        if report.is_empty() {
            output.push_str("No hourly billing records\n");
            return output;
        }

        for day in report.days() {
            output.push_str(&format!("\n=== {day} ===\n"));

            let buy = report.total_buy_record.get(day);
            let sell = report.total_sell_record.get(day);

            let mut table = Self::new_table();
            table.set_titles(row![b -> "Hour", b -> "Buy Cost", b -> "Sell Cost"]);
            for hour in 0..HOURS_PER_DAY {
                let buy_cost = buy.map_or(0.0, |costs| costs[hour]);
                let sell_cost = sell.map_or(0.0, |costs| costs[hour]);
                table.add_row(row![
                    format!("{hour:02}:00"),
                    r -> Self::format_currency(buy_cost),
                    r -> Self::format_currency(sell_cost)
                ]);
            }
            output.push_str(&table.to_string());
        }

        output.push_str(&format!(
            "\nTotal buy: {}, total sell: {}\n",
            Self::format_currency(totals.buy_cost),
            Self::format_currency(totals.sell_cost)
        ));
        output.push_str(&self.margin_line(totals));
        output.push('\n');
        output
    }

    fn format_rates(&self, rates: &[RateRow]) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![b -> "Prefix", b -> "Destination", b -> "Retail Rate"]);
        for rate in rates {
            table.add_row(row![rate.prefix, rate.destination, r -> rate.retail_rate]);
        }

        let mut output = table.to_string();
        output.push_str(&format!("{} rates\n", rates.len()));
        output
    }

    fn format_simulation(&self, destination_no: &str, rows: &[SimulationRow]) -> String {
        if rows.is_empty() {
            return format!("No rate found for {destination_no}\n");
        }

        let mut table = Self::new_table();
        table.set_titles(row![b -> "VoIP Plan", b -> "Retail Plan", b -> "Retail Rate"]);
        for sim in rows {
            table.add_row(row![
                sim.voipplan_id,
                sim.retail_plan_name,
                r -> Self::format_rate(sim.retail_rate)
            ]);
        }

        format!("Destination: {destination_no}\n{table}")
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_daily(&self, data: &[DailyBillingBucket], totals: &BillingTotals) -> String {
        let output = json!({
            "daily": data.iter().map(|b| json!({
                "timestamp_ms": b.timestamp_ms,
                "date": b.date.format("%Y-%m-%d"),
                "buy_cost_per_day": b.buy_cost_per_day,
                "sell_cost_per_day": b.sell_cost_per_day,
            })).collect::<Vec<_>>(),
            "totals": totals,
        });
        serde_json::to_string_pretty(&output).unwrap_or_default()
    }

    fn format_hourly(&self, report: &HourlyBillingReport, totals: &BillingTotals) -> String {
        let output = json!({
            "total_buy_record": report.total_buy_record,
            "total_sell_record": report.total_sell_record,
            "totals": totals,
        });
        serde_json::to_string_pretty(&output).unwrap_or_default()
    }

    fn format_rates(&self, rates: &[RateRow]) -> String {
        let output = json!({
            "rates": rates,
            "rate_count": rates.len(),
        });
        serde_json::to_string_pretty(&output).unwrap_or_default()
    }

    fn format_simulation(&self, destination_no: &str, rows: &[SimulationRow]) -> String {
        let output = json!({
            "destination_no": destination_no,
            "data": rows,
        });
        serde_json::to_string_pretty(&output).unwrap_or_default()
    }
}

/// Get the formatter for the requested output mode
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter::new())
    }
}
