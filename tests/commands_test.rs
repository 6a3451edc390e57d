//! Integration tests for voipbill CLI commands
//!
//! These tests drive the same building blocks main.rs wires together:
//! JSON Lines loading, the billing reporter, the rate book, CSV export and
//! the output formatters.

mod common;

use common::{AnalyticDocBuilder, RATE_BOOK_JSON, USERS_JSON, assert_approx_eq, jsonl_file, temp_file};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use voipbill::cli::{ServeArgs, TimezoneArgs};
use voipbill::config::AppConfig;
use voipbill::server::AppState;
use voipbill::server::pagination::parse_sort_by;
use voipbill_analytics::pipeline::{BillingQuery, DAILY_ANALYTIC};
use voipbill_analytics::report::BillingReporter;
use voipbill_analytics::store::InMemoryAnalyticStore;
use voipbill_core::aggregation_types::BillingTotals;
use voipbill_core::dates::{DayBound, ceil_strdate, day_range};
use voipbill_core::timezone::TimezoneConfig;
use voipbill_core::types::{AccountCode, SwitchId, VoipPlanId};
use voipbill_rates::csv_export::export_rates_to_path;
use voipbill_rates::engine::RateBook;
use voipbill_terminal::output::{JsonFormatter, OutputFormatter, TableFormatter};

fn analytic_lines() -> String {
    let docs = [
        AnalyticDocBuilder::new("2013-03-01")
            .with_call(9, 1.0, 1.5)
            .with_call(9, 0.5, 0.5)
            .build(),
        AnalyticDocBuilder::new("2013-03-01")
            .with_switch(2)
            .with_accountcode("1001")
            .with_call(23, 2.0, 3.0)
            .build(),
        AnalyticDocBuilder::new("2013-03-03")
            .with_call(0, 0.25, 0.5)
            .build(),
    ];
    let mut lines: Vec<String> = docs.iter().map(Value::to_string).collect();
    // Noise the loader must skip
    lines.insert(1, String::new());
    lines.insert(2, "{not json".to_string());
    lines.push("[1, 2, 3]".to_string());
    lines.join("\n")
}

async fn reporter_from_file(path: &std::path::Path) -> BillingReporter {
    let store = Arc::new(InMemoryAnalyticStore::new());
    let loaded = store.load_jsonl(DAILY_ANALYTIC, path).await.unwrap();
    assert_eq!(loaded, 3);
    BillingReporter::new(store, DAILY_ANALYTIC, TimezoneConfig::utc())
}

#[tokio::test]
async fn test_daily_command_json_output() {
    let file = temp_file(&analytic_lines());
    let reporter = reporter_from_file(file.path()).await;

    let start = ceil_strdate("2013-03-01", DayBound::Start).unwrap();
    let end = ceil_strdate("2013-03-31", DayBound::End).unwrap();
    let buckets = reporter.daily_report(&BillingQuery::new(start, end)).await.unwrap();
    let totals = BillingTotals::from_daily(&buckets);

    let output: Value = serde_json::from_str(&JsonFormatter.format_daily(&buckets, &totals)).unwrap();
    let daily = output["daily"].as_array().unwrap();
    assert_eq!(daily.len(), 2);
    assert_eq!(daily[0]["date"], "2013-03-01");
    assert_eq!(daily[1]["date"], "2013-03-03");
    assert_approx_eq(daily[0]["buy_cost_per_day"].as_f64().unwrap(), 3.5);
    assert_approx_eq(output["totals"]["sell_cost"].as_f64().unwrap(), 5.5);
}

#[tokio::test]
async fn test_daily_command_filters() {
    let file = temp_file(&analytic_lines());
    let reporter = reporter_from_file(file.path()).await;

    let start = ceil_strdate("2013-03-01", DayBound::Start).unwrap();
    let end = ceil_strdate("2013-03-31", DayBound::End).unwrap();

    let query = BillingQuery::new(start, end).with_accountcode(Some(AccountCode::new("1001")));
    let buckets = reporter.daily_report(&query).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_approx_eq(buckets[0].sell_cost_per_day, 3.0);

    let query = BillingQuery::new(start, end).with_switch(SwitchId::new(1));
    let buckets = reporter.daily_report(&query).await.unwrap();
    let totals = BillingTotals::from_daily(&buckets);
    assert_approx_eq(totals.buy_cost, 1.75);
    assert_approx_eq(totals.margin(), 0.75);
}

#[tokio::test]
async fn test_hourly_command_table_output() {
    let file = temp_file(&analytic_lines());
    let reporter = reporter_from_file(file.path()).await;

    let (start, end) = day_range(chrono::NaiveDate::from_ymd_opt(2013, 3, 1).unwrap());
    let report = reporter.hourly_report(&BillingQuery::new(start, end)).await.unwrap();
    assert_approx_eq(report.total_buy_record["2013-03-01"][9], 1.5);
    assert_approx_eq(report.total_sell_record["2013-03-01"][23], 3.0);

    let totals = BillingTotals::from_hourly(&report);
    let table = TableFormatter::plain().format_hourly(&report, &totals);
    assert!(table.contains("2013-03-01"));
    assert!(table.contains("23:00"));
}

#[tokio::test]
async fn test_missing_analytic_file_is_an_error() {
    let store = InMemoryAnalyticStore::new();
    let result = store
        .load_jsonl(DAILY_ANALYTIC, std::path::Path::new("/nonexistent/daily.jsonl"))
        .await;
    assert!(result.is_err());
}

#[test]
fn test_rates_command_sorted_descending() {
    let book_file = temp_file(RATE_BOOK_JSON);
    let book = RateBook::load(book_file.path()).unwrap();

    let (field, order) = parse_sort_by("-retail_rate");
    let rates = book.rate_listing(VoipPlanId::new(1), None, field, order).unwrap();
    let prefixes: Vec<&str> = rates.iter().map(|r| r.prefix.as_str()).collect();
    assert_eq!(prefixes, vec!["34650", "32", "34", "1"]);

    let output: Value = serde_json::from_str(&JsonFormatter.format_rates(&rates)).unwrap();
    assert_eq!(output["rate_count"], 4);
    assert_eq!(output["rates"][0]["retail_rate"], "0.1200");
}

#[test]
fn test_export_rates_command_writes_file() {
    let book_file = temp_file(RATE_BOOK_JSON);
    let book = RateBook::load(book_file.path()).unwrap();
    let (field, order) = parse_sort_by("prefix");
    let rates = book
        .rate_listing(VoipPlanId::new(1), Some("32123"), field, order)
        .unwrap();

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("call_rate.csv");
    export_rates_to_path(&output, &rates).unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        written,
        "prefix\tdestination\tretail_rate\r\n32\tBelgium\t0.0250\r\n"
    );
}

#[test]
fn test_simulate_command_output() {
    let book = RateBook::from_json_str(RATE_BOOK_JSON).unwrap();
    let plan = VoipPlanId::new(1);

    let rows = book.simulate("3225551234", plan).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].retail_plan_name, "Retail Standard");

    let table = TableFormatter::plain().format_simulation("3225551234", &rows);
    assert!(table.contains("Retail Standard"));

    let banned = book.simulate("3480123", plan).unwrap();
    assert_eq!(
        TableFormatter::plain().format_simulation("3480123", &banned),
        "No rate found for 3480123\n"
    );

    assert!(book.simulate("34", VoipPlanId::new(7)).is_err());
}

fn serve_args(users: PathBuf, rate_book: PathBuf, analytic_data: PathBuf) -> ServeArgs {
    ServeArgs {
        bind: "127.0.0.1".to_string(),
        port: 0,
        rate_api_url: None,
        users,
        rate_book: Some(rate_book),
        analytic_data: Some(analytic_data),
        collection: DAILY_ANALYTIC.to_string(),
        page_size: 10,
        http_timeout_secs: 5,
        session_ttl_secs: 1800,
        max_sessions: 10_000,
    }
}

#[tokio::test]
async fn test_serve_state_from_files() {
    let users = temp_file(USERS_JSON);
    let book = temp_file(RATE_BOOK_JSON);
    let docs = jsonl_file(&[AnalyticDocBuilder::new("2013-03-01").with_call(1, 1.0, 2.0).build()]);

    let args = serve_args(
        users.path().to_path_buf(),
        book.path().to_path_buf(),
        docs.path().to_path_buf(),
    );
    let tz = TimezoneArgs {
        timezone: None,
        utc: true,
    };
    let config = AppConfig::from_args(&args, &tz).unwrap();
    let local: std::net::SocketAddr = "127.0.0.1:9000".parse().unwrap();
    let state = AppState::from_config(config, local).await.unwrap();

    assert_eq!(state.users.len(), 5);
    assert!(state.users.authenticate("alice", "secret").is_some());
    assert!(state.users.authenticate("alice", "guess").is_none());
    assert!(state.reporter.has_records().await.unwrap());
    assert_eq!(state.rate_client.base_url().as_str(), "http://127.0.0.1:9000/");
    assert!(
        state
            .rate_book
            .prefix_allowed_to_call("34650123", VoipPlanId::new(1))
            .unwrap()
    );
}

#[tokio::test]
async fn test_serve_state_requires_users_file() {
    let book = temp_file(RATE_BOOK_JSON);
    let docs = jsonl_file(&[]);
    let args = serve_args(
        PathBuf::from("/nonexistent/users.json"),
        book.path().to_path_buf(),
        docs.path().to_path_buf(),
    );
    let config = AppConfig::from_args(&args, &TimezoneArgs::default()).unwrap();
    let local: std::net::SocketAddr = "127.0.0.1:9000".parse().unwrap();
    assert!(AppState::from_config(config, local).await.is_err());
}
