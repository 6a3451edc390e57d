//! Common test utilities for integration tests
//!
//! Fixtures for users, the rate book and analytic documents, plus a helper
//! that runs the full web server on an ephemeral port.

use serde_json::{Value, json};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use voipbill::config::AppConfig;
use voipbill::server::auth::UserDirectory;
use voipbill::server::{AppState, router};
use voipbill_analytics::pipeline::DAILY_ANALYTIC;
use voipbill_analytics::store::InMemoryAnalyticStore;
use voipbill_core::timezone::TimezoneConfig;
use voipbill_rates::engine::RateBook;

/// Users of every test server
///
/// - `admin` is a superuser on VoIP plan 1
/// - `alice` holds every view permission on account 1000, plan 1
/// - `bob` may list rates but has no VoIP plan
/// - `carol` may read daily billing on plan 1 but has no account code
/// - `dave` has a plan and no permissions
#[allow(dead_code)]
pub const USERS_JSON: &str = r#"[
    {"username": "admin", "password": "admin", "is_superuser": true, "voipplan_id": 1},
    {"username": "alice", "password": "secret", "accountcode": "1000", "voipplan_id": 1,
     "permissions": ["call_rate", "export_call_rate", "simulator", "daily_billing", "hourly_billing"]},
    {"username": "bob", "password": "hunter2", "permissions": ["call_rate"]},
    {"username": "carol", "password": "pass", "voipplan_id": 1, "permissions": ["daily_billing"]},
    {"username": "dave", "password": "pass", "voipplan_id": 1}
]"#;

/// Plan 1 draws on a standard and a promo retail plan and bans `3480`
#[allow(dead_code)]
pub const RATE_BOOK_JSON: &str = r#"{
    "voip_plans": [
        {"id": 1, "name": "Default", "retail_plans": [1, 2], "banned_prefixes": ["3480"]}
    ],
    "retail_plans": [
        {"id": 1, "name": "Retail Standard", "rates": [
            {"id": 10, "prefix": "34", "destination": "Spain", "retail_rate": 0.030},
            {"id": 11, "prefix": "34650", "destination": "Spain Mobile", "retail_rate": 0.120},
            {"id": 12, "prefix": "32", "destination": "Belgium", "retail_rate": 0.025}
        ]},
        {"id": 2, "name": "Retail Promo", "rates": [
            {"id": 20, "prefix": "34", "destination": "Spain", "retail_rate": 0.020},
            {"id": 21, "prefix": "1", "destination": "USA", "retail_rate": 0.010}
        ]}
    ]
}"#;

/// Builder for daily analytic documents
#[allow(dead_code)]
pub struct AnalyticDocBuilder {
    day: String,
    switch_id: i64,
    accountcode: String,
    buy_cost_per_day: f64,
    sell_cost_per_day: f64,
    buy_cost_per_hour: serde_json::Map<String, Value>,
    sell_cost_per_hour: serde_json::Map<String, Value>,
}

#[allow(dead_code)]
impl AnalyticDocBuilder {
    /// Document for `day` given as `YYYY-MM-DD`
    pub fn new(day: &str) -> Self {
        Self {
            day: day.to_string(),
            switch_id: 1,
            accountcode: "1000".to_string(),
            buy_cost_per_day: 0.0,
            sell_cost_per_day: 0.0,
            buy_cost_per_hour: serde_json::Map::new(),
            sell_cost_per_hour: serde_json::Map::new(),
        }
    }

    pub fn with_switch(mut self, switch_id: i64) -> Self {
        self.switch_id = switch_id;
        self
    }

    pub fn with_accountcode(mut self, accountcode: &str) -> Self {
        self.accountcode = accountcode.to_string();
        self
    }

    /// Add a call at `hour`; the daily sums follow the hourly ones
    pub fn with_call(mut self, hour: u32, buy: f64, sell: f64) -> Self {
        let key = hour.to_string();
        let add = |map: &mut serde_json::Map<String, Value>, cost: f64| {
            let current = map.get(&key).and_then(Value::as_f64).unwrap_or(0.0);
            map.insert(key.clone(), json!(current + cost));
        };
        add(&mut self.buy_cost_per_hour, buy);
        add(&mut self.sell_cost_per_hour, sell);
        self.buy_cost_per_day += buy;
        self.sell_cost_per_day += sell;
        self
    }

    pub fn build(self) -> Value {
        let compact = self.day.replace('-', "");
        json!({
            "_id": format!("{}-{}-{}", compact, self.switch_id, self.accountcode),
            "metadata": {
                "date": format!("{}T00:00:00", self.day),
                "switch_id": self.switch_id,
                "accountcode": self.accountcode,
            },
            "buy_cost_per_day": self.buy_cost_per_day,
            "sell_cost_per_day": self.sell_cost_per_day,
            "buy_cost_per_hour": self.buy_cost_per_hour,
            "sell_cost_per_hour": self.sell_cost_per_hour,
        })
    }
}

/// Write `contents` to a temporary file that lives as long as the handle
#[allow(dead_code)]
pub fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Write analytic documents as JSON Lines
#[allow(dead_code)]
pub fn jsonl_file(docs: &[Value]) -> NamedTempFile {
    let lines: Vec<String> = docs.iter().map(Value::to_string).collect();
    temp_file(&(lines.join("\n") + "\n"))
}

/// Assert that two floats are equal within 1e-9
#[allow(dead_code)]
pub fn assert_approx_eq(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

/// A web server running on an ephemeral local port
#[allow(dead_code)]
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// An authenticated `application/x-www-form-urlencoded` POST
    pub fn post_form(
        &self,
        path: &str,
        (username, password): (&str, &str),
        fields: &[(&str, &str)],
    ) -> reqwest::RequestBuilder {
        let body: Vec<String> = fields
            .iter()
            .map(|(key, value)| format!("{}={}", form_encode(key), form_encode(value)))
            .collect();
        self.client
            .post(self.url(path))
            .basic_auth(username, Some(password))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body.join("&"))
    }
}

#[allow(dead_code)]
fn form_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// Options for [`spawn_server`]
#[allow(dead_code)]
#[derive(Default)]
pub struct ServerOptions {
    /// Analytic documents loaded into the default collection
    pub docs: Vec<Value>,
    /// External rate API; `None` loops back to the server's own API
    pub rate_api_url: Option<String>,
    pub page_size: Option<usize>,
    pub max_sessions: Option<usize>,
}

#[allow(dead_code)]
fn test_config(options: &ServerOptions) -> AppConfig {
    AppConfig {
        bind: "127.0.0.1".to_string(),
        port: 0,
        rate_api_url: options.rate_api_url.clone(),
        users_path: PathBuf::from("users.json"),
        rate_book_path: None,
        analytic_data: None,
        collection: DAILY_ANALYTIC.to_string(),
        page_size: options.page_size.unwrap_or(10),
        http_timeout: Duration::from_secs(5),
        session_ttl: Duration::from_secs(1800),
        max_sessions: options.max_sessions.unwrap_or(10_000),
        timezone: TimezoneConfig::utc(),
    }
}

/// Start the full router with the fixture users and rate book
#[allow(dead_code)]
pub async fn spawn_server(options: ServerOptions) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = test_config(&options);
    let store = Arc::new(InMemoryAnalyticStore::new());
    if !options.docs.is_empty() {
        store.insert(DAILY_ANALYTIC, options.docs.clone()).await;
    }
    let rate_api_base = config.rate_api_base(&addr);
    let state = AppState::new(
        config,
        UserDirectory::from_json_str(USERS_JSON).unwrap(),
        RateBook::from_json_str(RATE_BOOK_JSON).unwrap(),
        store,
        &rate_api_base,
    )
    .unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
    }
}

/// `name=value` of the session cookie set by a response, if any
#[allow(dead_code)]
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sessionid="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}
