//! Web views
//!
//! Each view answers with the JSON context a page template would render.

pub mod api;
pub mod billing;
pub mod rates;
pub mod simulator;

use axum::Router;
use axum::routing::get;
use std::sync::Arc;

use crate::server::state::AppState;

/// Assemble the view router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/voip_rates/",
            get(rates::voip_rates).post(rates::voip_rates_search),
        )
        .route("/export_rate/", get(rates::export_rate))
        .route(
            "/simulator/",
            get(simulator::simulator).post(simulator::simulator_search),
        )
        .route(
            "/daily_billing_report/",
            get(billing::daily_billing_report).post(billing::daily_billing_search),
        )
        .route(
            "/hourly_billing_report/",
            get(billing::hourly_billing_report).post(billing::hourly_billing_search),
        )
        .route("/api/v1/voip_rate/", get(api::voip_rate))
}

/// Digits-only form value; `Err` carries the message shown next to the field
pub(crate) fn digits_field(raw: &str) -> Result<String, &'static str> {
    let value = raw.trim();
    if value.is_empty() {
        Err("This field is required.")
    } else if !value.chars().all(|c| c.is_ascii_digit()) {
        Err("Enter a whole number.")
    } else {
        Ok(value.to_string())
    }
}
