//! Daily and hourly billing report views
//!
//! Both reports read the daily analytic collection. Superusers see every
//! account; other users only their own account code.

use axum::Json;
use axum::extract::{Form, State};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use voipbill_analytics::pipeline::BillingQuery;
use voipbill_core::aggregation_types::BillingTotals;
use voipbill_core::dates::{DayBound, ceil_strdate, day_range, format_datetime, parse_form_date};
use voipbill_core::types::{AccountCode, SwitchId};

use crate::server::auth::{AuthUser, Permission};
use crate::server::error::AppError;
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DailyBillingForm {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub switch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HourlyBillingForm {
    pub from_date: Option<String>,
    pub switch: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_switch(value: &Option<String>) -> Result<SwitchId, AppError> {
    Ok(non_blank(value).unwrap_or("0").parse::<SwitchId>()?)
}

/// Permission, data-present, account and plan checks shared by both reports
async fn billing_guards(
    state: &AppState,
    user: &AuthUser,
    permission: Permission,
) -> Result<Option<AccountCode>, AppError> {
    user.require_permission(permission)?;
    if !state.reporter.has_records().await? {
        return Err(AppError::NotFound(
            "no call detail records have been collected yet".to_string(),
        ));
    }
    let accountcode = user.require_accountcode()?;
    user.require_voipplan()?;
    Ok(accountcode)
}

async fn daily_context(
    state: &AppState,
    query: BillingQuery,
    search_tag: u8,
    form: Value,
) -> Result<Json<Value>, AppError> {
    let buckets = state.reporter.daily_report(&query).await?;
    let totals = BillingTotals::from_daily(&buckets);

    let total_data: Vec<Value> = buckets
        .iter()
        .map(|b| {
            json!([
                b.timestamp_ms,
                {
                    "buy_cost_per_day": b.buy_cost_per_day,
                    "sell_cost_per_day": b.sell_cost_per_day,
                }
            ])
        })
        .collect();

    Ok(Json(json!({
        "module": "daily_billing_report",
        "form": form,
        "search_tag": search_tag,
        "total_data": total_data,
        "totals": totals,
        "start_date": format_datetime(&query.start),
        "end_date": format_datetime(&query.end),
    })))
}

/// GET /daily_billing_report/: today's daily billing
pub async fn daily_billing_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let accountcode = billing_guards(&state, &user, Permission::DailyBilling).await?;

    let today = state.config.timezone.today();
    let (start, end) = day_range(today);
    let query = BillingQuery::new(start, end).with_accountcode(accountcode);

    let day = today.format("%Y-%m-%d").to_string();
    let form = json!({ "from_date": day, "to_date": day, "switch": "0" });
    daily_context(&state, query, 0, form).await
}

/// POST /daily_billing_report/: daily billing over a date range
pub async fn daily_billing_search(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Form(form): Form<DailyBillingForm>,
) -> Result<Json<Value>, AppError> {
    let accountcode = billing_guards(&state, &user, Permission::DailyBilling).await?;

    let (today_start, today_end) = day_range(state.config.timezone.today());
    let start = match non_blank(&form.from_date) {
        Some(date) => ceil_strdate(date, DayBound::Start)?,
        None => today_start,
    };
    let end = match non_blank(&form.to_date) {
        Some(date) => ceil_strdate(date, DayBound::End)?,
        None => today_end,
    };
    let switch_id = parse_switch(&form.switch)?;

    let query = BillingQuery::new(start, end)
        .with_switch(switch_id)
        .with_accountcode(accountcode);
    let form_ctx = json!({
        "from_date": start.date().format("%Y-%m-%d").to_string(),
        "to_date": end.date().format("%Y-%m-%d").to_string(),
        "switch": switch_id.value().to_string(),
    });
    daily_context(&state, query, 1, form_ctx).await
}

async fn hourly_context(
    state: &AppState,
    day: NaiveDate,
    switch_id: SwitchId,
    accountcode: Option<AccountCode>,
    search_tag: u8,
) -> Result<Json<Value>, AppError> {
    let (start, end) = day_range(day);
    let query = BillingQuery::new(start, end)
        .with_switch(switch_id)
        .with_accountcode(accountcode);
    let report = state.reporter.hourly_report(&query).await?;
    let totals = BillingTotals::from_hourly(&report);

    Ok(Json(json!({
        "module": "hourly_billing_report",
        "form": {
            "from_date": day.format("%Y-%m-%d").to_string(),
            "switch": switch_id.value().to_string(),
        },
        "search_tag": search_tag,
        "total_buy_record": report.total_buy_record,
        "total_sell_record": report.total_sell_record,
        "totals": totals,
        "start_date": format_datetime(&start),
    })))
}

/// GET /hourly_billing_report/: today's hourly billing
pub async fn hourly_billing_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let accountcode = billing_guards(&state, &user, Permission::HourlyBilling).await?;
    let today = state.config.timezone.today();
    hourly_context(&state, today, SwitchId::ALL, accountcode, 0).await
}

/// POST /hourly_billing_report/: hourly billing of one day
pub async fn hourly_billing_search(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Form(form): Form<HourlyBillingForm>,
) -> Result<Json<Value>, AppError> {
    let accountcode = billing_guards(&state, &user, Permission::HourlyBilling).await?;

    let day = match non_blank(&form.from_date) {
        Some(date) => parse_form_date(date)?,
        None => state.config.timezone.today(),
    };
    let switch_id = parse_switch(&form.switch)?;
    hourly_context(&state, day, switch_id, accountcode, 1).await
}
