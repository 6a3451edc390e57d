//! Rate listing and CSV export views

use axum::Json;
use axum::extract::{Form, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::Response;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;
use voipbill_rates::client::RateQuery;
use voipbill_rates::csv_export::{EXPORT_FILENAME, rates_csv_bytes};

use super::digits_field;
use crate::server::auth::{AuthUser, Permission};
use crate::server::error::AppError;
use crate::server::pagination::{PageParams, PaginationVars};
use crate::server::session::Session;
use crate::server::state::AppState;

/// Column headings of the rate table
const RATE_COLUMN_NAME: [(&str, &str); 3] = [
    ("prefix", "Prefix"),
    ("destination", "Destination"),
    ("retail_rate", "Retail Rate"),
];

/// Prefix search form
#[derive(Debug, Default, Deserialize)]
pub struct PrefixForm {
    #[serde(default)]
    pub prefix: String,
}

/// GET /voip_rates/: rate listing, keeping the session dialcode while paging
pub async fn voip_rates(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    session: Session,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    list_rates(&state, &user, &session, &params, None).await
}

/// POST /voip_rates/: rate listing filtered by a new dialcode
pub async fn voip_rates_search(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    session: Session,
    Query(params): Query<PageParams>,
    Form(form): Form<PrefixForm>,
) -> Result<Response, AppError> {
    list_rates(&state, &user, &session, &params, Some(form)).await
}

async fn list_rates(
    state: &AppState,
    user: &AuthUser,
    session: &Session,
    params: &PageParams,
    form: Option<PrefixForm>,
) -> Result<Response, AppError> {
    user.require_permission(Permission::CallRate)?;
    user.require_voipplan()?;

    let vars = PaginationVars::from_params(params, state.config.page_size);
    let mut dialcode = String::new();
    let form_ctx = match form {
        Some(form) => match digits_field(&form.prefix) {
            Ok(code) => {
                let saved = code.clone();
                state
                    .sessions
                    .update(session.id(), move |data| data.dialcode = saved)
                    .await;
                dialcode = code;
                json!({ "prefix": dialcode })
            }
            Err(message) => json!({ "prefix": form.prefix, "errors": { "prefix": message } }),
        },
        None => {
            let saved = state.sessions.get(session.id()).await;
            if !saved.dialcode.is_empty() && params.is_navigation() {
                dialcode = saved.dialcode;
            } else {
                state
                    .sessions
                    .update(session.id(), |data| {
                        data.dialcode.clear();
                        data.final_rate_list.clear();
                    })
                    .await;
            }
            json!({ "prefix": dialcode })
        }
    };

    let query = RateQuery::new(vars.sort_field, vars.sort_order).with_dialcode(dialcode);
    let rates = state
        .rate_client
        .fetch_rates(&query, &user.credentials)
        .await?;
    debug!(
        "Listing {} rates for {} (page {})",
        rates.len(),
        user.user.username,
        vars.page
    );

    let rate_column_name: serde_json::Map<String, Value> = RATE_COLUMN_NAME
        .iter()
        .map(|(key, label)| (key.to_string(), json!(label)))
        .collect();

    let ctx = json!({
        "module": "voip_rates",
        "form": form_ctx,
        "rate_list": vars.slice(&rates),
        "rate_list_count": rates.len(),
        "col_name_with_order": vars.col_name_with_order,
        "page_size": vars.page_size,
        "page": vars.page,
        "rate_column_name": rate_column_name,
        "sort_order": vars.sort_field.as_str(),
        "order": vars.sort_order.as_api_str(),
    });

    state
        .sessions
        .update(session.id(), move |data| data.final_rate_list = rates)
        .await;

    Ok(session.respond(Json(ctx)))
}

/// GET /export_rate/: the session's last rate list as tab-separated CSV
pub async fn export_rate(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    session: Session,
) -> Result<Response, AppError> {
    user.require_permission(Permission::ExportCallRate)?;

    let data = state.sessions.get(session.id()).await;
    let body = rates_csv_bytes(&data.final_rate_list)?;
    debug!("Exporting {} rates", data.final_rate_list.len());

    let headers = [
        (CONTENT_TYPE, "text/csv".to_string()),
        (
            CONTENT_DISPOSITION,
            format!("attachment;filename={EXPORT_FILENAME}"),
        ),
    ];
    Ok(session.respond((headers, body)))
}
