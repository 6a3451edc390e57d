//! Rate API
//!
//! Serves the rate listing of the caller's VoIP plan as a bracketed list of
//! dict literals, the body format the rate listing view parses.

use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use voipbill_core::types::{RateSortField, SortOrder};
use voipbill_rates::parser::encode_rate_list;

use crate::server::auth::AuthUser;
use crate::server::error::AppError;
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RateApiParams {
    pub dialcode: Option<String>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
}

/// GET /api/v1/voip_rate/
pub async fn voip_rate(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<RateApiParams>,
) -> Result<Response, AppError> {
    let voipplan_id = user.require_voipplan()?;

    let sort_field = match params.sort_field.as_deref().map(str::trim) {
        Some(field) if !field.is_empty() => field.parse::<RateSortField>()?,
        _ => RateSortField::default(),
    };
    let sort_order = params
        .sort_order
        .as_deref()
        .unwrap_or_default()
        .parse::<SortOrder>()?;

    let rows = state.rate_book.rate_listing(
        voipplan_id,
        params.dialcode.as_deref(),
        sort_field,
        sort_order,
    )?;
    debug!(
        "Rate API: {} rows for VoIP plan {} ({} {})",
        rows.len(),
        voipplan_id,
        sort_field,
        sort_order
    );

    Ok((
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        encode_rate_list(&rows),
    )
        .into_response())
}
