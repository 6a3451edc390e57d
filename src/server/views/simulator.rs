//! Call simulator view

use axum::Json;
use axum::extract::{Form, State};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use super::digits_field;
use crate::server::auth::{AuthUser, Permission};
use crate::server::error::AppError;
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SimulatorForm {
    #[serde(default)]
    pub destination_no: String,
}

/// GET /simulator/: empty simulator form
pub async fn simulator(
    State(_state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    user.require_permission(Permission::Simulator)?;
    let voipplan_id = user.require_voipplan()?;

    Ok(Json(json!({
        "module": "simulator",
        "form": { "destination_no": "" },
        "voipplan_id": voipplan_id,
        "data": [],
    })))
}

/// POST /simulator/: retail rates for a destination number
pub async fn simulator_search(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Form(form): Form<SimulatorForm>,
) -> Result<Json<Value>, AppError> {
    user.require_permission(Permission::Simulator)?;
    let voipplan_id = user.require_voipplan()?;

    let destination_no = match digits_field(&form.destination_no) {
        Ok(number) => number,
        Err(message) => {
            return Ok(Json(json!({
                "module": "simulator",
                "form": {
                    "destination_no": form.destination_no,
                    "errors": { "destination_no": message },
                },
                "voipplan_id": voipplan_id,
                "data": [],
            })));
        }
    };

    let allowed = state
        .rate_book
        .prefix_allowed_to_call(&destination_no, voipplan_id)?;
    let data = if allowed {
        state.rate_book.simulate(&destination_no, voipplan_id)?
    } else {
        info!("{} is banned for VoIP plan {}", destination_no, voipplan_id);
        Vec::new()
    };

    Ok(Json(json!({
        "module": "simulator",
        "form": { "destination_no": destination_no },
        "voipplan_id": voipplan_id,
        "allowed": allowed,
        "data": data,
    })))
}
