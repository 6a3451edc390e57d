//! HTTP Basic authentication and view guards
//!
//! Users come from a JSON file. Superusers hold every permission and see
//! every account; other users are restricted to their own account code.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use voipbill_core::error::Result;
use voipbill_core::types::{AccountCode, VoipPlanId};
use voipbill_rates::client::Credentials;

use crate::server::error::AppError;
use crate::server::state::AppState;

/// Permissions gating the billing views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    CallRate,
    ExportCallRate,
    Simulator,
    DailyBilling,
    HourlyBilling,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CallRate => "call_rate",
            Permission::ExportCallRate => "export_call_rate",
            Permission::Simulator => "simulator",
            Permission::DailyBilling => "daily_billing",
            Permission::HourlyBilling => "hourly_billing",
        }
    }
}

/// One account from the users file
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub accountcode: Option<AccountCode>,
    #[serde(default)]
    pub voipplan_id: Option<VoipPlanId>,
}

impl UserRecord {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.is_superuser || self.permissions.iter().any(|p| p == permission.as_str())
    }
}

/// Accounts allowed to log in
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, UserRecord>,
}

impl UserDirectory {
    pub fn from_records(records: Vec<UserRecord>) -> Self {
        Self {
            users: records
                .into_iter()
                .map(|user| (user.username.clone(), user))
                .collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<UserRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(records))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let users = Self::from_json_str(&text)?;
        info!("Loaded {} users from {}", users.len(), path.display());
        Ok(users)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// The user with these credentials, if any
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&UserRecord> {
        self.users
            .get(username)
            .filter(|user| constant_time_eq(user.password.as_bytes(), password.as_bytes()))
    }
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Decode an `Authorization: Basic ...` header into username and password
pub fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// The logged-in user of a request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserRecord,
    /// Credentials the request was made with, forwarded to the rate API
    pub credentials: Credentials,
}

impl AuthUser {
    pub fn require_permission(&self, permission: Permission) -> std::result::Result<(), AppError> {
        if self.user.has_permission(permission) {
            Ok(())
        } else {
            warn!(
                "User {} lacks permission {}",
                self.user.username,
                permission.as_str()
            );
            Err(AppError::Forbidden(format!(
                "permission '{}' required",
                permission.as_str()
            )))
        }
    }

    /// The user's VoIP plan; views that price calls need one
    pub fn require_voipplan(&self) -> std::result::Result<VoipPlanId, AppError> {
        self.user.voipplan_id.ok_or_else(|| {
            AppError::Forbidden("no VoIP plan is attached to this account".to_string())
        })
    }

    /// Account filter for billing reports: `None` for superusers, otherwise
    /// the user's own account code, which must exist
    pub fn require_accountcode(&self) -> std::result::Result<Option<AccountCode>, AppError> {
        if self.user.is_superuser {
            return Ok(None);
        }
        match &self.user.accountcode {
            Some(code) if !code.as_str().trim().is_empty() => Ok(Some(code.clone())),
            _ => Err(AppError::Forbidden(
                "no account code is attached to this account".to_string(),
            )),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let (username, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_basic_auth)
            .ok_or(AppError::Unauthorized)?;

        let user = state
            .users
            .authenticate(&username, &password)
            .ok_or_else(|| {
                warn!("Failed login for {}", username);
                AppError::Unauthorized
            })?;

        Ok(Self {
            user: user.clone(),
            credentials: Credentials::new(username, password),
        })
    }
}
