//! Cookie-backed server-side sessions
//!
//! The rate listing keeps the current dialcode and the last fetched rate list
//! per browser session so paging, re-sorting and CSV export reuse them.

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use voipbill_core::types::RateRow;

use crate::server::state::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "sessionid";

/// Values remembered between requests of one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    /// Dialcode of the last prefix search, empty when none
    pub dialcode: String,
    /// Rate list last shown, used by the CSV export
    pub final_rate_list: Vec<RateRow>,
}

/// Sessions idle for longer than this are dropped
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on live sessions; the least recently seen go first
pub const MAX_SESSIONS: usize = 10_000;

#[derive(Debug)]
struct SessionEntry {
    data: SessionData,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(SESSION_IDLE_TTL, MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    fn is_live(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.duration_since(entry.last_seen) <= self.idle_ttl
    }

    /// Mark a live session as seen; expired or unknown ids return false
    pub async fn touch(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(entry) if self.is_live(entry, now) => {
                entry.last_seen = now;
                true
            }
            Some(_) => {
                sessions.remove(id);
                false
            }
            None => false,
        }
    }

    /// Snapshot of a session; unknown or expired ids read as empty
    pub async fn get(&self, id: &str) -> SessionData {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .get(id)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.data.clone())
            .unwrap_or_default()
    }

    pub async fn update<F>(&self, id: &str, f: F)
    where
        F: FnOnce(&mut SessionData),
    {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        self.evict(&mut sessions, id, now);

        let entry = sessions.entry(id.to_string()).or_insert_with(|| SessionEntry {
            data: SessionData::default(),
            last_seen: now,
        });
        entry.last_seen = now;
        f(&mut entry.data);
    }

    /// Drop idle sessions, then the oldest ones if `id` would not fit
    fn evict(&self, sessions: &mut HashMap<String, SessionEntry>, id: &str, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| self.is_live(entry, now));

        if !sessions.contains_key(id) && sessions.len() >= self.max_sessions {
            let mut by_age: Vec<(Instant, String)> = sessions
                .iter()
                .map(|(key, entry)| (entry.last_seen, key.clone()))
                .collect();
            by_age.sort_unstable();
            let excess = sessions.len() + 1 - self.max_sessions;
            for (_, key) in by_age.into_iter().take(excess) {
                sessions.remove(&key);
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} sessions, {} remain", evicted, sessions.len());
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// The session of the current request
///
/// Unknown, expired or missing session cookies start a fresh session; its
/// cookie is set by [`Session::respond`].
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    is_new: bool,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Turn `body` into a response, setting the cookie for new sessions
    pub fn respond(&self, body: impl IntoResponse) -> Response {
        let mut response = body.into_response();
        if self.is_new {
            let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        response
    }
}

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(id) = cookie_value(&parts.headers, SESSION_COOKIE) {
            if state.sessions.touch(&id).await {
                return Ok(Self { id, is_new: false });
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        debug!("Starting session {}", id);
        Ok(Self { id, is_new: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("csrftoken=abc; sessionid=1234; theme=dark"),
        );
        assert_eq!(cookie_value(&headers, "sessionid").as_deref(), Some("1234"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[tokio::test]
    async fn test_store_update_and_get() {
        let store = SessionStore::new();
        assert_eq!(store.get("s1").await, SessionData::default());

        store
            .update("s1", |data| {
                data.dialcode = "34".to_string();
                data.final_rate_list = vec![RateRow::new("34", "Spain", "0.0200")];
            })
            .await;

        let data = store.get("s1").await;
        assert_eq!(data.dialcode, "34");
        assert_eq!(data.final_rate_list.len(), 1);
        assert!(store.touch("s1").await);
        assert!(!store.touch("s2").await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let store = SessionStore::with_limits(Duration::from_millis(20), 100);
        for i in 0..50 {
            store.update(&format!("old{i}"), |data| data.dialcode = "34".into()).await;
        }
        assert_eq!(store.len().await, 50);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("old0").await, SessionData::default());
        assert!(!store.touch("old1").await);

        store.update("fresh", |data| data.dialcode = "32".into()).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("fresh").await.dialcode, "32");
    }

    #[tokio::test]
    async fn test_session_count_is_capped() {
        let store = SessionStore::with_limits(SESSION_IDLE_TTL, 3);
        for id in ["a", "b", "c"] {
            store.update(id, |_| {}).await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        // "a" was seen last, so "b" is now the oldest
        assert!(store.touch("a").await);

        store.update("d", |_| {}).await;
        assert_eq!(store.len().await, 3);
        assert!(!store.touch("b").await);
        assert!(store.touch("a").await);
        assert!(store.touch("c").await);
        assert!(store.touch("d").await);

        // updating a live session never evicts another
        store.update("c", |data| data.dialcode = "1".into()).await;
        assert_eq!(store.len().await, 3);
    }

    #[test]
    fn test_respond_sets_cookie_only_for_new_sessions() {
        let fresh = Session {
            id: "abc".to_string(),
            is_new: true,
        };
        let response = fresh.respond("ok");
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("sessionid=abc;"));

        let known = Session {
            id: "abc".to_string(),
            is_new: false,
        };
        assert!(known.respond("ok").headers().get(SET_COOKIE).is_none());
    }
}
