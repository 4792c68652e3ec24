//! Sessions and the stores that keep them between requests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppError, Result, request::Request, response::Response};

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    name: String,
    values: HashMap<String, Value>,
    is_new: bool,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            values: HashMap::new(),
            is_new: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        self.values.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }
}

/// Backing store for sessions. Implementations must be safe to share
/// across concurrently running requests.
pub trait SessionStore: Send + Sync {
    /// Session named `name` referenced by `request`.
    fn get(&self, request: &Request, name: &str) -> Result<Session>;

    fn new_session(&self, name: &str) -> Result<Session>;

    /// Persist `session` and reference it from `response`.
    fn save(&self, response: &mut Response, session: &Session) -> Result<()>;
}

struct StoredSession {
    values: HashMap<String, Value>,
    expires_at: DateTime<Utc>,
}

/// Saves between two sweeps of expired sessions.
const PURGE_INTERVAL: usize = 64;

/// In-process store keyed by a random id kept in a cookie.
///
/// Expired sessions are dropped when looked up and swept every
/// [`PURGE_INTERVAL`] saves.
pub struct MemorySessionStore {
    sessions: DashMap<String, StoredSession>,
    max_age: Duration,
    path: String,
    saves: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new(max_age_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            max_age: Duration::seconds(
                i64::try_from(max_age_secs)
                    .unwrap_or(i64::MAX)
                    .min(i64::MAX / 1000),
            ),
            path: "/".into(),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop expired sessions.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, stored| stored.expires_at > now);
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, request: &Request, name: &str) -> Result<Session> {
        let id = request
            .cookie(name)
            .ok_or_else(|| AppError::SessionError(format!("no \"{name}\" cookie")))?;

        let now = Utc::now();
        let values = self
            .sessions
            .get(id)
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.values.clone());
        let Some(values) = values else {
            self.sessions
                .remove_if(id, |_, stored| stored.expires_at <= now);
            return Err(AppError::SessionError(format!("session {id} not found")));
        };

        Ok(Session {
            id: id.to_owned(),
            name: name.to_owned(),
            values,
            is_new: false,
        })
    }

    fn new_session(&self, name: &str) -> Result<Session> {
        Ok(Session::new(name))
    }

    fn save(&self, response: &mut Response, session: &Session) -> Result<()> {
        if self.saves.fetch_add(1, Ordering::Relaxed) % PURGE_INTERVAL == PURGE_INTERVAL - 1 {
            self.purge_expired();
        }
        self.sessions.insert(
            session.id.clone(),
            StoredSession {
                values: session.values.clone(),
                expires_at: Utc::now() + self.max_age,
            },
        );

        let cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly",
            session.name,
            session.id,
            self.path,
            self.max_age.num_seconds()
        );
        response.add_header("set-cookie", &cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Bytes, http};

    fn request_with_cookie(cookie: &str) -> Request {
        http::Request::builder()
            .uri("/")
            .header(http::header::COOKIE, cookie)
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    #[test]
    fn test_session_values() {
        let mut session = Session::new("SID");
        session.set("user_id", 42).unwrap();
        assert_eq!(session.get::<i64>("user_id"), Some(42));
        assert_eq!(session.get::<String>("user_id"), None);
        assert!(session.remove("user_id").is_some());
        assert!(session.values().is_empty());
        assert!(session.is_new());
    }

    #[test]
    fn test_memory_store_round_trip_through_cookie() {
        let store = MemorySessionStore::new(60);
        let mut session = store.new_session("SID").unwrap();
        session.set("flash", "saved").unwrap();

        let mut response = Response::new();
        store.save(&mut response, &session).unwrap();
        let cookie = response.headers()["set-cookie"].to_str().unwrap().to_owned();
        assert!(cookie.starts_with(&format!("SID={}", session.id())));
        assert!(cookie.contains("Max-Age=60"));

        let request = request_with_cookie(&format!("SID={}", session.id()));
        let loaded = store.get(&request, "SID").unwrap();
        assert!(!loaded.is_new());
        assert_eq!(loaded.get::<String>("flash").as_deref(), Some("saved"));
    }

    #[test]
    fn test_memory_store_unknown_session_is_error() {
        let store = MemorySessionStore::new(60);
        let request = request_with_cookie("SID=unknown");
        assert!(matches!(store.get(&request, "SID"), Err(AppError::SessionError(_))));
    }

    #[test]
    fn test_expired_sessions_are_not_returned() {
        let store = MemorySessionStore::new(0);
        let session = store.new_session("SID").unwrap();
        let mut response = Response::new();
        store.save(&mut response, &session).unwrap();

        let request = request_with_cookie(&format!("SID={}", session.id()));
        assert!(store.get(&request, "SID").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_sessions_are_swept_on_save() {
        let store = MemorySessionStore::new(0);
        let mut response = Response::new();
        for _ in 0..1000 {
            let session = store.new_session("SID").unwrap();
            store.save(&mut response, &session).unwrap();
        }
        assert!(store.len() <= PURGE_INTERVAL);

        store.purge_expired();
        assert!(store.is_empty());
    }
}
