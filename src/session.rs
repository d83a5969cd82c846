use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::track::Track;

pub const SESSION_COOKIE: &str = "strava_tracks_session";

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub access_token: String,
    /// Tracks of the last completed export, keyed by activity id.
    pub tracks: Option<HashMap<String, Track>>,
    last_seen: Instant,
}

/// Server-side sessions keyed by the id carried in the session cookie.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // A poisoned map still holds consistent entries; every write is a single insert.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a session for a freshly authorized user and returns its id.
    pub fn create(&self, username: String, access_token: String) -> String {
        let id = Uuid::new_v4().to_string();
        let session = Session {
            username,
            access_token,
            tracks: None,
            last_seen: Instant::now(),
        };
        self.lock().insert(id.clone(), session);
        id
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.lock();
        let now = Instant::now();
        let expired = match sessions.get_mut(id) {
            None => return None,
            Some(session) if now.duration_since(session.last_seen) > self.ttl => true,
            Some(session) => {
                session.last_seen = now;
                false
            }
        };
        if expired {
            sessions.remove(id);
            return None;
        }
        sessions.get(id).cloned()
    }

    pub fn store_tracks(&self, id: &str, tracks: HashMap<String, Track>) {
        if let Some(session) = self.lock().get_mut(id) {
            session.tracks = Some(tracks);
        }
    }

    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        let ttl = self.ttl;
        sessions.retain(|_, s| s.last_seen.elapsed() <= ttl);
        before - sessions.len()
    }
}

/// `Set-Cookie` value carrying a session id. `secure` marks it https-only.
pub fn session_cookie(id: &str, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
