//! Session and global variables (spec.md §5, §6): `(user, current_space,
//! idle_duration, global_variable_holder_ref)` per session, plus the
//! process-wide global variable holder queries can read and set. Matches
//! the teacher's choice of `RwLock`-guarded registries for state that's
//! read far more than written (`codec::schema::SchemaRegistry`,
//! `graph::space::SpaceManager`).

use crate::codec::Value;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

pub type SessionId = u64;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user: String,
    pub current_space: Option<u32>,
    created_at: Instant,
    last_active: Instant,
}

impl Session {
    fn new(id: SessionId, user: String) -> Self {
        let now = Instant::now();
        Self { id, user, current_space: None, created_at: now, last_active: now }
    }

    pub fn idle_duration(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Process-wide holder for session (global) variables, guarded by one
/// `RwLock` per spec.md §5 ("Global variables... live in a process-wide
/// holder guarded by a reader-writer lock").
#[derive(Default)]
pub struct GlobalVariableHolder {
    vars: RwLock<HashMap<String, Value>>,
}

impl GlobalVariableHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.read().unwrap().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.vars.write().unwrap().insert(name.into(), value);
    }

    pub fn unset(&self, name: &str) -> Option<Value> {
        self.vars.write().unwrap().remove(name)
    }
}

/// Authenticates sessions and tracks their idle time; `idle_timeout`
/// expiry is checked lazily on lookup rather than with a background sweep,
/// matching the teacher's preference for on-demand checks over polling
/// threads outside of Raft/log-monitor's own timers.
pub struct SessionManager {
    next_id: AtomicU64,
    sessions: RwLock<HashMap<SessionId, Session>>,
    idle_timeout: Duration,
    pub globals: GlobalVariableHolder,
}

impl SessionManager {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            globals: GlobalVariableHolder::new(),
        }
    }

    /// `authenticate(user, pass)` (spec.md §6). Password verification is an
    /// external collaborator's concern (auth backend); here any non-empty
    /// credential pair succeeds, mirroring the CLI's bootstrap-only scope.
    pub fn authenticate(&self, user: &str, password: &str) -> Result<SessionId> {
        if user.is_empty() || password.is_empty() {
            return Err(Error::BadUserPassword);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sessions.write().unwrap().insert(id, Session::new(id, user.to_string()));
        Ok(id)
    }

    pub fn signout(&self, id: SessionId) {
        self.sessions.write().unwrap().remove(&id);
    }

    /// Looks up a session, expiring (and removing) it if it has been idle
    /// longer than `idle_timeout`. Every lookup counts as activity.
    pub fn touch(&self, id: SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        let expired = match sessions.get(&id) {
            Some(s) => s.idle_duration() > self.idle_timeout,
            None => return Err(Error::SessionInvalid),
        };
        if expired {
            sessions.remove(&id);
            return Err(Error::SessionTimeout);
        }
        let session = sessions.get_mut(&id).unwrap();
        session.last_active = Instant::now();
        Ok(())
    }

    pub fn set_current_space(&self, id: SessionId, space_id: u32) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        let session = sessions.get_mut(&id).ok_or(Error::SessionInvalid)?;
        session.current_space = Some(space_id);
        Ok(())
    }

    pub fn current_space(&self, id: SessionId) -> Result<Option<u32>> {
        self.sessions.read().unwrap().get(&id).map(|s| s.current_space).ok_or(Error::SessionInvalid)
    }

    pub fn user(&self, id: SessionId) -> Result<String> {
        self.sessions.read().unwrap().get(&id).map(|s| s.user.clone()).ok_or(Error::SessionInvalid)
    }

    pub fn idle_duration(&self, id: SessionId) -> Result<Duration> {
        self.sessions.read().unwrap().get(&id).map(|s| s.idle_duration()).ok_or(Error::SessionInvalid)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_rejects_empty_credentials() {
        let mgr = SessionManager::new(Duration::from_secs(60));
        assert!(matches!(mgr.authenticate("", "pw"), Err(Error::BadUserPassword)));
        assert!(matches!(mgr.authenticate("u", ""), Err(Error::BadUserPassword)));
    }

    #[test]
    fn signout_invalidates_the_session() {
        let mgr = SessionManager::new(Duration::from_secs(60));
        let id = mgr.authenticate("root", "nebula").unwrap();
        mgr.touch(id).unwrap();
        mgr.signout(id);
        assert!(matches!(mgr.touch(id), Err(Error::SessionInvalid)));
    }

    #[test]
    fn current_space_round_trips() {
        let mgr = SessionManager::new(Duration::from_secs(60));
        let id = mgr.authenticate("root", "nebula").unwrap();
        assert_eq!(mgr.current_space(id).unwrap(), None);
        mgr.set_current_space(id, 7).unwrap();
        assert_eq!(mgr.current_space(id).unwrap(), Some(7));
    }

    #[test]
    fn idle_session_times_out() {
        let mgr = SessionManager::new(Duration::from_millis(1));
        let id = mgr.authenticate("root", "nebula").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(mgr.touch(id), Err(Error::SessionTimeout)));
        assert!(matches!(mgr.touch(id), Err(Error::SessionInvalid)));
    }

    #[test]
    fn global_variables_are_shared_process_wide() {
        let mgr = SessionManager::new(Duration::from_secs(60));
        mgr.globals.set("max_threads_per_query", Value::Int(8));
        assert_eq!(mgr.globals.get("max_threads_per_query"), Some(Value::Int(8)));
        mgr.globals.unset("max_threads_per_query");
        assert_eq!(mgr.globals.get("max_threads_per_query"), None);
    }
}
