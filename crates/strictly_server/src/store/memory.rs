//! In-process session store.

use super::{MAX_ID_ATTEMPTS, SessionStore, stamp};
use crate::{Clock, IdSource, RandomIds, SessionError, SessionId, SessionRecord, StoreError, SystemClock};
use chrono::TimeDelta;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use strictly_chess::Position;
use tracing::{debug, info, instrument, warn};

/// Session store held in a mutex-guarded map.
///
/// The lock is held across the whole read-transform-write of `mutate`.
/// Sessions do not survive a restart.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

impl MemorySessionStore {
    /// Creates an empty store whose sessions live for `ttl` after each write.
    #[instrument]
    pub fn new(ttl: TimeDelta) -> Self {
        info!("Creating in-memory session store");
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the id source.
    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionRecord>>, StoreError> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::new("Session map lock poisoned"))
    }
}

impl SessionStore for MemorySessionStore {
    #[instrument(skip(self, position))]
    fn create(&self, position: Position) -> Result<SessionRecord, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.lock()?;

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = self.ids.next_id();
            if sessions.get(&id).is_some_and(|r| !r.is_expired(now)) {
                warn!(session_id = %id, attempt, "Session id collision");
                continue;
            }
            let record = SessionRecord::new(id.clone(), position, now + self.ttl);
            sessions.insert(id, record.clone());
            info!(session_id = %record.id, "Created session");
            return Ok(record);
        }

        Err(SessionError::IdentifierCollision {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    #[instrument(skip(self), fields(session_id = %id))]
    fn get(&self, id: &SessionId) -> Result<SessionRecord, SessionError> {
        let now = self.clock.now();
        let sessions = self.lock()?;
        sessions
            .get(id)
            .filter(|r| !r.is_expired(now))
            .cloned()
            .ok_or_else(|| {
                debug!("Session not found");
                SessionError::SessionNotFound(id.clone())
            })
    }

    #[instrument(skip(self, f), fields(session_id = %id))]
    fn mutate<F>(&self, id: &SessionId, f: F) -> Result<SessionRecord, SessionError>
    where
        F: FnOnce(&SessionRecord) -> Result<SessionRecord, SessionError>,
    {
        let now = self.clock.now();
        let mut sessions = self.lock()?;

        let current = sessions
            .get(id)
            .filter(|r| !r.is_expired(now))
            .ok_or_else(|| SessionError::SessionNotFound(id.clone()))?;
        let next = stamp(current, f(current)?, now, self.ttl);

        sessions.insert(id.clone(), next.clone());
        debug!(version = next.version, "Session updated");
        Ok(next)
    }

    #[instrument(skip(self))]
    fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, r| !r.is_expired(now));
        let purged = before - sessions.len();
        if purged > 0 {
            info!(purged, "Purged expired sessions");
        }
        Ok(purged)
    }
}
