//! TTL-bounded session storage.
//!
//! A store maps [`SessionId`] to [`SessionRecord`]. Expiry is passive: once
//! a record's `expires_at` has passed, `get` and `mutate` no longer see it.
//! `mutate` is atomic per id, so two concurrent writers never both act on
//! the same prior state.

mod memory;
mod models;
mod schema;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::{SessionError, SessionId, SessionRecord};
use chrono::{NaiveDateTime, TimeDelta};
use strictly_chess::Position;

/// How many fresh ids `create` tries before giving up.
pub const MAX_ID_ATTEMPTS: usize = 8;

/// Durable mapping from session id to session record with expiry.
pub trait SessionStore: Send + Sync {
    /// Allocates an id and stores a fresh session at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IdentifierCollision`] if [`MAX_ID_ATTEMPTS`]
    /// candidate ids all belong to live sessions.
    fn create(&self, position: Position) -> Result<SessionRecord, SessionError>;

    /// Reads a live session without touching its expiry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] if the id is absent or expired.
    fn get(&self, id: &SessionId) -> Result<SessionRecord, SessionError>;

    /// Atomically replaces a live session with `f(current)`.
    ///
    /// If `f` fails nothing is written. On success the store bumps the
    /// version, pushes the expiry forward and returns what it persisted.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] if the id is absent or
    /// expired, or whatever `f` returns.
    fn mutate<F>(&self, id: &SessionId, f: F) -> Result<SessionRecord, SessionError>
    where
        F: FnOnce(&SessionRecord) -> Result<SessionRecord, SessionError>;

    /// Physically drops expired records, returning how many went.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the backend fails.
    fn purge_expired(&self) -> Result<usize, SessionError>;
}

/// Applies the store-owned fields to a transformed record.
fn stamp(
    current: &SessionRecord,
    mut next: SessionRecord,
    now: NaiveDateTime,
    ttl: TimeDelta,
) -> SessionRecord {
    next.id = current.id.clone();
    next.version = current.version + 1;
    next.expires_at = current.expires_at.max(now + ttl);
    next
}
