//! SQLite-backed session store.

use super::models::SessionRow;
use super::schema::chess_sessions;
use super::{MAX_ID_ATTEMPTS, SessionStore, stamp};
use crate::{Clock, IdSource, RandomIds, SessionError, SessionId, SessionRecord, StoreError, SystemClock};
use chrono::TimeDelta;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::sync::{Arc, Mutex, MutexGuard};
use strictly_chess::Position;
use tracing::{debug, info, instrument, warn};

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Session store persisted in a SQLite database.
///
/// Holds a single connection for its whole lifetime; the connection is
/// opened (and migrated) by [`SqliteSessionStore::open`] and closed when the
/// store is dropped. `mutate` runs in an `IMMEDIATE` transaction, so other
/// processes sharing the file are serialized too.
pub struct SqliteSessionStore {
    database_url: String,
    conn: Mutex<SqliteConnection>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

impl std::fmt::Debug for SqliteSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSessionStore")
            .field("database_url", &self.database_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SqliteSessionStore {
    /// Opens (creating if needed) the database and applies pending migrations.
    ///
    /// Use `":memory:"` for a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the connection or a migration fails.
    #[instrument(skip(database_url), fields(database_url = %database_url))]
    pub fn open(database_url: &str, ttl: TimeDelta) -> Result<Self, StoreError> {
        info!("Opening SQLite session store");
        let mut conn = SqliteConnection::establish(database_url)?;

        diesel::sql_query("PRAGMA busy_timeout = 5000").execute(&mut conn)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::new(format!("Migration failed: {}", e)))?;
        debug!(migrations = applied.len(), "Migrations applied");

        Ok(Self {
            database_url: database_url.to_string(),
            conn: Mutex::new(conn),
            ttl,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
        })
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

    fn connection(&self) -> Result<MutexGuard<'_, SqliteConnection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::new("SQLite connection lock poisoned"))
    }
}

impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self, position))]
    fn create(&self, position: Position) -> Result<SessionRecord, SessionError> {
        let now = self.clock.now();
        let mut conn = self.connection()?;

        conn.immediate_transaction(|conn| {
            for attempt in 1..=MAX_ID_ATTEMPTS {
                let id = self.ids.next_id();
                let live = chess_sessions::table
                    .find(id.as_str())
                    .filter(chess_sessions::expires_at.gt(now))
                    .select(chess_sessions::id)
                    .first::<String>(conn)
                    .optional()?;
                if live.is_some() {
                    warn!(session_id = %id, attempt, "Session id collision");
                    continue;
                }

                let record = SessionRecord::new(id, position.clone(), now + self.ttl);
                diesel::replace_into(chess_sessions::table)
                    .values(&SessionRow::try_from(&record)?)
                    .execute(conn)?;
                info!(session_id = %record.id, "Created session");
                return Ok(record);
            }

            Err(SessionError::IdentifierCollision {
                attempts: MAX_ID_ATTEMPTS,
            })
        })
    }

    #[instrument(skip(self), fields(session_id = %id))]
    fn get(&self, id: &SessionId) -> Result<SessionRecord, SessionError> {
        let now = self.clock.now();
        let mut conn = self.connection()?;

        let row = chess_sessions::table
            .find(id.as_str())
            .filter(chess_sessions::expires_at.gt(now))
            .select(SessionRow::as_select())
            .first(&mut *conn)
            .optional()?
            .ok_or_else(|| {
                debug!("Session not found");
                SessionError::SessionNotFound(id.clone())
            })?;

        Ok(SessionRecord::try_from(row)?)
    }

    #[instrument(skip(self, f), fields(session_id = %id))]
    fn mutate<F>(&self, id: &SessionId, f: F) -> Result<SessionRecord, SessionError>
    where
        F: FnOnce(&SessionRecord) -> Result<SessionRecord, SessionError>,
    {
        let now = self.clock.now();
        let mut conn = self.connection()?;

        conn.immediate_transaction(|conn| {
            let row = chess_sessions::table
                .find(id.as_str())
                .filter(chess_sessions::expires_at.gt(now))
                .select(SessionRow::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| SessionError::SessionNotFound(id.clone()))?;

            let current = SessionRecord::try_from(row)?;
            let next = stamp(&current, f(&current)?, now, self.ttl);

            diesel::replace_into(chess_sessions::table)
                .values(&SessionRow::try_from(&next)?)
                .execute(conn)?;
            debug!(version = next.version, "Session updated");
            Ok(next)
        })
    }

    #[instrument(skip(self))]
    fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = self.clock.now();
        let mut conn = self.connection()?;

        let purged = diesel::delete(
            chess_sessions::table.filter(chess_sessions::expires_at.le(now)),
        )
        .execute(&mut *conn)?;
        if purged > 0 {
            info!(purged, "Purged expired sessions");
        }
        Ok(purged)
    }
}
