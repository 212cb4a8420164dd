//! Database row model for sessions.

use super::schema;
use crate::{SessionRecord, StoreError};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use tracing::instrument;

/// One session as a `chess_sessions` row.
///
/// History, outcome and last move are JSON columns so the whole session
/// lives and expires as a single row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::chess_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct SessionRow {
    id: String,
    position: String,
    history: String,
    status: String,
    outcome: Option<String>,
    flipped: bool,
    last_move: Option<String>,
    version: i64,
    expires_at: NaiveDateTime,
}

impl TryFrom<&SessionRecord> for SessionRow {
    type Error = StoreError;

    #[instrument(skip(record), fields(session_id = %record.id))]
    fn try_from(record: &SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id.to_string(),
            position: record.position.clone().into_inner(),
            history: serde_json::to_string(&record.history)?,
            status: record.status.to_string(),
            outcome: record.outcome.as_ref().map(serde_json::to_string).transpose()?,
            flipped: record.flipped,
            last_move: record.last_move.as_ref().map(serde_json::to_string).transpose()?,
            version: i64::try_from(record.version)
                .map_err(|_| StoreError::new("Session version overflow"))?,
            expires_at: record.expires_at,
        })
    }
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = StoreError;

    #[instrument(skip(row), fields(session_id = %row.id))]
    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row
                .status
                .parse()
                .map_err(|_| StoreError::new(format!("Invalid status: '{}'", row.status)))?,
            history: serde_json::from_str(&row.history)?,
            outcome: row.outcome.as_deref().map(serde_json::from_str).transpose()?,
            last_move: row.last_move.as_deref().map(serde_json::from_str).transpose()?,
            version: u64::try_from(row.version)
                .map_err(|_| StoreError::new(format!("Negative version {}", row.version)))?,
            id: row.id.into(),
            position: strictly_chess::Position::new(row.position),
            flipped: row.flipped,
            expires_at: row.expires_at,
        })
    }
}
