//! Session error types.

use crate::SessionId;
use derive_more::{Display, Error};
use strictly_chess::{RulesError, Side};
use tracing::instrument;

/// Failure of a session operation.
///
/// Every variant is a per-request condition; none leaves a session
/// partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionError {
    /// The id is unknown or its TTL has elapsed.
    #[display("Session {} not found or expired", _0)]
    SessionNotFound(SessionId),

    /// The rules engine rejected the move. State is unchanged.
    #[display("Invalid move: {}", _0)]
    InvalidMove(String),

    /// The session already has an outcome.
    #[display("Game already ended{}", winner.map(|w| format!(" ({} won)", w.name())).unwrap_or_default())]
    GameAlreadyEnded {
        /// Winner of the finished game, if decisive.
        winner: Option<Side>,
    },

    /// There is no move to take back.
    #[display("No move to undo")]
    NoUndoAvailable,

    /// A side was not one of `w` or `b`.
    #[display("Invalid side: '{}'", _0)]
    InvalidSide(String),

    /// The request body or query string could not be read.
    #[display("Malformed request: {}", _0)]
    BadRequest(String),

    /// A required parameter was absent.
    #[display("Missing '{}' parameter", _0)]
    MissingParameter(&'static str),

    /// Every allocated id collided with a live session.
    #[display("Could not allocate a free session id after {} attempts", attempts)]
    IdentifierCollision {
        /// Number of ids tried.
        attempts: usize,
    },

    /// The backing store failed.
    #[display("{}", _0)]
    Store(StoreError),

    /// A stored position could not be decoded by the rules engine.
    #[display("Corrupt session state: {}", _0)]
    Engine(RulesError),
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl SessionError {
    /// Stable snake_case name of the error kind, for wire envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::InvalidMove(_) => "invalid_move",
            Self::GameAlreadyEnded { .. } => "game_already_ended",
            Self::NoUndoAvailable => "no_undo_available",
            Self::InvalidSide(_) => "invalid_side",
            Self::BadRequest(_) => "bad_request",
            Self::MissingParameter(_) => "missing_parameter",
            Self::IdentifierCollision { .. } => "identifier_collision",
            Self::Store(_) => "store",
            Self::Engine(_) => "engine",
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<diesel::result::Error> for SessionError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::Store(StoreError::from(err))
    }
}

/// Session store error with location tracking.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::new(format!("Diesel error: {}", err))
    }
}

impl From<diesel::ConnectionError> for StoreError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(format!("Connection error: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Encoding error: {}", err))
    }
}
