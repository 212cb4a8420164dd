//! The session record: the only persistent entity.

use chrono::NaiveDateTime;
use derive_more::Display;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strictly_chess::{ChessMove, GameStatus, Position, Side};
use tracing::instrument;

/// Short, human-typeable session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Source of candidate session ids.
pub trait IdSource: Send + Sync + std::fmt::Debug {
    /// Produces the next candidate id. Collisions are handled by the store.
    fn next_id(&self) -> SessionId;
}

/// Uniformly random five-digit ids (`10000`..=`99999`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    #[instrument(skip(self))]
    fn next_id(&self) -> SessionId {
        let n: u32 = rand::thread_rng().gen_range(10_000..=99_999);
        SessionId(n.to_string())
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "lowercase")]
pub enum Outcome {
    /// The side to move was checkmated.
    Checkmate {
        /// Side that delivered mate.
        winner: Side,
    },
    /// A player resigned.
    Resignation {
        /// Opponent of the resigning side.
        winner: Side,
    },
    /// No legal move, not in check.
    Stalemate,
    /// Drawn by rule.
    Draw,
}

impl Outcome {
    /// Winner of a decisive outcome.
    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::Checkmate { winner } | Outcome::Resignation { winner } => Some(winner),
            Outcome::Stalemate | Outcome::Draw => None,
        }
    }

    /// Outcome implied by a terminal engine status reached by `mover`'s move.
    pub fn from_status(status: GameStatus, mover: Side) -> Option<Self> {
        match status {
            GameStatus::Checkmate => Some(Outcome::Checkmate { winner: mover }),
            GameStatus::Stalemate => Some(Outcome::Stalemate),
            GameStatus::Draw => Some(Outcome::Draw),
            GameStatus::Ongoing | GameStatus::Check => None,
        }
    }
}

/// State machine view of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Moves are accepted.
    Ongoing,
    /// Terminal until reset.
    Ended(Outcome),
}

/// A state the game was in before a move, kept for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position before the move.
    pub position: Position,
    /// Engine status of that position.
    pub status: GameStatus,
    /// Move that had produced that position.
    pub last_move: Option<ChessMove>,
}

/// One session, as held by a [`crate::SessionStore`].
///
/// `version` and `expires_at` belong to the store: it bumps and refreshes
/// them on every accepted mutation, whatever the transformation returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session id.
    pub id: SessionId,
    /// Authoritative position.
    pub position: Position,
    /// Undo stack; the last element is the most recent prior state.
    pub history: Vec<HistoryEntry>,
    /// Engine status of `position`.
    pub status: GameStatus,
    /// Set once the game is decided.
    pub outcome: Option<Outcome>,
    /// Cosmetic board orientation flag.
    pub flipped: bool,
    /// Most recently applied move.
    pub last_move: Option<ChessMove>,
    /// Change counter, starting at 1.
    pub version: u64,
    /// Instant (UTC) after which the session is gone.
    pub expires_at: NaiveDateTime,
}

impl SessionRecord {
    /// Fresh session at `position`.
    #[instrument(skip(position))]
    pub fn new(id: SessionId, position: Position, expires_at: NaiveDateTime) -> Self {
        Self {
            id,
            position,
            history: Vec::new(),
            status: GameStatus::Ongoing,
            outcome: None,
            flipped: false,
            last_move: None,
            version: 1,
            expires_at,
        }
    }

    /// Whether the game has an outcome.
    pub fn ended(&self) -> bool {
        self.outcome.is_some()
    }

    /// Winner of a decisive outcome.
    pub fn winner(&self) -> Option<Side> {
        self.outcome.and_then(Outcome::winner)
    }

    /// Current state machine state.
    pub fn state(&self) -> SessionState {
        match self.outcome {
            Some(outcome) => SessionState::Ended(outcome),
            None => SessionState::Ongoing,
        }
    }

    /// Whether the record is past its expiry at `now`.
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }
}
