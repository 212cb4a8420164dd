//! Sync protocol payloads.
//!
//! Clients learn about state by polling. Every mutating call hands the fresh
//! [`SessionSnapshot`] straight back to its caller, so only passive
//! observers wait for the next poll. The `version` in each snapshot is the
//! change-detection token: it grows by one with every accepted mutation.

use crate::{Outcome, SessionId, SessionRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strictly_chess::{ChessMove, GameStatus, Position, Side};

/// Client-facing view of a session at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session id.
    pub session_id: SessionId,
    /// Current position encoding.
    #[serde(rename = "fen")]
    pub position: Position,
    /// Side to move.
    pub turn: Side,
    /// Engine status of the current position.
    pub status: GameStatus,
    /// Whether the game is decided.
    pub ended: bool,
    /// Winner of a decisive outcome.
    pub winner: Option<Side>,
    /// How the game ended.
    pub outcome: Option<Outcome>,
    /// Board orientation flag.
    #[serde(rename = "flip")]
    pub flipped: bool,
    /// Most recent move, for highlighting.
    pub last_move: Option<ChessMove>,
    /// Number of moves that can be undone.
    pub history_len: usize,
    /// Change counter.
    pub version: u64,
    /// Expiry instant (UTC).
    pub expires_at: NaiveDateTime,
}

impl SessionSnapshot {
    /// Builds the view of `record`; `turn` comes from the rules engine.
    pub fn new(record: &SessionRecord, turn: Side) -> Self {
        Self {
            session_id: record.id.clone(),
            position: record.position.clone(),
            turn,
            status: record.status,
            ended: record.ended(),
            winner: record.winner(),
            outcome: record.outcome,
            flipped: record.flipped,
            last_move: record.last_move.clone(),
            history_len: record.history.len(),
            version: record.version,
            expires_at: record.expires_at,
        }
    }

    /// Human-readable outcome line, e.g. "White wins by resignation".
    pub fn outcome_message(&self) -> Option<String> {
        self.outcome.map(|outcome| match outcome {
            Outcome::Checkmate { winner } => format!("{} wins by checkmate", winner.name()),
            Outcome::Resignation { winner } => format!(
                "{} resigned, {} wins",
                winner.opposite().name(),
                winner.name()
            ),
            Outcome::Stalemate => "Draw by stalemate".to_string(),
            Outcome::Draw => "Draw".to_string(),
        })
    }
}

/// Answer to a poll carrying the version the client last saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The session moved on (or the client had no version yet).
    Changed(SessionSnapshot),
    /// Nothing happened since `version`.
    Unchanged {
        /// Current version.
        version: u64,
    },
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// The move as applied by the engine.
    #[serde(rename = "move")]
    pub applied: ChessMove,
    /// Engine status after the move.
    pub status: GameStatus,
    /// Fresh authoritative state.
    pub session: SessionSnapshot,
}
