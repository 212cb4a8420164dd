//! Engine-reported status of a position.

use serde::{Deserialize, Serialize};

/// Status of a position right after a move, as reported by the rules engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameStatus {
    /// Play continues normally.
    #[default]
    Ongoing,
    /// The side to move is in check.
    Check,
    /// The side to move is checkmated.
    Checkmate,
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// Drawn by rule (insufficient material, fifty-move rule).
    Draw,
}

impl GameStatus {
    /// Whether this status ends the game.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GameStatus::Checkmate | GameStatus::Stalemate | GameStatus::Draw
        )
    }
}
