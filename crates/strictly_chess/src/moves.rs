//! Move requests and move records.
//!
//! A [`MoveRequest`] is what a caller intends; a [`ChessMove`] is what the
//! engine says actually happened (or could happen, for legal move listings).

use super::{GameStatus, Position, Side};
use derive_new::new;
use serde::{Deserialize, Serialize};

/// A move as requested by a caller, in square coordinates.
///
/// Castling is requested as the king's two-square move (`e1` to `g1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct MoveRequest {
    /// Source square, e.g. `"e2"`.
    pub from: String,
    /// Target square, e.g. `"e4"`.
    pub to: String,
    /// Promotion piece (`q`, `r`, `b` or `n`) for pawns reaching the last rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

/// Verbose description of a move in a particular position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChessMove {
    /// Side making the move.
    #[serde(rename = "color")]
    pub side: Side,
    /// Source square.
    pub from: String,
    /// Target square (the king's destination for castling).
    pub to: String,
    /// Moving piece as a lowercase letter (`p`, `n`, `b`, `r`, `q`, `k`).
    pub piece: char,
    /// Captured piece, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<char>,
    /// Promotion piece, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<char>,
    /// Standard algebraic notation.
    pub san: String,
}

/// Result of applying a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    /// Position after the move.
    pub position: Position,
    /// Status of the new position.
    pub status: GameStatus,
    /// The move that was applied.
    pub applied: ChessMove,
}
