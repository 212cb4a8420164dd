//! The rules engine seam.

use super::{ChessMove, MoveRequest, MoveResult, Position, Side};
use derive_more::Display;

/// Move legality, move generation and terminal detection for a game.
///
/// Implementations are pure: every call rebuilds game state from the
/// [`Position`] it is given and holds nothing between calls.
pub trait RulesEngine: Send + Sync {
    /// Canonical starting position.
    fn initial_position(&self) -> Position;

    /// Applies `request` to `position`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::IllegalMove`] if the move is not legal for the
    /// side to move, [`RulesError::InvalidSquare`] if a square cannot be
    /// parsed, and [`RulesError::InvalidPosition`] if `position` does not
    /// decode.
    fn apply_move(
        &self,
        position: &Position,
        request: &MoveRequest,
    ) -> Result<MoveResult, RulesError>;

    /// Lists the legal moves of the piece standing on `from`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidSquare`] if `from` cannot be parsed and
    /// [`RulesError::InvalidPosition`] if `position` does not decode.
    fn legal_moves(&self, position: &Position, from: &str) -> Result<Vec<ChessMove>, RulesError>;

    /// Side whose turn it is in `position`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidPosition`] if `position` does not decode.
    fn side_to_move(&self, position: &Position) -> Result<Side, RulesError>;
}

/// Rejection from a rules engine.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RulesError {
    /// The move is not legal in the given position.
    #[display("Illegal move: {}", _0)]
    IllegalMove(String),

    /// A square name could not be parsed.
    #[display("Invalid square: '{}'", _0)]
    InvalidSquare(String),

    /// The position encoding could not be decoded.
    #[display("Invalid position: {}", _0)]
    InvalidPosition(String),
}

impl std::error::Error for RulesError {}
