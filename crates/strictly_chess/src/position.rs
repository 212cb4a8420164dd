//! Opaque position encoding and the two sides of the board.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::instrument;

/// Serialized snapshot of a complete game state (FEN in the chess domain).
///
/// The encoding is produced and consumed only by a [`crate::RulesEngine`].
/// Everything else stores and forwards it untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    /// Wraps an encoding produced by a rules engine.
    pub fn new(encoding: impl Into<String>) -> Self {
        Self(encoding.into())
    }

    /// Returns the raw encoding.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the position, returning the raw encoding.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// One of the two sides of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Side {
    /// White moves first.
    #[serde(rename = "w")]
    #[display("w")]
    White,
    /// Black.
    #[serde(rename = "b")]
    #[display("b")]
    Black,
}

impl Side {
    /// Returns the opposing side.
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Side::White => "White",
            Side::Black => "Black",
        }
    }
}

/// Input did not name a side.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Not a side: '{}' (expected w, b, white or black)", input)]
pub struct SideParseError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Side {
    type Err = SideParseError;

    #[instrument]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "white" => Ok(Side::White),
            "b" | "black" => Ok(Side::Black),
            _ => Err(SideParseError {
                input: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parses_short_and_long_names() {
        assert_eq!("w".parse::<Side>(), Ok(Side::White));
        assert_eq!("Black".parse::<Side>(), Ok(Side::Black));
        assert_eq!(" b ".parse::<Side>(), Ok(Side::Black));
    }

    #[test]
    fn test_side_rejects_unknown() {
        let err = "red".parse::<Side>().unwrap_err();
        assert_eq!(err.input, "red");
    }

    #[test]
    fn test_side_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Side::White).unwrap(), "\"w\"");
        assert_eq!(Side::Black.to_string(), "b");
        assert_eq!(Side::White.opposite(), Side::Black);
    }

    #[test]
    fn test_position_is_transparent() {
        let pos = Position::new("8/8/8/8/8/8/8/8 w - - 0 1");
        let json = serde_json::to_string(&pos).unwrap();
        assert_eq!(json, "\"8/8/8/8/8/8/8/8 w - - 0 1\"");
    }
}
