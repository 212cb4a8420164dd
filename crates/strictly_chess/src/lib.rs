//! Strictly Chess - chess domain types behind a rules engine seam.
//!
//! Session servers treat a chess position as an opaque [`Position`]
//! encoding. Everything that needs to understand the encoding (legality,
//! move generation, terminal detection) goes through [`RulesEngine`].
//!
//! # Example
//!
//! ```
//! use strictly_chess::{GameStatus, MoveRequest, RulesEngine, StandardChess};
//!
//! let engine = StandardChess::new();
//! let start = engine.initial_position();
//! let result = engine
//!     .apply_move(&start, &MoveRequest::new("e2".into(), "e4".into(), None))
//!     .unwrap();
//! assert_eq!(result.status, GameStatus::Ongoing);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod engine;
mod moves;
mod position;
mod standard;
mod status;

pub use engine::{RulesEngine, RulesError};
pub use moves::{ChessMove, MoveRequest, MoveResult};
pub use position::{Position, Side, SideParseError};
pub use standard::StandardChess;
pub use status::GameStatus;
