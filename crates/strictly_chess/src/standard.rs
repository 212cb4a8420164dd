//! Standard chess rules backed by `shakmaty`.

use super::{ChessMove, GameStatus, MoveRequest, MoveResult, Position, RulesEngine, RulesError, Side};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Move, Position as _, Role, Square};
use tracing::{debug, instrument, warn};

/// Orthodox chess with FEN as the position encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardChess;

impl StandardChess {
    /// Creates the engine.
    pub fn new() -> Self {
        Self
    }
}

impl RulesEngine for StandardChess {
    #[instrument(skip(self))]
    fn initial_position(&self) -> Position {
        encode(&Chess::default())
    }

    #[instrument(skip(self), fields(fen = %position))]
    fn apply_move(
        &self,
        position: &Position,
        request: &MoveRequest,
    ) -> Result<MoveResult, RulesError> {
        let pos = decode(position)?;
        let from = parse_square(&request.from)?;
        let to = parse_square(&request.to)?;
        let promotion = match request.promotion.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Some(parse_role(p)?),
            _ => None,
        };

        let legal = pos.legal_moves();
        let chosen = legal
            .iter()
            .find(|m| {
                endpoints(m) == Some((from, to))
                    && (m.promotion().is_none() || m.promotion() == promotion)
            })
            .ok_or_else(|| {
                debug!(%from, %to, ?promotion, "No legal move matches request");
                RulesError::IllegalMove(format!("{}{}", from, to))
            })?;

        let applied = describe(&pos, chosen)
            .ok_or_else(|| RulesError::IllegalMove(format!("{}{}", from, to)))?;

        let mut next = pos;
        next.play_unchecked(chosen);
        let status = status_of(&next);

        debug!(san = %applied.san, %status, "Move applied");
        Ok(MoveResult {
            position: encode(&next),
            status,
            applied,
        })
    }

    #[instrument(skip(self), fields(fen = %position))]
    fn legal_moves(&self, position: &Position, from: &str) -> Result<Vec<ChessMove>, RulesError> {
        let pos = decode(position)?;
        let square = parse_square(from)?;

        let moves: Vec<ChessMove> = pos
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(square))
            .filter_map(|m| describe(&pos, m))
            .collect();

        debug!(count = moves.len(), "Legal moves listed");
        Ok(moves)
    }

    #[instrument(skip(self), fields(fen = %position))]
    fn side_to_move(&self, position: &Position) -> Result<Side, RulesError> {
        Ok(side_of(decode(position)?.turn()))
    }
}

fn decode(position: &Position) -> Result<Chess, RulesError> {
    let fen: Fen = position.as_str().parse().map_err(|e: shakmaty::fen::ParseFenError| {
        warn!(fen = %position, error = %e, "Unparseable position");
        RulesError::InvalidPosition(e.to_string())
    })?;
    fen.into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| RulesError::InvalidPosition(e.to_string()))
}

fn encode(pos: &Chess) -> Position {
    Position::new(Fen(pos.clone().into_setup(EnPassantMode::Legal)).to_string())
}

fn parse_square(name: &str) -> Result<Square, RulesError> {
    name.trim()
        .to_ascii_lowercase()
        .parse::<Square>()
        .map_err(|_| RulesError::InvalidSquare(name.to_string()))
}

fn parse_role(name: &str) -> Result<Role, RulesError> {
    match name.to_ascii_lowercase().as_str() {
        "q" | "queen" => Ok(Role::Queen),
        "r" | "rook" => Ok(Role::Rook),
        "b" | "bishop" => Ok(Role::Bishop),
        "n" | "knight" => Ok(Role::Knight),
        _ => Err(RulesError::IllegalMove(format!(
            "cannot promote to '{}'",
            name
        ))),
    }
}

fn side_of(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

/// Source and destination squares as a player would name them.
///
/// `shakmaty` encodes castling as king-takes-rook; callers name the king's
/// destination instead.
fn endpoints(m: &Move) -> Option<(Square, Square)> {
    match *m {
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() {
                File::G
            } else {
                File::C
            };
            Some((king, Square::from_coords(file, king.rank())))
        }
        _ => m.from().map(|from| (from, m.to())),
    }
}

fn describe(pos: &Chess, m: &Move) -> Option<ChessMove> {
    let (from, to) = endpoints(m)?;
    Some(ChessMove {
        side: side_of(pos.turn()),
        from: from.to_string(),
        to: to.to_string(),
        piece: m.role().char(),
        captured: m.capture().map(Role::char),
        promotion: m.promotion().map(Role::char),
        san: San::from_move(pos, m).to_string(),
    })
}

fn status_of(pos: &Chess) -> GameStatus {
    if pos.is_checkmate() {
        GameStatus::Checkmate
    } else if pos.is_stalemate() {
        GameStatus::Stalemate
    } else if pos.is_insufficient_material() || pos.halfmoves() >= 100 {
        GameStatus::Draw
    } else if pos.is_check() {
        GameStatus::Check
    } else {
        GameStatus::Ongoing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_castle_endpoints_name_king_destination() {
        let castle = Move::Castle {
            king: Square::E1,
            rook: Square::H1,
        };
        assert_eq!(endpoints(&castle), Some((Square::E1, Square::G1)));

        let long = Move::Castle {
            king: Square::E8,
            rook: Square::A8,
        };
        assert_eq!(endpoints(&long), Some((Square::E8, Square::C8)));
    }

    #[test]
    fn test_parse_role_rejects_king_and_pawn() {
        assert_eq!(parse_role("q"), Ok(Role::Queen));
        assert_eq!(parse_role("Knight"), Ok(Role::Knight));
        assert!(parse_role("k").is_err());
        assert!(parse_role("p").is_err());
    }

    #[test]
    fn test_parse_square_is_case_insensitive() {
        assert_eq!(parse_square("E2"), Ok(Square::E2));
        assert!(parse_square("z9").is_err());
    }
}
