//! The session state machine.
//!
//! Every operation reads the session from the store, rebuilds whatever it
//! needs from the stored position and writes back through a single atomic
//! `mutate`. Nothing is kept in memory between calls.

use crate::sync::{MoveOutcome, PollOutcome, SessionSnapshot};
use crate::{
    HistoryEntry, Outcome, SessionError, SessionId, SessionRecord, SessionState, SessionStore,
    StoreError,
};
use std::sync::Arc;
use strictly_chess::{ChessMove, MoveRequest, RulesEngine, RulesError, Side};
use tracing::{debug, info, instrument, warn};

/// Creates, mutates and observes chess sessions.
///
/// Turn order is not enforced here; it lives in the position and the rules
/// engine rejects out-of-turn moves as illegal.
#[derive(Debug)]
pub struct SessionManager<S, E> {
    store: Arc<S>,
    engine: E,
}

impl<S, E> SessionManager<S, E>
where
    S: SessionStore,
    E: RulesEngine,
{
    /// Creates a manager over `store`, delegating legality to `engine`.
    pub fn new(store: Arc<S>, engine: E) -> Self {
        Self { store, engine }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Starts a session at the engine's initial position.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IdentifierCollision`] if no free id was found.
    #[instrument(skip(self))]
    pub fn new_session(&self) -> Result<SessionSnapshot, SessionError> {
        let record = self.store.create(self.engine.initial_position())?;
        info!(session_id = %record.id, "New session started");
        self.snapshot_of(&record)
    }

    /// Applies a move to a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`], [`SessionError::GameAlreadyEnded`]
    /// or [`SessionError::InvalidMove`]. On error nothing is written.
    #[instrument(skip(self, request), fields(session_id = %id, from = %request.from, to = %request.to))]
    pub fn make_move(
        &self,
        id: &SessionId,
        request: &MoveRequest,
    ) -> Result<MoveOutcome, SessionError> {
        let record = self.store.mutate(id, |current| {
            if let SessionState::Ended(outcome) = current.state() {
                warn!(?outcome, "Move attempted on finished game");
                return Err(SessionError::GameAlreadyEnded {
                    winner: outcome.winner(),
                });
            }

            let result = self
                .engine
                .apply_move(&current.position, request)
                .map_err(|e| match e {
                    RulesError::IllegalMove(_) | RulesError::InvalidSquare(_) => {
                        debug!(error = %e, "Move rejected by rules engine");
                        SessionError::InvalidMove(e.to_string())
                    }
                    RulesError::InvalidPosition(_) => SessionError::Engine(e),
                })?;

            let mut next = current.clone();
            next.history.push(HistoryEntry {
                position: current.position.clone(),
                status: current.status,
                last_move: current.last_move.clone(),
            });
            next.position = result.position;
            next.status = result.status;
            next.outcome = Outcome::from_status(result.status, result.applied.side);
            next.last_move = Some(result.applied);
            Ok(next)
        })?;

        let applied = record
            .last_move
            .clone()
            .ok_or_else(|| StoreError::new("Applied move missing from stored session"))?;

        info!(
            san = %applied.san,
            status = %record.status,
            version = record.version,
            "Move applied"
        );
        if record.status.is_terminal() {
            info!(outcome = ?record.outcome, "Game over");
        }

        Ok(MoveOutcome {
            status: record.status,
            applied,
            session: self.snapshot_of(&record)?,
        })
    }

    /// Takes back the most recent move.
    ///
    /// Always returns the session to ongoing play.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`] or
    /// [`SessionError::NoUndoAvailable`] if there is nothing to take back.
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn undo(&self, id: &SessionId) -> Result<SessionSnapshot, SessionError> {
        let record = self.store.mutate(id, |current| {
            let mut next = current.clone();
            let entry = next.history.pop().ok_or(SessionError::NoUndoAvailable)?;
            next.position = entry.position;
            next.status = entry.status;
            next.last_move = entry.last_move;
            next.outcome = None;
            Ok(next)
        })?;

        info!(history_len = record.history.len(), "Move undone");
        self.snapshot_of(&record)
    }

    /// Resigns on behalf of `side` (`w`, `b`, `white` or `black`).
    ///
    /// Resigning a finished game replaces its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidSide`] or [`SessionError::SessionNotFound`].
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn resign(&self, id: &SessionId, side: &str) -> Result<SessionSnapshot, SessionError> {
        let side: Side = side.parse().map_err(|_| {
            warn!(side, "Resignation with invalid side");
            SessionError::InvalidSide(side.to_string())
        })?;

        let record = self.store.mutate(id, |current| {
            if let Some(previous) = current.outcome {
                debug!(?previous, "Overwriting previous outcome");
            }
            let mut next = current.clone();
            next.outcome = Some(Outcome::Resignation {
                winner: side.opposite(),
            });
            Ok(next)
        })?;

        info!(resigned = %side, "Player resigned");
        self.snapshot_of(&record)
    }

    /// Starts over at the initial position, keeping id and orientation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`].
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn reset(&self, id: &SessionId) -> Result<SessionSnapshot, SessionError> {
        let initial = self.engine.initial_position();
        let record = self.store.mutate(id, |current| {
            Ok(SessionRecord {
                history: Vec::new(),
                outcome: None,
                last_move: None,
                status: Default::default(),
                position: initial,
                ..current.clone()
            })
        })?;

        info!("Session reset");
        self.snapshot_of(&record)
    }

    /// Flips the cosmetic board orientation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`].
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn toggle_orientation(&self, id: &SessionId) -> Result<SessionSnapshot, SessionError> {
        let record = self.store.mutate(id, |current| {
            let mut next = current.clone();
            next.flipped = !current.flipped;
            Ok(next)
        })?;

        debug!(flipped = record.flipped, "Orientation toggled");
        self.snapshot_of(&record)
    }

    /// Legal moves of the piece on `from` in the current position.
    ///
    /// An unparseable square has no legal moves.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingParameter`] if `from` is absent or
    /// blank, then [`SessionError::SessionNotFound`].
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn legal_targets(
        &self,
        id: &SessionId,
        from: Option<&str>,
    ) -> Result<Vec<ChessMove>, SessionError> {
        let from = from
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(SessionError::MissingParameter("from"))?;

        let record = self.store.get(id)?;
        match self.engine.legal_moves(&record.position, from) {
            Ok(moves) => Ok(moves),
            Err(RulesError::InvalidSquare(square)) => {
                debug!(%square, "Unparseable square has no legal moves");
                Ok(Vec::new())
            }
            Err(e) => Err(SessionError::Engine(e)),
        }
    }

    /// Current authoritative state of a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`].
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn snapshot(&self, id: &SessionId) -> Result<SessionSnapshot, SessionError> {
        let record = self.store.get(id)?;
        self.snapshot_of(&record)
    }

    /// Reports whether a session changed since the version a client last saw.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionNotFound`].
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn poll(&self, id: &SessionId, since: Option<u64>) -> Result<PollOutcome, SessionError> {
        let record = self.store.get(id)?;
        match since {
            Some(seen) if seen == record.version => {
                debug!(version = record.version, "Session unchanged");
                Ok(PollOutcome::Unchanged {
                    version: record.version,
                })
            }
            _ => Ok(PollOutcome::Changed(self.snapshot_of(&record)?)),
        }
    }

    fn snapshot_of(&self, record: &SessionRecord) -> Result<SessionSnapshot, SessionError> {
        let turn = self
            .engine
            .side_to_move(&record.position)
            .map_err(SessionError::Engine)?;
        Ok(SessionSnapshot::new(record, turn))
    }
}
