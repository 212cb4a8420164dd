//! Strictly Chess server library - shared chess sessions over HTTP
//!
//! Two players share a game by session id. The server holds no game object
//! between requests: every operation reloads the stored position, asks the
//! rules engine, and writes the result back atomically.
//!
//! # Architecture
//!
//! - **Store**: TTL-bounded session records (in-memory or SQLite)
//! - **Manager**: the session state machine (move, undo, resign, reset, flip)
//! - **Sync**: versioned snapshots and change polling
//! - **HTTP**: axum routes and a reqwest client with a polling watcher
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::TimeDelta;
//! use strictly_chess::{MoveRequest, StandardChess};
//! use strictly_server::{MemorySessionStore, SessionManager};
//!
//! # fn main() -> Result<(), strictly_server::SessionError> {
//! let store = Arc::new(MemorySessionStore::new(TimeDelta::hours(3)));
//! let manager = SessionManager::new(store, StandardChess::new());
//!
//! let session = manager.new_session()?;
//! let moved = manager.make_move(&session.session_id, &MoveRequest::new("e2".into(), "e4".into(), None))?;
//! assert_eq!(moved.applied.san, "e4");
//! assert_eq!(moved.session.version, session.version + 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod clock;
mod config;
mod error;
mod http;
mod manager;
mod session;
mod store;
mod sync;

// Crate-level exports - Errors
pub use error::{SessionError, StoreError};

// Crate-level exports - Session records
pub use session::{HistoryEntry, IdSource, Outcome, RandomIds, SessionId, SessionRecord, SessionState};

// Crate-level exports - Time
pub use clock::{Clock, ManualClock, SystemClock};

// Crate-level exports - Storage
pub use store::{MAX_ID_ATTEMPTS, MemorySessionStore, SessionStore, SqliteSessionStore};

// Crate-level exports - Session management
pub use manager::SessionManager;
pub use sync::{MoveOutcome, PollOutcome, SessionSnapshot};

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig, StoreBackend};

// Crate-level exports - HTTP transport
pub use http::{
    ApiError, ErrorBody, FlipResponse, LegalMovesResponse, MoveResponse, ResignBody,
    ResignResponse, purge_loop, router,
};

// Crate-level exports - Client
pub use client::{ApiFailure, DEFAULT_POLL_INTERVAL, SessionClient, SessionWatcher, SyncEvent};
