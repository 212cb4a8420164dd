//! Typed HTTP client and the polling watcher built on it.

use crate::http::{ErrorBody, FlipResponse, LegalMovesResponse, MoveResponse, ResignResponse};
use crate::sync::{PollOutcome, SessionSnapshot};
use crate::SessionId;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use strictly_chess::{ChessMove, MoveRequest};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Default polling cadence for watchers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3_000);

/// Failed call, carrying the server's error envelope when there was one.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("HTTP {}: {} ({})", status, message, kind)]
pub struct ApiFailure {
    /// Response status.
    pub status: StatusCode,
    /// Server message.
    pub message: String,
    /// Server error kind.
    pub kind: String,
}

/// Typed client for the session HTTP API.
#[derive(Debug, Clone)]
pub struct SessionClient {
    base_url: String,
    client: reqwest::Client,
}

impl SessionClient {
    /// Creates a client for the server at `base_url` (e.g. `http://127.0.0.1:8099`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn session_url(&self, id: &SessionId, suffix: &str) -> String {
        format!("{}/session/{}{}", self.base_url, id, suffix)
    }

    /// Starts a new session.
    #[instrument(skip(self))]
    pub async fn new_session(&self) -> Result<SessionSnapshot> {
        let response = self
            .client
            .post(format!("{}/new-session", self.base_url))
            .send()
            .await?;
        let snapshot: SessionSnapshot = decode(response).await?;
        info!(session_id = %snapshot.session_id, "Session created");
        Ok(snapshot)
    }

    /// Fetches the current state unconditionally.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn snapshot(&self, id: &SessionId) -> Result<SessionSnapshot> {
        let response = self.client.get(self.session_url(id, "")).send().await?;
        decode(response).await
    }

    /// Asks whether the session moved past `since`.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn poll(&self, id: &SessionId, since: Option<u64>) -> Result<PollOutcome> {
        let url = match since {
            Some(version) => self.session_url(id, &format!("?since={}", version)),
            None => self.session_url(id, ""),
        };
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            debug!(?since, "Session not modified");
            return Ok(PollOutcome::Unchanged {
                version: since.unwrap_or_default(),
            });
        }
        Ok(PollOutcome::Changed(decode(response).await?))
    }

    /// Legal moves of the piece on `from`.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn legal_moves(&self, id: &SessionId, from: &str) -> Result<Vec<ChessMove>> {
        let response = self
            .client
            .get(self.session_url(id, &format!("/legal-moves?from={}", from.trim())))
            .send()
            .await?;
        let body: LegalMovesResponse = decode(response).await?;
        Ok(body.moves)
    }

    /// Submits a move.
    #[instrument(skip(self, request), fields(session_id = %id, from = %request.from, to = %request.to))]
    pub async fn make_move(&self, id: &SessionId, request: &MoveRequest) -> Result<MoveResponse> {
        let response = self
            .client
            .post(self.session_url(id, "/move"))
            .json(request)
            .send()
            .await?;
        let body: MoveResponse = decode(response).await?;
        info!(san = %body.applied.san, status = %body.status, "Move accepted");
        Ok(body)
    }

    /// Takes back the last move.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn undo(&self, id: &SessionId) -> Result<SessionSnapshot> {
        let response = self.client.post(self.session_url(id, "/undo")).send().await?;
        decode(response).await
    }

    /// Resigns for `color` (`w` or `b`).
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn resign(&self, id: &SessionId, color: &str) -> Result<ResignResponse> {
        let response = self
            .client
            .post(self.session_url(id, "/resign"))
            .json(&serde_json::json!({ "color": color }))
            .send()
            .await?;
        decode(response).await
    }

    /// Starts the game over.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn reset(&self, id: &SessionId) -> Result<SessionSnapshot> {
        let response = self.client.post(self.session_url(id, "/newgame")).send().await?;
        decode(response).await
    }

    /// Toggles board orientation.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn flip(&self, id: &SessionId) -> Result<FlipResponse> {
        let response = self.client.post(self.session_url(id, "/flip")).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .with_context(|| format!("Malformed response body (HTTP {})", status));
    }

    let text = response.text().await.unwrap_or_default();
    let failure = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => ApiFailure {
            status,
            message: body.error,
            kind: body.kind,
        },
        Err(_) => ApiFailure {
            status,
            message: text,
            kind: "unknown".to_string(),
        },
    };
    Err(failure.into())
}

/// Change notifications emitted by [`SessionWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The session advanced to a new version.
    Changed(SessionSnapshot),
    /// The session just gained an outcome.
    Ended(SessionSnapshot),
    /// The session is gone (expired or never existed). The watcher stops.
    Expired,
}

/// Observer side of the sync protocol: polls a session and reports changes.
pub struct SessionWatcher {
    client: SessionClient,
    session_id: SessionId,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
    poll_interval: Duration,
}

impl SessionWatcher {
    /// Creates a watcher polling at [`DEFAULT_POLL_INTERVAL`].
    pub fn new(
        client: SessionClient,
        session_id: SessionId,
        event_tx: mpsc::UnboundedSender<SyncEvent>,
    ) -> Self {
        Self {
            client,
            session_id,
            event_tx,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Polls until the session expires. Fails once the receiver is dropped.
    ///
    /// Transient failures are logged and retried on the next tick.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn run(&mut self) -> Result<()> {
        info!(interval = ?self.poll_interval, "Starting session watch");

        let mut seen: Option<u64> = None;
        let mut was_ended = false;

        loop {
            match self.client.poll(&self.session_id, seen).await {
                Ok(PollOutcome::Changed(snapshot)) => {
                    debug!(version = snapshot.version, status = %snapshot.status, "Session changed");
                    seen = Some(snapshot.version);

                    let ended = snapshot.ended;
                    self.event_tx.send(SyncEvent::Changed(snapshot.clone()))?;
                    if ended && !was_ended {
                        info!(outcome = ?snapshot.outcome, "Session ended");
                        self.event_tx.send(SyncEvent::Ended(snapshot))?;
                    }
                    was_ended = ended;
                }
                Ok(PollOutcome::Unchanged { .. }) => {}
                Err(e) if is_not_found(&e) => {
                    info!("Session expired");
                    self.event_tx.send(SyncEvent::Expired)?;
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Failed to poll server");
                }
            }

            sleep(self.poll_interval).await;
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiFailure>()
        .is_some_and(|f| f.status == StatusCode::NOT_FOUND)
}
