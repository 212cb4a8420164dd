//! HTTP/JSON transport over the session manager.

use crate::sync::{MoveOutcome, PollOutcome, SessionSnapshot};
use crate::{SessionError, SessionId, SessionManager, SessionStore, StoreError};
use axum::{
    Json, Router,
    body::Body,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strictly_chess::{ChessMove, GameStatus, MoveRequest, Position, RulesEngine};
use tower::ServiceBuilder;
use tracing::{debug, error, info, instrument, warn};

/// Builds the router exposing every session operation.
pub fn router<S, E>(manager: Arc<SessionManager<S, E>>) -> Router
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    Router::new()
        .route("/new-session", post(new_session::<S, E>))
        .route("/session/{id}", get(get_session::<S, E>))
        .route("/session/{id}/legal-moves", get(legal_moves::<S, E>))
        .route("/session/{id}/move", post(make_move::<S, E>))
        .route("/session/{id}/undo", post(undo::<S, E>))
        .route("/session/{id}/resign", post(resign::<S, E>))
        .route("/session/{id}/newgame", post(reset::<S, E>))
        .route("/session/{id}/flip", post(flip::<S, E>))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(manager)
}

/// Periodically drops expired sessions until the task is aborted.
#[instrument(skip(manager))]
pub async fn purge_loop<S, E>(manager: Arc<SessionManager<S, E>>, every: Duration)
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match blocking(manager.clone(), |m| m.store().purge_expired()).await {
            Ok(purged) => debug!(purged, "Expiry sweep finished"),
            Err(e) => warn!(error = %e.0, "Expiry sweep failed"),
        }
    }
}

/// Error envelope returned by every failing route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Stable error kind.
    pub kind: String,
}

/// [`SessionError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub SessionError);

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SessionError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            SessionError::InvalidMove(_)
            | SessionError::BadRequest(_)
            | SessionError::InvalidSide(_)
            | SessionError::MissingParameter(_)
            | SessionError::NoUndoAvailable => StatusCode::BAD_REQUEST,
            SessionError::GameAlreadyEnded { .. } => StatusCode::CONFLICT,
            SessionError::IdentifierCollision { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::Store(_) | SessionError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, %status, "Request failed");
        } else {
            debug!(error = %self.0, %status, "Request rejected");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Body of `POST /session/{id}/resign`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResignBody {
    /// Resigning side (`w` or `b`).
    #[serde(default)]
    pub color: String,
}

/// Response of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResponse {
    /// The move as applied.
    #[serde(rename = "move")]
    pub applied: ChessMove,
    /// Position after the move.
    pub fen: Position,
    /// Engine status after the move.
    pub status: GameStatus,
    /// Fresh session state.
    pub session: SessionSnapshot,
}

impl From<MoveOutcome> for MoveResponse {
    fn from(outcome: MoveOutcome) -> Self {
        Self {
            fen: outcome.session.position.clone(),
            applied: outcome.applied,
            status: outcome.status,
            session: outcome.session,
        }
    }
}

/// Response of a resignation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResignResponse {
    /// Outcome line, e.g. "White resigned, Black wins".
    pub message: String,
    /// Fresh session state.
    pub session: SessionSnapshot,
}

/// Response of an orientation toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipResponse {
    /// New orientation flag.
    pub flip: bool,
    /// Fresh session state.
    pub session: SessionSnapshot,
}

/// Response of a legal-moves query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMovesResponse {
    /// Legal moves from the requested square.
    pub moves: Vec<ChessMove>,
}

#[derive(Debug, Deserialize)]
struct PollQuery {
    since: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LegalMovesQuery {
    from: Option<String>,
}

type Shared<S, E> = State<Arc<SessionManager<S, E>>>;

/// Runs a synchronous manager call off the async workers.
async fn blocking<S, E, T, F>(manager: Arc<SessionManager<S, E>>, f: F) -> Result<T, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
    T: Send + 'static,
    F: FnOnce(&SessionManager<S, E>) -> Result<T, SessionError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&manager))
        .await
        .map_err(|e| SessionError::Store(StoreError::new(format!("Worker task failed: {}", e))))?
        .map_err(ApiError::from)
}

fn with_etag(snapshot: SessionSnapshot) -> Response {
    let etag = etag_for(snapshot.version);
    let mut response = Json(snapshot).into_response();
    if let Ok(value) = HeaderValue::from_str(&etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

fn etag_for(version: u64) -> String {
    format!("\"{}\"", version)
}

/// Version named by an `If-None-Match` header, if any.
fn if_none_match(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::IF_NONE_MATCH)?
        .to_str()
        .ok()?
        .trim()
        .trim_start_matches("W/")
        .trim_matches('"')
        .parse()
        .ok()
}

#[instrument(skip(manager))]
async fn new_session<S, E>(State(manager): Shared<S, E>) -> Result<Response, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    let snapshot = blocking(manager, |m| m.new_session()).await?;
    Ok(with_etag(snapshot))
}

#[instrument(skip(manager, query, headers))]
async fn get_session<S, E>(
    State(manager): Shared<S, E>,
    Path(id): Path<String>,
    query: Result<Query<PollQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    let Query(query) = query.map_err(|e| SessionError::BadRequest(e.body_text()))?;
    let since = query.since.or_else(|| if_none_match(&headers));
    let id = SessionId::from(id);
    match blocking(manager, move |m| m.poll(&id, since)).await? {
        PollOutcome::Changed(snapshot) => Ok(with_etag(snapshot)),
        PollOutcome::Unchanged { version } => {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            if let Ok(value) = HeaderValue::from_str(&etag_for(version)) {
                response.headers_mut().insert(header::ETAG, value);
            }
            Ok(response)
        }
    }
}

#[instrument(skip(manager, query))]
async fn legal_moves<S, E>(
    State(manager): Shared<S, E>,
    Path(id): Path<String>,
    query: Result<Query<LegalMovesQuery>, QueryRejection>,
) -> Result<Json<LegalMovesResponse>, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    let Query(query) = query.map_err(|e| SessionError::BadRequest(e.body_text()))?;
    let id = SessionId::from(id);
    let moves = blocking(manager, move |m| m.legal_targets(&id, query.from.as_deref())).await?;
    Ok(Json(LegalMovesResponse { moves }))
}

#[instrument(skip(manager, request))]
async fn make_move<S, E>(
    State(manager): Shared<S, E>,
    Path(id): Path<String>,
    request: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<MoveResponse>, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    let Json(request) = request.map_err(|e| SessionError::BadRequest(e.body_text()))?;
    let id = SessionId::from(id);
    let outcome = blocking(manager, move |m| m.make_move(&id, &request)).await?;
    Ok(Json(MoveResponse::from(outcome)))
}

#[instrument(skip(manager))]
async fn undo<S, E>(
    State(manager): Shared<S, E>,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    let id = SessionId::from(id);
    Ok(with_etag(blocking(manager, move |m| m.undo(&id)).await?))
}

#[instrument(skip(manager, body))]
async fn resign<S, E>(
    State(manager): Shared<S, E>,
    Path(id): Path<String>,
    body: Result<Json<ResignBody>, JsonRejection>,
) -> Result<Json<ResignResponse>, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    // An absent or unreadable body names no side.
    let color = match body {
        Ok(Json(body)) => body.color,
        Err(e) => {
            debug!(rejection = %e.body_text(), "Unreadable resign body");
            String::new()
        }
    };
    let id = SessionId::from(id);
    let session = blocking(manager, move |m| m.resign(&id, &color)).await?;
    Ok(Json(ResignResponse {
        message: session.outcome_message().unwrap_or_default(),
        session,
    }))
}

#[instrument(skip(manager))]
async fn reset<S, E>(
    State(manager): Shared<S, E>,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    let id = SessionId::from(id);
    Ok(with_etag(blocking(manager, move |m| m.reset(&id)).await?))
}

#[instrument(skip(manager))]
async fn flip<S, E>(
    State(manager): Shared<S, E>,
    Path(id): Path<String>,
) -> Result<Json<FlipResponse>, ApiError>
where
    S: SessionStore + 'static,
    E: RulesEngine + 'static,
{
    let id = SessionId::from(id);
    let session = blocking(manager, move |m| m.toggle_orientation(&id)).await?;
    Ok(Json(FlipResponse {
        flip: session.flipped,
        session,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_none_match_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(if_none_match(&headers), None);
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"7\""));
        assert_eq!(if_none_match(&headers), Some(7));
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("W/\"12\""));
        assert_eq!(if_none_match(&headers), Some(12));
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert_eq!(if_none_match(&headers), None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(SessionError::SessionNotFound("10000".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(SessionError::GameAlreadyEnded { winner: None }).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(SessionError::IdentifierCollision { attempts: 8 }).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(SessionError::MissingParameter("from")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(SessionError::BadRequest("bad json".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
