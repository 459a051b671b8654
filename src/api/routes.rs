use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, ConnectInfo, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use super::{AppState, Envelope};
use crate::directory::{NewServer, RankedServer, Server};
use crate::error::AppError;
use crate::identity::ClientIdentifier;
use crate::votes::{VoteReceipt, VoteRequest, VoteStatus};

#[derive(Serialize)]
pub struct ServerList {
    pub servers: Vec<RankedServer>,
}

#[derive(Serialize)]
pub struct ServerCreated {
    pub server: Server,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatuses {
    pub vote_statuses: BTreeMap<String, VoteStatus>,
}

// ============================================================================
// HELPERS
// ============================================================================

fn identify(state: &AppState, headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> ClientIdentifier {
    state
        .identity
        .identify(headers, peer.map(|ConnectInfo(addr)| addr))
}

/// Decode a request body that must be a non-empty JSON object.
///
/// Request types coerce their field types, so only the overall shape is
/// rejected here. Field values are judged by the services.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected unparseable body: {}", e);
        AppError::invalid_json()
    })?;

    match &value {
        Value::Object(fields) if !fields.is_empty() => {}
        _ => return Err(AppError::invalid_json()),
    }

    serde_json::from_value(value).map_err(|e| {
        debug!("Rejected undecodable body: {}", e);
        AppError::invalid_json()
    })
}

/// Run a service call on the blocking thread pool.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Request task panicked: {}", e)))?
}

// ============================================================================
// HANDLERS
// ============================================================================

/// `GET /servers`
pub async fn list_servers(State(state): State<Arc<AppState>>) -> Result<Envelope<ServerList>, AppError> {
    let servers = blocking(move || Ok(state.directory.list())).await?;
    Ok(Envelope::success(ServerList { servers }))
}

/// `POST /servers`
pub async fn register_server(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Envelope<ServerCreated>, AppError> {
    let client = identify(&state, &headers, peer);
    let request: NewServer = parse_body(&body)?;

    let server = blocking(move || state.directory.register(&client, request)).await?;
    Ok(Envelope::success(ServerCreated { server }))
}

/// First non-empty `serverId` in the query string. Repeats are ignored.
fn requested_server_id(pairs: Vec<(String, String)>) -> Option<String> {
    pairs
        .into_iter()
        .find(|(key, value)| key == "serverId" && !value.is_empty())
        .map(|(_, value)| value)
}

/// `GET /vote[?serverId=<id>]`
pub async fn vote_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(pairs) = query.map_err(|e| {
        debug!("Rejected query string: {}", e);
        AppError::Validation("Parámetros inválidos.".to_string())
    })?;
    let client = identify(&state, &headers, peer);

    match requested_server_id(pairs) {
        Some(server_id) => {
            let status = blocking(move || Ok(state.votes.status(&client, &server_id))).await?;
            Ok(Envelope::success(status).into_response())
        }
        None => {
            let vote_statuses = blocking(move || Ok(state.votes.status_all(&client))).await?;
            Ok(Envelope::success(VoteStatuses { vote_statuses }).into_response())
        }
    }
}

/// `POST /vote`
pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Envelope<VoteReceipt>, AppError> {
    let client = identify(&state, &headers, peer);
    let request: VoteRequest = parse_body(&body)?;

    let receipt = blocking(move || state.votes.cast(&client, request)).await?;
    Ok(Envelope::success(receipt))
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Ruta no encontrada.".to_string())
}

/// `GET /health`
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "hyspania-directory"
    }))
}
