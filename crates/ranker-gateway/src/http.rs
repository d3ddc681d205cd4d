//! HTTP poll-creation boundary.
//!
//! Thin request/response layer in front of the coordinator: creating a poll
//! and minting join credentials. Everything stateful happens over the
//! WebSocket once the credential is presented there.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ranker_engine::{ids, Phase};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::service::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub topic: String,
    pub votes_per_voter: usize,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinPollRequest {
    pub poll_id: String,
    pub name: String,
}

/// Credential bundle returned by both boundary endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCredentials {
    pub poll_id: String,
    pub user_id: String,
    pub access_token: String,
}

/// Boundary-level error with an HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("internal error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `POST /polls` — create a poll with the caller as admin.
pub async fn create_poll(
    State(state): State<AppState>,
    Json(req): Json<CreatePollRequest>,
) -> Result<Json<PollCredentials>, ApiError> {
    let limits = &state.config.polls;
    let topic = validate_text("topic", &req.topic, limits.max_topic_len)?;
    let name = validate_text("name", &req.name, limits.max_name_len)?;
    if req.votes_per_voter < limits.min_votes_per_voter
        || req.votes_per_voter > limits.max_votes_per_voter
    {
        return Err(ApiError::Validation(format!(
            "votes_per_voter must be between {} and {}",
            limits.min_votes_per_voter, limits.max_votes_per_voter
        )));
    }

    let user_id = ids::create_participant_id();
    let poll = state
        .coordinator
        .create_poll(topic, req.votes_per_voter, user_id.clone(), name.clone());
    let access_token = state
        .verifier
        .issue(&poll.id, &user_id, &name)
        .map_err(|_| ApiError::Internal)?;

    info!(poll_id = %poll.id, "Poll created via HTTP boundary");
    Ok(Json(PollCredentials {
        poll_id: poll.id,
        user_id,
        access_token,
    }))
}

/// `POST /polls/join` — mint a participant credential for an existing poll.
///
/// New participants may only join while nominations are open; enrolled
/// participants reconnect with their original credential instead.
pub async fn join_poll(
    State(state): State<AppState>,
    Json(req): Json<JoinPollRequest>,
) -> Result<Json<PollCredentials>, ApiError> {
    let name = validate_text("name", &req.name, state.config.polls.max_name_len)?;

    let phase = state
        .coordinator
        .poll_phase(&req.poll_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("poll {} not found", req.poll_id)))?;
    if phase != Phase::Nominating {
        return Err(ApiError::Forbidden(
            "poll is no longer accepting participants".to_string(),
        ));
    }

    let user_id = ids::create_participant_id();
    let access_token = state
        .verifier
        .issue(&req.poll_id, &user_id, &name)
        .map_err(|_| ApiError::Internal)?;

    Ok(Json(PollCredentials {
        poll_id: req.poll_id,
        user_id,
        access_token,
    }))
}

/// `POST /polls/rejoin` — re-mint a credential for an enrolled participant.
///
/// Accepts the previous bearer token even when expired: the signature proves
/// a prior enrollment, and the roster confirms it is still current. The
/// display name comes from the roster, not the stale claims, so an admin
/// rename survives the refresh.
pub async fn rejoin_poll(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PollCredentials>, ApiError> {
    let token = crate::ws::bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthenticated("missing credentials".to_string()))?;
    let authed = state
        .verifier
        .verify_allow_expired(&token)
        .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;

    state
        .coordinator
        .poll_phase(&authed.poll_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("poll {} not found", authed.poll_id)))?;
    let name = state
        .coordinator
        .participant_name(&authed.poll_id, &authed.participant_id)
        .await
        .ok_or_else(|| ApiError::Forbidden("not enrolled in this poll".to_string()))?;

    let access_token = state
        .verifier
        .issue(&authed.poll_id, &authed.participant_id, &name)
        .map_err(|_| ApiError::Internal)?;

    info!(poll_id = %authed.poll_id, "Credential refreshed");
    Ok(Json(PollCredentials {
        poll_id: authed.poll_id,
        user_id: authed.participant_id,
        access_token,
    }))
}

/// `GET /health` — liveness probe.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn validate_text(field: &str, value: &str, max_len: usize) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ApiError::Validation(format!(
            "{field} exceeds {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}
