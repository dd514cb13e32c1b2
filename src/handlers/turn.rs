use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Session;
use crate::services::dialogue;
use crate::services::validate::ValidationContext;
use crate::state::AppState;

const SESSION_IDLE_MINUTES: i64 = 30;

#[derive(Deserialize)]
pub struct TurnRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
pub struct TurnResponse {
    pub session_id: String,
    pub reply: String,
    pub state: String,
    pub intent: Option<String>,
}

// POST /api/turn
pub async fn post_turn(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let id = req
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut session = {
        let mut sessions = state.sessions.lock().unwrap();
        prune_expired(&mut sessions);
        sessions
            .remove(&id)
            .unwrap_or_else(|| Session::new(id.clone()))
    };

    let ctx = ValidationContext::from_today();
    let reply = dialogue::process_turn(state.backend.as_ref(), &mut session, &req.message, &ctx)
        .await
        .map_err(|e| {
            tracing::error!(session = %id, error = %e, "turn processing failed");
            AppError::Dialogue(e.to_string())
        })?;

    session.last_activity = Utc::now().naive_utc();

    let response = TurnResponse {
        session_id: id.clone(),
        reply,
        state: session.state.as_str().to_string(),
        intent: session.intent.map(|i| i.as_str().to_string()),
    };

    state.sessions.lock().unwrap().insert(id, session);

    Ok(Json(response))
}

// DELETE /api/session/:id — caller abandoned the conversation
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let removed = state.sessions.lock().unwrap().remove(&id);
    match removed {
        Some(_) => {
            tracing::info!(session = %id, "session discarded");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(AppError::NotFound(format!("session {id}"))),
    }
}

fn prune_expired(sessions: &mut HashMap<String, Session>) {
    let cutoff = Utc::now().naive_utc() - Duration::minutes(SESSION_IDLE_MINUTES);
    sessions.retain(|_, s| s.last_activity > cutoff);
}
