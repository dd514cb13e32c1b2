use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::state::AppState;

#[allow(clippy::result_large_err)]
fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response());
    }
    Ok(())
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct AppointmentResponse {
    id: String,
    date: String,
    time: String,
    purpose: String,
    name: String,
    created_at: String,
}

pub async fn get_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50);
    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_appointments(&db, limit).map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        })?
    };

    let response: Vec<AppointmentResponse> = appointments
        .into_iter()
        .map(|a| AppointmentResponse {
            id: a.id,
            date: a.date.format("%Y-%m-%d").to_string(),
            time: a.time.format("%H:%M").to_string(),
            purpose: a.purpose,
            name: a.name,
            created_at: a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();

    Ok(Json(response))
}
