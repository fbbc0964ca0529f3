//! Question answering endpoint.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use vigil_domain::{Answer, AnswerOutcome};

use crate::error::ServerError;
use crate::state::AppState;

/// Request body for `POST /api/v1/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub user_id: String,
    pub query: String,
}

/// POST /api/v1/ask
///
/// The body is always an [`Answer`]. Refusals keep their user-facing text
/// but carry a matching status: 400 for invalid input, 429 when rate
/// limited.
pub async fn ask_handler(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Answer>), ServerError> {
    let Json(request) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let answer = state
        .handler
        .handle_detailed(&request.user_id, &request.query)
        .await;

    let status = match answer.outcome {
        AnswerOutcome::Invalid => StatusCode::BAD_REQUEST,
        AnswerOutcome::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::OK,
    };
    Ok((status, Json(answer)))
}
