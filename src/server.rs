//! HTTP boundary for submissions
//!
//! Thin axum surface over the coordinator. Only request validation is
//! rejected synchronously; judging failures always surface as verdicts
//! through the polling route.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::coordinator::{
    Coordinator, SubmissionKind, SubmissionRequest, SubmissionStatus, SubmitError,
};
use crate::rewards::RewardDelta;
use crate::verdict::JudgeOutcome;

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/submissions", post(submit))
        .route("/submissions/run", post(run))
        .route("/submissions/{id}", get(status))
        .with_state(coordinator)
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    problem_id: i64,
    #[serde(default)]
    user_id: Option<String>,
    code: String,
    language: String,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    message: &'static str,
    submission_id: Uuid,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    outcome: JudgeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    rewards: Option<RewardDelta>,
}

async fn submit(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<SubmitBody>,
) -> Response {
    handle_submission(coordinator, body, SubmissionKind::Submit).await
}

async fn run(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<SubmitBody>,
) -> Response {
    handle_submission(coordinator, body, SubmissionKind::Run).await
}

async fn handle_submission(
    coordinator: Arc<Coordinator>,
    body: SubmitBody,
    kind: SubmissionKind,
) -> Response {
    if body.code.trim().is_empty() || body.language.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Missing fields" })),
        )
            .into_response();
    }

    let request = SubmissionRequest {
        problem_id: body.problem_id,
        user_id: body.user_id,
        code: body.code,
        language: body.language,
        kind,
    };

    match coordinator.submit(request).await {
        Ok(submission_id) => Json(SubmitResponse {
            message: "Submission accepted",
            submission_id,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn status(
    State(coordinator): State<Arc<Coordinator>>,
    Path(id): Path<Uuid>,
) -> Response {
    match coordinator.status(id).await {
        Ok(SubmissionStatus::Pending) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "processing" })),
        )
            .into_response(),
        Ok(SubmissionStatus::Resolved { outcome, rewards }) => {
            Json(StatusResponse { outcome, rewards }).into_response()
        }
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            SubmitError::ProblemNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            SubmitError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            SubmitError::Internal(e) => {
                error!("Internal error handling submission: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (code, Json(json!({ "message": message }))).into_response()
    }
}
