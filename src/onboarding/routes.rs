//! REST endpoint for register-and-hire.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tracing::error;

use crate::error::OnboardingError;
use crate::onboarding::request::RegisterAndHireRequest;
use crate::onboarding::service::OnboardingService;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub service: Arc<OnboardingService>,
}

/// POST /onboarding/register-and-hire
///
/// Registers a user, creates their client, hires the requested agent and
/// provisions every channel binding, all-or-nothing. Returns 201 with the
/// created entities on success.
async fn register_and_hire(
    State(state): State<OnboardingRouteState>,
    body: Result<Json<RegisterAndHireRequest>, JsonRejection>,
) -> impl IntoResponse {
    // Extractor failures get the same `{"error": ...}` shape as domain 400s.
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": rejection.body_text() })),
            )
                .into_response();
        }
    };

    match state.service.register_and_hire(body).await {
        Ok(response) => (StatusCode::CREATED, Json(serde_json::json!(response))).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// Map the onboarding error taxonomy onto HTTP statuses: requester
/// mistakes are 400, uniqueness collisions are 409, storage faults are
/// 500 with the detail kept server-side.
fn error_response(e: OnboardingError) -> (StatusCode, Json<serde_json::Value>) {
    let (status, message) = match e {
        OnboardingError::Validation(msg)
        | OnboardingError::NotHireable(msg)
        | OnboardingError::Policy(msg) => (StatusCode::BAD_REQUEST, msg),
        OnboardingError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        OnboardingError::Database(db) => {
            error!(error = %db, "Onboarding storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    (status, Json(serde_json::json!({ "error": message })))
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/onboarding/register-and-hire", post(register_and_hire))
        .with_state(state)
}
