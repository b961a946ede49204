//! REST endpoints for managing the agents catalog.
//!
//! Onboarding can only hire agents that exist here, so operators use this
//! surface to publish agents and take them out of rotation.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::DatabaseError;
use crate::model::{Agent, EntityStatus};
use crate::store::{repo, LibSqlStore};

/// Shared state for agent routes.
#[derive(Clone)]
pub struct AgentRouteState {
    pub store: Arc<LibSqlStore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    pub system_prompt: String,
    pub status: Option<EntityStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentStatusRequest {
    pub status: EntityStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub status: EntityStatus,
}

impl From<&Agent> for AgentView {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            system_prompt: agent.system_prompt.clone(),
            status: agent.status,
        }
    }
}

/// POST /api/agents
///
/// Publishes a new agent. Status defaults to active.
async fn create_agent(
    State(state): State<AgentRouteState>,
    body: Result<Json<CreateAgentRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(rejection),
    };
    if body.name.trim().is_empty() {
        return bad_request("name must not be empty");
    }
    if body.system_prompt.trim().is_empty() {
        return bad_request("systemPrompt must not be empty");
    }

    let status = body.status.unwrap_or(EntityStatus::Active);
    match repo::create_agent(state.store.conn(), body.name.trim(), &body.system_prompt, status)
        .await
    {
        Ok(agent) => {
            info!(agent_id = %agent.id, name = %agent.name, "Agent published");
            (
                StatusCode::CREATED,
                Json(serde_json::json!(AgentView::from(&agent))),
            )
        }
        Err(e) => storage_error("create agent", e),
    }
}

/// GET /api/agents
async fn list_agents(State(state): State<AgentRouteState>) -> impl IntoResponse {
    match repo::list_agents(state.store.conn()).await {
        Ok(agents) => {
            let views: Vec<AgentView> = agents.iter().map(AgentView::from).collect();
            (StatusCode::OK, Json(serde_json::json!(views)))
        }
        Err(e) => storage_error("list agents", e),
    }
}

/// GET /api/agents/{id}
async fn get_agent(
    State(state): State<AgentRouteState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match repo::find_agent(state.store.conn(), &id).await {
        Ok(Some(agent)) => (
            StatusCode::OK,
            Json(serde_json::json!(AgentView::from(&agent))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Agent not found"})),
        ),
        Err(e) => storage_error("get agent", e),
    }
}

/// POST /api/agents/{id}/status
///
/// Moves an agent between active, inactive and archived. Existing hires
/// keep their bindings; only new hires are gated on the agent's status.
async fn update_agent_status(
    State(state): State<AgentRouteState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateAgentStatusRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected_body(rejection),
    };
    match repo::update_agent_status(state.store.conn(), &id, body.status).await {
        Ok(true) => match repo::find_agent(state.store.conn(), &id).await {
            Ok(Some(agent)) => {
                info!(agent_id = %id, status = agent.status.as_str(), "Agent status updated");
                (
                    StatusCode::OK,
                    Json(serde_json::json!(AgentView::from(&agent))),
                )
            }
            Ok(None) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Agent not found"})),
            ),
            Err(e) => storage_error("reload agent", e),
        },
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Agent not found"})),
        ),
        Err(e) => storage_error("update agent status", e),
    }
}

fn rejected_body(rejection: JsonRejection) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": rejection.body_text()})),
    )
}

fn bad_request(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
}

fn storage_error(op: &str, e: DatabaseError) -> (StatusCode, Json<serde_json::Value>) {
    error!(error = %e, "Failed to {op}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "Internal server error"})),
    )
}

/// Build the agent admin routes.
pub fn agent_routes(state: AgentRouteState) -> Router {
    Router::new()
        .route("/api/agents", post(create_agent).get(list_agents))
        .route("/api/agents/{id}", get(get_agent))
        .route("/api/agents/{id}/status", post(update_agent_status))
        .with_state(state)
}
