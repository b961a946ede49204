//! Response views for the register-and-hire endpoint.
//!
//! These are the only shapes that cross the HTTP boundary on success.
//! `LlmConfigView` carries provider and model and nothing else, so the
//! API key is redacted by construction rather than by filtering.

use serde::Serialize;

use crate::model::{
    AgentChannel, BindingStatus, Client, ClientAgent, ClientType, EntityStatus, LlmProvider, User,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAndHireResponse {
    pub user: UserView,
    pub client: ClientView,
    pub client_agent: ClientAgentView,
    pub agent_channels: Vec<AgentChannelView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: String,
    pub client_id: String,
    pub status: EntityStatus,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            client_id: user.client_id.clone(),
            status: user.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub owner_user_id: Option<String>,
    pub status: EntityStatus,
}

impl ClientView {
    /// View of the client as committed, with the owner patched in.
    pub fn new(client: &Client, owner_user_id: &str) -> Self {
        Self {
            id: client.id.clone(),
            name: client.name.clone(),
            client_type: client.client_type,
            owner_user_id: Some(owner_user_id.to_string()),
            status: client.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAgentView {
    pub id: String,
    pub client_id: String,
    pub agent_id: String,
    pub price: f64,
    pub status: EntityStatus,
}

impl From<&ClientAgent> for ClientAgentView {
    fn from(link: &ClientAgent) -> Self {
        Self {
            id: link.id.clone(),
            client_id: link.client_id.clone(),
            agent_id: link.agent_id.clone(),
            price: link.price,
            status: link.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentChannelView {
    pub id: String,
    pub client_id: String,
    pub agent_id: String,
    pub channel_id: String,
    pub status: BindingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_phone_id: Option<String>,
    pub channel_config: serde_json::Value,
    pub llm_config: LlmConfigView,
}

impl From<&AgentChannel> for AgentChannelView {
    fn from(binding: &AgentChannel) -> Self {
        Self {
            id: binding.id.clone(),
            client_id: binding.client_id.clone(),
            agent_id: binding.agent_id.clone(),
            channel_id: binding.channel_id.clone(),
            status: binding.status,
            client_phone_id: binding.client_phone_id.clone(),
            channel_config: binding.channel_config.clone(),
            llm_config: LlmConfigView {
                provider: binding.llm_config.provider,
                model: binding.llm_config.model.clone(),
            },
        }
    }
}

/// Sanitized LLM config: provider and model only, never the API key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfigView {
    pub provider: LlmProvider,
    pub model: String,
}
