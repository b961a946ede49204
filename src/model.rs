//! Domain entities shared by the store and the HTTP surface.
//!
//! All ids are UUID v4 strings; timestamps are UTC and stored as RFC 3339
//! TEXT. Enum values map 1:1 to the strings persisted in the database and
//! carried on the wire.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by users, clients, agents and billing links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Inactive,
    Archived,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Inactive => "inactive",
            EntityStatus::Archived => "archived",
        }
    }

    /// Parse a DB string; unknown values are treated as inactive.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => EntityStatus::Active,
            "archived" => EntityStatus::Archived,
            _ => EntityStatus::Inactive,
        }
    }
}

/// Status of an agent-channel binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStatus {
    Active,
    Inactive,
}

impl BindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStatus::Active => "active",
            BindingStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "inactive" => BindingStatus::Inactive,
            _ => BindingStatus::Active,
        }
    }
}

/// Kind of tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Individual,
    Organization,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Individual => "individual",
            ClientType::Organization => "organization",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "organization" => ClientType::Organization,
            _ => ClientType::Individual,
        }
    }
}

/// Communication medium a channel represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Whatsapp,
    Telegram,
    Web,
    Api,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Whatsapp => "whatsapp",
            ChannelType::Telegram => "telegram",
            ChannelType::Web => "web",
            ChannelType::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "whatsapp" => ChannelType::Whatsapp,
            "telegram" => ChannelType::Telegram,
            "web" => ChannelType::Web,
            _ => ChannelType::Api,
        }
    }
}

/// Upstream messaging provider behind a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelProvider {
    Meta,
    Twilio,
    Custom,
}

impl ChannelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelProvider::Meta => "meta",
            ChannelProvider::Twilio => "twilio",
            ChannelProvider::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "meta" => ChannelProvider::Meta,
            "twilio" => ChannelProvider::Twilio,
            _ => ChannelProvider::Custom,
        }
    }
}

/// LLM provider an agent-channel binding calls out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Openai,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Openai => "openai",
            LlmProvider::Anthropic => "anthropic",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "anthropic" => LlmProvider::Anthropic,
            _ => LlmProvider::Openai,
        }
    }
}

/// LLM configuration carried by an agent-channel binding.
///
/// The API key is a [`SecretString`]: it deserializes from requests and is
/// written to storage, but it has no `Serialize` impl, so it cannot end up
/// in a response or log by accident.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: SecretString,
    pub model: String,
}

/// A registered platform user. Email is globally unique, lowercased and
/// trimmed before storage.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub client_id: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tenant. `owner_user_id` is null only transiently inside the onboarding
/// transaction, between client creation and the owner patch.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub client_type: ClientType,
    pub owner_user_id: Option<String>,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A hireable chatbot persona. Onboarding only reads agents; they are
/// created by the admin surface or the seeder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Billing link created when a client hires an agent. Snapshots the
/// negotiated price at hire time.
#[derive(Debug, Clone)]
pub struct ClientAgent {
    pub id: String,
    pub client_id: String,
    pub agent_id: String,
    pub price: f64,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

/// Shared catalog entry for a communication channel. Globally unique by
/// name, not tenant-scoped.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub channel_type: ChannelType,
    pub provider: ChannelProvider,
    pub created_at: DateTime<Utc>,
}

/// Ownership record binding a phone-number identifier to exactly one client.
#[derive(Debug, Clone)]
pub struct ClientPhone {
    pub id: String,
    pub client_id: String,
    pub phone_number_id: String,
    pub provider: Option<ChannelProvider>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Binding of one tenant's hired agent to one channel. Unique per
/// (client, agent, channel).
#[derive(Debug, Clone)]
pub struct AgentChannel {
    pub id: String,
    pub client_id: String,
    pub agent_id: String,
    pub channel_id: String,
    pub status: BindingStatus,
    pub client_phone_id: Option<String>,
    /// Channel-specific settings with the phone number stripped out
    /// (ownership lives in [`ClientPhone`]).
    pub channel_config: serde_json::Value,
    pub llm_config: LlmConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
