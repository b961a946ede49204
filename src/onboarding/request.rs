//! Request body for the register-and-hire endpoint.
//!
//! Wire format is camelCase JSON. Field-level validation lives here;
//! anything that needs a database read (email uniqueness, agent
//! eligibility, phone ownership) belongs to the service's pre-flight.

use std::sync::LazyLock;

use regex::Regex;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::OnboardingError;
use crate::model::{BindingStatus, ChannelProvider, ChannelType, ClientType, LlmProvider};

/// Key inside `channelConfig` that carries the phone-number identifier.
/// It is extracted into a ClientPhone record and stripped from the stored
/// config.
pub const PHONE_NUMBER_KEY: &str = "phoneNumberId";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAndHireRequest {
    pub user: UserRequest,
    pub client: ClientRequest,
    pub agent_hiring: AgentHiringRequest,
    pub channels: Vec<ChannelRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHiringRequest {
    pub agent_id: String,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub provider: Option<ChannelProvider>,
    pub agent_channel_config: AgentChannelConfigRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentChannelConfigRequest {
    pub status: Option<BindingStatus>,
    pub channel_config: serde_json::Value,
    pub llm_config: LlmConfigRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfigRequest {
    pub provider: LlmProvider,
    /// Deserialize-only: `SecretString` has no `Serialize` impl, so the key
    /// cannot flow back out through any response type.
    pub api_key: SecretString,
    pub model: String,
}

impl RegisterAndHireRequest {
    /// Field-level checks that need no database access.
    pub fn validate(&self) -> Result<(), OnboardingError> {
        let email = self.user.email.trim();
        if !EMAIL_RE.is_match(email) {
            return Err(OnboardingError::Validation(
                "user.email must be a valid email address".to_string(),
            ));
        }
        if self.user.name.trim().is_empty() {
            return Err(OnboardingError::Validation(
                "user.name must not be empty".to_string(),
            ));
        }
        if self.agent_hiring.agent_id.trim().is_empty() {
            return Err(OnboardingError::Validation(
                "agentHiring.agentId must not be empty".to_string(),
            ));
        }
        if !self.agent_hiring.price.is_finite() || self.agent_hiring.price < 0.0 {
            return Err(OnboardingError::Validation(
                "agentHiring.price must be a non-negative number".to_string(),
            ));
        }
        for channel in &self.channels {
            channel.validate()?;
        }
        Ok(())
    }

    /// Email as stored: lowercased and trimmed.
    pub fn normalized_email(&self) -> String {
        self.user.email.trim().to_lowercase()
    }
}

impl ChannelRequest {
    fn validate(&self) -> Result<(), OnboardingError> {
        if self.name.trim().is_empty() {
            return Err(OnboardingError::Validation(
                "channels[].name must not be empty".to_string(),
            ));
        }
        if !self.agent_channel_config.channel_config.is_object() {
            return Err(OnboardingError::Validation(format!(
                "channels[].channelConfig for '{}' must be an object",
                self.name
            )));
        }
        if let Some(phone) = self
            .agent_channel_config
            .channel_config
            .get(PHONE_NUMBER_KEY)
        {
            if !phone.is_string() {
                return Err(OnboardingError::Validation(format!(
                    "channels[].channelConfig.{PHONE_NUMBER_KEY} for '{}' must be a string",
                    self.name
                )));
            }
        }
        if self.agent_channel_config.llm_config.model.trim().is_empty() {
            return Err(OnboardingError::Validation(format!(
                "channels[].llmConfig.model for '{}' must not be empty",
                self.name
            )));
        }
        Ok(())
    }

    /// Upstream provider, defaulting to `custom` when omitted.
    pub fn provider_or_default(&self) -> ChannelProvider {
        self.provider.unwrap_or(ChannelProvider::Custom)
    }

    /// Requested binding status, defaulting to active.
    pub fn status_or_default(&self) -> BindingStatus {
        self.agent_channel_config
            .status
            .unwrap_or(BindingStatus::Active)
    }

    /// The phone-number identifier inside `channelConfig`, if any.
    pub fn phone_number_id(&self) -> Option<&str> {
        self.agent_channel_config
            .channel_config
            .get(PHONE_NUMBER_KEY)
            .and_then(|v| v.as_str())
    }

    /// The channel config with the phone number stripped out; ownership
    /// lives only in the ClientPhone record.
    pub fn config_without_phone(&self) -> serde_json::Value {
        let mut config = self.agent_channel_config.channel_config.clone();
        if let Some(map) = config.as_object_mut() {
            map.remove(PHONE_NUMBER_KEY);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> serde_json::Value {
        serde_json::json!({
            "user": { "email": "A@B.com", "name": "Alice" },
            "client": { "type": "individual" },
            "agentHiring": { "agentId": "agent-1", "price": 100.0 },
            "channels": [{
                "name": "wa-main",
                "type": "whatsapp",
                "provider": "meta",
                "agentChannelConfig": {
                    "status": "active",
                    "channelConfig": {
                        "phoneNumberId": "555",
                        "accessToken": "tok",
                        "webhookVerifyToken": "verify"
                    },
                    "llmConfig": {
                        "provider": "openai",
                        "apiKey": "sk-secret",
                        "model": "gpt-4o-mini"
                    }
                }
            }]
        })
    }

    fn parse(body: serde_json::Value) -> RegisterAndHireRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn full_body_parses_and_validates() {
        let req = parse(sample_body());
        req.validate().unwrap();
        assert_eq!(req.normalized_email(), "a@b.com");
        assert_eq!(req.channels[0].phone_number_id(), Some("555"));
        assert_eq!(req.channels[0].provider_or_default(), ChannelProvider::Meta);
    }

    #[test]
    fn phone_is_stripped_from_config() {
        let req = parse(sample_body());
        let config = req.channels[0].config_without_phone();
        assert!(config.get(PHONE_NUMBER_KEY).is_none());
        assert_eq!(config["accessToken"], "tok");
    }

    #[test]
    fn missing_provider_defaults_to_custom() {
        let mut body = sample_body();
        body["channels"][0]
            .as_object_mut()
            .unwrap()
            .remove("provider");
        let req = parse(body);
        assert_eq!(
            req.channels[0].provider_or_default(),
            ChannelProvider::Custom
        );
    }

    #[test]
    fn bad_email_is_rejected() {
        let mut body = sample_body();
        body["user"]["email"] = "not-an-email".into();
        let err = parse(body).validate().unwrap_err();
        assert!(matches!(err, OnboardingError::Validation(_)));
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut body = sample_body();
        body["agentHiring"]["price"] = (-1.0).into();
        let err = parse(body).validate().unwrap_err();
        assert!(matches!(err, OnboardingError::Validation(_)));
    }

    #[test]
    fn non_object_channel_config_is_rejected() {
        let mut body = sample_body();
        body["channels"][0]["agentChannelConfig"]["channelConfig"] = "oops".into();
        let err = parse(body).validate().unwrap_err();
        assert!(matches!(err, OnboardingError::Validation(_)));
    }
}
