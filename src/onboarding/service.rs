//! The register-and-hire flow: pre-flight validation, then one atomic
//! transaction creating the tenant, its owning user, the billing link and
//! every requested agent-channel binding.
//!
//! Pre-flight runs read-only against the base connection, under the
//! store's read guard so it never observes another call's uncommitted
//! rows, and rejects cheaply. The transaction re-resolves the shared
//! resources (channel catalog, phone ownership) because the pre-flight
//! check-then-act window is not closed; the schema's unique constraints
//! are the final backstop, and constraint violations are translated to
//! domain conflicts here.

use std::collections::HashSet;
use std::sync::Arc;

use libsql::Connection;
use tracing::{info, warn};

use crate::error::{DatabaseError, OnboardingError};
use crate::model::{Agent, Channel, ClientType, EntityStatus, LlmConfig};
use crate::onboarding::request::{ChannelRequest, RegisterAndHireRequest};
use crate::onboarding::response::{
    AgentChannelView, ClientAgentView, ClientView, RegisterAndHireResponse, UserView,
};
use crate::store::repo::{self, NewAgentChannel};
use crate::store::LibSqlStore;

pub struct OnboardingService {
    store: Arc<LibSqlStore>,
}

impl OnboardingService {
    pub fn new(store: Arc<LibSqlStore>) -> Self {
        Self { store }
    }

    /// Register a user, create their tenant, hire an agent and provision
    /// channels, atomically.
    pub async fn register_and_hire(
        &self,
        request: RegisterAndHireRequest,
    ) -> Result<RegisterAndHireResponse, OnboardingError> {
        request.validate()?;
        let email = request.normalized_email();

        self.preflight(&request, &email).await?;

        let tx = self.store.begin().await?;
        match self.provision(tx.conn(), &request, &email).await {
            Ok(response) => {
                tx.commit().await?;
                info!(
                    user_id = %response.user.id,
                    client_id = %response.client.id,
                    agent_id = %response.client_agent.agent_id,
                    channels = response.agent_channels.len(),
                    "Onboarding completed"
                );
                Ok(response)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed onboarding");
                }
                Err(classify_write_failure(e))
            }
        }
    }

    // ── Pre-flight ──────────────────────────────────────────────────

    /// Every check that needs no transactional write, in order, failing on
    /// the first violation. Read-only; holds the store's read guard so no
    /// in-flight transaction's uncommitted rows leak into the checks.
    async fn preflight(
        &self,
        request: &RegisterAndHireRequest,
        email: &str,
    ) -> Result<(), OnboardingError> {
        let _guard = self.store.read_guard().await;
        let conn = self.store.conn();

        if repo::find_user_by_email(conn, email).await?.is_some() {
            return Err(OnboardingError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        self.validate_hireable(conn, &request.agent_hiring.agent_id)
            .await?;

        if request.client.client_type == ClientType::Organization
            && request
                .client
                .name
                .as_deref()
                .is_none_or(|name| name.trim().is_empty())
        {
            return Err(OnboardingError::Policy(
                "Client name is required for organization type".to_string(),
            ));
        }

        self.validate_channels(conn, &request.channels).await?;
        Ok(())
    }

    /// Agent eligibility gate: the agent must exist and be active.
    async fn validate_hireable(
        &self,
        conn: &Connection,
        agent_id: &str,
    ) -> Result<Agent, OnboardingError> {
        let agent = repo::find_agent(conn, agent_id)
            .await?
            .ok_or_else(|| OnboardingError::NotHireable("Agent not found".to_string()))?;
        if agent.status != EntityStatus::Active {
            return Err(OnboardingError::NotHireable(
                "Agent is not currently available".to_string(),
            ));
        }
        Ok(agent)
    }

    /// Channel-list checks: unique names within the request, and no
    /// requested phone number already owned by an existing client.
    ///
    /// Phone numbers are deduplicated first: the same phone on two channels
    /// of one request is legal, since ownership is per-client.
    async fn validate_channels(
        &self,
        conn: &Connection,
        channels: &[ChannelRequest],
    ) -> Result<(), OnboardingError> {
        let mut names = HashSet::new();
        for channel in channels {
            if !names.insert(channel.name.as_str()) {
                return Err(OnboardingError::Policy(
                    "Duplicate channel names in request".to_string(),
                ));
            }
        }

        let phone_number_ids: HashSet<&str> = channels
            .iter()
            .filter_map(|c| c.phone_number_id())
            .collect();

        for phone_number_id in phone_number_ids {
            if repo::find_client_phone_by_number(conn, phone_number_id)
                .await?
                .is_some()
            {
                return Err(OnboardingError::Conflict(format!(
                    "Phone number {phone_number_id} is already owned by another client"
                )));
            }
        }
        Ok(())
    }

    // ── Transaction body ────────────────────────────────────────────

    /// The ordered write sequence. Runs entirely on the transaction's
    /// connection; any error here aborts the whole unit.
    async fn provision(
        &self,
        conn: &Connection,
        request: &RegisterAndHireRequest,
        email: &str,
    ) -> Result<RegisterAndHireResponse, OnboardingError> {
        // Client first (the user needs its id), owner patched in after the
        // user exists. The null-owner state never escapes the transaction.
        let client_name = request
            .client
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| request.user.name.trim());
        let client = repo::create_client(conn, client_name, request.client.client_type).await?;

        let user = repo::create_user(conn, email, request.user.name.trim(), &client.id).await?;
        repo::set_client_owner(conn, &client.id, &user.id).await?;

        let client_agent = repo::create_client_agent(
            conn,
            &client.id,
            &request.agent_hiring.agent_id,
            request.agent_hiring.price,
        )
        .await?;

        let mut agent_channels = Vec::with_capacity(request.channels.len());
        for channel_request in &request.channels {
            let channel = self.resolve_channel(conn, channel_request).await?;

            let client_phone_id = match channel_request.phone_number_id() {
                Some(phone_number_id) => Some(
                    self.resolve_client_phone(conn, &client.id, phone_number_id, channel_request)
                        .await?,
                ),
                None => None,
            };

            let channel_config = channel_request.config_without_phone();
            let llm = &channel_request.agent_channel_config.llm_config;
            let llm_config = LlmConfig {
                provider: llm.provider,
                api_key: llm.api_key.clone(),
                model: llm.model.clone(),
            };

            let binding = repo::create_agent_channel(
                conn,
                NewAgentChannel {
                    client_id: &client.id,
                    agent_id: &request.agent_hiring.agent_id,
                    channel_id: &channel.id,
                    status: channel_request.status_or_default(),
                    client_phone_id: client_phone_id.as_deref(),
                    channel_config: &channel_config,
                    llm_config: &llm_config,
                },
            )
            .await?;
            agent_channels.push(AgentChannelView::from(&binding));
        }

        Ok(RegisterAndHireResponse {
            user: UserView::from(&user),
            client: ClientView::new(&client, &user.id),
            client_agent: ClientAgentView::from(&client_agent),
            agent_channels,
        })
    }

    /// Channel registry resolver: find-or-create the shared catalog entry
    /// by name. Concurrent creators converge via the unique index on name.
    async fn resolve_channel(
        &self,
        conn: &Connection,
        request: &ChannelRequest,
    ) -> Result<Channel, OnboardingError> {
        if let Some(channel) = repo::find_channel_by_name(conn, &request.name).await? {
            return Ok(channel);
        }
        Ok(repo::create_channel(
            conn,
            &request.name,
            request.channel_type,
            request.provider_or_default(),
        )
        .await?)
    }

    /// Phone ownership resolver.
    ///
    /// Unowned numbers are claimed for this client; a number this client
    /// already owns is reused (two channels in one request may share it).
    /// A number owned by a different client should have been rejected in
    /// pre-flight; seeing one here means a lost race, reported as the same
    /// conflict.
    async fn resolve_client_phone(
        &self,
        conn: &Connection,
        client_id: &str,
        phone_number_id: &str,
        request: &ChannelRequest,
    ) -> Result<String, OnboardingError> {
        match repo::find_client_phone_by_number(conn, phone_number_id).await? {
            Some(phone) if phone.client_id == client_id => Ok(phone.id),
            Some(_) => Err(OnboardingError::Conflict(format!(
                "Phone number {phone_number_id} is already owned by another client"
            ))),
            None => Ok(repo::create_client_phone(
                conn,
                client_id,
                phone_number_id,
                Some(request.provider_or_default()),
            )
            .await?
            .id),
        }
    }
}

/// Translate duplicate-key violations surfaced mid-transaction into domain
/// conflicts naming the offending field(s); everything else passes through.
fn classify_write_failure(e: OnboardingError) -> OnboardingError {
    match e {
        OnboardingError::Database(DatabaseError::Constraint(fields)) => {
            OnboardingError::Conflict(format!("Duplicate value for field: {fields}"))
        }
        other => other,
    }
}
