//! Startup seeding for the agents catalog.
//!
//! Onboarding can only hire an agent that already exists, so an empty
//! database gets one default agent. Seeding is skipped as soon as the
//! table has any row, making it safe to run on every startup.

use tracing::info;

use crate::error::DatabaseError;
use crate::model::EntityStatus;
use crate::store::backend::LibSqlStore;
use crate::store::repo;

const DEFAULT_AGENT_NAME: &str = "Support Bot";
const DEFAULT_AGENT_PROMPT: &str = "You are a helpful support assistant.";

/// Seed the default agent if the agents table is empty.
///
/// Returns the seeded agent's id, or None if seeding was skipped.
pub async fn seed_agents(store: &LibSqlStore) -> Result<Option<String>, DatabaseError> {
    let conn = store.conn();

    if repo::agents_exist(conn).await? {
        info!("Agents table has data, skipping seed");
        return Ok(None);
    }

    let agent = repo::create_agent(
        conn,
        DEFAULT_AGENT_NAME,
        DEFAULT_AGENT_PROMPT,
        EntityStatus::Active,
    )
    .await?;

    info!(agent_id = %agent.id, "Seeded default agent");
    Ok(Some(agent.id))
}
