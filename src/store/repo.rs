//! Repository operations over the entity tables.
//!
//! Every function takes an explicit `&Connection` so callers decide the
//! session: the store's base connection for plain reads and writes, or a
//! transaction's connection when the writes must commit or roll back as
//! one unit. Unique-constraint violations surface as
//! [`DatabaseError::Constraint`] with the offending field name(s).

use chrono::{DateTime, Utc};
use libsql::{Connection, params};
use secrecy::ExposeSecret;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{
    Agent, AgentChannel, BindingStatus, Channel, ChannelProvider, ChannelType, Client, ClientAgent,
    ClientPhone, ClientType, EntityStatus, LlmConfig, LlmProvider, User,
};
use crate::store::backend::map_write_error;

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    warn!(value = s, "Unparseable datetime in row, using minimum");
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Read a nullable TEXT column. NULL maps to `None`; any other non-text
/// value is a decode failure, not a missing value.
fn opt_text_col(row: &libsql::Row, idx: i32) -> Result<Option<String>, libsql::Error> {
    match row.get_value(idx)? {
        libsql::Value::Null => Ok(None),
        libsql::Value::Text(s) => Ok(Some(s)),
        _ => Err(libsql::Error::InvalidColumnType),
    }
}

async fn next_row(
    rows: &mut libsql::Rows,
    op: &str,
) -> Result<Option<libsql::Row>, DatabaseError> {
    rows.next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))
}

// ── Row mappers ─────────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, email, name, client_id, status, created_at, updated_at";

fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    let status: String = row.get(4)?;
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        client_id: row.get(3)?,
        status: EntityStatus::parse(&status),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

const CLIENT_COLUMNS: &str = "id, name, client_type, owner_user_id, status, created_at, updated_at";

fn row_to_client(row: &libsql::Row) -> Result<Client, libsql::Error> {
    let client_type: String = row.get(2)?;
    let status: String = row.get(4)?;
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        client_type: ClientType::parse(&client_type),
        owner_user_id: opt_text_col(row, 3)?,
        status: EntityStatus::parse(&status),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

const AGENT_COLUMNS: &str = "id, name, system_prompt, status, created_at, updated_at";

fn row_to_agent(row: &libsql::Row) -> Result<Agent, libsql::Error> {
    let status: String = row.get(3)?;
    let created: String = row.get(4)?;
    let updated: String = row.get(5)?;
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        system_prompt: row.get(2)?,
        status: EntityStatus::parse(&status),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

const CLIENT_AGENT_COLUMNS: &str = "id, client_id, agent_id, price, status, created_at";

fn row_to_client_agent(row: &libsql::Row) -> Result<ClientAgent, libsql::Error> {
    let status: String = row.get(4)?;
    let created: String = row.get(5)?;
    Ok(ClientAgent {
        id: row.get(0)?,
        client_id: row.get(1)?,
        agent_id: row.get(2)?,
        price: row.get(3)?,
        status: EntityStatus::parse(&status),
        created_at: parse_datetime(&created),
    })
}

const CHANNEL_COLUMNS: &str = "id, name, channel_type, provider, created_at";

fn row_to_channel(row: &libsql::Row) -> Result<Channel, libsql::Error> {
    let channel_type: String = row.get(2)?;
    let provider: String = row.get(3)?;
    let created: String = row.get(4)?;
    Ok(Channel {
        id: row.get(0)?,
        name: row.get(1)?,
        channel_type: ChannelType::parse(&channel_type),
        provider: ChannelProvider::parse(&provider),
        created_at: parse_datetime(&created),
    })
}

const CLIENT_PHONE_COLUMNS: &str = "id, client_id, phone_number_id, provider, metadata, created_at";

fn row_to_client_phone(row: &libsql::Row) -> Result<ClientPhone, libsql::Error> {
    let provider = opt_text_col(row, 3)?;
    let metadata = opt_text_col(row, 4)?;
    let created: String = row.get(5)?;
    Ok(ClientPhone {
        id: row.get(0)?,
        client_id: row.get(1)?,
        phone_number_id: row.get(2)?,
        provider: provider.as_deref().map(ChannelProvider::parse),
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        created_at: parse_datetime(&created),
    })
}

const AGENT_CHANNEL_COLUMNS: &str = "id, client_id, agent_id, channel_id, status, client_phone_id, \
     channel_config, llm_provider, llm_api_key, llm_model, created_at, updated_at";

fn row_to_agent_channel(row: &libsql::Row) -> Result<AgentChannel, libsql::Error> {
    let status: String = row.get(4)?;
    let config: String = row.get(6)?;
    let llm_provider: String = row.get(7)?;
    let llm_api_key: String = row.get(8)?;
    let created: String = row.get(10)?;
    let updated: String = row.get(11)?;
    Ok(AgentChannel {
        id: row.get(0)?,
        client_id: row.get(1)?,
        agent_id: row.get(2)?,
        channel_id: row.get(3)?,
        status: BindingStatus::parse(&status),
        client_phone_id: opt_text_col(row, 5)?,
        channel_config: serde_json::from_str(&config).unwrap_or(serde_json::json!({})),
        llm_config: LlmConfig {
            provider: LlmProvider::parse(&llm_provider),
            api_key: llm_api_key.into(),
            model: row.get(9)?,
        },
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

// ── Users ───────────────────────────────────────────────────────────

/// Insert a user. Email must already be normalized (lowercase, trimmed);
/// the schema's unique index is the race backstop.
pub async fn create_user(
    conn: &Connection,
    email: &str,
    name: &str,
    client_id: &str,
) -> Result<User, DatabaseError> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        name: name.to_string(),
        client_id: client_id.to_string(),
        status: EntityStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO users (id, email, name, client_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            user.id.clone(),
            user.email.clone(),
            user.name.clone(),
            user.client_id.clone(),
            user.status.as_str(),
            user.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| map_write_error("create_user", e))?;

    debug!(user_id = %user.id, "User created");
    Ok(user)
}

pub async fn find_user_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<User>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("find_user_by_email: {e}")))?;

    match next_row(&mut rows, "find_user_by_email").await? {
        Some(row) => Ok(Some(row_to_user(&row).map_err(|e| {
            DatabaseError::Query(format!("find_user_by_email row parse: {e}"))
        })?)),
        None => Ok(None),
    }
}

// ── Clients ─────────────────────────────────────────────────────────

/// Insert a client with no owner yet. The owner is patched in once the
/// owning user exists, inside the same transaction.
pub async fn create_client(
    conn: &Connection,
    name: &str,
    client_type: ClientType,
) -> Result<Client, DatabaseError> {
    let client = Client {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        client_type,
        owner_user_id: None,
        status: EntityStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO clients (id, name, client_type, owner_user_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?5)",
        params![
            client.id.clone(),
            client.name.clone(),
            client.client_type.as_str(),
            client.status.as_str(),
            client.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| map_write_error("create_client", e))?;

    debug!(client_id = %client.id, "Client created");
    Ok(client)
}

pub async fn set_client_owner(
    conn: &Connection,
    client_id: &str,
    owner_user_id: &str,
) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE clients SET owner_user_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![owner_user_id, now, client_id],
    )
    .await
    .map_err(|e| map_write_error("set_client_owner", e))?;
    Ok(())
}

pub async fn find_client(conn: &Connection, id: &str) -> Result<Option<Client>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
            params![id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("find_client: {e}")))?;

    match next_row(&mut rows, "find_client").await? {
        Some(row) => Ok(Some(row_to_client(&row).map_err(|e| {
            DatabaseError::Query(format!("find_client row parse: {e}"))
        })?)),
        None => Ok(None),
    }
}

// ── Agents ──────────────────────────────────────────────────────────

pub async fn create_agent(
    conn: &Connection,
    name: &str,
    system_prompt: &str,
    status: EntityStatus,
) -> Result<Agent, DatabaseError> {
    let agent = Agent {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        system_prompt: system_prompt.to_string(),
        status,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO agents (id, name, system_prompt, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            agent.id.clone(),
            agent.name.clone(),
            agent.system_prompt.clone(),
            agent.status.as_str(),
            agent.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| map_write_error("create_agent", e))?;

    debug!(agent_id = %agent.id, name = %agent.name, "Agent created");
    Ok(agent)
}

pub async fn find_agent(conn: &Connection, id: &str) -> Result<Option<Agent>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
            params![id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("find_agent: {e}")))?;

    match next_row(&mut rows, "find_agent").await? {
        Some(row) => Ok(Some(row_to_agent(&row).map_err(|e| {
            DatabaseError::Query(format!("find_agent row parse: {e}"))
        })?)),
        None => Ok(None),
    }
}

pub async fn list_agents(conn: &Connection) -> Result<Vec<Agent>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {AGENT_COLUMNS} FROM agents ORDER BY created_at ASC"),
            (),
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("list_agents: {e}")))?;

    let mut agents = Vec::new();
    while let Some(row) = next_row(&mut rows, "list_agents").await? {
        match row_to_agent(&row) {
            Ok(agent) => agents.push(agent),
            Err(e) => tracing::warn!("Skipping agent row: {e}"),
        }
    }
    Ok(agents)
}

/// Update an agent's status. Returns false if the agent doesn't exist.
pub async fn update_agent_status(
    conn: &Connection,
    id: &str,
    status: EntityStatus,
) -> Result<bool, DatabaseError> {
    let now = Utc::now().to_rfc3339();
    let count = conn
        .execute(
            "UPDATE agents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, id],
        )
        .await
        .map_err(|e| map_write_error("update_agent_status", e))?;
    Ok(count > 0)
}

pub async fn agents_exist(conn: &Connection) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query("SELECT EXISTS(SELECT 1 FROM agents)", ())
        .await
        .map_err(|e| DatabaseError::Query(format!("agents_exist: {e}")))?;

    match next_row(&mut rows, "agents_exist").await? {
        Some(row) => Ok(row.get::<i64>(0).unwrap_or(0) != 0),
        None => Ok(false),
    }
}

// ── Client agents ───────────────────────────────────────────────────

/// Insert the billing link for a hiring event, snapshotting the price.
pub async fn create_client_agent(
    conn: &Connection,
    client_id: &str,
    agent_id: &str,
    price: f64,
) -> Result<ClientAgent, DatabaseError> {
    let link = ClientAgent {
        id: Uuid::new_v4().to_string(),
        client_id: client_id.to_string(),
        agent_id: agent_id.to_string(),
        price,
        status: EntityStatus::Active,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO client_agents (id, client_id, agent_id, price, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            link.id.clone(),
            link.client_id.clone(),
            link.agent_id.clone(),
            link.price,
            link.status.as_str(),
            link.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| map_write_error("create_client_agent", e))?;

    debug!(client_agent_id = %link.id, "Client-agent link created");
    Ok(link)
}

// ── Channels ────────────────────────────────────────────────────────

pub async fn find_channel_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<Channel>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE name = ?1"),
            params![name],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("find_channel_by_name: {e}")))?;

    match next_row(&mut rows, "find_channel_by_name").await? {
        Some(row) => Ok(Some(row_to_channel(&row).map_err(|e| {
            DatabaseError::Query(format!("find_channel_by_name row parse: {e}"))
        })?)),
        None => Ok(None),
    }
}

pub async fn create_channel(
    conn: &Connection,
    name: &str,
    channel_type: ChannelType,
    provider: ChannelProvider,
) -> Result<Channel, DatabaseError> {
    let channel = Channel {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        channel_type,
        provider,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO channels (id, name, channel_type, provider, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            channel.id.clone(),
            channel.name.clone(),
            channel.channel_type.as_str(),
            channel.provider.as_str(),
            channel.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| map_write_error("create_channel", e))?;

    debug!(channel_id = %channel.id, name = %channel.name, "Channel created");
    Ok(channel)
}

// ── Client phones ───────────────────────────────────────────────────

/// Global ownership lookup: who owns this phone number, if anyone.
pub async fn find_client_phone_by_number(
    conn: &Connection,
    phone_number_id: &str,
) -> Result<Option<ClientPhone>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {CLIENT_PHONE_COLUMNS} FROM client_phones WHERE phone_number_id = ?1"),
            params![phone_number_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("find_client_phone_by_number: {e}")))?;

    match next_row(&mut rows, "find_client_phone_by_number").await? {
        Some(row) => Ok(Some(row_to_client_phone(&row).map_err(|e| {
            DatabaseError::Query(format!("find_client_phone_by_number row parse: {e}"))
        })?)),
        None => Ok(None),
    }
}

pub async fn create_client_phone(
    conn: &Connection,
    client_id: &str,
    phone_number_id: &str,
    provider: Option<ChannelProvider>,
) -> Result<ClientPhone, DatabaseError> {
    let phone = ClientPhone {
        id: Uuid::new_v4().to_string(),
        client_id: client_id.to_string(),
        phone_number_id: phone_number_id.to_string(),
        provider,
        metadata: None,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO client_phones (id, client_id, phone_number_id, provider, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
        params![
            phone.id.clone(),
            phone.client_id.clone(),
            phone.phone_number_id.clone(),
            opt_text(phone.provider.map(|p| p.as_str())),
            phone.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| map_write_error("create_client_phone", e))?;

    debug!(client_phone_id = %phone.id, "Client phone claimed");
    Ok(phone)
}

// ── Agent channels ──────────────────────────────────────────────────

/// Fields for a new agent-channel binding.
pub struct NewAgentChannel<'a> {
    pub client_id: &'a str,
    pub agent_id: &'a str,
    pub channel_id: &'a str,
    pub status: BindingStatus,
    pub client_phone_id: Option<&'a str>,
    pub channel_config: &'a serde_json::Value,
    pub llm_config: &'a LlmConfig,
}

pub async fn create_agent_channel(
    conn: &Connection,
    new: NewAgentChannel<'_>,
) -> Result<AgentChannel, DatabaseError> {
    let binding = AgentChannel {
        id: Uuid::new_v4().to_string(),
        client_id: new.client_id.to_string(),
        agent_id: new.agent_id.to_string(),
        channel_id: new.channel_id.to_string(),
        status: new.status,
        client_phone_id: new.client_phone_id.map(str::to_string),
        channel_config: new.channel_config.clone(),
        llm_config: new.llm_config.clone(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let config_json = serde_json::to_string(&binding.channel_config)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO agent_channels (id, client_id, agent_id, channel_id, status, client_phone_id,
             channel_config, llm_provider, llm_api_key, llm_model, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            binding.id.clone(),
            binding.client_id.clone(),
            binding.agent_id.clone(),
            binding.channel_id.clone(),
            binding.status.as_str(),
            opt_text(binding.client_phone_id.as_deref()),
            config_json,
            binding.llm_config.provider.as_str(),
            binding.llm_config.api_key.expose_secret(),
            binding.llm_config.model.clone(),
            binding.created_at.to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| map_write_error("create_agent_channel", e))?;

    debug!(agent_channel_id = %binding.id, channel_id = %binding.channel_id, "Agent channel created");
    Ok(binding)
}

pub async fn list_agent_channels_for_client(
    conn: &Connection,
    client_id: &str,
) -> Result<Vec<AgentChannel>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {AGENT_CHANNEL_COLUMNS} FROM agent_channels
                 WHERE client_id = ?1 ORDER BY created_at ASC"
            ),
            params![client_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("list_agent_channels_for_client: {e}")))?;

    let mut bindings = Vec::new();
    while let Some(row) = next_row(&mut rows, "list_agent_channels_for_client").await? {
        bindings.push(row_to_agent_channel(&row).map_err(|e| {
            DatabaseError::Query(format!("list_agent_channels_for_client row parse: {e}"))
        })?);
    }
    Ok(bindings)
}
