//! Error types for Agent Hire.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Unique-constraint violation. Carries the violated column name(s),
    /// e.g. `"email"` or `"client_id, agent_id, channel_id"`.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Domain errors for the register-and-hire flow.
///
/// The first four variants are caller-facing and map to HTTP 400/409;
/// `Database` covers everything the storage layer surfaces after rollback.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    /// Malformed or out-of-range input fields. Safe to retry after fixing
    /// the input. Maps to 400.
    #[error("{0}")]
    Validation(String),

    /// Requested agent is missing or not `active`. Maps to 400.
    #[error("{0}")]
    NotHireable(String),

    /// Request-shape policy violation (org client without a name, duplicate
    /// channel names in one request). Maps to 400.
    #[error("{0}")]
    Policy(String),

    /// Cross-entity uniqueness conflict: email already registered, phone
    /// owned by another tenant, or a duplicate-key race surfaced
    /// mid-transaction. Maps to 409.
    #[error("{0}")]
    Conflict(String),

    /// Unclassified storage failure, propagated unchanged after rollback.
    /// Maps to 500 at the HTTP boundary.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
