//! Admin surface for the agents catalog.

pub mod routes;

pub use routes::{agent_routes, AgentRouteState};
