//! Agent Hire — multi-tenant agent onboarding backend.

pub mod agents;
pub mod config;
pub mod error;
pub mod model;
pub mod onboarding;
pub mod store;
