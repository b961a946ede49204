//! Atomic user registration, client creation and agent hiring.

pub mod request;
pub mod response;
pub mod routes;
pub mod service;

pub use routes::{onboarding_routes, OnboardingRouteState};
pub use service::OnboardingService;
