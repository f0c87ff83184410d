pub mod onboarding_service;
pub mod state_store;
pub mod status_resolver;
pub mod step_gate;
