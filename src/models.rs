pub mod auth;
pub mod onboarding;
pub mod profile;
pub mod store;
