pub mod onboarding;
pub mod setup;
