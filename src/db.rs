pub mod onboarding_repo;
pub use onboarding_repo::{OnboardingRecordStore, OnboardingRepository, ProvisionRequest};
pub mod memory;
pub use memory::MemoryRecordStore;
