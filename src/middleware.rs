pub mod auth;
pub mod snapshot;
