// src/middleware/snapshot.rs

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{models::store::ClientSnapshot, services::state_store::SnapshotInput};

// O cliente manda o estado de onboarding em cache a cada requisição; o
// servidor não guarda cópia.
const SNAPSHOT_HEADER: &str = "x-onboarding-snapshot";

pub struct ClientCache(pub SnapshotInput);

impl<S> FromRequestParts<S> for ClientCache
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let input = match parts.headers.get(SNAPSHOT_HEADER) {
            None => SnapshotInput::Absent,
            Some(value) => match value.to_str() {
                Err(_) => SnapshotInput::Malformed("o header do snapshot não é ASCII".to_string()),
                Ok(raw) => match serde_json::from_str::<ClientSnapshot>(raw) {
                    Ok(snapshot) => SnapshotInput::Present(snapshot),
                    Err(e) => SnapshotInput::Malformed(e.to_string()),
                },
            },
        };

        Ok(ClientCache(input))
    }
}
