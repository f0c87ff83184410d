// src/services/state_store.rs

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::timeout;

use crate::{
    db::OnboardingRecordStore,
    models::{
        auth::{Claims, SessionContext},
        store::{ClientSnapshot, PartialView, Provenance, SourceSlot, SourceViews},
    },
};

/// Por que uma store não contribuiu para a resolução. Nunca sai do
/// adaptador; vira um slot `Unavailable`.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("tempo esgotado após {0:?}")]
    Timeout(Duration),

    #[error("sem dados: {0}")]
    Missing(&'static str),

    #[error("dados malformados: {0}")]
    Malformed(String),

    #[error("erro no backend: {0}")]
    Backend(String),
}

/// Uma store que falha de forma independente.
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn fetch(&self, session: &SessionContext) -> Result<PartialView, SourceError>;
}

// ---
// Primária: store autoritativa de registros
// ---
pub struct BackendRecordSource {
    records: Arc<dyn OnboardingRecordStore>,
}

impl BackendRecordSource {
    pub fn new(records: Arc<dyn OnboardingRecordStore>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl StateSource for BackendRecordSource {
    async fn fetch(&self, session: &SessionContext) -> Result<PartialView, SourceError> {
        let record = self
            .records
            .find_record(session.user_id())
            .await
            .map_err(|e| SourceError::Backend(e.to_string()))?;

        // Usuário desconhecido é uma resposta válida da autoridade, não uma falha.
        Ok(record
            .map(|r| r.into_view())
            .unwrap_or_else(|| PartialView::empty(Provenance::BackendRecord)))
    }
}

// ---
// Secundária: atributos custom do provedor de identidade
// ---
/// Lê os atributos `custom:*` direto da credencial da sessão.
pub struct IdentityAttributeSource {
    jwt_secret: String,
}

impl IdentityAttributeSource {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self { jwt_secret: jwt_secret.into() }
    }
}

#[async_trait]
impl StateSource for IdentityAttributeSource {
    async fn fetch(&self, session: &SessionContext) -> Result<PartialView, SourceError> {
        let claims = Claims::decode(session.credential(), &self.jwt_secret)
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(claims.attributes.into_view())
    }
}

// ---
// Terciária: o snapshot do cache do cliente, válido só na requisição
// ---
/// O que o cliente mandou como cache, como chegou na fronteira da requisição.
#[derive(Debug, Clone, Default)]
pub enum SnapshotInput {
    #[default]
    Absent,
    /// Descartado pelo servidor. Caminhos de escrita não confiam no cache do cliente.
    Ignored,
    Malformed(String),
    Present(ClientSnapshot),
}

pub struct ClientCacheSource {
    snapshot: SnapshotInput,
}

impl ClientCacheSource {
    pub fn new(snapshot: SnapshotInput) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl StateSource for ClientCacheSource {
    async fn fetch(&self, _session: &SessionContext) -> Result<PartialView, SourceError> {
        match &self.snapshot {
            SnapshotInput::Absent => Err(SourceError::Missing("nenhum snapshot do cliente enviado")),
            SnapshotInput::Ignored => Err(SourceError::Missing("snapshot do cliente ignorado na escrita")),
            SnapshotInput::Malformed(detail) => Err(SourceError::Malformed(detail.clone())),
            SnapshotInput::Present(snapshot) => Ok(snapshot.clone().into_view()),
        }
    }
}

// ---
// O adaptador
// ---
#[derive(Debug, Clone, Copy)]
pub struct SourceTimeouts {
    pub primary: Duration,
    pub secondary: Duration,
    pub tertiary: Duration,
}

impl Default for SourceTimeouts {
    fn default() -> Self {
        Self {
            primary: Duration::from_millis(3000),
            secondary: Duration::from_millis(2000),
            tertiary: Duration::from_millis(50),
        }
    }
}

#[derive(Clone)]
pub struct StateStoreAdapter {
    primary: Arc<dyn StateSource>,
    secondary: Arc<dyn StateSource>,
    timeouts: SourceTimeouts,
}

impl StateStoreAdapter {
    pub fn new(
        primary: Arc<dyn StateSource>,
        secondary: Arc<dyn StateSource>,
        timeouts: SourceTimeouts,
    ) -> Self {
        Self { primary, secondary, timeouts }
    }

    /// Consulta as três stores ao mesmo tempo. Cada leitura tem seu próprio
    /// timeout e é abandonada sozinha; o adaptador em si nunca falha.
    pub async fn fetch_all(&self, session: &SessionContext, snapshot: SnapshotInput) -> SourceViews {
        let tertiary = ClientCacheSource::new(snapshot);

        let (primary, secondary, tertiary) = tokio::join!(
            fetch_slot(Provenance::BackendRecord, self.primary.as_ref(), session, self.timeouts.primary),
            fetch_slot(
                Provenance::IdentityAttributes,
                self.secondary.as_ref(),
                session,
                self.timeouts.secondary,
            ),
            fetch_slot(Provenance::ClientCache, &tertiary, session, self.timeouts.tertiary),
        );

        SourceViews { primary, secondary, tertiary }
    }
}

async fn fetch_slot(
    provenance: Provenance,
    source: &dyn StateSource,
    session: &SessionContext,
    limit: Duration,
) -> SourceSlot {
    let outcome = match timeout(limit, source.fetch(session)).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(limit)),
    };

    match outcome {
        // O slot define a proveniência, seja o que for que a store pôs na visão.
        Ok(mut view) => {
            view.source = provenance;
            SourceSlot::Available(view)
        }
        Err(SourceError::Missing(reason)) => {
            tracing::debug!(request_id = %session.request_id(), source = %provenance, reason, "Store sem dados");
            SourceSlot::unavailable(provenance, reason)
        }
        Err(e) => {
            tracing::warn!(
                request_id = %session.request_id(),
                source = %provenance,
                error = %e,
                "Store indisponível"
            );
            SourceSlot::unavailable(provenance, e.to_string())
        }
    }
}
