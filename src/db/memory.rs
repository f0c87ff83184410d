// src/db/memory.rs

use async_trait::async_trait;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::onboarding_repo::{OnboardingRecordStore, ProvisionRequest},
    models::{onboarding::OnboardingStatus, store::BackendRecord},
};

#[derive(Default)]
struct Tables {
    progress: HashMap<Uuid, BackendRecord>,
    bindings: HashMap<Uuid, Uuid>,
    tenants: HashMap<Uuid, String>,
}

/// Store de registros em memória, escolhida com `RECORD_STORE=memory`.
/// Mesmo contrato do repositório Postgres, só que sem persistência.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitui a linha de onboarding do usuário. Um `tenant_id` no registro
    /// também cria o tenant e o vínculo.
    pub async fn seed(&self, user_id: Uuid, mut record: BackendRecord) {
        let mut tables = self.tables.write().await;
        if let Some(tenant_id) = record.tenant_id.take() {
            let name = record.business_name.clone().unwrap_or_default();
            tables.tenants.insert(tenant_id, name);
            tables.bindings.insert(user_id, tenant_id);
        }
        tables.progress.insert(user_id, record);
    }

    pub async fn tenant_count(&self) -> usize {
        self.tables.read().await.tenants.len()
    }
}

#[async_trait]
impl OnboardingRecordStore for MemoryRecordStore {
    async fn find_record(&self, user_id: Uuid) -> Result<Option<BackendRecord>, AppError> {
        let tables = self.tables.read().await;
        let binding = tables
            .bindings
            .get(&user_id)
            .copied()
            .filter(|tenant_id| tables.tenants.contains_key(tenant_id));

        let record = match (tables.progress.get(&user_id), binding) {
            (None, None) => None,
            (progress, tenant_id) => Some(BackendRecord {
                tenant_id,
                ..progress.cloned().unwrap_or_default()
            }),
        };
        Ok(record)
    }

    async fn advance_status(
        &self,
        user_id: Uuid,
        to: OnboardingStatus,
    ) -> Result<OnboardingStatus, AppError> {
        let mut tables = self.tables.write().await;
        let record = tables.progress.entry(user_id).or_default();

        let previous = record
            .status
            .as_deref()
            .map(|raw| OnboardingStatus::parse_or_initial(raw, "backend_record"))
            .unwrap_or(OnboardingStatus::NotStarted);

        if to < previous {
            return Err(AppError::StatusRegression { from: previous, to });
        }

        record.status = Some(to.as_db_str().to_string());
        Ok(previous)
    }

    async fn provision_tenant(&self, request: ProvisionRequest) -> Result<Uuid, AppError> {
        let mut tables = self.tables.write().await;

        let tenant_id = match request.existing {
            Some(existing) => existing,
            None => {
                if tables.bindings.contains_key(&request.user_id) {
                    return Err(AppError::ProvisioningFailed(
                        "o usuário foi vinculado a um tenant em paralelo".to_string(),
                    ));
                }
                let tenant_id = request.tenant_id.unwrap_or_else(Uuid::new_v4);
                tables.bindings.insert(request.user_id, tenant_id);
                tenant_id
            }
        };
        tables
            .tenants
            .entry(tenant_id)
            .or_insert_with(|| request.tenant_name.clone());

        let record = tables.progress.entry(request.user_id).or_default();
        record.status = Some(OnboardingStatus::Complete.as_db_str().to_string());
        record.onboarding_completed = Some(true);
        record.setup_completed_at.get_or_insert_with(Utc::now);

        tracing::info!(user_id = %request.user_id, %tenant_id, "Tenant provisionado (memória)");
        Ok(tenant_id)
    }
}
