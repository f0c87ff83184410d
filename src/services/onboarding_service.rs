// src/services/onboarding_service.rs

use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::{OnboardingRecordStore, ProvisionRequest},
    models::{
        auth::SessionContext,
        onboarding::{OnboardingStatus, OnboardingStep, TenantId},
        profile::{AdvanceStatusResponse, CanonicalStatus, SetupState, SetupTriggerResponse},
    },
    services::{
        state_store::{SnapshotInput, StateStoreAdapter},
        status_resolver::StatusResolver,
        step_gate::{Decision, StepGate},
    },
};

#[derive(Clone)]
pub struct OnboardingService {
    adapter: StateStoreAdapter,
    records: Arc<dyn OnboardingRecordStore>,
    resolver: StatusResolver,
    gate: StepGate,
}

impl OnboardingService {
    pub fn new(adapter: StateStoreAdapter, records: Arc<dyn OnboardingRecordStore>) -> Self {
        Self {
            adapter,
            records,
            resolver: StatusResolver,
            gate: StepGate,
        }
    }

    /// Caminho de leitura: fan-out e depois merge. Nunca falha.
    pub async fn resolve(&self, session: &SessionContext, snapshot: SnapshotInput) -> CanonicalStatus {
        let views = self.adapter.fetch_all(session, snapshot).await;
        let canonical = self.resolver.resolve(&views, session.plan_tier_hint());

        tracing::info!(
            request_id = %session.request_id(),
            user_id = %session.user_id(),
            status = %canonical.status,
            business_rule = ?canonical.business_rule,
            plan = canonical.plan_tier.as_str(),
            "Status de onboarding resolvido"
        );
        canonical
    }

    // As escritas só confiam no registro do backend e nos atributos do token.
    // O snapshot do cliente pode ser forjado e nunca libera um passo.
    async fn resolve_for_write(&self, session: &SessionContext) -> CanonicalStatus {
        self.resolve(session, SnapshotInput::Ignored).await
    }

    pub fn next_step(&self, canonical: &CanonicalStatus) -> OnboardingStep {
        self.gate.next_step(canonical.current_step(), canonical.plan_tier)
    }

    /// Decisão do step gate para `requested` sobre um status já resolvido.
    pub fn verify_step(&self, canonical: &CanonicalStatus, requested: &str) -> Decision {
        self.gate.can_access_raw(
            canonical.current_step(),
            requested,
            &canonical.fields,
            canonical.plan_tier,
        )
    }

    /// A única escrita de status exposta. Vai só para a store autoritativa;
    /// as outras stores se atualizam pelos próprios fluxos.
    pub async fn advance_status(
        &self,
        session: &SessionContext,
        raw_target: &str,
    ) -> Result<AdvanceStatusResponse, AppError> {
        let target = OnboardingStatus::parse(raw_target)
            .map_err(|e| AppError::UnknownStatus(e.0))?;

        // COMPLETE exige vínculo de tenant, e só o setup cria o vínculo.
        if target == OnboardingStatus::Complete {
            return Err(AppError::StepNotReady {
                requested: OnboardingStep::Complete,
                redirect: OnboardingStep::Setup,
            });
        }

        let canonical = self.resolve_for_write(session).await;
        let requested = target.current_step();
        if let Decision::Denied { redirect, reason, .. } = self.gate.can_access(
            canonical.current_step(),
            requested,
            &canonical.fields,
            canonical.plan_tier,
        ) {
            tracing::info!(
                request_id = %session.request_id(),
                %requested,
                %redirect,
                reason = %reason.describe(),
                "Avanço de status recusado pelo step gate"
            );
            return Err(AppError::StepNotReady { requested, redirect });
        }

        let previous = self.records.advance_status(session.user_id(), target).await?;
        tracing::info!(
            request_id = %session.request_id(),
            user_id = %session.user_id(),
            from = %previous,
            to = %target,
            "Status de onboarding avançado"
        );

        Ok(AdvanceStatusResponse {
            previous_status: previous,
            status: target,
            request_id: session.request_id(),
        })
    }

    /// Provisiona o tenant e o vínculo. Idempotente, a não ser que forçado.
    pub async fn trigger_setup(
        &self,
        session: &SessionContext,
        force_setup: bool,
        requested_tenant: Option<&str>,
    ) -> Result<SetupTriggerResponse, AppError> {
        let request_id = session.request_id();
        let requested_tenant = requested_tenant
            .and_then(TenantId::parse)
            .map(|t| {
                uuid::Uuid::parse_str(t.as_str())
                    .map_err(|_| AppError::InvalidTenantId(t.to_string()))
            })
            .transpose()?;

        // O vínculo tem que vir da própria store autoritativa; um tenant id
        // ecoado pelo token ou pelo cache do cliente não basta.
        let existing = self
            .records
            .find_record(session.user_id())
            .await
            .map_err(|e| AppError::ProvisioningFailed(e.to_string()))?
            .and_then(|r| r.tenant_id);

        if let (Some(existing), Some(requested)) = (existing, requested_tenant) {
            if existing != requested {
                return Err(AppError::TenantConflict { existing: existing.to_string() });
            }
        }

        if let (Some(tenant_id), false) = (existing, force_setup) {
            tracing::info!(%request_id, user_id = %session.user_id(), %tenant_id, "Setup já concluído");
            return Ok(SetupTriggerResponse {
                status: SetupState::Complete,
                tenant_id: tenant_id.into(),
                request_id,
                message: "Setup já concluído.".to_string(),
            });
        }

        let canonical = self.resolve_for_write(session).await;
        if existing.is_none() && canonical.current_step().index() < OnboardingStep::Setup.index() {
            return Err(AppError::StepNotReady {
                requested: OnboardingStep::Setup,
                redirect: self.gate.fallback(canonical.current_step()),
            });
        }

        let tenant_name = canonical
            .profile
            .business_name
            .clone()
            .or_else(|| session.email().map(str::to_string))
            .unwrap_or_else(|| "Empresa sem nome".to_string());

        tracing::info!(%request_id, user_id = %session.user_id(), force_setup, "Provisionando tenant");
        let tenant_id = self
            .records
            .provision_tenant(ProvisionRequest {
                user_id: session.user_id(),
                tenant_id: requested_tenant,
                tenant_name,
                existing,
            })
            .await
            .map_err(|e| match e {
                AppError::ProvisioningFailed(_) => e,
                other => AppError::ProvisioningFailed(other.to_string()),
            })?;

        Ok(SetupTriggerResponse {
            status: SetupState::Provisioned,
            tenant_id: tenant_id.into(),
            request_id,
            message: if existing.is_some() {
                "Setup refeito sobre o tenant existente.".to_string()
            } else {
                "Tenant provisionado.".to_string()
            },
        })
    }
}
