// src/models/profile.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    onboarding::{FieldSet, OnboardingStatus, OnboardingStep, PlanTier, TenantId},
    store::{ProfileFields, Provenance, SourceSlot},
};

// ---
// 1. Resultado da resolução canônica
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessRule {
    HasTenantComplete,
    NoTenantIncomplete,
    FlagDerived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: Provenance,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&SourceSlot> for SourceReport {
    fn from(slot: &SourceSlot) -> Self {
        match slot {
            SourceSlot::Available(view) => Self { source: view.source, available: true, reason: None },
            SourceSlot::Unavailable { source, reason } => Self {
                source: *source,
                available: false,
                reason: Some(reason.clone()),
            },
        }
    }
}

/// Divergência entre stores resolvida pela precedência.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub field: &'static str,
    pub winner: Provenance,
    pub winning_value: String,
    pub loser: Provenance,
    pub losing_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalStatus {
    pub status: OnboardingStatus,
    pub onboarding_completed: bool,
    pub needs_onboarding: bool,
    pub tenant_id: Option<TenantId>,
    pub profile: ProfileFields,
    pub plan_tier: PlanTier,
    pub fields: FieldSet,
    pub business_rule: BusinessRule,
    pub sources: Vec<SourceReport>,
    pub conflicts: Vec<Conflict>,
}

impl CanonicalStatus {
    pub fn current_step(&self) -> OnboardingStep {
        self.status.current_step()
    }
}

// ---
// 2. Respostas
// ---
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedProfile {
    pub authenticated: bool,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub needs_onboarding: bool,
    pub onboarding_completed: bool,
    pub onboarding_status: OnboardingStatus,
    pub tenant_id: Option<TenantId>,
    pub business_name: Option<String>,
    pub subscription_plan: PlanTier,
    pub current_step: OnboardingStep,
    pub next_step: OnboardingStep,
    pub business_rule: BusinessRule,
    pub backend_sources: Vec<SourceReport>,
    pub request_id: Uuid,
}

impl UnifiedProfile {
    pub fn new(
        email: Option<String>,
        canonical: CanonicalStatus,
        next_step: OnboardingStep,
        request_id: Uuid,
    ) -> Self {
        let current_step = canonical.current_step();
        Self {
            authenticated: true,
            email,
            first_name: canonical.profile.first_name,
            last_name: canonical.profile.last_name,
            needs_onboarding: canonical.needs_onboarding,
            onboarding_completed: canonical.onboarding_completed,
            onboarding_status: canonical.status,
            tenant_id: canonical.tenant_id,
            business_name: canonical.profile.business_name,
            subscription_plan: canonical.plan_tier,
            current_step,
            next_step,
            business_rule: canonical.business_rule,
            backend_sources: canonical.sources,
            request_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", untagged)]
pub enum VerifyStateResponse {
    #[serde(rename_all = "camelCase")]
    Valid { is_valid: bool, user_data: UnifiedProfile },
    #[serde(rename_all = "camelCase")]
    Invalid {
        is_valid: bool,
        redirect_url: String,
        reason: String,
        payment_satisfied: bool,
    },
}

// ---
// 3. Payloads
// ---
#[derive(Debug, Deserialize)]
pub struct VerifyStateQuery {
    pub step: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdvanceStatusPayload {
    #[validate(length(min = 1, message = "O status é obrigatório."))]
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceStatusResponse {
    pub previous_status: OnboardingStatus,
    pub status: OnboardingStatus,
    pub request_id: Uuid,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SetupTriggerPayload {
    #[serde(default)]
    pub force_setup: bool,
    #[validate(length(min = 1, max = 64, message = "O tenant_id deve ter entre 1 e 64 caracteres."))]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupState {
    Complete,
    Provisioned,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupTriggerResponse {
    pub status: SetupState,
    pub tenant_id: TenantId,
    pub request_id: Uuid,
    pub message: String,
}
