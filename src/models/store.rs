// src/models/store.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::models::onboarding::{FieldSet, OnboardingStatus, PlanTier, TenantId};

// ---
// 1. Provenance
// ---
/// De qual store veio a visão parcial. A ordenação é a ordem de precedência.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    BackendRecord,
    IdentityAttributes,
    ClientCache,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackendRecord => "backend_record",
            Self::IdentityAttributes => "identity_attributes",
            Self::ClientCache => "client_cache",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---
// 2. PartialView (o que cada store vira depois da leitura)
// ---
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub business_name: Option<String>,
    pub subscription_plan: Option<PlanTier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialView {
    pub source: Provenance,
    pub tenant_id: Option<TenantId>,
    pub status: Option<OnboardingStatus>,
    pub completed: Option<bool>,
    pub profile: ProfileFields,
    pub fields: FieldSet,
}

impl PartialView {
    pub fn empty(source: Provenance) -> Self {
        Self {
            source,
            tenant_id: None,
            status: None,
            completed: None,
            profile: ProfileFields::default(),
            fields: FieldSet::new(),
        }
    }

    /// O status que esta store afirma, se houver. Um status explícito vale
    /// mais que o booleano de conclusão.
    pub fn status_flag(&self) -> Option<OnboardingStatus> {
        self.status.or(match self.completed {
            Some(true) => Some(OnboardingStatus::Complete),
            Some(false) => Some(OnboardingStatus::NotStarted),
            None => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSlot {
    Available(PartialView),
    Unavailable { source: Provenance, reason: String },
}

impl SourceSlot {
    pub fn unavailable(source: Provenance, reason: impl Into<String>) -> Self {
        Self::Unavailable { source, reason: reason.into() }
    }

    pub fn view(&self) -> Option<&PartialView> {
        match self {
            Self::Available(view) => Some(view),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn source(&self) -> Provenance {
        match self {
            Self::Available(view) => view.source,
            Self::Unavailable { source, .. } => *source,
        }
    }
}

/// Resultado de um fan-out. Os slots ficam sempre em ordem de precedência.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceViews {
    pub primary: SourceSlot,
    pub secondary: SourceSlot,
    pub tertiary: SourceSlot,
}

impl SourceViews {
    pub fn all_unavailable(reason: &str) -> Self {
        Self {
            primary: SourceSlot::unavailable(Provenance::BackendRecord, reason),
            secondary: SourceSlot::unavailable(Provenance::IdentityAttributes, reason),
            tertiary: SourceSlot::unavailable(Provenance::ClientCache, reason),
        }
    }

    pub fn in_precedence_order(&self) -> [&SourceSlot; 3] {
        [&self.primary, &self.secondary, &self.tertiary]
    }

    pub fn available(&self) -> impl Iterator<Item = &PartialView> {
        self.in_precedence_order().into_iter().filter_map(SourceSlot::view)
    }
}

// ---
// 3. BackendRecord (linha da store autoritativa)
// ---
#[derive(Debug, Clone, Default, FromRow)]
pub struct BackendRecord {
    pub tenant_id: Option<Uuid>,
    pub status: Option<String>,
    pub onboarding_completed: Option<bool>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub country: Option<String>,
    pub legal_structure: Option<String>,
    pub selected_plan: Option<String>,
    pub billing_cycle: Option<String>,
    pub payment_method: Option<String>,
    pub payment_status: Option<String>,
    pub setup_completed_at: Option<DateTime<Utc>>,
}

impl BackendRecord {
    pub fn into_view(self) -> PartialView {
        let source = Provenance::BackendRecord;
        let mut fields = FieldSet::new();
        for (name, value) in [
            ("business_name", &self.business_name),
            ("business_type", &self.business_type),
            ("country", &self.country),
            ("legal_structure", &self.legal_structure),
            ("selected_plan", &self.selected_plan),
            ("billing_cycle", &self.billing_cycle),
            ("payment_method", &self.payment_method),
            ("payment_status", &self.payment_status),
        ] {
            if present(value) {
                fields.insert(name.to_string());
            }
        }

        let tenant_id = self.tenant_id.map(TenantId::from);
        if tenant_id.is_some() {
            fields.insert("tenant_id".to_string());
        }

        PartialView {
            source,
            tenant_id,
            status: parse_status(self.status.as_deref(), source),
            completed: self
                .onboarding_completed
                .or(self.setup_completed_at.map(|_| true)),
            profile: ProfileFields {
                first_name: non_blank(self.first_name),
                last_name: non_blank(self.last_name),
                business_name: non_blank(self.business_name),
                subscription_plan: parse_plan(self.selected_plan.as_deref(), source),
            },
            fields,
        }
    }
}

// ---
// 4. IdentityAttributes (atributos custom do token de identidade)
// ---
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAttributes {
    #[serde(rename = "custom:tenant_id", default)]
    pub tenant_id: Option<String>,
    #[serde(rename = "custom:onboarding", default)]
    pub onboarding: Option<String>,
    #[serde(rename = "custom:setupdone", default)]
    pub setup_done: Option<String>,
    #[serde(rename = "custom:businessname", default)]
    pub business_name: Option<String>,
    #[serde(rename = "custom:subplan", default)]
    pub subscription_plan: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

impl IdentityAttributes {
    pub fn into_view(self) -> PartialView {
        let source = Provenance::IdentityAttributes;
        let tenant_id = self.tenant_id.as_deref().and_then(TenantId::parse);
        let mut fields = FieldSet::new();
        if tenant_id.is_some() {
            fields.insert("tenant_id".to_string());
        }
        if present(&self.business_name) {
            fields.insert("business_name".to_string());
        }
        if present(&self.subscription_plan) {
            fields.insert("selected_plan".to_string());
        }

        PartialView {
            source,
            tenant_id,
            status: parse_status(self.onboarding.as_deref(), source),
            completed: self.setup_done.as_deref().and_then(parse_flag),
            profile: ProfileFields {
                first_name: non_blank(self.given_name),
                last_name: non_blank(self.family_name),
                business_name: non_blank(self.business_name),
                subscription_plan: parse_plan(self.subscription_plan.as_deref(), source),
            },
            fields,
        }
    }
}

// ---
// 5. ClientSnapshot (cópia do cache do cliente, válida só na requisição)
// ---
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub onboarding_status: Option<String>,
    #[serde(default)]
    pub onboarding_completed: Option<bool>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub subscription_plan: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ClientSnapshot {
    pub fn into_view(self) -> PartialView {
        let source = Provenance::ClientCache;
        let tenant_id = self.tenant_id.as_deref().and_then(TenantId::parse);
        let fields = self
            .fields
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        PartialView {
            source,
            tenant_id,
            status: parse_status(self.onboarding_status.as_deref(), source),
            completed: self.onboarding_completed,
            profile: ProfileFields {
                first_name: None,
                last_name: None,
                business_name: non_blank(self.business_name),
                subscription_plan: parse_plan(self.subscription_plan.as_deref(), source),
            },
            fields,
        }
    }
}

// ---
// Helpers de fronteira
// ---
fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_status(raw: Option<&str>, source: Provenance) -> Option<OnboardingStatus> {
    raw.filter(|r| !r.trim().is_empty())
        .map(|r| OnboardingStatus::parse_or_initial(r, source.as_str()))
}

fn parse_plan(raw: Option<&str>, source: Provenance) -> Option<PlanTier> {
    let raw = raw.filter(|r| !r.trim().is_empty())?;
    let tier = PlanTier::parse(raw);
    if tier.is_none() {
        tracing::warn!(source = source.as_str(), raw, "plano de assinatura desconhecido ignorado");
    }
    tier
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
