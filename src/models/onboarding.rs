// src/models/onboarding.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---
// 1. OnboardingStatus (o progresso que cada store guarda uma cópia)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    NotStarted,
    BusinessInfo,
    Subscription,
    Payment,
    Setup,
    Complete,
}

/// Status vindo de uma store que não corresponde a nenhuma variante.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status de onboarding desconhecido '{0}'")]
pub struct UnknownStatus(pub String);

impl OnboardingStatus {
    pub const ALL: [OnboardingStatus; 6] = [
        OnboardingStatus::NotStarted,
        OnboardingStatus::BusinessInfo,
        OnboardingStatus::Subscription,
        OnboardingStatus::Payment,
        OnboardingStatus::Setup,
        OnboardingStatus::Complete,
    ];

    /// O único parse canônico. Toda store passa por aqui, então caixa,
    /// separadores e sinônimos legados não vazam além da fronteira do adaptador.
    pub fn parse(raw: &str) -> Result<Self, UnknownStatus> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "" | "notstarted" | "new" | "pending" | "started" => Ok(Self::NotStarted),
            "businessinfo" | "business" | "businessinformation" => Ok(Self::BusinessInfo),
            "subscription" | "subscriptions" | "plan" | "planselection" => {
                Ok(Self::Subscription)
            }
            "payment" | "payments" | "paymentpending" => Ok(Self::Payment),
            "setup" | "setuppending" | "setupinprogress" => Ok(Self::Setup),
            "complete" | "completed" | "done" | "finished" => Ok(Self::Complete),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }

    /// Igual a [`parse`](Self::parse), mas cai no estado inicial seguro.
    pub fn parse_or_initial(raw: &str, source: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|e| {
            tracing::warn!(source, raw, "{}; assumindo NOT_STARTED", e);
            Self::NotStarted
        })
    }

    /// A página de onboarding em que o usuário com este status está.
    pub fn current_step(self) -> OnboardingStep {
        match self {
            Self::NotStarted | Self::BusinessInfo => OnboardingStep::BusinessInfo,
            Self::Subscription => OnboardingStep::Subscription,
            Self::Payment => OnboardingStep::Payment,
            Self::Setup => OnboardingStep::Setup,
            Self::Complete => OnboardingStep::Complete,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::BusinessInfo => "BUSINESS_INFO",
            Self::Subscription => "SUBSCRIPTION",
            Self::Payment => "PAYMENT",
            Self::Setup => "SETUP",
            Self::Complete => "COMPLETE",
        }
    }

    /// Valor da coluna usado pela store de registros.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::BusinessInfo => "business_info",
            Self::Subscription => "subscription",
            Self::Payment => "payment",
            Self::Setup => "setup",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---
// 2. OnboardingStep (as páginas roteáveis)
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnboardingStep {
    BusinessInfo,
    Subscription,
    Payment,
    Setup,
    Complete,
    Dashboard,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 6] = [
        OnboardingStep::BusinessInfo,
        OnboardingStep::Subscription,
        OnboardingStep::Payment,
        OnboardingStep::Setup,
        OnboardingStep::Complete,
        OnboardingStep::Dashboard,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "business-info" | "businessinfo" => Some(Self::BusinessInfo),
            "subscription" | "subscriptions" => Some(Self::Subscription),
            "payment" => Some(Self::Payment),
            "setup" => Some(Self::Setup),
            "complete" | "completed" => Some(Self::Complete),
            "dashboard" => Some(Self::Dashboard),
            _ => None,
        }
    }

    /// Posição na ordem canônica completa.
    pub fn index(self) -> usize {
        match self {
            Self::BusinessInfo => 0,
            Self::Subscription => 1,
            Self::Payment => 2,
            Self::Setup => 3,
            Self::Complete => 4,
            Self::Dashboard => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BusinessInfo => "business-info",
            Self::Subscription => "subscription",
            Self::Payment => "payment",
            Self::Setup => "setup",
            Self::Complete => "complete",
            Self::Dashboard => "dashboard",
        }
    }

    pub fn route(self) -> String {
        match self {
            Self::Dashboard => "/dashboard".to_string(),
            step => format!("/onboarding/{}", step.as_str()),
        }
    }

    /// Status gravado quando este passo é o que está em andamento.
    pub fn status(self) -> OnboardingStatus {
        match self {
            Self::BusinessInfo => OnboardingStatus::BusinessInfo,
            Self::Subscription => OnboardingStatus::Subscription,
            Self::Payment => OnboardingStatus::Payment,
            Self::Setup => OnboardingStatus::Setup,
            Self::Complete | Self::Dashboard => OnboardingStatus::Complete,
        }
    }

    /// Campos que precisam estar preenchidos antes de avançar deste passo.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::BusinessInfo => &["business_name", "business_type", "country", "legal_structure"],
            Self::Subscription => &["selected_plan", "billing_cycle"],
            Self::Payment => &["payment_method", "payment_status"],
            Self::Setup => &["tenant_id"],
            Self::Complete | Self::Dashboard => &[],
        }
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---
// 3. PlanTier
// ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Basic,
    Professional,
    Enterprise,
}

impl PlanTier {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "basic" | "starter" => Some(Self::Basic),
            "professional" | "pro" => Some(Self::Professional),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    pub fn requires_payment(self) -> bool {
        matches!(self, Self::Professional | Self::Enterprise)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }
}

// ---
// 4. TenantId
// ---
/// Candidato a tenant id. Rejeita os placeholders que algumas stores
/// gravam em vez de deixar o campo vazio.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "null" | "undefined" | "none" => None,
            _ => Some(Self(trimmed.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<uuid::Uuid> for TenantId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Nomes dos campos de onboarding que uma store informa como preenchidos.
pub type FieldSet = BTreeSet<String>;
