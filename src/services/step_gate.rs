// src/services/step_gate.rs

use serde::Serialize;

use crate::models::onboarding::{FieldSet, OnboardingStep, PlanTier};

use crate::models::onboarding::OnboardingStep::{
    BusinessInfo, Complete, Dashboard, Payment, Setup, Subscription,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DenyReason {
    PaymentNotRequired,
    NotInTransitionTable,
    SkipsAhead,
    MissingFields { fields: Vec<&'static str> },
    UnknownStep,
}

impl DenyReason {
    pub fn describe(&self) -> String {
        match self {
            Self::PaymentNotRequired => "o plano não exige pagamento".to_string(),
            Self::NotInTransitionTable => "o passo não é alcançável a partir do passo atual".to_string(),
            Self::SkipsAhead => "não é permitido pular passos".to_string(),
            Self::MissingFields { fields } => format!("campos obrigatórios ausentes: {}", fields.join(", ")),
            Self::UnknownStep => "passo de onboarding desconhecido".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied {
        redirect: OnboardingStep,
        reason: DenyReason,
        /// Ligado quando o pagamento foi pulado porque o plano não o exige.
        payment_satisfied: bool,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Máquina de estados do onboarding, só para frente, com desvio por plano.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepGate;

impl StepGate {
    /// Sucessor de `current`. `subscription` desvia conforme o plano.
    pub fn next_step(&self, current: OnboardingStep, tier: PlanTier) -> OnboardingStep {
        match current {
            BusinessInfo => Subscription,
            Subscription if tier.requires_payment() => Payment,
            Subscription | Payment => Setup,
            Setup => Complete,
            Complete | Dashboard => Dashboard,
        }
    }

    /// Passos alcançáveis a partir de `current` na checagem de acesso. Inclui
    /// páginas anteriores para o usuário poder revisitá-las.
    pub fn allowed_from(&self, current: OnboardingStep) -> &'static [OnboardingStep] {
        match current {
            BusinessInfo => &[BusinessInfo, Subscription],
            Subscription | Payment => &[BusinessInfo, Subscription, Payment, Setup],
            Setup => &[BusinessInfo, Subscription, Payment, Setup, Complete],
            Complete | Dashboard => &[Complete, Dashboard],
        }
    }

    /// O caminho ordenado que um usuário no plano `tier` percorre.
    pub fn path(&self, tier: PlanTier) -> &'static [OnboardingStep] {
        if tier.requires_payment() {
            &[BusinessInfo, Subscription, Payment, Setup, Complete, Dashboard]
        } else {
            &[BusinessInfo, Subscription, Setup, Complete, Dashboard]
        }
    }

    /// Posição de `step` no caminho do plano; `None` para pagamento em planos grátis.
    pub fn path_index(&self, step: OnboardingStep, tier: PlanTier) -> Option<usize> {
        self.path(tier).iter().position(|s| *s == step)
    }

    pub fn can_access(
        &self,
        current: OnboardingStep,
        requested: OnboardingStep,
        fields: &FieldSet,
        tier: PlanTier,
    ) -> Decision {
        // Status de pagamento antigo num plano sem pagamento conta como assinatura feita.
        let current = if current == Payment && !tier.requires_payment() {
            Subscription
        } else {
            current
        };

        if requested == BusinessInfo {
            return Decision::Allowed;
        }

        if requested == Payment && !tier.requires_payment() {
            let redirect = if self.can_access(current, Setup, fields, tier).is_allowed() {
                Setup
            } else {
                self.fallback(current)
            };
            return Decision::Denied {
                redirect,
                reason: DenyReason::PaymentNotRequired,
                payment_satisfied: true,
            };
        }

        if requested == Subscription && matches!(current, BusinessInfo | Subscription) {
            return Decision::Allowed;
        }

        if !self.allowed_from(current).contains(&requested) {
            return self.deny(current, DenyReason::NotInTransitionTable);
        }

        let (Some(current_idx), Some(requested_idx)) =
            (self.path_index(current, tier), self.path_index(requested, tier))
        else {
            return self.deny(current, DenyReason::NotInTransitionTable);
        };

        if requested_idx > current_idx + 1 {
            return self.deny(current, DenyReason::SkipsAhead);
        }

        if requested_idx > current_idx {
            let missing: Vec<&'static str> = current
                .required_fields()
                .iter()
                .copied()
                .filter(|f| !fields.contains(*f))
                .collect();
            if !missing.is_empty() {
                return self.deny(current, DenyReason::MissingFields { fields: missing });
            }
        }

        Decision::Allowed
    }

    /// Checagem de acesso para o nome de passo cru vindo da requisição.
    pub fn can_access_raw(
        &self,
        current: OnboardingStep,
        requested: &str,
        fields: &FieldSet,
        tier: PlanTier,
    ) -> Decision {
        match OnboardingStep::parse(requested) {
            Some(step) => self.can_access(current, step, fields, tier),
            None => {
                tracing::warn!(requested, "Verificação pedida para passo desconhecido");
                self.deny(current, DenyReason::UnknownStep)
            }
        }
    }

    /// Para onde mandar o usuário que não pode ir aonde pediu.
    pub fn fallback(&self, current: OnboardingStep) -> OnboardingStep {
        match current {
            Complete | Dashboard => Dashboard,
            step => step,
        }
    }

    fn deny(&self, current: OnboardingStep, reason: DenyReason) -> Decision {
        Decision::Denied {
            redirect: self.fallback(current),
            reason,
            payment_satisfied: false,
        }
    }
}
