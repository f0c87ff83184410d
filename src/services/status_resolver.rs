// src/services/status_resolver.rs

use crate::models::{
    onboarding::{FieldSet, OnboardingStatus, PlanTier, TenantId},
    profile::{BusinessRule, CanonicalStatus, Conflict, SourceReport},
    store::{PartialView, ProfileFields, Provenance, SourceViews},
};

/// Junta as três visões parciais num status canônico.
///
/// Puro e determinístico: o resultado depende só das visões e da dica de plano,
/// nunca de qual store respondeu primeiro. Não falha; sem nenhuma informação
/// responde `NOT_STARTED` sem tenant.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusResolver;

impl StatusResolver {
    pub fn resolve(&self, views: &SourceViews, plan_tier_hint: Option<PlanTier>) -> CanonicalStatus {
        let available: Vec<&PartialView> = views.available().collect();
        let mut conflicts = Vec::new();

        // 1. Vínculo de tenant, primeiro candidato na ordem de precedência.
        let tenant = pick_first(&available, "tenant_id", &mut conflicts, |v| {
            v.tenant_id.as_ref().map(TenantId::to_string)
        })
        .and_then(|(_, raw)| TenantId::parse(&raw));

        // 2./3. Status: o vínculo vale mais que qualquer flag.
        let (status, business_rule) = match &tenant {
            Some(_) => {
                for view in &available {
                    if let Some(flag) = view.status_flag().filter(|f| *f != OnboardingStatus::Complete) {
                        tracing::info!(
                            source = %view.source,
                            stale_flag = %flag,
                            "Vínculo de tenant sobrepõe flag de status desatualizada"
                        );
                    }
                }
                (OnboardingStatus::Complete, BusinessRule::HasTenantComplete)
            }
            None => match pick_first(&available, "status", &mut conflicts, |v| {
                v.status_flag().map(|s| s.as_str().to_string())
            }) {
                Some((source, _)) => {
                    let flag = available
                        .iter()
                        .find(|v| v.source == source)
                        .and_then(|v| v.status_flag())
                        .unwrap_or(OnboardingStatus::NotStarted);
                    (cap_without_tenant(flag, source), BusinessRule::FlagDerived)
                }
                None => (OnboardingStatus::NotStarted, BusinessRule::NoTenantIncomplete),
            },
        };

        // 4. Campos de perfil, mesclados independente do status.
        let profile = ProfileFields {
            first_name: first(&available, |v| v.profile.first_name.clone()),
            last_name: first(&available, |v| v.profile.last_name.clone()),
            business_name: pick_first(&available, "business_name", &mut conflicts, |v| {
                v.profile.business_name.clone()
            })
            .map(|(_, name)| name),
            subscription_plan: first(&available, |v| v.profile.subscription_plan),
        };
        let plan_tier = resolve_plan(profile.subscription_plan, plan_tier_hint);

        // 5. Campos acumulados.
        let mut fields: FieldSet = available.iter().flat_map(|v| v.fields.iter().cloned()).collect();
        if tenant.is_some() {
            fields.insert("tenant_id".to_string());
        }

        let onboarding_completed = status == OnboardingStatus::Complete;
        let sources = views.in_precedence_order().into_iter().map(SourceReport::from).collect();

        tracing::debug!(
            status = %status,
            ?business_rule,
            tenant = tenant.as_ref().map(TenantId::as_str),
            conflicts = conflicts.len(),
            "Status de onboarding resolvido"
        );

        CanonicalStatus {
            status,
            onboarding_completed,
            needs_onboarding: !onboarding_completed,
            tenant_id: tenant,
            profile,
            plan_tier,
            fields,
            business_rule,
            sources,
            conflicts,
        }
    }
}

/// Flag COMPLETE sem vínculo de tenant não pode ser verdade, pois é o setup
/// que cria o vínculo. O usuário volta para o setup.
fn cap_without_tenant(flag: OnboardingStatus, source: Provenance) -> OnboardingStatus {
    if flag == OnboardingStatus::Complete {
        tracing::warn!(source = %source, "Flag COMPLETE sem vínculo de tenant; limitando a SETUP");
        OnboardingStatus::Setup
    } else {
        flag
    }
}

fn resolve_plan(from_stores: Option<PlanTier>, hint: Option<PlanTier>) -> PlanTier {
    match (from_stores, hint) {
        (Some(stored), Some(hint)) if stored != hint => {
            tracing::info!(
                stored = stored.as_str(),
                hint = hint.as_str(),
                "Plano da sessão diverge das stores; usando as stores"
            );
            stored
        }
        (Some(stored), _) => stored,
        (None, Some(hint)) => hint,
        (None, None) => PlanTier::default(),
    }
}

fn first<T>(views: &[&PartialView], get: impl Fn(&PartialView) -> Option<T>) -> Option<T> {
    views.iter().find_map(|v| get(v))
}

/// Primeiro valor na ordem de precedência. Cada store seguinte com valor
/// diferente vira um conflito logado; nenhuma delas falha a resolução.
fn pick_first(
    views: &[&PartialView],
    field: &'static str,
    conflicts: &mut Vec<Conflict>,
    get: impl Fn(&PartialView) -> Option<String>,
) -> Option<(Provenance, String)> {
    let mut candidates = views.iter().filter_map(|v| get(v).map(|value| (v.source, value)));
    let (winner, winning_value) = candidates.next()?;

    for (loser, losing_value) in candidates.filter(|(_, value)| *value != winning_value) {
        tracing::warn!(
            field,
            winner = %winner,
            winning_value = %winning_value,
            loser = %loser,
            losing_value = %losing_value,
            "Stores divergem; mantendo a de maior precedência"
        );
        conflicts.push(Conflict {
            field,
            winner,
            winning_value: winning_value.clone(),
            loser,
            losing_value,
        });
    }

    Some((winner, winning_value))
}
