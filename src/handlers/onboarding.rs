// src/handlers/onboarding.rs

use axum::{
    extract::{Query, State},
    Json,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::snapshot::ClientCache,
    models::{
        auth::SessionContext,
        profile::{
            AdvanceStatusPayload, AdvanceStatusResponse, UnifiedProfile, VerifyStateQuery,
            VerifyStateResponse,
        },
    },
    services::step_gate::Decision,
};

// GET /api/onboarding/unified-profile
pub async fn unified_profile(
    State(app_state): State<AppState>,
    session: SessionContext,
    ClientCache(snapshot): ClientCache,
) -> Json<UnifiedProfile> {
    let canonical = app_state.onboarding_service.resolve(&session, snapshot).await;
    let next_step = app_state.onboarding_service.next_step(&canonical);

    Json(UnifiedProfile::new(
        session.email().map(str::to_string),
        canonical,
        next_step,
        session.request_id(),
    ))
}

// GET /api/onboarding/verify-state?step=<step>
// Uma negação é um resultado normal e ainda responde 200.
pub async fn verify_state(
    State(app_state): State<AppState>,
    session: SessionContext,
    ClientCache(snapshot): ClientCache,
    Query(query): Query<VerifyStateQuery>,
) -> Result<Json<VerifyStateResponse>, AppError> {
    let step = query
        .step
        .filter(|s| !s.trim().is_empty())
        .ok_or(AppError::MissingParameter("step"))?;

    let canonical = app_state.onboarding_service.resolve(&session, snapshot).await;
    let decision = app_state.onboarding_service.verify_step(&canonical, &step);
    let next_step = app_state.onboarding_service.next_step(&canonical);

    let response = match decision {
        Decision::Allowed => VerifyStateResponse::Valid {
            is_valid: true,
            user_data: UnifiedProfile::new(
                session.email().map(str::to_string),
                canonical,
                next_step,
                session.request_id(),
            ),
        },
        Decision::Denied { redirect, reason, payment_satisfied } => {
            tracing::info!(
                request_id = %session.request_id(),
                requested = %step,
                redirect = %redirect,
                reason = %reason.describe(),
                "Acesso ao passo negado"
            );
            VerifyStateResponse::Invalid {
                is_valid: false,
                redirect_url: redirect.route(),
                reason: reason.describe(),
                payment_satisfied,
            }
        }
    };

    Ok(Json(response))
}

// POST /api/onboarding/advance
pub async fn advance_status(
    State(app_state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<AdvanceStatusPayload>,
) -> Result<Json<AdvanceStatusResponse>, AppError> {
    payload.validate()?;

    let response = app_state
        .onboarding_service
        .advance_status(&session, &payload.status)
        .await?;

    Ok(Json(response))
}
