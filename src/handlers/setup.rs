// src/handlers/setup.rs

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::{
        auth::SessionContext,
        profile::{SetupTriggerPayload, SetupTriggerResponse},
    },
};

// POST /api/onboarding/setup/trigger
// Ao contrário das rotas de leitura, uma falha de provisionamento volta ao cliente como está.
pub async fn trigger_setup(
    State(app_state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<SetupTriggerPayload>,
) -> Result<Json<SetupTriggerResponse>, AppError> {
    payload.validate()?;

    let response = app_state
        .onboarding_service
        .trigger_setup(&session, payload.force_setup, payload.tenant_id.as_deref())
        .await?;

    Ok(Json(response))
}
