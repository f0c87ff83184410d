use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::onboarding::{OnboardingStatus, OnboardingStep};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Credencial ausente ou inválida")]
    Unauthenticated,

    #[error("Parâmetro '{0}' ausente na query")]
    MissingParameter(&'static str),

    #[error("Status de onboarding desconhecido '{0}'")]
    UnknownStatus(String),

    #[error("O status de onboarding não pode voltar de {from} para {to}")]
    StatusRegression {
        from: OnboardingStatus,
        to: OnboardingStatus,
    },

    #[error("O passo '{requested}' ainda não está liberado")]
    StepNotReady {
        requested: OnboardingStep,
        redirect: OnboardingStep,
    },

    #[error("O tenant id '{0}' não é um UUID válido")]
    InvalidTenantId(String),

    #[error("Usuário já vinculado ao tenant '{existing}'")]
    TenantConflict { existing: String },

    // Único caminho de escrita cuja falha chega intacta ao cliente.
    #[error("Falha ao provisionar o tenant: {0}")]
    ProvisioningFailed(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::StepNotReady { requested, redirect } => {
                let body = Json(json!({
                    "error": format!("O passo '{}' ainda não está liberado.", requested),
                    "redirectUrl": redirect.route(),
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::ProvisioningFailed(detail) => {
                tracing::error!(%detail, "Falha ao provisionar o tenant");
                let body = Json(json!({
                    "error": "Falha ao provisionar o tenant.",
                    "detail": detail,
                }));
                return (StatusCode::BAD_GATEWAY, body).into_response();
            }
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            ref e @ (AppError::MissingParameter(_)
            | AppError::UnknownStatus(_)
            | AppError::InvalidTenantId(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ref e @ (AppError::StatusRegression { .. } | AppError::TenantConflict { .. }) => {
                (StatusCode::CONFLICT, e.to_string())
            }

            // Todo o resto vira 500. A mensagem detalhada só vai para o log.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
