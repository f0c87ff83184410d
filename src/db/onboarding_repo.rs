// src/db/onboarding_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{onboarding::OnboardingStatus, store::BackendRecord},
};

/// Dados para o provisionamento do setup. `existing` é o vínculo lido antes
/// da escrita, então um re-run forçado nunca cria um segundo.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub tenant_name: String,
    pub existing: Option<Uuid>,
}

/// A store autoritativa de registros de onboarding.
#[async_trait]
pub trait OnboardingRecordStore: Send + Sync {
    /// Linha de onboarding junto com o vínculo de tenant do usuário. `None`
    /// significa que a store nunca viu esse usuário.
    async fn find_record(&self, user_id: Uuid) -> Result<Option<BackendRecord>, AppError>;

    /// Escrita de status só para frente. Retorna o status anterior.
    async fn advance_status(
        &self,
        user_id: Uuid,
        to: OnboardingStatus,
    ) -> Result<OnboardingStatus, AppError>;

    /// Cria o tenant e o vínculo (ou refaz o setup sobre o vínculo existente)
    /// e marca o onboarding como completo. Retorna o id do tenant.
    async fn provision_tenant(&self, request: ProvisionRequest) -> Result<Uuid, AppError>;
}

// Repositório sobre as tabelas `onboarding_progress`, `user_tenants` e `tenants`.
#[derive(Clone)]
pub struct OnboardingRepository {
    pool: PgPool,
}

impl OnboardingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn provisioning_error(e: sqlx::Error) -> AppError {
    AppError::ProvisioningFailed(e.to_string())
}

#[async_trait]
impl OnboardingRecordStore for OnboardingRepository {
    async fn find_record(&self, user_id: Uuid) -> Result<Option<BackendRecord>, AppError> {
        // Só conta o vínculo que ainda aponta para um tenant existente.
        let record = sqlx::query_as::<_, BackendRecord>(
            r#"
            SELECT
                t.id AS tenant_id,
                p.status,
                p.onboarding_completed,
                p.first_name,
                p.last_name,
                p.business_name,
                p.business_type,
                p.country,
                p.legal_structure,
                p.selected_plan,
                p.billing_cycle,
                p.payment_method,
                p.payment_status,
                p.setup_completed_at
            FROM (SELECT $1::uuid AS user_id) u
            LEFT JOIN onboarding_progress p ON p.user_id = u.user_id
            LEFT JOIN user_tenants ut ON ut.user_id = u.user_id
            LEFT JOIN tenants t ON t.id = ut.tenant_id
            WHERE p.user_id IS NOT NULL OR ut.user_id IS NOT NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn advance_status(
        &self,
        user_id: Uuid,
        to: OnboardingStatus,
    ) -> Result<OnboardingStatus, AppError> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_scalar::<_, Option<String>>(
            "SELECT status FROM onboarding_progress WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .flatten();

        let previous = stored
            .as_deref()
            .map(|raw| OnboardingStatus::parse_or_initial(raw, "backend_record"))
            .unwrap_or(OnboardingStatus::NotStarted);

        if to < previous {
            return Err(AppError::StatusRegression { from: previous, to });
        }

        sqlx::query(
            r#"
            INSERT INTO onboarding_progress (user_id, status)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(to.as_db_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn provision_tenant(&self, request: ProvisionRequest) -> Result<Uuid, AppError> {
        let mut tx = self.pool.begin().await.map_err(provisioning_error)?;

        let tenant_id = match request.existing {
            // Re-run sobre o vínculo existente: garante que o tenant existe.
            Some(existing) => {
                sqlx::query(
                    r#"
                    INSERT INTO tenants (id, name) VALUES ($1, $2)
                    ON CONFLICT (id) DO UPDATE SET updated_at = NOW()
                    "#,
                )
                .bind(existing)
                .bind(&request.tenant_name)
                .execute(&mut *tx)
                .await
                .map_err(provisioning_error)?;
                existing
            }
            None => {
                let tenant_id = sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO tenants (id, name)
                    VALUES (COALESCE($1, gen_random_uuid()), $2)
                    RETURNING id
                    "#,
                )
                .bind(request.tenant_id)
                .bind(&request.tenant_name)
                .fetch_one(&mut *tx)
                .await
                .map_err(provisioning_error)?;

                sqlx::query("INSERT INTO user_tenants (user_id, tenant_id) VALUES ($1, $2)")
                    .bind(request.user_id)
                    .bind(tenant_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        if let Some(db_err) = e.as_database_error() {
                            if db_err.is_unique_violation() {
                                return AppError::ProvisioningFailed(
                                    "o usuário foi vinculado a um tenant em paralelo".to_string(),
                                );
                            }
                        }
                        provisioning_error(e)
                    })?;
                tenant_id
            }
        };

        sqlx::query(
            r#"
            INSERT INTO onboarding_progress (user_id, status, onboarding_completed, setup_completed_at)
            VALUES ($1, 'complete', TRUE, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                status = 'complete',
                onboarding_completed = TRUE,
                setup_completed_at = COALESCE(onboarding_progress.setup_completed_at, NOW()),
                updated_at = NOW()
            "#,
        )
        .bind(request.user_id)
        .execute(&mut *tx)
        .await
        .map_err(provisioning_error)?;

        tx.commit().await.map_err(provisioning_error)?;

        tracing::info!(user_id = %request.user_id, %tenant_id, "Tenant provisionado");
        Ok(tenant_id)
    }
}
