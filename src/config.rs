// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, sync::Arc, time::Duration};

use crate::{
    db::{MemoryRecordStore, OnboardingRecordStore, OnboardingRepository},
    services::{
        onboarding_service::OnboardingService,
        state_store::{BackendRecordSource, IdentityAttributeSource, SourceTimeouts, StateStoreAdapter},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub record_store: RecordStoreKind,
    pub timeouts: SourceTimeouts,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let record_store = match env::var("RECORD_STORE").as_deref() {
            Ok("memory") => RecordStoreKind::Memory,
            Ok("postgres") | Err(_) => RecordStoreKind::Postgres,
            Ok(other) => anyhow::bail!("RECORD_STORE deve ser 'postgres' ou 'memory', recebido '{other}'"),
        };

        let database_url = env::var("DATABASE_URL").ok();
        if record_store == RecordStoreKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL deve estar definida quando RECORD_STORE=postgres");
        }

        let defaults = SourceTimeouts::default();
        Ok(Self {
            database_url,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve estar definida")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            record_store,
            timeouts: SourceTimeouts {
                primary: timeout_var("PRIMARY_TIMEOUT_MS", defaults.primary)?,
                secondary: timeout_var("SECONDARY_TIMEOUT_MS", defaults.secondary)?,
                tertiary: timeout_var("TERTIARY_TIMEOUT_MS", defaults.tertiary)?,
            },
        })
    }
}

fn timeout_var(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(name) {
        Ok(raw) => {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("{name} deve ser um número de milissegundos"))?;
            Ok(Duration::from_millis(millis))
        }
        Err(_) => Ok(default),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_pool: Option<PgPool>,
    pub onboarding_service: OnboardingService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let (db_pool, records): (Option<PgPool>, Arc<dyn OnboardingRecordStore>) =
            match (&config.record_store, &config.database_url) {
                (RecordStoreKind::Postgres, Some(database_url)) => {
                    let db_pool = PgPoolOptions::new()
                        .max_connections(5)
                        .acquire_timeout(Duration::from_secs(3))
                        .connect(database_url)
                        .await?;
                    tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
                    (Some(db_pool.clone()), Arc::new(OnboardingRepository::new(db_pool)))
                }
                (RecordStoreKind::Postgres, None) => anyhow::bail!("DATABASE_URL deve estar definida"),
                (RecordStoreKind::Memory, _) => {
                    tracing::warn!("Usando a store de registros em memória; nada é persistido");
                    (None, Arc::new(MemoryRecordStore::new()))
                }
            };

        Ok(Self::with_records(config, db_pool, records))
    }

    // --- Monta o gráfico de dependências em volta da store de registros ---
    pub fn with_records(
        config: AppConfig,
        db_pool: Option<PgPool>,
        records: Arc<dyn OnboardingRecordStore>,
    ) -> Self {
        let adapter = StateStoreAdapter::new(
            Arc::new(BackendRecordSource::new(records.clone())),
            Arc::new(IdentityAttributeSource::new(config.jwt_secret.clone())),
            config.timeouts,
        );
        let onboarding_service = OnboardingService::new(adapter, records);

        Self {
            config: Arc::new(config),
            db_pool,
            onboarding_service,
        }
    }
}
