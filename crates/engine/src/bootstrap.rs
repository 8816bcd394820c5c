use std::sync::Arc;
use std::time::Duration as StdDuration;

use thiserror::Error;
use tracing::info;

use haggle_agent::{HttpLlmClient, LlmClient, NegotiationResponder, NullLlmClient};
use haggle_core::config::{AppConfig, ConfigError, LoadOptions};
use haggle_db::repositories::{SqlCouponStore, SqlNegotiationProfileStore};
use haggle_db::{connect_with_settings, migrations, DbPool};

use crate::context::CustomerDirectory;
use crate::orchestrator::NegotiationOrchestrator;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: NegotiationOrchestrator,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client construction failed: {0}")]
    Llm(#[source] anyhow::Error),
}

pub async fn bootstrap(
    options: LoadOptions,
    customers: Arc<dyn CustomerDirectory>,
) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_start", "starting negotiation engine bootstrap");
    let config = AppConfig::load(options)?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "bootstrap_database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "bootstrap_migrations_applied", "database migrations applied");

    let llm: Arc<dyn LlmClient> = match &config.llm.api_key {
        Some(api_key) => Arc::new(
            HttpLlmClient::new(
                config.llm.base_url.clone(),
                config.llm.model.clone(),
                api_key.clone(),
                StdDuration::from_secs(config.llm.timeout_secs),
            )
            .map_err(BootstrapError::Llm)?,
        ),
        None => {
            info!(
                event_name = "bootstrap_llm_disabled",
                "no llm api key configured, responses use template copy"
            );
            Arc::new(NullLlmClient)
        }
    };
    let responder = NegotiationResponder::new(
        llm,
        StdDuration::from_secs(config.negotiation.responder_timeout_secs),
    );

    let coupons = Arc::new(SqlCouponStore::with_retry_limit(
        db_pool.clone(),
        config.negotiation.code_retry_limit,
    ));
    let profiles = Arc::new(SqlNegotiationProfileStore::new(db_pool.clone()));
    let orchestrator = NegotiationOrchestrator::new(customers, profiles, coupons, responder)
        .with_coupon_ttl(chrono::Duration::hours(config.negotiation.coupon_ttl_hours));

    info!(event_name = "bootstrap_complete", "negotiation engine ready");
    Ok(Application { config, db_pool, orchestrator })
}
