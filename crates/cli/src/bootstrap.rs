use std::sync::Arc;

use jarvis_agent::AgentRuntime;
use jarvis_core::config::{AppConfig, ConfigError};
use jarvis_core::features::{FeatureTable, FeatureTableError};
use jarvis_core::ml::{ModelArtifact, ModelError, SalesModel};
use jarvis_db::{connect_with_settings, DbPool, RepositoryError, SqlSalesRepository};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model artifact could not be loaded: {0}")]
    Model(#[source] ModelError),
    #[error("feature artifact could not be loaded: {0}")]
    Features(#[source] FeatureTableError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("sales table is not usable: {0}")]
    SalesTable(#[source] RepositoryError),
}

impl BootstrapError {
    /// Stable class name and process exit code for CLI reporting.
    pub fn classify(&self) -> (&'static str, u8) {
        match self {
            Self::Config(_) => ("config_validation", 2),
            Self::DatabaseConnect(_) => ("db_connectivity", 4),
            Self::SalesTable(_) => ("sales_table", 4),
            Self::Model(_) | Self::Features(_) => ("artifact_load", 5),
        }
    }
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent_runtime: AgentRuntime,
}

pub fn load_model(config: &AppConfig) -> Result<ModelArtifact, BootstrapError> {
    let model = ModelArtifact::load(&config.artifacts.model_path).map_err(BootstrapError::Model)?;
    info!(
        event_name = "system.bootstrap.model_loaded",
        correlation_id = "bootstrap",
        model_version = model.version(),
        path = %config.artifacts.model_path.display(),
        "model artifact loaded"
    );
    Ok(model)
}

pub fn load_features(config: &AppConfig) -> Result<FeatureTable, BootstrapError> {
    let features =
        FeatureTable::load(&config.artifacts.features_path).map_err(BootstrapError::Features)?;
    info!(
        event_name = "system.bootstrap.features_loaded",
        correlation_id = "bootstrap",
        rows = features.row_count(),
        path = %config.artifacts.features_path.display(),
        "feature table loaded"
    );
    Ok(features)
}

pub async fn connect_store(config: &AppConfig) -> Result<DbPool, BootstrapError> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
        config.database.read_only,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        read_only = config.database.read_only,
        "database connection established"
    );
    Ok(pool)
}

/// Loads every startup resource once and wires them into an [`AgentRuntime`].
///
/// Any failure is fatal: a runtime is never built around a missing model,
/// feature table or store.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let model: Arc<dyn SalesModel> = Arc::new(load_model(&config)?);
    let features = Arc::new(load_features(&config)?);
    let db_pool = connect_store(&config).await?;
    let sales = SqlSalesRepository::new(db_pool.clone(), config.database.sales_table.clone())
        .map_err(BootstrapError::SalesTable)?;

    let agent_runtime =
        AgentRuntime::new(Arc::new(sales), model, features, config.analysis.clone());
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        "agent runtime ready"
    );

    Ok(Application { config, db_pool, agent_runtime })
}
