use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;
use tripdesk_agent::{AgentRuntime, AgentSettings, ChatCompletionsOracle, OracleError};
use tripdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use tripdesk_db::{connect_with_settings, migrations, DbPool, SqlSessionFactory};
use tripdesk_messenger::{DeliveryError, GraphSendClient, MessengerSender};

use crate::{health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent_runtime: Arc<AgentRuntime>,
    pub sender: Arc<dyn MessengerSender>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(
        "messenger.verify_token and messenger.page_access_token are required to serve the webhook"
    )]
    MessengerNotConfigured,
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("reasoning oracle could not be built: {0}")]
    Oracle(#[source] OracleError),
    #[error("send api client could not be built: {0}")]
    Delivery(#[source] DeliveryError),
}

impl Application {
    /// Health probe and webhook routes sharing one HTTP listener.
    pub fn router(&self) -> Router {
        let webhook_state = webhook::WebhookState::new(
            Arc::clone(&self.agent_runtime),
            Arc::clone(&self.sender),
            &self.config.messenger,
        );

        health::router(self.db_pool.clone())
            .merge(webhook::router(webhook_state))
            .layer(TraceLayer::new_for_http())
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        llm_model = %config.llm.model,
        "starting application bootstrap"
    );
    if !config.messenger_ready() {
        return Err(BootstrapError::MessengerNotConfigured);
    }

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let oracle = ChatCompletionsOracle::from_config(&config.llm).map_err(BootstrapError::Oracle)?;
    info!(
        event_name = "system.bootstrap.oracle_ready",
        correlation_id = "bootstrap",
        endpoint = oracle.endpoint(),
        "reasoning oracle configured"
    );

    let sender = GraphSendClient::from_config(&config.messenger).map_err(BootstrapError::Delivery)?;
    let agent_runtime = AgentRuntime::new(
        Arc::new(SqlSessionFactory::new(db_pool.clone())),
        Arc::new(oracle),
        AgentSettings::from(&config.agent),
    );

    Ok(Application {
        config,
        db_pool,
        agent_runtime: Arc::new(agent_runtime),
        sender: Arc::new(sender),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use tripdesk_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                messenger_verify_token: Some("verify-me".to_string()),
                messenger_page_access_token: Some("page-token".to_string()),
                agent_pacing_millis: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_messenger_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                messenger_verify_token: Some("verify-me".to_string()),
                messenger_page_access_token: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let error = result.err().expect("bootstrap should fail");
        assert!(matches!(error, BootstrapError::MessengerNotConfigured));
        assert!(error.to_string().contains("messenger.page_access_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_runtime() {
        let app = bootstrap(valid_overrides("sqlite::memory:"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('clients', 'trips', 'bookings', 'messages')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("inventory tables should exist after bootstrap");
        assert_eq!(table_count, 4);
        assert!(app.agent_runtime.settings().pacing.is_zero());
    }

    #[tokio::test]
    async fn router_serves_health_and_the_webhook_handshake() {
        let app = bootstrap(valid_overrides("sqlite::memory:")).await.expect("bootstrap");
        let router = app.router();

        let health = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health response");
        assert_eq!(health.status(), StatusCode::OK);

        let handshake = router
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=42")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("handshake response");
        assert_eq!(handshake.status(), StatusCode::OK);
    }
}
