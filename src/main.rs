//! Tunnel Connector
//!
//! Main entry point: wires the tag registry, event router, integration
//! sinks, box reconciler and background jobs, then serves the REST API.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunnel_connector::box_reconciler::{ActuatorConfig, BoxReconciler};
use tunnel_connector::connection_supervisor::ConnectionSupervisor;
use tunnel_connector::device_gateway::{DeviceGateway, SimulatedGateway};
use tunnel_connector::event_router::EventRouter;
use tunnel_connector::integration::{
    DatabaseSink, GpoIndicator, IndicatorSink, IntegrationFanout, IntegrationSink, WebhookSink,
    XtrackSink,
};
use tunnel_connector::persistence::{self, EventRepository, PersistedEntity, TagRepository};
use tunnel_connector::retention::RetentionSweeper;
use tunnel_connector::state::{AppConfig, AppState};
use tunnel_connector::tag_registry::TagRegistry;
use tunnel_connector::tasks::TaskSet;
use tunnel_connector::web_api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunnel_connector=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tunnel Connector v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        host = %config.host,
        port = config.port,
        identity = ?config.tag_identity,
        "Configuration loaded"
    );

    // Database integration is optional
    let pool = match &config.database_url {
        Some(url) => {
            let pool = SqlitePoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await?;
            persistence::init_schema(&pool).await?;
            tracing::info!("Database connected");
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set. Skipping database integration setup.");
            None
        }
    };
    let tag_repo = pool.clone().map(TagRepository::new);
    let event_repo = pool.map(EventRepository::new);

    // Core components
    let registry = Arc::new(TagRegistry::new(config.tag_identity));
    let gateway: Arc<dyn DeviceGateway> = Arc::new(SimulatedGateway::new());

    // Integration sinks, each independently optional
    let webhook_timeout = Duration::from_secs(config.webhook_timeout_secs);
    let mut sinks: Vec<Arc<dyn IntegrationSink>> = Vec::new();

    if let (Some(tags), Some(events)) = (tag_repo.clone(), event_repo.clone()) {
        tracing::info!("Setting up database integration");
        sinks.push(Arc::new(DatabaseSink::new(tags, events)));
    }

    match &config.webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Setting up webhook integration");
            sinks.push(Arc::new(WebhookSink::new(
                url.clone(),
                webhook_timeout,
                config.webhook_max_retries,
            )?));
        }
        None => tracing::warn!("WEBHOOK_URL not set. Skipping webhook integration setup."),
    }

    match &config.xtrack_url {
        Some(url) => {
            tracing::info!(url = %url, "Setting up Xtrack integration");
            sinks.push(Arc::new(XtrackSink::new(url.clone(), webhook_timeout)?));
        }
        None => tracing::warn!("XTRACK_URL not set. Skipping Xtrack integration setup."),
    }

    if config.beep {
        tracing::info!("Setting up indicator integration");
        let indicator = Arc::new(GpoIndicator::new(
            gateway.clone(),
            config.indicator_device.clone(),
            config.indicator_pin,
            200,
        ));
        sinks.push(Arc::new(IndicatorSink::new(indicator)));
    } else {
        tracing::warn!("BEEP disabled. Skipping indicator integration setup.");
    }

    let fanout = Arc::new(IntegrationFanout::new(sinks));
    tracing::info!(sinks = ?fanout.sink_names(), "Integration fan-out configured");

    let tasks = Arc::new(TaskSet::new());

    let reconciler = Arc::new(BoxReconciler::new(
        registry.clone(),
        gateway.clone(),
        ActuatorConfig {
            approve_pin: config.approve_pin,
            reject_pin: config.reject_pin,
            pulse_ms: config.gpo_pulse_ms,
            recheck_delay: Duration::from_millis(config.recheck_delay_ms),
        },
    ));

    let router = Arc::new(EventRouter::new(
        registry.clone(),
        fanout,
        reconciler.clone(),
        tasks.clone(),
    ));

    // Connection supervisor
    {
        let supervisor = ConnectionSupervisor::new(gateway.clone());
        let cancel = tasks.cancel_token();
        tasks.spawn(async move { supervisor.run(cancel).await });
    }

    // Retention sweeper jobs
    {
        let mut entities: Vec<Arc<dyn PersistedEntity>> = Vec::new();
        if let Some(repo) = tag_repo.clone() {
            entities.push(Arc::new(repo));
        }
        if let Some(repo) = event_repo.clone() {
            entities.push(Arc::new(repo));
        }
        let sweeper = Arc::new(RetentionSweeper::new(
            registry.clone(),
            entities,
            config.clear_old_tags_interval,
            config.storage_days,
        ));

        let aging = sweeper.clone();
        let cancel = tasks.cancel_token();
        tasks.spawn(async move { aging.run_tag_aging(cancel).await });

        let cancel = tasks.cancel_token();
        tasks.spawn(async move { sweeper.run_row_purge(cancel).await });
    }

    let state = AppState {
        config: config.clone(),
        registry,
        router,
        reconciler: reconciler.clone(),
        gateway,
        tag_repo,
        event_repo,
    };

    let app = web_api::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Drain background work before exit
    reconciler.reset().await;
    tasks.shutdown().await;
    tracing::info!("Tunnel Connector stopped");

    Ok(())
}
