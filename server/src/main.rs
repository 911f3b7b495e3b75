//! Stayline guest access server.
//!
//! Wires the Postgres stores, Redis staff sessions and the Redpanda bus
//! into the web router, then serves HTTP and websocket traffic until a
//! shutdown signal arrives.

mod config;

use anyhow::Context;
use axum::{Router, routing::get};
use config::Config;
use stayline_auth::stores::{
    PostgresBookingDirectory, PostgresCredentialStore, PostgresGuestActivity, RedisStaffSessionStore,
};
use stayline_auth::{
    ChannelGateway, GatewayConfig, GrantSigner, GuestActionService, GuestContextResolver,
    TokenLifecycleManager, TokenPolicy,
};
use stayline_core::environment::{Clock, IdGenerator, RandomIdGenerator, SystemClock};
use stayline_core::event_bus::EventBus;
use stayline_postgres::PoolConfig;
use stayline_redpanda::RedpandaEventBus;
use stayline_runtime::metrics::MetricsServer;
use stayline_runtime::{EmitterConfig, EventEmitter};
use stayline_web::{AppState, Backend, RelayHub, router, spawn_bus_pump};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Event ids remembered by the relay for redelivery detection.
const RELAY_DEDUP_CAPACITY: usize = 10_000;

/// Production adapters.
struct PostgresBackend;

impl Backend for PostgresBackend {
    type Credentials = PostgresCredentialStore;
    type Directory = PostgresBookingDirectory;
    type Sessions = RedisStaffSessionStore;
    type Activity = PostgresGuestActivity;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stayline=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        redpanda_brokers = %config.redpanda.brokers,
        topic = %config.redpanda.topic,
        port = config.server.port,
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(SocketAddr::new(
        config.server.host.parse().context("HOST is not an IP address")?,
        config.server.metrics_port,
    ));
    metrics.start()?;
    if let Some(handle) = metrics.handle().cloned() {
        let metrics_app = Router::new().route("/metrics", get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }));
        let metrics_listener = tokio::net::TcpListener::bind(metrics.addr()).await?;
        info!(address = %metrics.addr(), "Metrics endpoint listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
                error!(error = %e, "Metrics endpoint stopped");
            }
        });
    }

    info!("Connecting to PostgreSQL...");
    let pool = stayline_postgres::connect(
        &PoolConfig::new(config.database.url.clone()).with_max_connections(config.database.max_connections),
    )
    .await?;
    stayline_postgres::migrate(&pool).await?;

    info!("Connecting to Redpanda event bus...");
    let bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(config.redpanda.brokers.clone())
            .topic(config.redpanda.topic.clone())
            .timeout(config.redpanda.publish_timeout)
            .build()?,
    );

    info!("Connecting to Redis for staff sessions...");
    let sessions = RedisStaffSessionStore::new(&config.redis_url).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ids: Arc<dyn IdGenerator> = Arc::new(RandomIdGenerator);

    let emitter = EventEmitter::new(
        bus.clone(),
        clock.clone(),
        ids.clone(),
        EmitterConfig::default().with_publish_timeout(config.redpanda.publish_timeout),
    );
    let tokens = TokenLifecycleManager::new(
        PostgresCredentialStore::new(pool.clone()),
        clock,
        ids.clone(),
        TokenPolicy::default().with_grace_after_stay(chrono::Duration::days(config.access.grace_days)),
    );
    let resolver = GuestContextResolver::new(tokens, PostgresBookingDirectory::new(pool.clone()));
    let signer = GrantSigner::new(&GatewayConfig::new(
        config.access.signing_key_id.clone(),
        config.access.signing_secret.clone(),
    ));
    let gateway = ChannelGateway::new(resolver.clone(), sessions, signer);
    let actions = GuestActionService::new(resolver.clone(), PostgresGuestActivity::new(pool), emitter, ids);

    let relay = RelayHub::new();
    let pump = spawn_bus_pump(bus, relay.clone(), RELAY_DEDUP_CAPACITY);

    let app = router(AppState::<PostgresBackend>::new(resolver, gateway, actions, relay));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = stop_tx.send(true);

    // Open websockets hold graceful shutdown; give them a bounded window.
    match tokio::time::timeout(config.server.shutdown_timeout, server).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join)) => error!(error = %join, "Server task failed"),
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout.as_secs(),
            "Shutdown timeout elapsed with connections still open"
        ),
    }
    pump.abort();

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM signal, shutting down gracefully..."),
    }
}
