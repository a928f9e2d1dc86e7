//! ChargeSquare Server - Main entry point

use anyhow::Result;
use chargesquare_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chargesquare_server::{
    api::{self, AppState},
    config::Config,
    db::{
        self, InMemoryOffsetStore, InMemoryStationRepository, OffsetStore, PgOffsetStore,
        PgStationRepository, StationRepository,
    },
    ingest::{OpenChargeMapClient, StationPoller},
    messaging::{
        kafka::KafkaTopic, memory::MemoryTopic, ListenerConfig, StationMessageHandler,
        StationPublisher, TopicListener, TopicProducer, TopicSubscription,
    },
    middleware,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("chargesquare-server")
        .filter_directives("chargesquare_server=debug,tower_http=debug,sqlx=warn,rskafka=info")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting ChargeSquare server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // Station store
    let (stations, pool): (Arc<dyn StationRepository>, _) = match config.database.pool_config() {
        Some(db_config) => {
            let pool = db::create_pool(&db_config).await?;
            db::run_migrations(&pool).await?;
            info!("Database connection pool established");
            let repository: Arc<dyn StationRepository> =
                Arc::new(PgStationRepository::new(pool.clone()));
            (repository, Some(pool))
        },
        None => {
            warn!("DATABASE_URL not set, stations are kept in memory");
            let repository: Arc<dyn StationRepository> = Arc::new(InMemoryStationRepository::new());
            (repository, None)
        },
    };

    // Topic
    let (producer, subscription) = match config.kafka.topic_config() {
        Some(topic_config) => {
            let topic = KafkaTopic::connect(&topic_config).await?;
            let offsets: Arc<dyn OffsetStore> = match pool {
                Some(ref pool) => Arc::new(PgOffsetStore::new(pool.clone())),
                None => {
                    warn!("Consumer offsets are kept in memory; a restart replays the topic");
                    Arc::new(InMemoryOffsetStore::new())
                },
            };
            let subscription: Box<dyn TopicSubscription> =
                Box::new(topic.subscribe(config.kafka.group_id.clone(), offsets));
            let producer: Arc<dyn TopicProducer> = topic;
            (producer, subscription)
        },
        None => {
            warn!("KAFKA_BROKERS not set, using an in-memory topic");
            let topic = MemoryTopic::new(config.kafka.topic.clone(), config.kafka.partitions);
            let subscription: Box<dyn TopicSubscription> =
                Box::new(topic.subscribe(config.kafka.group_id.clone()));
            let producer: Arc<dyn TopicProducer> = topic;
            (producer, subscription)
        },
    };

    let ctx = CancellationToken::new();

    let listener_task = spawn_listener(
        subscription,
        Arc::clone(&stations),
        config.consumer.listener_config(),
        ctx.clone(),
    );

    let poller_task = if config.ingest.enabled {
        let ocm = &config.ingest.open_charge_map;
        let client = OpenChargeMapClient::new(ocm)?;
        let poller = StationPoller::new(client, StationPublisher::new(producer), ocm.fetch_interval());
        info!(
            country_code = %ocm.country_code,
            interval_secs = ocm.fetch_interval_secs,
            "Ingestion is enabled, starting poller"
        );
        Some(tokio::spawn(poller.run(ctx.clone())))
    } else {
        info!("Ingestion is disabled (INGEST_ENABLED=false)");
        None
    };

    let app = api::create_router(AppState { stations })
        .layer(middleware::cors_layer(&config.cors));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(ctx.clone()))
        .await?;

    // Covers the server exiting without a signal
    ctx.cancel();

    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    join_background("listener", Some(listener_task), timeout).await;
    join_background("poller", poller_task, timeout).await;

    info!("Server shut down gracefully");

    Ok(())
}

fn spawn_listener(
    subscription: Box<dyn TopicSubscription>,
    stations: Arc<dyn StationRepository>,
    config: ListenerConfig,
    ctx: CancellationToken,
) -> JoinHandle<Result<()>> {
    let handler = StationMessageHandler::new(stations);
    let listener = TopicListener::new(subscription, handler, config);
    tokio::spawn(listener.run(ctx))
}

async fn join_background(name: &str, task: Option<JoinHandle<Result<()>>>, timeout: Duration) {
    let Some(task) = task else {
        return;
    };

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(()))) => info!("Background {} stopped", name),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Background {} failed", name),
        Ok(Err(e)) => tracing::error!(error = %e, "Background {} panicked", name),
        Err(_) => warn!("Background {} did not stop within {:?}", name, timeout),
    }
}

/// Graceful shutdown signal handler
///
/// Cancels `ctx` so the poller and the listener stop with the server.
async fn shutdown_signal(ctx: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    ctx.cancel();
}
