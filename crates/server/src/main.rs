use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use riskwatch_common::repository::{AlertRepository, ConfigurationRepository, DeliveryRepository};
use riskwatch_workers::alert::AlertStore;
use riskwatch_workers::delivery::DeliveryTracker;
use riskwatch_workers::dispatch::DispatchEngine;
use riskwatch_workers::scheduler::{Schedule, Scheduler};
use riskwatch_workers::storage::{
    create_pool, migrator, PgAlertRepository, PgConfigurationRepository, PgDeliveryRepository,
};
use riskwatch_workers::store::{
    MemoryAlertRepository, MemoryConfigurationRepository, MemoryDeliveryRepository,
};
use tokio_util::task::TaskTracker;

use riskwatch_server::channels::build_registry;
use riskwatch_server::config::{self, DatabaseConfig, LogConfig, LogFormat, ServerConfig};
use riskwatch_server::metrics::server_metrics::ServerMetrics;
use riskwatch_server::ratelimit::{AdmissionController, BucketEvictionJob};
use riskwatch_server::rest::{self, drain_dispatches, AppState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

struct Repositories {
    alerts: Arc<dyn AlertRepository>,
    configurations: Arc<dyn ConfigurationRepository>,
    deliveries: Arc<dyn DeliveryRepository>,
}

#[tokio::main]
async fn main() {
    let config = match config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("riskwatch-server: failed to load configuration: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(&config.log);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn repositories(db: &DatabaseConfig) -> Result<Repositories, BoxError> {
    let Some(url) = &db.url else {
        tracing::warn!("no database configured, state is kept in memory only");
        return Ok(Repositories {
            alerts: Arc::new(MemoryAlertRepository::new()),
            configurations: Arc::new(MemoryConfigurationRepository::new()),
            deliveries: Arc::new(MemoryDeliveryRepository::new()),
        });
    };

    let pool = create_pool(url, db.max_connections).await?;
    let applied = migrator::run_migrations(&pool).await?;
    tracing::info!(applied = applied.len(), "database migrations up to date");
    Ok(Repositories {
        alerts: Arc::new(PgAlertRepository::new(pool.clone())),
        configurations: Arc::new(PgConfigurationRepository::new(pool.clone())),
        deliveries: Arc::new(PgDeliveryRepository::new(pool)),
    })
}

async fn run(config: ServerConfig) -> Result<(), BoxError> {
    let repos = repositories(&config.database).await?;
    let notifiers = build_registry(&config.channels)?;

    let dispatch = config.dispatch.engine_config();
    let engine = DispatchEngine::new(
        AlertStore::new(repos.alerts),
        repos.configurations.clone(),
        DeliveryTracker::new(repos.deliveries, dispatch.backoff_ceiling),
        notifiers,
        dispatch,
    );

    let metrics = ServerMetrics::new();
    let admission = AdmissionController::new(config.rate_limit.policy(), metrics.clone());

    let mut scheduler = Scheduler::with_dispatch_jobs(engine.clone(), &config.scheduler.settings());
    scheduler.register(
        BucketEvictionJob::new(admission.clone()),
        Schedule::every(config.rate_limit.eviction_interval()),
    );
    tracing::info!(jobs = ?scheduler.job_names(), "scheduler starting");
    let jobs = scheduler.spawn_all();

    let dispatches = TaskTracker::new();
    let app = rest::router(AppState {
        engine,
        configurations: repos.configurations,
        admission,
        metrics,
        rate_limit_enabled: config.rate_limit.enabled,
        dispatches: dispatches.clone(),
    });

    let addr = config.http.addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "REST server starting");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown())
    .await?;

    tracing::info!(in_flight = dispatches.len(), "draining alert dispatches");
    let abandoned = drain_dispatches(&dispatches, DISPATCH_DRAIN_TIMEOUT).await;
    if abandoned > 0 {
        tracing::warn!(abandoned, "dispatches still running at shutdown");
    }

    tracing::info!(jobs = jobs.job_count(), "stopping scheduler");
    jobs.shutdown().await;
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown signal received");
}
