use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

use riskwatch_common::repository::ConfigurationRepository;
use riskwatch_workers::dispatch::DispatchEngine;

use super::{admin, alerts, configurations, health, metrics};
use crate::metrics::server_metrics::ServerMetrics;
use crate::middleware::observe::observe;
use crate::middleware::rate_limit::rate_limit;
use crate::ratelimit::AdmissionController;

#[derive(Clone)]
pub struct AppState {
    pub engine: DispatchEngine,
    pub configurations: Arc<dyn ConfigurationRepository>,
    pub admission: AdmissionController,
    pub metrics: Arc<ServerMetrics>,
    pub rate_limit_enabled: bool,
    /// Dispatches started by alert creation, drained on shutdown.
    pub dispatches: TaskTracker,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::metrics))
        .route("/health/channels", get(health::channels))
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/alerts/stats", get(alerts::alert_stats))
        .route("/alerts/{id}", get(alerts::get_alert))
        .route("/alerts/{id}/deliveries", get(alerts::alert_deliveries))
        .route("/alerts/{id}/acknowledge", post(alerts::acknowledge_alert))
        .route("/alerts/{id}/resolve", post(alerts::resolve_alert))
        .route(
            "/alert-configurations",
            get(configurations::list_configurations).post(configurations::create_configuration),
        )
        .route(
            "/alert-configurations/{id}",
            get(configurations::get_configuration)
                .put(configurations::update_configuration)
                .delete(configurations::delete_configuration),
        )
        .route("/admin/rate-limits/reset", post(admin::reset_rate_limit))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn_with_state(state.clone(), observe))
        .with_state(state)
}

/// Stops accepting dispatch work and waits for what is in flight. Returns
/// how many dispatches were still running when `timeout` elapsed.
pub async fn drain_dispatches(dispatches: &TaskTracker, timeout: Duration) -> usize {
    dispatches.close();
    if tokio::time::timeout(timeout, dispatches.wait()).await.is_ok() {
        return 0;
    }
    dispatches.len()
}
