use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use shop_admin_storage::Database;

use crate::{admin, api, dashboard, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database) -> Self {
        Self {
            metrics,
            storage,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/dashboard", get(dashboard::json))
        .route("/admin", get(admin::index))
        .route("/admin/dashboard", get(dashboard::page))
        .route(
            "/admin/api/:entity",
            get(api::list).delete(api::bulk_delete),
        )
        .route("/admin/:entity", get(admin::list))
        .route(
            "/admin/:entity/create",
            get(admin::create_form).post(admin::create_submit),
        )
        .route("/admin/:entity/export", get(admin::export))
        .route("/admin/:entity/:id", get(admin::detail))
        .route(
            "/admin/:entity/:id/edit",
            get(admin::edit_form).post(admin::edit_submit),
        )
        .route("/admin/:entity/:id/delete", post(admin::delete))
        .with_state(state)
}

async fn root() -> Redirect {
    Redirect::to("/admin")
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
