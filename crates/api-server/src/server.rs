//! API server — HTTP surface, Swagger UI, and the Prometheus exporter.

use crate::admin;
use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use splitflow_core::AppConfig;
use splitflow_engine::{AssignmentCoordinator, Strategy, VariantStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Main API server for campaign allocation and administration.
pub struct ApiServer {
    config: AppConfig,
    store: Arc<VariantStore>,
    coordinator: Arc<AssignmentCoordinator>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        store: Arc<VariantStore>,
        coordinator: Arc<AssignmentCoordinator>,
    ) -> Self {
        Self {
            config,
            store,
            coordinator,
        }
    }

    /// Start the HTTP REST server. Blocks until shutdown.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState {
            store: self.store.clone(),
            coordinator: self.coordinator.clone(),
            default_strategy: Strategy::resolve(&self.config.engine.default_strategy),
            epsilon: self.config.engine.epsilon,
            report_sample_size: self.config.engine.report_sample_size,
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        let app = Router::new()
            // Traffic endpoints
            .route("/v1/variant", post(rest::assign_variant))
            .route("/v1/impression", post(rest::record_impression))
            .route("/v1/conversion", post(rest::record_conversion))
            // Campaign administration
            .route(
                "/v1/campaigns",
                get(admin::list_campaigns).post(admin::create_campaign),
            )
            .route("/v1/campaigns/:name", get(admin::get_campaign))
            .route("/v1/campaigns/:name/pause", post(admin::pause_campaign))
            .route("/v1/campaigns/:name/resume", post(admin::resume_campaign))
            .route("/v1/campaigns/:name/reset", post(admin::reset_campaign))
            // Statistics
            .route("/v1/campaigns/:name/stats", get(rest::campaign_stats))
            .route(
                "/v1/campaigns/:name/comparisons",
                get(rest::campaign_comparisons),
            )
            // Users
            .route("/v1/users", post(rest::register_user))
            .route("/v1/users/:user_id", get(rest::user_status))
            // Simulation
            .route("/v1/simulate", post(admin::run_simulation))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // API docs
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
