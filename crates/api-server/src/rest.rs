//! REST handlers for live traffic: allocation, counter events, user
//! registry, statistics, and operational probes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use splitflow_core::SplitflowError;
use splitflow_engine::{
    campaign_report, pairwise_comparisons, AssignmentCoordinator, CampaignReport,
    PairwiseComparison, Strategy, VariantStore,
};
use tracing::{error, warn};
use utoipa::{IntoParams, ToSchema};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VariantStore>,
    pub coordinator: Arc<AssignmentCoordinator>,
    pub default_strategy: Strategy,
    pub epsilon: f64,
    pub report_sample_size: usize,
    pub node_id: String,
    pub start_time: Instant,
}

/// Maps engine errors onto HTTP statuses. Capacity violations surface as
/// conflicts so racing clients can tell a lost race from a bad request.
pub(crate) fn map_error(err: SplitflowError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        SplitflowError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        SplitflowError::InvariantViolation(_) => (StatusCode::CONFLICT, "conflict"),
        SplitflowError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        SplitflowError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    if status.is_server_error() {
        error!(error = %err, "Request failed");
        metrics::counter!("api.errors").increment(1);
    } else {
        warn!(error = %err, "Request rejected");
        if status == StatusCode::BAD_REQUEST {
            metrics::counter!("api.validation_errors").increment(1);
        }
    }
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: err.to_string(),
        }),
    )
}

// ─── Allocation ────────────────────────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct AssignVariantRequest {
    #[schema(example = "Test Home Page")]
    pub campaign: String,
    #[schema(example = "user1")]
    pub user_id: String,
    /// Strategy name; unset falls back to the configured default.
    #[schema(example = "thompson")]
    pub strategy: Option<String>,
    /// Set to false to rerun allocation and overwrite the stored assignment.
    pub sticky: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignVariantResponse {
    pub campaign: String,
    pub user_id: String,
    #[schema(example = "A")]
    pub variant: String,
    pub strategy: Strategy,
    pub sticky: bool,
}

/// POST /v1/variant — allocate (or replay) a variant for a user.
#[utoipa::path(
    post,
    path = "/v1/variant",
    tag = "Allocation",
    request_body = AssignVariantRequest,
    responses(
        (status = 200, description = "Variant assigned or replayed", body = AssignVariantResponse),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn assign_variant(
    State(state): State<AppState>,
    Json(request): Json<AssignVariantRequest>,
) -> Result<Json<AssignVariantResponse>, (StatusCode, Json<ErrorResponse>)> {
    if request.user_id.is_empty() {
        return Err(map_error(SplitflowError::InvalidParameter(
            "user_id must not be empty".to_string(),
        )));
    }

    let strategy = request
        .strategy
        .as_deref()
        .map(Strategy::resolve)
        .unwrap_or(state.default_strategy);
    let sticky = request.sticky.unwrap_or(true);

    let mut rng = rand::thread_rng();
    let variant = state
        .coordinator
        .get_or_assign(
            &state.store,
            &request.campaign,
            &request.user_id,
            strategy,
            state.epsilon,
            sticky,
            &mut rng,
        )
        .map_err(map_error)?;

    metrics::counter!("api.assignments", "strategy" => strategy.as_str()).increment(1);
    Ok(Json(AssignVariantResponse {
        campaign: request.campaign,
        user_id: request.user_id,
        variant,
        strategy,
        sticky,
    }))
}

// ─── Counter events ────────────────────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct CounterEventRequest {
    #[schema(example = "Test Home Page")]
    pub campaign: String,
    #[schema(example = "A")]
    pub variant: String,
}

#[derive(Serialize, ToSchema)]
pub struct ImpressionResponse {
    pub campaign: String,
    pub variant: String,
    pub impressions: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionResponse {
    pub campaign: String,
    pub variant: String,
    pub conversions: u64,
}

/// POST /v1/impression — record one impression.
#[utoipa::path(
    post,
    path = "/v1/impression",
    tag = "Counters",
    request_body = CounterEventRequest,
    responses(
        (status = 200, description = "Impression recorded", body = ImpressionResponse),
        (status = 404, description = "Unknown campaign or variant", body = ErrorResponse),
    )
)]
pub async fn record_impression(
    State(state): State<AppState>,
    Json(request): Json<CounterEventRequest>,
) -> Result<Json<ImpressionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let impressions = state
        .store
        .register_impression(&request.campaign, &request.variant)
        .map_err(map_error)?;
    metrics::counter!("api.impressions").increment(1);
    Ok(Json(ImpressionResponse {
        campaign: request.campaign,
        variant: request.variant,
        impressions,
    }))
}

/// POST /v1/conversion — record one conversion.
#[utoipa::path(
    post,
    path = "/v1/conversion",
    tag = "Counters",
    request_body = CounterEventRequest,
    responses(
        (status = 200, description = "Conversion recorded", body = ConversionResponse),
        (status = 404, description = "Unknown campaign or variant", body = ErrorResponse),
        (status = 409, description = "Conversion would exceed impressions", body = ErrorResponse),
    )
)]
pub async fn record_conversion(
    State(state): State<AppState>,
    Json(request): Json<CounterEventRequest>,
) -> Result<Json<ConversionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let conversions = state
        .store
        .register_conversion(&request.campaign, &request.variant)
        .map_err(map_error)?;
    metrics::counter!("api.conversions").increment(1);
    Ok(Json(ConversionResponse {
        campaign: request.campaign,
        variant: request.variant,
        conversions,
    }))
}

// ─── Statistics ────────────────────────────────────────────────────────────

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// Monte Carlo draws per variant; unset uses the configured default.
    #[param(minimum = 1, maximum = 1_000_000)]
    pub sample_size: Option<usize>,
}

/// GET /v1/campaigns/:name/stats — posterior report for a campaign.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{name}/stats",
    tag = "Statistics",
    params(
        ("name" = String, Path, description = "Campaign name"),
        StatsQuery,
    ),
    responses(
        (status = 200, description = "Posterior report", body = CampaignReport),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
        (status = 400, description = "Sample size out of range", body = ErrorResponse),
    )
)]
pub async fn campaign_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<CampaignReport>, (StatusCode, Json<ErrorResponse>)> {
    let sample_size = query.sample_size.unwrap_or(state.report_sample_size);
    let mut rng = rand::thread_rng();
    let report = campaign_report(&state.store, &name, sample_size, &mut rng).map_err(map_error)?;
    Ok(Json(report))
}

/// GET /v1/campaigns/:name/comparisons — closed-form pairwise comparison.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{name}/comparisons",
    tag = "Statistics",
    params(("name" = String, Path, description = "Campaign name")),
    responses(
        (status = 200, description = "Ordered pairwise comparisons", body = Vec<PairwiseComparison>),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
    )
)]
pub async fn campaign_comparisons(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<PairwiseComparison>>, (StatusCode, Json<ErrorResponse>)> {
    let rows = pairwise_comparisons(&state.store, &name).map_err(map_error)?;
    Ok(Json(rows))
}

// ─── Users ─────────────────────────────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    #[schema(example = "user1")]
    pub user_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterUserResponse {
    pub user_id: String,
    /// False when the id already existed; its assignments were reset.
    pub created: bool,
}

#[derive(Serialize, ToSchema)]
pub struct UserStatusResponse {
    pub user_id: String,
    pub known: bool,
    /// Sticky assignments keyed by campaign name.
    pub assignments: BTreeMap<String, String>,
}

/// POST /v1/users — register a user, resetting assignments on re-register.
#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "Users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "New user registered", body = RegisterUserResponse),
        (status = 200, description = "Existing user reset", body = RegisterUserResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<RegisterUserResponse>), (StatusCode, Json<ErrorResponse>)> {
    if request.user_id.is_empty() {
        return Err(map_error(SplitflowError::InvalidParameter(
            "user_id must not be empty".to_string(),
        )));
    }
    let created = state.coordinator.register_user(&request.user_id);
    metrics::counter!("api.users_registered").increment(1);
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(RegisterUserResponse {
            user_id: request.user_id,
            created,
        }),
    ))
}

/// GET /v1/users/:user_id — existence check plus current assignments.
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}",
    tag = "Users",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "User status", body = UserStatusResponse),
    )
)]
pub async fn user_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<UserStatusResponse> {
    let known = state.coordinator.user_exists(&user_id);
    let assignments = state.coordinator.assignments_for(&user_id);
    Json(UserStatusResponse {
        user_id,
        known,
        assignments,
    })
}

// ─── Operations ────────────────────────────────────────────────────────────

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
/// Returns 200 only when the service is ready to accept traffic.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready"),
        (status = 503, description = "Not ready"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe for Kubernetes.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn test_state() -> AppState {
        let store = Arc::new(VariantStore::new());
        store
            .create_campaign("landing", &["A".to_string(), "B".to_string()])
            .unwrap();
        AppState {
            store,
            coordinator: Arc::new(AssignmentCoordinator::new()),
            default_strategy: Strategy::Thompson,
            epsilon: 0.1,
            report_sample_size: 500,
            node_id: "test-node".to_string(),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_assign_variant_replays_sticky_choice() {
        let state = test_state();
        let request = || AssignVariantRequest {
            campaign: "landing".to_string(),
            user_id: "u1".to_string(),
            strategy: Some("uniform".to_string()),
            sticky: None,
        };

        let Json(first) = assign_variant(State(state.clone()), Json(request()))
            .await
            .unwrap();
        assert_eq!(first.strategy, Strategy::Uniform);
        assert!(first.sticky);

        let Json(second) = assign_variant(State(state.clone()), Json(request()))
            .await
            .unwrap();
        assert_eq!(second.variant, first.variant);
    }

    #[tokio::test]
    async fn test_assign_variant_unknown_campaign_is_404() {
        let state = test_state();
        let (status, Json(body)) = assign_variant(
            State(state),
            Json(AssignVariantRequest {
                campaign: "ghost".to_string(),
                user_id: "u1".to_string(),
                strategy: None,
                sticky: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "not_found");
    }

    #[tokio::test]
    async fn test_assign_variant_empty_user_is_400() {
        let state = test_state();
        let (status, Json(body)) = assign_variant(
            State(state),
            Json(AssignVariantRequest {
                campaign: "landing".to_string(),
                user_id: String::new(),
                strategy: None,
                sticky: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "invalid_request");
    }

    #[tokio::test]
    async fn test_impression_then_conversion_counts() {
        let state = test_state();
        let event = || CounterEventRequest {
            campaign: "landing".to_string(),
            variant: "A".to_string(),
        };

        let Json(imp) = record_impression(State(state.clone()), Json(event()))
            .await
            .unwrap();
        assert_eq!(imp.impressions, 2);

        let Json(conv) = record_conversion(State(state.clone()), Json(event()))
            .await
            .unwrap();
        assert_eq!(conv.conversions, 2);
    }

    #[tokio::test]
    async fn test_conversion_without_capacity_is_409() {
        let state = test_state();
        // seeded counters sit at 1/1, so an immediate conversion has no room
        let (status, Json(body)) = record_conversion(
            State(state),
            Json(CounterEventRequest {
                campaign: "landing".to_string(),
                variant: "A".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "conflict");
    }

    #[tokio::test]
    async fn test_stats_endpoint_uses_configured_sample_size() {
        let state = test_state();
        let Json(report) = campaign_stats(
            State(state),
            Path("landing".to_string()),
            Query(StatsQuery { sample_size: None }),
        )
        .await
        .unwrap();
        assert_eq!(report.sample_size, 500);
        assert_eq!(report.variant_impressions.len(), 2);
    }

    #[tokio::test]
    async fn test_stats_oversized_sample_size_is_400() {
        let state = test_state();

        let (status, Json(body)) = campaign_stats(
            State(state.clone()),
            Path("landing".to_string()),
            Query(StatsQuery {
                sample_size: Some(usize::MAX),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "invalid_request");

        // in-range overrides still take effect
        let Json(report) = campaign_stats(
            State(state),
            Path("landing".to_string()),
            Query(StatsQuery {
                sample_size: Some(1_000),
            }),
        )
        .await
        .unwrap();
        assert_eq!(report.sample_size, 1_000);
    }

    #[tokio::test]
    async fn test_comparisons_endpoint_orders_pairs() {
        let state = test_state();
        let Json(rows) = campaign_comparisons(State(state), Path("landing".to_string()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_user_registration_round_trip() {
        let state = test_state();

        let (status, Json(first)) = register_user(
            State(state.clone()),
            Json(RegisterUserRequest {
                user_id: "user1".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(first.created);

        let (status, Json(second)) = register_user(
            State(state.clone()),
            Json(RegisterUserRequest {
                user_id: "user1".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(!second.created);

        let Json(known) = user_status(State(state.clone()), Path("user1".to_string())).await;
        assert!(known.known);
        let Json(unknown) = user_status(State(state), Path("stranger".to_string())).await;
        assert!(!unknown.known);
        assert!(unknown.assignments.is_empty());
    }
}
