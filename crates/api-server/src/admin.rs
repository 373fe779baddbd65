//! Campaign administration endpoints: definition, lifecycle, counter
//! resets, and synthetic traffic runs.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use splitflow_core::types::{Campaign, VariantCounts};
use splitflow_engine::{simulate_visits, SimulationReport, Strategy};
use utoipa::ToSchema;

use crate::rest::{map_error, AppState, ErrorResponse};

#[derive(Deserialize, ToSchema)]
pub struct CreateCampaignRequest {
    #[schema(example = "Test Home Page")]
    pub name: String,
    #[schema(example = json!(["A", "B"]))]
    pub variants: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignCountsResponse {
    pub campaign: String,
    pub variants: BTreeMap<String, VariantCounts>,
}

#[derive(Deserialize, ToSchema)]
pub struct SimulationRequest {
    #[schema(example = "Test Home Page")]
    pub campaign: String,
    #[schema(example = 1000, maximum = 1_000_000)]
    pub visits: u64,
    /// Bernoulli conversion rate per variant; omitted variants convert at 0.5.
    #[serde(default)]
    #[schema(example = json!({"A": 0.1, "B": 0.15}))]
    pub conversion_rates: BTreeMap<String, f64>,
    pub strategy: Option<String>,
    pub epsilon: Option<f64>,
}

/// POST /v1/campaigns — create or replace a campaign.
#[utoipa::path(
    post,
    path = "/v1/campaigns",
    tag = "Campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign stored with seeded counters", body = CampaignCountsResponse),
        (status = 400, description = "Invalid campaign definition", body = ErrorResponse),
    )
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignCountsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let variants = state
        .store
        .create_campaign(&request.name, &request.variants)
        .map_err(map_error)?;
    metrics::counter!("api.campaigns_created").increment(1);
    Ok((
        StatusCode::CREATED,
        Json(CampaignCountsResponse {
            campaign: request.name,
            variants,
        }),
    ))
}

/// GET /v1/campaigns — list campaigns, newest first.
#[utoipa::path(
    get,
    path = "/v1/campaigns",
    tag = "Campaigns",
    responses((status = 200, description = "All campaigns", body = Vec<Campaign>))
)]
pub async fn list_campaigns(State(state): State<AppState>) -> Json<Vec<Campaign>> {
    Json(state.store.list())
}

/// GET /v1/campaigns/:name — campaign detail.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{name}",
    tag = "Campaigns",
    params(("name" = String, Path, description = "Campaign name")),
    responses(
        (status = 200, description = "Campaign detail", body = Campaign),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
    )
)]
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Campaign>, (StatusCode, Json<ErrorResponse>)> {
    state.store.get(&name).map(Json).map_err(map_error)
}

/// POST /v1/campaigns/:name/pause — mark a campaign inactive.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{name}/pause",
    tag = "Campaigns",
    params(("name" = String, Path, description = "Campaign name")),
    responses(
        (status = 200, description = "Campaign paused", body = Campaign),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
    )
)]
pub async fn pause_campaign(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Campaign>, (StatusCode, Json<ErrorResponse>)> {
    state.store.set_active(&name, false).map(Json).map_err(map_error)
}

/// POST /v1/campaigns/:name/resume — mark a campaign active.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{name}/resume",
    tag = "Campaigns",
    params(("name" = String, Path, description = "Campaign name")),
    responses(
        (status = 200, description = "Campaign resumed", body = Campaign),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
    )
)]
pub async fn resume_campaign(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Campaign>, (StatusCode, Json<ErrorResponse>)> {
    state.store.set_active(&name, true).map(Json).map_err(map_error)
}

/// POST /v1/campaigns/:name/reset — restore all counters to the seed prior.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{name}/reset",
    tag = "Campaigns",
    params(("name" = String, Path, description = "Campaign name")),
    responses(
        (status = 200, description = "Counters reset", body = CampaignCountsResponse),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
    )
)]
pub async fn reset_campaign(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CampaignCountsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let variants = state.store.reset_counters(&name).map_err(map_error)?;
    Ok(Json(CampaignCountsResponse {
        campaign: name,
        variants,
    }))
}

/// POST /v1/simulate — drive synthetic visits through the live counters.
#[utoipa::path(
    post,
    path = "/v1/simulate",
    tag = "Simulation",
    request_body = SimulationRequest,
    responses(
        (status = 200, description = "Simulation outcome", body = SimulationReport),
        (status = 404, description = "Unknown campaign", body = ErrorResponse),
        (status = 400, description = "Invalid conversion rates or visit count", body = ErrorResponse),
    )
)]
pub async fn run_simulation(
    State(state): State<AppState>,
    Json(request): Json<SimulationRequest>,
) -> Result<Json<SimulationReport>, (StatusCode, Json<ErrorResponse>)> {
    let strategy = request
        .strategy
        .as_deref()
        .map(Strategy::resolve)
        .unwrap_or(state.default_strategy);
    let epsilon = request.epsilon.unwrap_or(state.epsilon);

    let mut rng = rand::thread_rng();
    let report = simulate_visits(
        &state.store,
        &request.campaign,
        request.visits,
        &request.conversion_rates,
        strategy,
        epsilon,
        &mut rng,
    )
    .map_err(map_error)?;

    metrics::counter!("api.simulations").increment(1);
    Ok(Json(report))
}
