//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Splitflow API",
        version = "0.1.0",
        description = "Bayesian traffic-splitting service for A/B campaigns.\n\nVariants are allocated with epsilon-greedy, Thompson sampling, UCB1, or uniform strategies over live beta-binomial counters, with sticky per-user assignments and closed-form posterior comparison.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Allocation", description = "Variant allocation for live traffic"),
        (name = "Counters", description = "Impression and conversion event ingestion"),
        (name = "Campaigns", description = "Campaign administration and lifecycle"),
        (name = "Statistics", description = "Posterior reports and pairwise comparisons"),
        (name = "Users", description = "User registry and sticky assignments"),
        (name = "Simulation", description = "Synthetic traffic runs against live counters"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Allocation
        crate::rest::assign_variant,
        // Counters
        crate::rest::record_impression,
        crate::rest::record_conversion,
        // Statistics
        crate::rest::campaign_stats,
        crate::rest::campaign_comparisons,
        // Users
        crate::rest::register_user,
        crate::rest::user_status,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
        // Campaigns
        crate::admin::create_campaign,
        crate::admin::list_campaigns,
        crate::admin::get_campaign,
        crate::admin::pause_campaign,
        crate::admin::resume_campaign,
        crate::admin::reset_campaign,
        // Simulation
        crate::admin::run_simulation,
    ),
    components(schemas(
        // Core types
        splitflow_core::types::Campaign,
        splitflow_core::types::VariantCounts,
        // Engine types
        splitflow_engine::strategy::Strategy,
        splitflow_engine::reporter::CampaignReport,
        splitflow_engine::reporter::PairwiseComparison,
        splitflow_engine::simulation::SimulationReport,
        // Request/response types
        crate::rest::AssignVariantRequest,
        crate::rest::AssignVariantResponse,
        crate::rest::CounterEventRequest,
        crate::rest::ImpressionResponse,
        crate::rest::ConversionResponse,
        crate::rest::RegisterUserRequest,
        crate::rest::RegisterUserResponse,
        crate::rest::UserStatusResponse,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
        crate::admin::CreateCampaignRequest,
        crate::admin::CampaignCountsResponse,
        crate::admin::SimulationRequest,
    ))
)]
pub struct ApiDoc;
