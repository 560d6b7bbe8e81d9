//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{assets, health, tickets};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "OpsDesk API",
        version = "1.0.0",
        description = "HR and IT operations REST API: assets, assignments and support tickets",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Assets
        assets::list_assets,
        assets::get_asset,
        assets::create_asset,
        assets::update_asset,
        assets::get_transitions,
        assets::create_assignment,
        assets::return_asset,
        assets::list_assignments,
        // Tickets
        tickets::list_tickets,
        tickets::get_ticket,
        tickets::create_ticket,
        tickets::update_ticket,
        tickets::list_comments,
        tickets::add_comment,
        tickets::list_priorities,
    ),
    components(
        schemas(
            // Assets
            crate::models::asset::Asset,
            crate::models::asset::AssetAssignment,
            crate::models::asset::AssetDetails,
            crate::models::asset::AssetTransitions,
            crate::models::asset::AssetPage,
            crate::models::asset::AssetQuery,
            crate::models::asset::CreateAsset,
            crate::models::asset::UpdateAsset,
            crate::models::asset::CreateAssignment,
            crate::models::asset::ReturnAsset,
            crate::models::enums::AssetStatus,
            crate::models::enums::AssetType,
            crate::rules::asset_lifecycle::AssetActions,
            crate::rules::asset_lifecycle::AssetAction,
            // Tickets
            crate::models::ticket::Ticket,
            crate::models::ticket::TicketDetails,
            crate::models::ticket::TicketPage,
            crate::models::ticket::TicketPriority,
            crate::models::ticket::TicketComment,
            crate::models::ticket::TicketQuery,
            crate::models::ticket::CreateTicket,
            crate::models::ticket::UpdateTicket,
            crate::models::ticket::CreateComment,
            crate::models::enums::TicketStatus,
            crate::rules::ticket_sla::SlaSnapshot,
            crate::rules::ticket_sla::PendingFlags,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "assets", description = "Asset lifecycle and assignments"),
        (name = "tickets", description = "Support tickets and SLA tracking")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
