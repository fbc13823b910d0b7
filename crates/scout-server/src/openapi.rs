use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scout API",
        version = "0.1.0",
        description = "Bulk ingestion and result access for the event, festival and sport extraction pipeline."
    ),
    paths(
        crate::routes::ingest_rows,
        crate::routes::ingest_csv,
        crate::routes::get_details,
        crate::routes::get_stats,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::IngestRowRequest,
        crate::dto::IngestRequest,
        crate::dto::IngestResponse,
        crate::dto::DetailsResponse,
        crate::dto::JobStatsResponse,
        crate::dto::CategoryStatsResponse,
        crate::dto::StatsResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
        crate::dto::RateLimitResponse,
    )),
    tags(
        (name = "ingest", description = "Bulk URL ingestion"),
        (name = "details", description = "Extracted detail records"),
        (name = "stats", description = "Queue and link-set counts"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Admin token. Set via SCOUT_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
