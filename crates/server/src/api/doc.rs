//! OpenAPI documentation aggregator, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "chatbot-gateway API",
        version = "0.1.0",
        description = "Chat gateway connecting a Claude model to tools served by MCP providers.",
    ),
    tags(
        (name = "Health", description = "Server readiness and provider status"),
        (name = "Query", description = "Conversational queries with tool use"),
        (name = "Tools", description = "Aggregated tool catalog and direct invocation"),
    ),
    paths(
        crate::api::health::health,
        crate::api::query::query,
        crate::api::tools::list_tools,
        crate::api::tools::invoke_tool,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::health::HealthResponse,
        crate::api::query::QueryRequest,
        crate::api::query::QueryResponse,
        crate::api::tools::ToolsResponse,
        crate::api::tools::ToolInvokeRequest,
        crate::api::tools::ToolInvokeResponse,
    ))
)]
pub struct ApiDoc;
