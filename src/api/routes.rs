//! API router setup with Swagger UI and middleware.

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::auth::require_api_key;
use super::handlers::{self, health, identify, translate, HealthResponse, IdentifyRequest, TranslateRequest};
use super::state::ApiState;
use crate::config::ServerConfig;
use crate::proxy::ErrorBody;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Herbgarden Proxy API",
        version = "1.0.0",
        description = "Credential-injecting proxies for plant identification and herb translation",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::health,
        handlers::identify,
        handlers::translate,
    ),
    components(
        schemas(
            HealthResponse,
            IdentifyRequest,
            TranslateRequest,
            ErrorBody,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Proxy", description = "Identification and translation proxies"),
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

/// Add API key security scheme to OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-API-Key"),
                    ),
                ),
            );
        }
    }
}

/// Build the CORS layer. Browsers call the proxies directly, so preflight
/// must succeed for the headers the web client sends.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    if origins.is_empty() {
        // Same-origin only
        layer
    } else if origins.iter().any(|o| o == "*") {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// Create the API router with all routes and middleware.
pub fn create_router(state: ApiState, config: &ServerConfig) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    let proxy_routes = Router::new()
        .route("/api/v1/identify", post(identify))
        .route("/api/v1/translate", post(translate))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let mut router = Router::new()
        .merge(public_routes)
        .merge(proxy_routes)
        .with_state(state);

    if config.swagger_ui {
        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}
