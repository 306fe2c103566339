mod auth;
mod config;
mod errors;
mod flatten;
mod gateway;
mod handlers;
mod models;
mod query;
mod services;
mod ttl_cache;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::ttl_cache::TtlCache;

/// Serves the OpenAPI specification YAML file.
///
/// This endpoint reads the `openapi.yml` file from the filesystem and serves it
/// with the appropriate content type. If the file is not found, it returns a 404 error.
///
/// # Returns
///
/// * `impl IntoResponse` - The HTTP response containing the OpenAPI YAML content or an error message.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            "OpenAPI spec not found. Expected openapi.yml next to the binary.",
        )
            .into_response(),
    }
}

/// Serves the Swagger UI HTML page.
///
/// This endpoint returns an HTML page that embeds the Swagger UI, configured to
/// load the OpenAPI specification served by `serve_openapi_spec`.
///
/// # Returns
///
/// * `impl IntoResponse` - The HTTP response containing the Swagger UI HTML.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Sankhya Portal API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - The authenticated Sankhya gateway.
/// - Caches (search responses, partner names).
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sankhya_portal_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize the Sankhya gateway (holds the shared session token slot)
    let gateway = match gateway::SankhyaGateway::new(&config) {
        Ok(gw) => {
            tracing::info!("✓ Sankhya gateway initialized: {}", gw.base_url());
            Arc::new(gw)
        }
        Err(e) => anyhow::bail!("Failed to initialize Sankhya gateway: {}", e),
    };

    // Create checksummed search-response caches (product: 3 min, partner: 5 min)
    let produto_search_cache = Arc::new(TtlCache::new(config.search_cache_capacity));
    let parceiro_search_cache = Arc::new(TtlCache::new(config.search_cache_capacity));
    tracing::info!(
        "Search caches initialized ({} entries max each)",
        config.search_cache_capacity
    );

    // Create partner code -> name cache (1 hour TTL, 50k max entries)
    // Keeps receivable pages from re-fetching the same partner repeatedly
    let parceiro_nome_cache = Cache::builder()
        .time_to_live(Duration::from_secs(3600))
        .max_capacity(50_000)
        .build();
    tracing::info!("Partner name cache initialized (1h TTL, 50k capacity)");

    // Build application state
    let app_state = std::sync::Arc::new(crate::handlers::AppState {
        config: config.clone(),
        gateway,
        produto_search_cache,
        parceiro_search_cache,
        parceiro_nome_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        // Portal authentication
        .route("/api/auth/login", post(handlers::login))
        // Receivables
        .route(
            "/api/sankhya/titulos-receber",
            get(handlers::listar_titulos),
        )
        // Partners
        .route("/api/sankhya/parceiros", get(handlers::listar_parceiros))
        .route(
            "/api/sankhya/parceiros/search",
            get(handlers::search_parceiros),
        )
        .route(
            "/api/sankhya/parceiros/salvar",
            post(handlers::salvar_parceiro),
        )
        .route(
            "/api/sankhya/parceiros/deletar",
            post(handlers::deletar_parceiro),
        )
        // Products
        .route(
            "/api/sankhya/produtos/search",
            get(handlers::search_produtos),
        )
        .route(
            "/api/sankhya/produtos/estoque",
            get(handlers::estoque_produto),
        )
        .route("/api/sankhya/produtos/preco", get(handlers::preco_produto))
        // Lead activities
        .route("/api/leads/atividades", get(handlers::listar_atividades))
        .route(
            "/api/leads/atividades/criar",
            post(handlers::criar_atividade),
        )
        // Sellers
        .route("/api/vendedores", get(handlers::listar_vendedores))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 2MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20 (prevents DDoS)
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting for orchestration probes)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
