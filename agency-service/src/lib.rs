pub mod config;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routing;
pub mod services;
pub mod startup;
pub mod store;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AgencyConfig;
use crate::identity::IdentityProvider;
use crate::services::{ActivityLog, MembershipService};
use crate::store::AgencyStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AgencyConfig,
    pub store: Arc<dyn AgencyStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub resolver: MembershipService,
    pub activity: ActivityLog,
}

/// Build the HTTP router.
///
/// The tenant router middleware is mounted around this router in
/// [`startup::Application::run_until_stopped`], so every path here is
/// post-rewrite: tenant subdomains arrive as `/:token/...` and the bare
/// `/` never reaches the router at all.
pub fn build_router(state: AppState) -> Router {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        // Marketing site
        .route("/site", get(handlers::pages::site_home))
        .route("/site/*section", get(handlers::pages::site_section))
        // Agency section
        .route("/agency", get(handlers::agency::agency_entry))
        .route("/agency/sign-in", get(handlers::pages::sign_in_page))
        .route("/agency/sign-up", get(handlers::pages::sign_up_page))
        .route(
            "/agency/:agency_id",
            get(handlers::agency::agency_dashboard).patch(handlers::agency::update_agency),
        )
        .route(
            "/agency/:agency_id/notifications",
            get(handlers::agency::list_notifications),
        )
        .route(
            "/agency/:agency_id/*section",
            get(handlers::pages::agency_section),
        )
        .route("/subaccount", get(handlers::pages::subaccount_home))
        // Tenant sites, reached through the subdomain rewrite
        .route("/:token", get(handlers::pages::tenant_site))
        .route("/:token/*section", get(handlers::pages::tenant_site_section))
        .with_state(state.clone())
        // Add metrics middleware
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        // Add CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .map(|o| {
                            o.parse::<axum::http::HeaderValue>().unwrap_or_else(|e| {
                                tracing::error!(
                                    "Invalid CORS origin '{}': {}. Using fallback.",
                                    o,
                                    e
                                );
                                axum::http::HeaderValue::from_static("*")
                            })
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::COOKIE,
                ]),
        );

    app
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": state.config.service_name,
                "version": state.config.service_version
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": state.config.service_name,
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
