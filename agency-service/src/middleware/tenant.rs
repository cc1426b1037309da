//! Tenant router middleware.
//!
//! Wraps the whole router rather than sitting inside it, so URI rewrites
//! happen before axum matches a route. Session presence is only checked
//! when the decision actually hinges on it, which keeps public traffic off
//! the identity provider.

use crate::identity::SessionCredentials;
use crate::routing::{decide_route, RouteAction, RouteRequest, SIGN_IN_PATH};
use crate::services::metrics::ROUTE_DECISIONS_TOTAL;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, uri::Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use service_core::error::AppError;

pub async fn tenant_router_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned());
    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(|value| value.to_owned());

    let route_request = RouteRequest {
        host: host.as_deref(),
        path: &path,
        query: query.as_deref(),
        has_session: false,
    };
    let mut action = decide_route(&route_request, &state.config.routing);

    // Session presence only flips RequireAuth into Passthrough, so the
    // decision is first taken without it and only revisited when it is the
    // deciding factor.
    if matches!(action, RouteAction::RequireAuth { .. }) {
        let credentials =
            SessionCredentials::from_headers(request.headers(), &state.config.identity.session_cookie);
        if !credentials.is_empty() {
            match state.identity.current_identity(&credentials).await {
                Ok(Some(_)) => action = RouteAction::Passthrough,
                Ok(None) => {}
                Err(e) => {
                    // Fail closed: an unreachable provider reads as no session.
                    tracing::warn!(
                        error = %e,
                        path = %path,
                        "Identity provider unavailable during routing, treating as unauthenticated"
                    );
                }
            }
        }
    }

    ROUTE_DECISIONS_TOTAL
        .with_label_values(&[action.kind()])
        .inc();
    tracing::debug!(path = %path, action = action.kind(), "Route decision");

    match action {
        RouteAction::Rewrite(target) => {
            let Some(uri) = rewrite_uri(request.uri(), &target) else {
                tracing::error!(target = %target, "Failed to rewrite request URI");
                return AppError::InternalError(anyhow::anyhow!("Invalid rewrite target"))
                    .into_response();
            };
            *request.uri_mut() = uri;
            next.run(request).await
        }
        RouteAction::Redirect(location) => Redirect::temporary(&location).into_response(),
        RouteAction::RequireAuth { return_to } => {
            let location = format!(
                "{}?return_to={}",
                SIGN_IN_PATH,
                urlencoding::encode(&return_to)
            );
            Redirect::temporary(&location).into_response()
        }
        RouteAction::Passthrough => next.run(request).await,
    }
}

/// Swap the path and query of a request URI, keeping everything else.
fn rewrite_uri(original: &Uri, target: &str) -> Option<Uri> {
    let path_and_query = target.parse().ok()?;
    let mut parts = original.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).ok()
}
