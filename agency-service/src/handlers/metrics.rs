//! Prometheus metrics endpoint.

use crate::services::get_metrics;
use axum::http::StatusCode;
use axum::response::IntoResponse;

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
