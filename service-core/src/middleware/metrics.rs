use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};
use std::time::Instant;

/// Known top-level sections. Anything else is a tenant site path, which
/// would otherwise blow up label cardinality with one series per tenant.
const KNOWN_SECTIONS: &[&str] = &[
    "/health",
    "/ready",
    "/metrics",
    "/site",
    "/agency",
    "/subaccount",
    "/stripe",
];

fn path_label(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    for section in KNOWN_SECTIONS {
        if path == *section || path.starts_with(&format!("{}/", section)) {
            return (*section).to_string();
        }
    }
    "/{tenant}".to_string()
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = path_label(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status().as_u16().to_string();

    let labels = [("method", method), ("path", path), ("status", status)];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_paths_collapse_to_their_prefix() {
        assert_eq!(path_label("/agency/abc-123/billing"), "/agency");
        assert_eq!(path_label("/site/pricing"), "/site");
        assert_eq!(path_label("/health"), "/health");
    }

    #[test]
    fn tenant_paths_share_one_label() {
        assert_eq!(path_label("/tenant-a/dashboard"), "/{tenant}");
        assert_eq!(path_label("/some-agency"), "/{tenant}");
    }

    #[test]
    fn root_is_kept_as_is() {
        assert_eq!(path_label("/"), "/");
    }
}
