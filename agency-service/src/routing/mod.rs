//! Tenant routing decisions.
//!
//! Every request passes through [`decide_route`] before it reaches a
//! handler. The function is pure: it looks only at the facts in
//! [`RouteRequest`] and the static [`RoutingConfig`], and returns what the
//! HTTP layer should do. Rules are evaluated top to bottom; the first match
//! wins.

use serde::Deserialize;

/// Where unauthenticated visitors are sent.
pub const SIGN_IN_PATH: &str = "/agency/sign-in";

/// Path sections that are never treated as tenant tokens.
const RESERVED_SECTIONS: [&str; 3] = ["/agency", "/subaccount", "/stripe"];

/// Static routing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Apex domain the service is hosted on, e.g. `app.example.com`.
    /// Hosts below it are tenant subdomains.
    pub base_domain: String,
    /// Paths reachable without a session. An entry matches exactly or as a
    /// segment prefix (`/site` covers `/site/pricing`, not `/sitemap`).
    pub public_routes: Vec<String>,
}

/// Facts about one request, extracted before any handler runs.
#[derive(Debug, Clone)]
pub struct RouteRequest<'a> {
    pub host: Option<&'a str>,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub has_session: bool,
}

/// What the HTTP layer should do with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Serve a different internal path; the URL in the browser stays put.
    Rewrite(String),
    /// Send the client elsewhere with a temporary redirect.
    Redirect(String),
    /// No session on a protected path. Carries the path to return to after
    /// signing in.
    RequireAuth { return_to: String },
    /// Let the request through unchanged.
    Passthrough,
}

impl RouteAction {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteAction::Rewrite(_) => "rewrite",
            RouteAction::Redirect(_) => "redirect",
            RouteAction::RequireAuth { .. } => "require_auth",
            RouteAction::Passthrough => "passthrough",
        }
    }
}

/// Decide what to do with a request.
pub fn decide_route(request: &RouteRequest<'_>, config: &RoutingConfig) -> RouteAction {
    let token = custom_domain_token(request.host, &config.base_domain);

    // Tenant subdomain: fold the token into the path so one handler tree
    // serves every tenant.
    if let Some(token) = token {
        let mut target = format!("/{}{}", token, request.path);
        if let Some(query) = request.query {
            target.push('?');
            target.push_str(query);
        }
        return RouteAction::Rewrite(target);
    }

    // Bare auth paths move under the agency section.
    if request.path == "/sign-in" || request.path == "/sign-up" {
        return RouteAction::Redirect(SIGN_IN_PATH.to_string());
    }

    // The apex landing page is the marketing site. Exact matches only;
    // deeper /site paths already point where they should.
    if request.path == "/"
        || (request.path == "/site" && is_base_host(request.host, &config.base_domain))
    {
        return RouteAction::Rewrite("/site".to_string());
    }

    // Reserved first-level sections are the app itself.
    if RESERVED_SECTIONS
        .iter()
        .any(|section| matches_route(request.path, section))
    {
        return RouteAction::Passthrough;
    }

    if !is_public_route(request.path, &config.public_routes) && !request.has_session {
        let mut return_to = request.path.to_string();
        if let Some(query) = request.query {
            return_to.push('?');
            return_to.push_str(query);
        }
        return RouteAction::RequireAuth { return_to };
    }

    RouteAction::Passthrough
}

/// Extract the tenant token from the host, if the request arrived on a
/// subdomain of the base domain.
///
/// Hosts are compared case-insensitively and without any port. The apex
/// itself and its `www` alias carry no token.
fn custom_domain_token(host: Option<&str>, base_domain: &str) -> Option<String> {
    let host = host?;
    let normalized = host.split(':').next().unwrap_or(host).to_lowercase();
    let base = base_domain.to_lowercase();

    if normalized == base || normalized == format!("www.{}", base) {
        return None;
    }

    normalized
        .strip_suffix(&format!(".{}", base))
        .filter(|token| !token.is_empty() && *token != "www")
        .map(|token| token.to_string())
}

/// Whether the request is addressed to the apex (or its `www` alias).
/// A missing host header counts as the apex.
fn is_base_host(host: Option<&str>, base_domain: &str) -> bool {
    let Some(host) = host else { return true };
    let normalized = host.split(':').next().unwrap_or(host).to_lowercase();
    let base = base_domain.to_lowercase();
    normalized == base || normalized == format!("www.{}", base)
}

fn is_public_route(path: &str, public_routes: &[String]) -> bool {
    public_routes
        .iter()
        .any(|route| matches_route(path, route))
}

/// `route` matches itself and any path nested under it, on segment
/// boundaries.
fn matches_route(path: &str, route: &str) -> bool {
    path == route
        || path
            .strip_prefix(route)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RoutingConfig {
        RoutingConfig {
            base_domain: "app.example.com".to_string(),
            public_routes: vec![
                "/site".to_string(),
                "/agency/sign-in".to_string(),
                "/agency/sign-up".to_string(),
                "/health".to_string(),
                "/ready".to_string(),
                "/metrics".to_string(),
            ],
        }
    }

    fn request<'a>(host: Option<&'a str>, path: &'a str, query: Option<&'a str>) -> RouteRequest<'a> {
        RouteRequest {
            host,
            path,
            query,
            has_session: false,
        }
    }

    #[test]
    fn tenant_subdomain_rewrites_to_token_path() {
        let action = decide_route(
            &request(Some("acme.app.example.com"), "/", None),
            &config(),
        );
        assert_eq!(action, RouteAction::Rewrite("/acme/".to_string()));
    }

    #[test]
    fn tenant_subdomain_preserves_path_and_query() {
        let action = decide_route(
            &request(Some("acme.app.example.com"), "/projects", Some("page=2")),
            &config(),
        );
        assert_eq!(
            action,
            RouteAction::Rewrite("/acme/projects?page=2".to_string())
        );
    }

    #[test]
    fn host_port_and_case_are_normalized() {
        let action = decide_route(
            &request(Some("ACME.App.Example.Com:8080"), "/", None),
            &config(),
        );
        assert_eq!(action, RouteAction::Rewrite("/acme/".to_string()));
    }

    #[test]
    fn apex_and_www_are_not_tenants() {
        let apex = decide_route(&request(Some("app.example.com"), "/", None), &config());
        assert_eq!(apex, RouteAction::Rewrite("/site".to_string()));

        let www = decide_route(&request(Some("www.app.example.com"), "/", None), &config());
        assert_eq!(www, RouteAction::Rewrite("/site".to_string()));
    }

    #[test]
    fn unrelated_host_is_not_a_tenant() {
        // /site only rewrites on the base host; on a foreign host it is
        // just a public path.
        let action = decide_route(
            &request(Some("evil.example.org"), "/site", None),
            &config(),
        );
        assert_eq!(action, RouteAction::Passthrough);

        // The root path rewrites everywhere.
        let root = decide_route(&request(Some("evil.example.org"), "/", None), &config());
        assert_eq!(root, RouteAction::Rewrite("/site".to_string()));
    }

    #[test]
    fn missing_host_behaves_like_apex() {
        let action = decide_route(&request(None, "/", None), &config());
        assert_eq!(action, RouteAction::Rewrite("/site".to_string()));
    }

    #[test]
    fn bare_auth_paths_redirect_into_the_agency_section() {
        for path in ["/sign-in", "/sign-up"] {
            let action = decide_route(&request(None, path, None), &config());
            assert_eq!(action, RouteAction::Redirect(SIGN_IN_PATH.to_string()));
        }
    }

    #[test]
    fn site_rewrite_is_exact_match_only() {
        let action = decide_route(&request(None, "/site", None), &config());
        assert_eq!(action, RouteAction::Rewrite("/site".to_string()));

        // /site/pricing is already a site path and is public.
        let nested = decide_route(&request(None, "/site/pricing", None), &config());
        assert_eq!(nested, RouteAction::Passthrough);
    }

    #[test]
    fn subdomain_auth_path_is_rewritten_not_redirected() {
        // The subdomain rule runs first.
        let action = decide_route(
            &request(Some("acme.app.example.com"), "/sign-in", None),
            &config(),
        );
        assert_eq!(action, RouteAction::Rewrite("/acme/sign-in".to_string()));
    }

    #[test]
    fn reserved_sections_pass_through_without_a_session() {
        for path in [
            "/agency",
            "/agency/sign-in",
            "/subaccount",
            "/subaccount/123",
            "/stripe/webhook",
        ] {
            let action = decide_route(&request(None, path, None), &config());
            assert_eq!(action, RouteAction::Passthrough, "path {}", path);
        }
    }

    #[test]
    fn protected_path_without_session_requires_auth_with_return_to() {
        let action = decide_route(
            &request(None, "/dashboard", Some("tab=stats")),
            &config(),
        );
        assert_eq!(
            action,
            RouteAction::RequireAuth {
                return_to: "/dashboard?tab=stats".to_string()
            }
        );
    }

    #[test]
    fn protected_path_with_session_passes_through() {
        let mut req = request(None, "/dashboard", None);
        req.has_session = true;
        assert_eq!(decide_route(&req, &config()), RouteAction::Passthrough);
    }

    #[test]
    fn public_routes_match_exactly_or_by_segment() {
        let exact = decide_route(&request(None, "/health", None), &config());
        assert_eq!(exact, RouteAction::Passthrough);

        let nested = decide_route(&request(None, "/site/about/team", None), &config());
        assert_eq!(nested, RouteAction::Passthrough);

        // Prefix without a segment boundary is not public.
        let lookalike = decide_route(&request(None, "/sitemap.xml", None), &config());
        assert!(matches!(lookalike, RouteAction::RequireAuth { .. }));
    }

    #[test]
    fn action_kinds_are_stable() {
        assert_eq!(RouteAction::Rewrite("/x".into()).kind(), "rewrite");
        assert_eq!(RouteAction::Redirect("/x".into()).kind(), "redirect");
        assert_eq!(
            RouteAction::RequireAuth {
                return_to: "/x".into()
            }
            .kind(),
            "require_auth"
        );
        assert_eq!(RouteAction::Passthrough.kind(), "passthrough");
    }

    #[test]
    fn token_extraction_edge_cases() {
        assert_eq!(
            custom_domain_token(Some("acme.app.example.com"), "app.example.com"),
            Some("acme".to_string())
        );
        assert_eq!(
            custom_domain_token(Some("deep.acme.app.example.com"), "app.example.com"),
            Some("deep.acme".to_string())
        );
        assert_eq!(
            custom_domain_token(Some("app.example.com"), "app.example.com"),
            None
        );
        assert_eq!(
            custom_domain_token(Some("www.app.example.com"), "app.example.com"),
            None
        );
        assert_eq!(custom_domain_token(None, "app.example.com"), None);
        assert_eq!(
            custom_domain_token(Some("notapp.example.com"), "app.example.com"),
            None
        );
    }
}
