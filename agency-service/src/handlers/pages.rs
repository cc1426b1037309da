//! Server-rendered page stubs.
//!
//! The full product front-end lives in a separate application; these pages
//! render just enough HTML for the routing and entry flows to be exercised
//! end to end, with every dynamic value escaped.

use crate::models::MembershipOverview;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::Html;
use serde::Deserialize;
use uuid::Uuid;

/// Marketing site landing page, served for the apex domain.
pub async fn site_home() -> Html<String> {
    Html(page(
        "Welcome",
        "<h1>Grow your agency</h1><p>Run every client from a single workspace.</p>".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SignInQuery {
    pub return_to: Option<String>,
}

pub async fn sign_in_page(Query(query): Query<SignInQuery>) -> Html<String> {
    let return_to_field = query
        .return_to
        .as_deref()
        .map(|target| {
            format!(
                r#"<input type="hidden" name="return_to" value="{}">"#,
                escape_html(target)
            )
        })
        .unwrap_or_default();

    Html(page(
        "Sign in",
        format!(
            "<h1>Sign in to your agency</h1><form method=\"post\">{}<button>Continue</button></form>",
            return_to_field
        ),
    ))
}

pub async fn sign_up_page() -> Html<String> {
    Html(page(
        "Sign up",
        "<h1>Create your account</h1><form method=\"post\"><button>Continue</button></form>"
            .to_string(),
    ))
}

/// Deeper marketing pages, e.g. `/site/pricing`.
pub async fn site_section(Path(section): Path<String>) -> Html<String> {
    let section = escape_html(&section);
    Html(page(
        &section,
        format!("<h1>Grow your agency</h1><p>Section: {}</p>", section),
    ))
}

/// Landing page for sub-account level members.
pub async fn subaccount_home() -> Html<String> {
    Html(page(
        "Sub-accounts",
        "<h1>Sub-account workspace</h1><p>Pick a client to get started.</p>".to_string(),
    ))
}

/// Tenant site root, reached through the subdomain rewrite.
pub async fn tenant_site(Path(token): Path<String>) -> Html<String> {
    let token = escape_html(&token);
    Html(page(
        &token,
        format!("<h1>{}</h1><p>Tenant workspace</p>", token),
    ))
}

/// Any deeper tenant page.
pub async fn tenant_site_section(Path((token, section)): Path<(String, String)>) -> Html<String> {
    let token = escape_html(&token);
    let section = escape_html(&section);
    Html(page(
        &token,
        format!(
            "<h1>{}</h1><p>Tenant workspace</p><p>Section: {}</p>",
            token, section
        ),
    ))
}

/// Agency sections the dashboard links out to, e.g. settings or billing.
/// Rendered as placeholders; the data-bearing views live in the dedicated
/// handlers.
pub async fn agency_section(Path((agency_id, section)): Path<(Uuid, String)>) -> Html<String> {
    let section = escape_html(&section);
    Html(page(
        &section,
        format!(
            "<h1>Agency {}</h1><p>Section: {}</p>",
            agency_id, section
        ),
    ))
}

/// Onboarding page for authenticated users without an agency.
pub fn onboarding_page(email: &str) -> String {
    page(
        "Create your agency",
        format!(
            concat!(
                "<h1>Create your agency</h1>",
                "<form method=\"post\" action=\"/agency\">",
                "<label>Company email <input type=\"email\" name=\"company_email\" value=\"{}\"></label>",
                "<label>Agency name <input type=\"text\" name=\"name\"></label>",
                "<button>Create</button>",
                "</form>"
            ),
            escape_html(email)
        ),
    )
}

/// Dashboard for a member of the agency.
pub fn dashboard_page(overview: &MembershipOverview) -> String {
    page(
        &overview.agency.name,
        format!(
            "<h1>{}</h1><p>Dashboard</p><p>{} sub-accounts</p>",
            escape_html(&overview.agency.name),
            overview.sub_accounts.len()
        ),
    )
}

pub fn not_authorized() -> (StatusCode, Html<String>) {
    (
        StatusCode::FORBIDDEN,
        Html(page(
            "Not authorized",
            "<h1>Not authorized</h1><p>You do not have access to this agency.</p>".to_string(),
        )),
    )
}

fn page(title: &str, body: String) -> String {
    format!(
        concat!(
            "<!doctype html><html lang=\"en\"><head>",
            "<meta charset=\"utf-8\"><title>{}</title>",
            "</head><body>{}</body></html>"
        ),
        escape_html(title),
        body
    )
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
