//! Agency section handlers: the entry decision, detail updates, and the
//! notification feed.

use crate::handlers::pages;
use crate::identity::{Identity, SessionCredentials};
use crate::models::{Agency, NotificationFeed, Role, UpdateAgencyDetails};
use crate::routing::SIGN_IN_PATH;
use crate::services::ResolveError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_FEED_LIMIT: i64 = 50;
const MAX_FEED_LIMIT: i64 = 100;

// ============================================================================
// Entry decision
// ============================================================================

/// Query parameters carried into `/agency` by sign-up and billing flows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryQuery {
    /// Plan preselected during sign-up; forwards into billing.
    pub plan: Option<String>,
    /// Deep-link of the form `<path>___<agency_id>`.
    pub state: Option<String>,
    /// Opaque code forwarded together with `state`.
    pub code: Option<String>,
}

/// Where the `/agency` entry page sends an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgencyEntry {
    Redirect(String),
    Onboarding,
    NotAuthorized,
}

/// Pure entry decision for `/agency`.
///
/// `agency_id` is the resolver's answer, `role` the stored membership role.
/// Sub-account level members never see the agency dashboard; agency level
/// members are forwarded according to the query parameters.
pub fn decide_agency_entry(
    agency_id: Option<Uuid>,
    role: Option<Role>,
    query: &EntryQuery,
) -> AgencyEntry {
    let Some(agency_id) = agency_id else {
        return AgencyEntry::Onboarding;
    };

    match role {
        Some(Role::SubaccountUser) | Some(Role::SubaccountGuest) => {
            AgencyEntry::Redirect("/subaccount".to_string())
        }
        Some(Role::AgencyOwner) | Some(Role::AgencyAdmin) => {
            if let Some(plan) = query.plan.as_deref() {
                return AgencyEntry::Redirect(format!(
                    "/agency/{}/billing?plan={}",
                    agency_id,
                    urlencoding::encode(plan)
                ));
            }

            if let Some(state) = query.state.as_deref() {
                let Some((state_path, state_agency_id)) = state.split_once("___") else {
                    return AgencyEntry::NotAuthorized;
                };
                let Ok(state_agency_id) = state_agency_id.parse::<Uuid>() else {
                    return AgencyEntry::NotAuthorized;
                };

                let mut location = format!("/agency/{}/{}", state_agency_id, state_path);
                if let Some(code) = query.code.as_deref() {
                    location.push_str("?code=");
                    location.push_str(&urlencoding::encode(code));
                }
                return AgencyEntry::Redirect(location);
            }

            AgencyEntry::Redirect(format!("/agency/{}", agency_id))
        }
        // A resolved agency with no parseable role is an integrity gap;
        // refuse rather than guess.
        _ => AgencyEntry::NotAuthorized,
    }
}

/// `GET /agency` - resolve membership (consuming a pending invitation) and
/// forward the user to the right place.
#[tracing::instrument(skip(state, headers, query))]
pub async fn agency_entry(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let credentials =
        SessionCredentials::from_headers(&headers, &state.config.identity.session_cookie);

    let identity = match state.resolver.authenticate(&credentials).await {
        Ok(identity) => identity,
        Err(ResolveError::Unauthenticated) => {
            return Ok(Redirect::temporary(SIGN_IN_PATH).into_response());
        }
        Err(err) => return Err(err.into()),
    };

    let agency_id = state.resolver.resolve_for_identity(&identity).await?;

    let role = match agency_id {
        Some(_) => state
            .store
            .find_membership_by_email(&identity.email)
            .await?
            .and_then(|membership| membership.parsed_role()),
        None => None,
    };

    match decide_agency_entry(agency_id, role, &query) {
        AgencyEntry::Redirect(location) => Ok(Redirect::temporary(&location).into_response()),
        AgencyEntry::Onboarding => {
            Ok(Html(pages::onboarding_page(&identity.email)).into_response())
        }
        AgencyEntry::NotAuthorized => {
            tracing::warn!(
                user_id = %identity.id,
                agency_id = ?agency_id,
                "Resolved agency without a usable role"
            );
            Ok(pages::not_authorized().into_response())
        }
    }
}

// ============================================================================
// Agency resources
// ============================================================================

/// `GET /agency/:agency_id` - dashboard page for members of the agency.
#[tracing::instrument(skip(state, headers), fields(agency_id = %agency_id))]
pub async fn agency_dashboard(
    State(state): State<AppState>,
    Path(agency_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let credentials =
        SessionCredentials::from_headers(&headers, &state.config.identity.session_cookie);

    let identity = match state.resolver.authenticate(&credentials).await {
        Ok(identity) => identity,
        Err(ResolveError::Unauthenticated) => {
            return Ok(Redirect::temporary(SIGN_IN_PATH).into_response());
        }
        Err(err) => return Err(err.into()),
    };

    let overview = state.store.membership_overview(&identity.email).await?;
    match overview {
        Some(overview) if overview.agency.agency_id == agency_id => {
            Ok(Html(pages::dashboard_page(&overview)).into_response())
        }
        _ => Ok(pages::not_authorized().into_response()),
    }
}

/// `PATCH /agency/:agency_id` - partial update of agency details.
#[tracing::instrument(skip(state, headers, update), fields(agency_id = %agency_id))]
pub async fn update_agency(
    State(state): State<AppState>,
    Path(agency_id): Path<Uuid>,
    headers: HeaderMap,
    Json(update): Json<UpdateAgencyDetails>,
) -> Result<Json<Agency>, AppError> {
    let identity = authorize_member(&state, &headers, agency_id).await?;

    update.validate()?;

    let agency = state
        .store
        .update_agency(agency_id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Agency {} not found", agency_id)))?;

    // Best-effort feed entry; the update has already committed.
    if let Err(e) = state
        .activity
        .record(
            "updated agency information",
            Some(agency_id),
            None,
            Some(&identity),
        )
        .await
    {
        tracing::warn!(
            error = %e,
            agency_id = %agency_id,
            "Activity entry for agency update was not recorded"
        );
    }

    Ok(Json(agency))
}

#[derive(Debug, Deserialize)]
pub struct NotificationFeedQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /agency/:agency_id/notifications` - paged activity feed, newest
/// first.
#[tracing::instrument(skip(state, headers, query), fields(agency_id = %agency_id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(agency_id): Path<Uuid>,
    Query(query): Query<NotificationFeedQuery>,
    headers: HeaderMap,
) -> Result<Json<NotificationFeed>, AppError> {
    authorize_member(&state, &headers, agency_id).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_FEED_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let (notifications, total) = state
        .store
        .list_notifications(agency_id, limit, offset)
        .await?;

    Ok(Json(NotificationFeed {
        notifications,
        total,
        limit,
        offset,
    }))
}

/// Authenticate the caller and require a membership in the given agency.
async fn authorize_member(
    state: &AppState,
    headers: &HeaderMap,
    agency_id: Uuid,
) -> Result<Identity, AppError> {
    let credentials =
        SessionCredentials::from_headers(headers, &state.config.identity.session_cookie);
    let identity = state
        .resolver
        .authenticate(&credentials)
        .await
        .map_err(AppError::from)?;

    let membership = state.store.find_membership_by_email(&identity.email).await?;
    match membership {
        Some(membership) if membership.agency_id == agency_id => Ok(identity),
        _ => Err(AppError::Forbidden(anyhow::anyhow!(
            "Not a member of agency {}",
            agency_id
        ))),
    }
}
