//! Persistence boundary for agency data.
//!
//! Handlers and services depend on [`AgencyStore`] rather than a concrete
//! database so the whole stack can run against Postgres in deployment and
//! against the in-memory store in tests and local development.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{
    Agency, Invitation, Membership, MembershipOverview, NewAgency, NewInvitation, NewMembership,
    NewNotification, NewPermission, NewSubAccount, Notification, Permission, SubAccount,
    UpdateAgencyDetails,
};
use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the persistence boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("query failed: {0}")]
    Query(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            StoreError::Unavailable(msg) | StoreError::Query(msg) => {
                AppError::DatabaseError(anyhow::anyhow!(msg))
            }
        }
    }
}

/// Outcome of a conflict-tolerant membership insert.
#[derive(Debug, Clone)]
pub enum MembershipWrite {
    /// A new membership row was created.
    Inserted(Membership),
    /// A row with the same user id or email already existed; nothing changed.
    AlreadyMember,
}

/// Store operations for agencies, memberships, invitations, and the
/// notification feed.
///
/// Emails are normalized to lowercase at this boundary, on writes and on
/// lookups, so callers never have to care about casing.
#[async_trait]
pub trait AgencyStore: Send + Sync {
    /// Find the pending invitation addressed to the given email, if any.
    /// Non-pending invitations are invisible here.
    async fn find_pending_invitation(&self, email: &str) -> Result<Option<Invitation>, StoreError>;

    /// Insert a membership unless one already exists for the same user id or
    /// email. Never updates an existing row.
    async fn upsert_membership(
        &self,
        membership: NewMembership,
    ) -> Result<MembershipWrite, StoreError>;

    /// Delete the invitation addressed to the given email. Returns `false`
    /// when no row existed, which callers treat as an already-done delete.
    async fn delete_invitation(&self, email: &str) -> Result<bool, StoreError>;

    /// Append a notification to the agency's activity feed.
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError>;

    async fn find_membership_by_email(&self, email: &str)
        -> Result<Option<Membership>, StoreError>;

    /// Membership plus the agency context the entry page needs.
    async fn membership_overview(
        &self,
        email: &str,
    ) -> Result<Option<MembershipOverview>, StoreError>;

    async fn find_sub_account(&self, sub_account_id: Uuid)
        -> Result<Option<SubAccount>, StoreError>;

    /// Deterministic fallback actor for activity entries: the agency member
    /// with the smallest user id.
    async fn first_member_of_agency(
        &self,
        agency_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;

    async fn find_agency(&self, agency_id: Uuid) -> Result<Option<Agency>, StoreError>;

    /// Apply a partial update to an agency. Returns `None` when the agency
    /// does not exist.
    async fn update_agency(
        &self,
        agency_id: Uuid,
        update: &UpdateAgencyDetails,
    ) -> Result<Option<Agency>, StoreError>;

    /// Page of the agency's notification feed, newest first, plus the total
    /// row count.
    async fn list_notifications(
        &self,
        agency_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Notification>, i64), StoreError>;

    async fn insert_agency(&self, agency: NewAgency) -> Result<Agency, StoreError>;

    async fn insert_sub_account(
        &self,
        sub_account: NewSubAccount,
    ) -> Result<SubAccount, StoreError>;

    /// Create an invitation. Fails with [`StoreError::Conflict`] when one
    /// already exists for the email.
    async fn insert_invitation(&self, invitation: NewInvitation)
        -> Result<Invitation, StoreError>;

    async fn insert_permission(&self, permission: NewPermission)
        -> Result<Permission, StoreError>;

    /// Cheap connectivity probe for health endpoints.
    async fn health_check(&self) -> Result<(), StoreError>;
}
