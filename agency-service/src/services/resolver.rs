//! Membership resolution: the invitation acceptance flow.
//!
//! `resolve_membership` is the one entry point the agency pages go through
//! to answer "which agency does this user belong to". A pending invitation
//! for the user's email is consumed on the way: membership row, activity
//! entry, role metadata push, invitation delete. Retries converge because
//! every step is either idempotent or conflict-tolerant.

use crate::identity::{Identity, IdentityError, IdentityProvider, SessionCredentials};
use crate::models::{Invitation, NewMembership, Role};
use crate::services::activity::ActivityLog;
use crate::services::metrics::INVITATIONS_ACCEPTED_TOTAL;
use crate::store::{AgencyStore, MembershipWrite, StoreError};
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Feed message written when an invitation is accepted.
const ACCEPTED_INVITATION_MESSAGE: &str =
    "You have accepted the invitation to join the agency.";

/// Role granted when an invitation does not name one.
const DEFAULT_INVITATION_ROLE: Role = Role::SubaccountUser;

/// Errors from membership resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no authenticated identity")]
    Unauthenticated,
    #[error("invitation carries unknown role '{role}'")]
    InvalidRole { role: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("identity provider error: {0}")]
    Identity(#[from] IdentityError),
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Unauthenticated => {
                AppError::Unauthorized(anyhow::anyhow!("No authenticated identity"))
            }
            ResolveError::InvalidRole { role } => {
                AppError::Unprocessable(anyhow::anyhow!("Invitation carries unknown role '{}'", role))
            }
            ResolveError::Store(store_err) => store_err.into(),
            ResolveError::Identity(identity_err) => AppError::BadGateway(identity_err.to_string()),
        }
    }
}

/// Resolves users to their agency, consuming pending invitations.
#[derive(Clone)]
pub struct MembershipService {
    store: Arc<dyn AgencyStore>,
    identity_provider: Arc<dyn IdentityProvider>,
    activity: ActivityLog,
}

impl MembershipService {
    pub fn new(
        store: Arc<dyn AgencyStore>,
        identity_provider: Arc<dyn IdentityProvider>,
        activity: ActivityLog,
    ) -> Self {
        Self {
            store,
            identity_provider,
            activity,
        }
    }

    /// Resolve the session behind `credentials` to an identity.
    pub async fn authenticate(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Identity, ResolveError> {
        self.identity_provider
            .current_identity(credentials)
            .await?
            .ok_or(ResolveError::Unauthenticated)
    }

    /// Resolve the caller's agency, accepting a pending invitation if one
    /// exists. `Ok(None)` means authenticated but not a member anywhere.
    pub async fn resolve_membership(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Option<Uuid>, ResolveError> {
        let identity = self.authenticate(credentials).await?;
        self.resolve_for_identity(&identity).await
    }

    /// Same as [`resolve_membership`](Self::resolve_membership) for an
    /// already-authenticated identity.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.id))]
    pub async fn resolve_for_identity(
        &self,
        identity: &Identity,
    ) -> Result<Option<Uuid>, ResolveError> {
        match self.store.find_pending_invitation(&identity.email).await? {
            Some(invitation) => self.accept_invitation(identity, invitation).await.map(Some),
            None => {
                let membership = self.store.find_membership_by_email(&identity.email).await?;
                Ok(membership.map(|m| m.agency_id))
            }
        }
    }

    /// Consume a pending invitation for this identity.
    ///
    /// Step order matters for crash recovery: the membership row lands
    /// before the invitation is deleted, so a failure in between leaves a
    /// retryable state rather than a stranded user.
    async fn accept_invitation(
        &self,
        identity: &Identity,
        invitation: Invitation,
    ) -> Result<Uuid, ResolveError> {
        let role = if invitation.role.is_empty() {
            DEFAULT_INVITATION_ROLE
        } else {
            Role::parse(&invitation.role).ok_or_else(|| ResolveError::InvalidRole {
                role: invitation.role.clone(),
            })?
        };

        if role == Role::AgencyOwner {
            // Owner memberships are provisioned at agency creation; the
            // invitation only confirms them.
            tracing::info!(
                agency_id = %invitation.agency_id,
                "Owner invitation accepted without membership insert"
            );
        } else {
            let write = self
                .store
                .upsert_membership(NewMembership {
                    user_id: identity.id.clone(),
                    email: invitation.email.clone(),
                    name: identity.name.clone(),
                    avatar_url: identity.avatar_url.clone().unwrap_or_default(),
                    role,
                    agency_id: invitation.agency_id,
                })
                .await?;

            match write {
                MembershipWrite::Inserted(membership) => {
                    tracing::info!(
                        user_id = %membership.user_id,
                        agency_id = %membership.agency_id,
                        role = %membership.role,
                        "Invitation accepted, membership created"
                    );
                }
                MembershipWrite::AlreadyMember => {
                    tracing::debug!(
                        agency_id = %invitation.agency_id,
                        "Membership already present, treating acceptance as a retry"
                    );
                }
            }
        }

        // Best-effort: a missing feed entry never blocks the acceptance.
        if let Err(e) = self
            .activity
            .record(
                ACCEPTED_INVITATION_MESSAGE,
                Some(invitation.agency_id),
                None,
                Some(identity),
            )
            .await
        {
            tracing::warn!(
                error = %e,
                agency_id = %invitation.agency_id,
                "Activity entry for invitation acceptance was not recorded"
            );
        }

        // A failed push leaves the invitation pending; the next resolve
        // retries the whole acceptance.
        self.identity_provider
            .update_role_metadata(&identity.id, role)
            .await?;

        let deleted = self.store.delete_invitation(&invitation.email).await?;
        if !deleted {
            tracing::debug!(
                agency_id = %invitation.agency_id,
                "Invitation already deleted by a concurrent acceptance"
            );
        }

        INVITATIONS_ACCEPTED_TOTAL
            .with_label_values(&[role.as_str()])
            .inc();

        Ok(invitation.agency_id)
    }
}
