//! Activity feed writer.
//!
//! Every significant action lands in the agency's notification feed as
//! `"<actor name> | <description>"`. Writes are best-effort from the caller's
//! point of view; callers log failures and move on.

use crate::identity::Identity;
use crate::models::{Membership, NewNotification, Notification, SubAccount};
use crate::services::metrics::ACTIVITY_WRITES_TOTAL;
use crate::store::{AgencyStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors from recording an activity entry.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("no actor could be resolved for the activity entry")]
    ActorNotFound,
    #[error("an agency id or sub-account id is required to record activity")]
    MissingTenantContext,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writes activity entries into the notification feed.
#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn AgencyStore>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn AgencyStore>) -> Self {
        Self { store }
    }

    /// Record an activity entry.
    ///
    /// The actor is the authenticated identity when one is given; otherwise
    /// the agency's first member (smallest user id) stands in, resolved
    /// through the sub-account's owning agency. The tenant is the explicit
    /// `agency_id` when given, else derived from the sub-account.
    #[tracing::instrument(skip(self, actor), fields(description = %description))]
    pub async fn record(
        &self,
        description: &str,
        agency_id: Option<Uuid>,
        sub_account_id: Option<Uuid>,
        actor: Option<&Identity>,
    ) -> Result<Notification, ActivityError> {
        let result = self
            .record_inner(description, agency_id, sub_account_id, actor)
            .await;

        let outcome = match &result {
            Ok(_) => "recorded",
            Err(ActivityError::ActorNotFound) | Err(ActivityError::MissingTenantContext) => {
                "skipped"
            }
            Err(ActivityError::Store(_)) => "error",
        };
        ACTIVITY_WRITES_TOTAL.with_label_values(&[outcome]).inc();

        result
    }

    async fn record_inner(
        &self,
        description: &str,
        agency_id: Option<Uuid>,
        sub_account_id: Option<Uuid>,
        actor: Option<&Identity>,
    ) -> Result<Notification, ActivityError> {
        // Fetched once, reused for both the actor fallback and the tenant
        // fallback.
        let sub_account = match sub_account_id {
            Some(id) => self.store.find_sub_account(id).await?,
            None => None,
        };

        let actor_membership = self.resolve_actor(actor, sub_account.as_ref()).await?;

        let Some(agency_id) = agency_id.or_else(|| sub_account.as_ref().map(|s| s.agency_id))
        else {
            return Err(ActivityError::MissingTenantContext);
        };

        let notification = self
            .store
            .insert_notification(NewNotification {
                message: format!("{} | {}", actor_membership.name, description),
                agency_id,
                sub_account_id: sub_account.as_ref().map(|s| s.sub_account_id),
                user_id: actor_membership.user_id,
            })
            .await?;

        tracing::debug!(
            notification_id = %notification.notification_id,
            agency_id = %notification.agency_id,
            "Activity recorded"
        );
        Ok(notification)
    }

    async fn resolve_actor(
        &self,
        actor: Option<&Identity>,
        sub_account: Option<&SubAccount>,
    ) -> Result<Membership, ActivityError> {
        if let Some(identity) = actor {
            return self
                .store
                .find_membership_by_email(&identity.email)
                .await?
                .ok_or(ActivityError::ActorNotFound);
        }

        if let Some(sub_account) = sub_account {
            return self
                .store
                .first_member_of_agency(sub_account.agency_id)
                .await?
                .ok_or(ActivityError::ActorNotFound);
        }

        Err(ActivityError::ActorNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAgency, NewMembership, NewSubAccount, Role};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        activity: ActivityLog,
        agency_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let agency = store
            .insert_agency(NewAgency {
                name: "Acme Agency".to_string(),
                company_email: "ops@acme.example".to_string(),
                goal: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        let activity = ActivityLog::new(store.clone() as Arc<dyn AgencyStore>);
        Fixture {
            store,
            activity,
            agency_id: agency.agency_id,
        }
    }

    async fn seed_member(fixture: &Fixture, user_id: &str, email: &str, name: &str) {
        fixture
            .store
            .upsert_membership(NewMembership {
                user_id: user_id.to_string(),
                email: email.to_string(),
                name: name.to_string(),
                avatar_url: String::new(),
                role: Role::AgencyAdmin,
                agency_id: fixture.agency_id,
            })
            .await
            .unwrap();
    }

    fn identity(email: &str) -> Identity {
        Identity {
            id: "user_actor".to_string(),
            email: email.to_string(),
            name: "Actor".to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn records_with_authenticated_actor() {
        let fixture = fixture().await;
        seed_member(&fixture, "user_1", "kim@acme.example", "Kim Rivera").await;

        let notification = fixture
            .activity
            .record(
                "updated agency information",
                Some(fixture.agency_id),
                None,
                Some(&identity("kim@acme.example")),
            )
            .await
            .unwrap();

        assert_eq!(notification.message, "Kim Rivera | updated agency information");
        assert_eq!(notification.agency_id, fixture.agency_id);
        assert_eq!(notification.user_id, "user_1");
        assert!(notification.sub_account_id.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_first_agency_member_via_sub_account() {
        let fixture = fixture().await;
        seed_member(&fixture, "user_b", "b@acme.example", "Blake").await;
        seed_member(&fixture, "user_a", "a@acme.example", "Avery").await;

        let sub_account = fixture
            .store
            .insert_sub_account(NewSubAccount {
                agency_id: fixture.agency_id,
                name: "Client One".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let notification = fixture
            .activity
            .record(
                "uploaded a contract",
                None,
                Some(sub_account.sub_account_id),
                None,
            )
            .await
            .unwrap();

        // Smallest user id wins the fallback; tenant comes from the
        // sub-account's owning agency.
        assert_eq!(notification.user_id, "user_a");
        assert_eq!(notification.message, "Avery | uploaded a contract");
        assert_eq!(notification.agency_id, fixture.agency_id);
        assert_eq!(notification.sub_account_id, Some(sub_account.sub_account_id));
    }

    #[tokio::test]
    async fn missing_tenant_context_is_an_error() {
        let fixture = fixture().await;
        seed_member(&fixture, "user_1", "kim@acme.example", "Kim").await;

        let err = fixture
            .activity
            .record("orphan event", None, None, Some(&identity("kim@acme.example")))
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::MissingTenantContext));
    }

    #[tokio::test]
    async fn unresolvable_actor_is_an_error() {
        let fixture = fixture().await;

        let err = fixture
            .activity
            .record(
                "ghost event",
                Some(fixture.agency_id),
                None,
                Some(&identity("nobody@acme.example")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::ActorNotFound));

        let err = fixture
            .activity
            .record("ghost event", Some(fixture.agency_id), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::ActorNotFound));
    }
}
