//! In-memory agency store for local development and tests.

use crate::models::{
    Agency, Invitation, InvitationStatus, Membership, MembershipOverview, NewAgency, NewInvitation,
    NewMembership, NewNotification, NewPermission, NewSubAccount, Notification, Permission,
    SubAccount, UpdateAgencyDetails,
};
use crate::store::{AgencyStore, MembershipWrite, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    agencies: HashMap<Uuid, Agency>,
    sub_accounts: HashMap<Uuid, SubAccount>,
    /// Keyed by user id; email uniqueness is enforced on insert.
    memberships: HashMap<String, Membership>,
    /// Keyed by lowercased email, matching the unique column.
    invitations: HashMap<String, Invitation>,
    permissions: Vec<Permission>,
    /// Insertion order; the feed reads this in reverse.
    notifications: Vec<Notification>,
}

/// Store backed by process memory. Same observable behavior as [`PgStore`],
/// minus durability.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgencyStore for MemoryStore {
    async fn find_pending_invitation(&self, email: &str) -> Result<Option<Invitation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .invitations
            .get(&email.to_lowercase())
            .filter(|invitation| invitation.is_pending())
            .cloned())
    }

    async fn upsert_membership(
        &self,
        membership: NewMembership,
    ) -> Result<MembershipWrite, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let email = membership.email.to_lowercase();

        let exists = inner.memberships.contains_key(&membership.user_id)
            || inner.memberships.values().any(|m| m.email == email);
        if exists {
            return Ok(MembershipWrite::AlreadyMember);
        }

        let now = Utc::now();
        let row = Membership {
            user_id: membership.user_id.clone(),
            email,
            name: membership.name,
            avatar_url: membership.avatar_url,
            role: membership.role.as_str().to_string(),
            agency_id: membership.agency_id,
            created_utc: now,
            updated_utc: now,
        };
        inner.memberships.insert(membership.user_id, row.clone());
        Ok(MembershipWrite::Inserted(row))
    }

    async fn delete_invitation(&self, email: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.invitations.remove(&email.to_lowercase()).is_some())
    }

    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = Notification {
            notification_id: Uuid::new_v4(),
            message: notification.message,
            agency_id: notification.agency_id,
            sub_account_id: notification.sub_account_id,
            user_id: notification.user_id,
            created_utc: Utc::now(),
        };
        inner.notifications.push(row.clone());
        Ok(row)
    }

    async fn find_membership_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Membership>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let email = email.to_lowercase();
        Ok(inner
            .memberships
            .values()
            .find(|m| m.email == email)
            .cloned())
    }

    async fn membership_overview(
        &self,
        email: &str,
    ) -> Result<Option<MembershipOverview>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let email = email.to_lowercase();

        let Some(membership) = inner.memberships.values().find(|m| m.email == email).cloned()
        else {
            return Ok(None);
        };

        let agency = inner
            .agencies
            .get(&membership.agency_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::Query(format!(
                    "Membership {} references missing agency {}",
                    membership.user_id, membership.agency_id
                ))
            })?;

        let mut sub_accounts: Vec<SubAccount> = inner
            .sub_accounts
            .values()
            .filter(|s| s.agency_id == membership.agency_id)
            .cloned()
            .collect();
        sub_accounts.sort_by_key(|s| s.created_utc);

        let permissions = inner
            .permissions
            .iter()
            .filter(|p| p.email == email)
            .cloned()
            .collect();

        Ok(Some(MembershipOverview {
            membership,
            agency,
            sub_accounts,
            permissions,
        }))
    }

    async fn find_sub_account(
        &self,
        sub_account_id: Uuid,
    ) -> Result<Option<SubAccount>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sub_accounts.get(&sub_account_id).cloned())
    }

    async fn first_member_of_agency(
        &self,
        agency_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .memberships
            .values()
            .filter(|m| m.agency_id == agency_id)
            .min_by(|a, b| a.user_id.cmp(&b.user_id))
            .cloned())
    }

    async fn find_agency(&self, agency_id: Uuid) -> Result<Option<Agency>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.agencies.get(&agency_id).cloned())
    }

    async fn update_agency(
        &self,
        agency_id: Uuid,
        update: &UpdateAgencyDetails,
    ) -> Result<Option<Agency>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(agency) = inner.agencies.get_mut(&agency_id) else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            agency.name = name.clone();
        }
        if let Some(company_email) = &update.company_email {
            agency.company_email = company_email.clone();
        }
        if let Some(company_phone) = &update.company_phone {
            agency.company_phone = company_phone.clone();
        }
        if let Some(white_label) = update.white_label {
            agency.white_label = white_label;
        }
        if let Some(address) = &update.address {
            agency.address = address.clone();
        }
        if let Some(city) = &update.city {
            agency.city = city.clone();
        }
        if let Some(zip_code) = &update.zip_code {
            agency.zip_code = zip_code.clone();
        }
        if let Some(state) = &update.state {
            agency.state = state.clone();
        }
        if let Some(country) = &update.country {
            agency.country = country.clone();
        }
        if let Some(agency_logo) = &update.agency_logo {
            agency.agency_logo = agency_logo.clone();
        }
        if let Some(goal) = update.goal {
            agency.goal = goal;
        }
        agency.updated_utc = Utc::now();

        Ok(Some(agency.clone()))
    }

    async fn list_notifications(
        &self,
        agency_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Notification>, i64), StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut feed: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.agency_id == agency_id)
            .cloned()
            .collect();
        feed.reverse();

        let total = feed.len() as i64;
        let page = feed
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert_agency(&self, agency: NewAgency) -> Result<Agency, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let row = Agency {
            agency_id: Uuid::new_v4(),
            name: agency.name,
            company_email: agency.company_email,
            company_phone: agency.company_phone,
            white_label: agency.white_label,
            address: agency.address,
            city: agency.city,
            zip_code: agency.zip_code,
            state: agency.state,
            country: agency.country,
            agency_logo: agency.agency_logo,
            goal: agency.goal,
            created_utc: now,
            updated_utc: now,
        };
        inner.agencies.insert(row.agency_id, row.clone());
        Ok(row)
    }

    async fn insert_sub_account(
        &self,
        sub_account: NewSubAccount,
    ) -> Result<SubAccount, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let row = SubAccount {
            sub_account_id: Uuid::new_v4(),
            agency_id: sub_account.agency_id,
            name: sub_account.name,
            company_email: sub_account.company_email,
            sub_account_logo: sub_account.sub_account_logo,
            created_utc: now,
            updated_utc: now,
        };
        inner.sub_accounts.insert(row.sub_account_id, row.clone());
        Ok(row)
    }

    async fn insert_invitation(
        &self,
        invitation: NewInvitation,
    ) -> Result<Invitation, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let email = invitation.email.to_lowercase();

        if inner.invitations.contains_key(&email) {
            return Err(StoreError::Conflict(
                "An invitation already exists for this email".to_string(),
            ));
        }

        let row = Invitation {
            invitation_id: Uuid::new_v4(),
            email: email.clone(),
            agency_id: invitation.agency_id,
            role: invitation.role,
            status: invitation.status.as_str().to_string(),
            created_utc: Utc::now(),
        };
        inner.invitations.insert(email, row.clone());
        Ok(row)
    }

    async fn insert_permission(
        &self,
        permission: NewPermission,
    ) -> Result<Permission, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let email = permission.email.to_lowercase();

        if inner
            .permissions
            .iter()
            .any(|p| p.email == email && p.sub_account_id == permission.sub_account_id)
        {
            return Err(StoreError::Conflict(
                "A permission already exists for this email and sub-account".to_string(),
            ));
        }

        let row = Permission {
            permission_id: Uuid::new_v4(),
            email,
            sub_account_id: permission.sub_account_id,
            access: permission.access,
        };
        inner.permissions.push(row.clone());
        Ok(row)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn new_membership(user_id: &str, email: &str, agency_id: Uuid) -> NewMembership {
        NewMembership {
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: "Member".to_string(),
            avatar_url: String::new(),
            role: Role::SubaccountUser,
            agency_id,
        }
    }

    async fn seed_agency(store: &MemoryStore) -> Agency {
        store
            .insert_agency(NewAgency {
                name: "Acme Agency".to_string(),
                company_email: "ops@acme.example".to_string(),
                goal: 5,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn membership_insert_is_conflict_tolerant() {
        let store = MemoryStore::new();
        let agency = seed_agency(&store).await;

        let first = store
            .upsert_membership(new_membership("user_1", "kim@acme.example", agency.agency_id))
            .await
            .unwrap();
        assert!(matches!(first, MembershipWrite::Inserted(_)));

        // Same user id again.
        let second = store
            .upsert_membership(new_membership("user_1", "other@acme.example", agency.agency_id))
            .await
            .unwrap();
        assert!(matches!(second, MembershipWrite::AlreadyMember));

        // Same email, different user id.
        let third = store
            .upsert_membership(new_membership("user_2", "KIM@acme.example", agency.agency_id))
            .await
            .unwrap();
        assert!(matches!(third, MembershipWrite::AlreadyMember));
    }

    #[tokio::test]
    async fn invitation_lookup_ignores_non_pending_and_normalizes_case() {
        let store = MemoryStore::new();
        let agency = seed_agency(&store).await;

        store
            .insert_invitation(NewInvitation {
                email: "Taylor@Client.Example".to_string(),
                agency_id: agency.agency_id,
                role: Role::SubaccountUser.as_str().to_string(),
                status: InvitationStatus::Revoked,
            })
            .await
            .unwrap();
        assert!(store
            .find_pending_invitation("taylor@client.example")
            .await
            .unwrap()
            .is_none());

        store.delete_invitation("taylor@client.example").await.unwrap();
        store
            .insert_invitation(NewInvitation::pending(
                "Taylor@Client.Example",
                agency.agency_id,
                Role::AgencyAdmin.as_str(),
            ))
            .await
            .unwrap();

        let found = store
            .find_pending_invitation("TAYLOR@client.example")
            .await
            .unwrap()
            .expect("pending invitation");
        assert_eq!(found.email, "taylor@client.example");
    }

    #[tokio::test]
    async fn delete_invitation_reports_whether_a_row_existed() {
        let store = MemoryStore::new();
        let agency = seed_agency(&store).await;
        store
            .insert_invitation(NewInvitation::pending(
                "lee@client.example",
                agency.agency_id,
                "",
            ))
            .await
            .unwrap();

        assert!(store.delete_invitation("lee@client.example").await.unwrap());
        assert!(!store.delete_invitation("lee@client.example").await.unwrap());
    }

    #[tokio::test]
    async fn notification_feed_is_newest_first_with_total() {
        let store = MemoryStore::new();
        let agency = seed_agency(&store).await;

        for i in 0..3 {
            store
                .insert_notification(NewNotification {
                    message: format!("event {}", i),
                    agency_id: agency.agency_id,
                    sub_account_id: None,
                    user_id: "user_1".to_string(),
                })
                .await
                .unwrap();
        }

        let (page, total) = store
            .list_notifications(agency.agency_id, 2, 0)
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].message, "event 2");
        assert_eq!(page[1].message, "event 1");

        let (rest, _) = store
            .list_notifications(agency.agency_id, 2, 2)
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].message, "event 0");
    }

    #[tokio::test]
    async fn update_agency_applies_only_present_fields() {
        let store = MemoryStore::new();
        let agency = seed_agency(&store).await;

        let updated = store
            .update_agency(
                agency.agency_id,
                &UpdateAgencyDetails {
                    name: Some("Acme Rebranded".to_string()),
                    goal: Some(12),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("agency exists");

        assert_eq!(updated.name, "Acme Rebranded");
        assert_eq!(updated.goal, 12);
        assert_eq!(updated.company_email, "ops@acme.example");

        let missing = store
            .update_agency(Uuid::new_v4(), &UpdateAgencyDetails::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn first_member_is_smallest_user_id() {
        let store = MemoryStore::new();
        let agency = seed_agency(&store).await;

        store
            .upsert_membership(new_membership("user_b", "b@acme.example", agency.agency_id))
            .await
            .unwrap();
        store
            .upsert_membership(new_membership("user_a", "a@acme.example", agency.agency_id))
            .await
            .unwrap();

        let first = store
            .first_member_of_agency(agency.agency_id)
            .await
            .unwrap()
            .expect("members exist");
        assert_eq!(first.user_id, "user_a");
    }
}
