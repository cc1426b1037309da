//! Membership and role models.

use crate::models::{Agency, SubAccount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role a member holds within an agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    AgencyOwner,
    AgencyAdmin,
    SubaccountUser,
    SubaccountGuest,
}

impl Role {
    /// Get string representation for database and identity metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AgencyOwner => "AGENCY_OWNER",
            Role::AgencyAdmin => "AGENCY_ADMIN",
            Role::SubaccountUser => "SUBACCOUNT_USER",
            Role::SubaccountGuest => "SUBACCOUNT_GUEST",
        }
    }

    /// Parse a stored role string. Returns `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "AGENCY_OWNER" => Some(Role::AgencyOwner),
            "AGENCY_ADMIN" => Some(Role::AgencyAdmin),
            "SUBACCOUNT_USER" => Some(Role::SubaccountUser),
            "SUBACCOUNT_GUEST" => Some(Role::SubaccountGuest),
            _ => None,
        }
    }

    /// Whether this role operates at the agency level rather than inside a
    /// single sub-account.
    pub fn is_agency_level(&self) -> bool {
        matches!(self, Role::AgencyOwner | Role::AgencyAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership entity. Links an identity-provider user to an agency.
///
/// `user_id` is the external identity id; `email` is the join key used by
/// invitations and permissions.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
    pub role: String,
    pub agency_id: Uuid,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Membership {
    /// Get parsed role. `None` means the stored value is out of vocabulary.
    pub fn parsed_role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

/// Input for creating a membership.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
    pub role: Role,
    pub agency_id: Uuid,
}

/// Per-sub-account access grant for a member, keyed by email.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Permission {
    pub permission_id: Uuid,
    pub email: String,
    pub sub_account_id: Uuid,
    pub access: bool,
}

/// Input for granting sub-account access.
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub email: String,
    pub sub_account_id: Uuid,
    pub access: bool,
}

/// A member together with the agency context the entry page needs: the
/// agency record, its sub-accounts, and the member's access grants.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipOverview {
    pub membership: Membership,
    pub agency: Agency,
    pub sub_accounts: Vec<SubAccount>,
    pub permissions: Vec<Permission>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        for role in [
            Role::AgencyOwner,
            Role::AgencyAdmin,
            Role::SubaccountUser,
            Role::SubaccountGuest,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn unknown_role_does_not_parse() {
        assert_eq!(Role::parse("SUPERADMIN"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("agency_owner"), None);
    }

    #[test]
    fn agency_level_split() {
        assert!(Role::AgencyOwner.is_agency_level());
        assert!(Role::AgencyAdmin.is_agency_level());
        assert!(!Role::SubaccountUser.is_agency_level());
        assert!(!Role::SubaccountGuest.is_agency_level());
    }
}
