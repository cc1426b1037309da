//! Invitation model - pending offers to join an agency under a role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invitation lifecycle states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Revoked => "REVOKED",
        }
    }
}

/// Invitation entity. `role` is stored as text; an empty string means the
/// inviter left it unset and the default member role applies on acceptance.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub email: String,
    pub agency_id: Uuid,
    pub role: String,
    pub status: String,
    pub created_utc: DateTime<Utc>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending.as_str()
    }
}

/// Input for creating an invitation.
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub email: String,
    pub agency_id: Uuid,
    pub role: String,
    pub status: InvitationStatus,
}

impl NewInvitation {
    /// Pending invitation with the given role string.
    pub fn pending(email: impl Into<String>, agency_id: Uuid, role: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            agency_id,
            role: role.into(),
            status: InvitationStatus::Pending,
        }
    }
}
