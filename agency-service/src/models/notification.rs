//! Notification model - the per-agency activity feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Notification entity. One row per recorded activity, scoped to an agency
/// and optionally to a sub-account.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub message: String,
    pub agency_id: Uuid,
    pub sub_account_id: Option<Uuid>,
    pub user_id: String,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub message: String,
    pub agency_id: Uuid,
    pub sub_account_id: Option<Uuid>,
    pub user_id: String,
}

/// Paged notification feed, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
