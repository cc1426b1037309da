//! Agency and sub-account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Agency entity. The tenant root that memberships and sub-accounts hang off.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Agency {
    pub agency_id: Uuid,
    pub name: String,
    pub company_email: String,
    pub company_phone: String,
    pub white_label: bool,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub state: String,
    pub country: String,
    pub agency_logo: String,
    pub goal: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating an agency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAgency {
    pub name: String,
    pub company_email: String,
    pub company_phone: String,
    pub white_label: bool,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub state: String,
    pub country: String,
    pub agency_logo: String,
    pub goal: i32,
}

/// Partial update for agency details. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAgencyDetails {
    #[validate(length(min = 2, max = 255, message = "Agency name must be 2-255 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Company email must be a valid email address"))]
    pub company_email: Option<String>,
    #[validate(length(max = 64, message = "Company phone must be at most 64 characters"))]
    pub company_phone: Option<String>,
    pub white_label: Option<bool>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 128))]
    pub city: Option<String>,
    #[validate(length(max = 32))]
    pub zip_code: Option<String>,
    #[validate(length(max = 128))]
    pub state: Option<String>,
    #[validate(length(max = 128))]
    pub country: Option<String>,
    #[validate(url(message = "Agency logo must be a valid URL"))]
    pub agency_logo: Option<String>,
    #[validate(range(min = 1, message = "Goal must be at least 1"))]
    pub goal: Option<i32>,
}

/// Sub-account entity. A client workspace owned by an agency.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubAccount {
    pub sub_account_id: Uuid,
    pub agency_id: Uuid,
    pub name: String,
    pub company_email: String,
    pub sub_account_logo: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a sub-account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubAccount {
    pub agency_id: Uuid,
    pub name: String,
    pub company_email: String,
    pub sub_account_logo: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_with_valid_fields_passes_validation() {
        let update = UpdateAgencyDetails {
            name: Some("Northwind Digital".to_string()),
            company_email: Some("hello@northwind.example".to_string()),
            goal: Some(10),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn update_rejects_bad_email_and_goal() {
        let update = UpdateAgencyDetails {
            company_email: Some("not-an-email".to_string()),
            goal: Some(0),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("company_email"));
        assert!(errors.field_errors().contains_key("goal"));
    }

    #[test]
    fn empty_update_is_valid() {
        assert!(UpdateAgencyDetails::default().validate().is_ok());
    }
}
