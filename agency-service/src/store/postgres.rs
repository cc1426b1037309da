//! Postgres-backed agency store.

use crate::models::{
    Agency, Invitation, Membership, MembershipOverview, NewAgency, NewInvitation, NewMembership,
    NewNotification, NewPermission, NewSubAccount, Notification, Permission, SubAccount,
    UpdateAgencyDetails,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::store::{AgencyStore, MembershipWrite, StoreError};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "agency-service"))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl AgencyStore for PgStore {
    #[instrument(skip(self))]
    async fn find_pending_invitation(&self, email: &str) -> Result<Option<Invitation>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_pending_invitation"])
            .start_timer();

        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT invitation_id, email, agency_id, role, status, created_utc
            FROM invitations
            WHERE email = lower($1) AND status = 'PENDING'
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to find invitation: {}", e)))?;

        timer.observe_duration();
        Ok(invitation)
    }

    #[instrument(skip(self, membership), fields(user_id = %membership.user_id, agency_id = %membership.agency_id))]
    async fn upsert_membership(
        &self,
        membership: NewMembership,
    ) -> Result<MembershipWrite, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_membership"])
            .start_timer();

        // ON CONFLICT without a target covers both unique keys (user_id and
        // email), so concurrent acceptances collapse to one row.
        let inserted = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (user_id, email, name, avatar_url, role, agency_id)
            VALUES ($1, lower($2), $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING user_id, email, name, avatar_url, role, agency_id, created_utc, updated_utc
            "#,
        )
        .bind(&membership.user_id)
        .bind(&membership.email)
        .bind(&membership.name)
        .bind(&membership.avatar_url)
        .bind(membership.role.as_str())
        .bind(membership.agency_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to insert membership: {}", e)))?;

        timer.observe_duration();

        match inserted {
            Some(row) => {
                info!(
                    user_id = %row.user_id,
                    agency_id = %row.agency_id,
                    role = %row.role,
                    "Membership created"
                );
                Ok(MembershipWrite::Inserted(row))
            }
            None => Ok(MembershipWrite::AlreadyMember),
        }
    }

    #[instrument(skip(self))]
    async fn delete_invitation(&self, email: &str) -> Result<bool, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invitation"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invitations WHERE email = lower($1)")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to delete invitation: {}", e)))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, notification), fields(agency_id = %notification.agency_id))]
    async fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_notification"])
            .start_timer();

        let notification_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (notification_id, message, agency_id, sub_account_id, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING notification_id, message, agency_id, sub_account_id, user_id, created_utc
            "#,
        )
        .bind(notification_id)
        .bind(&notification.message)
        .bind(notification.agency_id)
        .bind(notification.sub_account_id)
        .bind(&notification.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to insert notification: {}", e)))?;

        timer.observe_duration();
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn find_membership_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Membership>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_membership_by_email"])
            .start_timer();

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT user_id, email, name, avatar_url, role, agency_id, created_utc, updated_utc
            FROM memberships
            WHERE email = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to find membership: {}", e)))?;

        timer.observe_duration();
        Ok(membership)
    }

    #[instrument(skip(self))]
    async fn membership_overview(
        &self,
        email: &str,
    ) -> Result<Option<MembershipOverview>, StoreError> {
        let Some(membership) = self.find_membership_by_email(email).await? else {
            return Ok(None);
        };

        let timer = DB_QUERY_DURATION
            .with_label_values(&["membership_overview"])
            .start_timer();

        let agency = sqlx::query_as::<_, Agency>(
            r#"
            SELECT agency_id, name, company_email, company_phone, white_label, address,
                   city, zip_code, state, country, agency_logo, goal, created_utc, updated_utc
            FROM agencies
            WHERE agency_id = $1
            "#,
        )
        .bind(membership.agency_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to load agency: {}", e)))?
        .ok_or_else(|| {
            StoreError::Query(format!(
                "Membership {} references missing agency {}",
                membership.user_id, membership.agency_id
            ))
        })?;

        let sub_accounts = sqlx::query_as::<_, SubAccount>(
            r#"
            SELECT sub_account_id, agency_id, name, company_email, sub_account_logo,
                   created_utc, updated_utc
            FROM sub_accounts
            WHERE agency_id = $1
            ORDER BY created_utc ASC
            "#,
        )
        .bind(membership.agency_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to load sub-accounts: {}", e)))?;

        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT permission_id, email, sub_account_id, access
            FROM permissions
            WHERE email = lower($1)
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to load permissions: {}", e)))?;

        timer.observe_duration();

        Ok(Some(MembershipOverview {
            membership,
            agency,
            sub_accounts,
            permissions,
        }))
    }

    #[instrument(skip(self), fields(sub_account_id = %sub_account_id))]
    async fn find_sub_account(
        &self,
        sub_account_id: Uuid,
    ) -> Result<Option<SubAccount>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_sub_account"])
            .start_timer();

        let sub_account = sqlx::query_as::<_, SubAccount>(
            r#"
            SELECT sub_account_id, agency_id, name, company_email, sub_account_logo,
                   created_utc, updated_utc
            FROM sub_accounts
            WHERE sub_account_id = $1
            "#,
        )
        .bind(sub_account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to find sub-account: {}", e)))?;

        timer.observe_duration();
        Ok(sub_account)
    }

    #[instrument(skip(self), fields(agency_id = %agency_id))]
    async fn first_member_of_agency(
        &self,
        agency_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["first_member_of_agency"])
            .start_timer();

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT user_id, email, name, avatar_url, role, agency_id, created_utc, updated_utc
            FROM memberships
            WHERE agency_id = $1
            ORDER BY user_id ASC
            LIMIT 1
            "#,
        )
        .bind(agency_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to find agency member: {}", e)))?;

        timer.observe_duration();
        Ok(membership)
    }

    #[instrument(skip(self), fields(agency_id = %agency_id))]
    async fn find_agency(&self, agency_id: Uuid) -> Result<Option<Agency>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_agency"])
            .start_timer();

        let agency = sqlx::query_as::<_, Agency>(
            r#"
            SELECT agency_id, name, company_email, company_phone, white_label, address,
                   city, zip_code, state, country, agency_logo, goal, created_utc, updated_utc
            FROM agencies
            WHERE agency_id = $1
            "#,
        )
        .bind(agency_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to find agency: {}", e)))?;

        timer.observe_duration();
        Ok(agency)
    }

    #[instrument(skip(self, update), fields(agency_id = %agency_id))]
    async fn update_agency(
        &self,
        agency_id: Uuid,
        update: &UpdateAgencyDetails,
    ) -> Result<Option<Agency>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_agency"])
            .start_timer();

        let agency = sqlx::query_as::<_, Agency>(
            r#"
            UPDATE agencies SET
                name = COALESCE($2, name),
                company_email = COALESCE($3, company_email),
                company_phone = COALESCE($4, company_phone),
                white_label = COALESCE($5, white_label),
                address = COALESCE($6, address),
                city = COALESCE($7, city),
                zip_code = COALESCE($8, zip_code),
                state = COALESCE($9, state),
                country = COALESCE($10, country),
                agency_logo = COALESCE($11, agency_logo),
                goal = COALESCE($12, goal),
                updated_utc = now()
            WHERE agency_id = $1
            RETURNING agency_id, name, company_email, company_phone, white_label, address,
                      city, zip_code, state, country, agency_logo, goal, created_utc, updated_utc
            "#,
        )
        .bind(agency_id)
        .bind(&update.name)
        .bind(&update.company_email)
        .bind(&update.company_phone)
        .bind(update.white_label)
        .bind(&update.address)
        .bind(&update.city)
        .bind(&update.zip_code)
        .bind(&update.state)
        .bind(&update.country)
        .bind(&update.agency_logo)
        .bind(update.goal)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to update agency: {}", e)))?;

        timer.observe_duration();

        if let Some(ref agency) = agency {
            info!(agency_id = %agency.agency_id, "Agency details updated");
        }
        Ok(agency)
    }

    #[instrument(skip(self), fields(agency_id = %agency_id))]
    async fn list_notifications(
        &self,
        agency_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Notification>, i64), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_notifications"])
            .start_timer();

        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT notification_id, message, agency_id, sub_account_id, user_id, created_utc
            FROM notifications
            WHERE agency_id = $1
            ORDER BY created_utc DESC, notification_id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(agency_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to list notifications: {}", e)))?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE agency_id = $1",
        )
        .bind(agency_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to count notifications: {}", e)))?;

        timer.observe_duration();
        Ok((notifications, total))
    }

    #[instrument(skip(self, agency), fields(name = %agency.name))]
    async fn insert_agency(&self, agency: NewAgency) -> Result<Agency, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_agency"])
            .start_timer();

        let agency_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, Agency>(
            r#"
            INSERT INTO agencies (agency_id, name, company_email, company_phone, white_label,
                                  address, city, zip_code, state, country, agency_logo, goal)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING agency_id, name, company_email, company_phone, white_label, address,
                      city, zip_code, state, country, agency_logo, goal, created_utc, updated_utc
            "#,
        )
        .bind(agency_id)
        .bind(&agency.name)
        .bind(&agency.company_email)
        .bind(&agency.company_phone)
        .bind(agency.white_label)
        .bind(&agency.address)
        .bind(&agency.city)
        .bind(&agency.zip_code)
        .bind(&agency.state)
        .bind(&agency.country)
        .bind(&agency.agency_logo)
        .bind(agency.goal)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to insert agency: {}", e)))?;

        timer.observe_duration();

        info!(agency_id = %row.agency_id, "Agency created");
        Ok(row)
    }

    #[instrument(skip(self, sub_account), fields(agency_id = %sub_account.agency_id))]
    async fn insert_sub_account(
        &self,
        sub_account: NewSubAccount,
    ) -> Result<SubAccount, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_sub_account"])
            .start_timer();

        let sub_account_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, SubAccount>(
            r#"
            INSERT INTO sub_accounts (sub_account_id, agency_id, name, company_email, sub_account_logo)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING sub_account_id, agency_id, name, company_email, sub_account_logo,
                      created_utc, updated_utc
            "#,
        )
        .bind(sub_account_id)
        .bind(sub_account.agency_id)
        .bind(&sub_account.name)
        .bind(&sub_account.company_email)
        .bind(&sub_account.sub_account_logo)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to insert sub-account: {}", e)))?;

        timer.observe_duration();
        Ok(row)
    }

    #[instrument(skip(self, invitation), fields(agency_id = %invitation.agency_id))]
    async fn insert_invitation(
        &self,
        invitation: NewInvitation,
    ) -> Result<Invitation, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invitation"])
            .start_timer();

        let invitation_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (invitation_id, email, agency_id, role, status)
            VALUES ($1, lower($2), $3, $4, $5)
            RETURNING invitation_id, email, agency_id, role, status, created_utc
            "#,
        )
        .bind(invitation_id)
        .bind(&invitation.email)
        .bind(invitation.agency_id)
        .bind(&invitation.role)
        .bind(invitation.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict("An invitation already exists for this email".to_string())
            }
            _ => StoreError::Query(format!("Failed to insert invitation: {}", e)),
        })?;

        timer.observe_duration();
        Ok(row)
    }

    #[instrument(skip(self, permission), fields(sub_account_id = %permission.sub_account_id))]
    async fn insert_permission(
        &self,
        permission: NewPermission,
    ) -> Result<Permission, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_permission"])
            .start_timer();

        let permission_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (permission_id, email, sub_account_id, access)
            VALUES ($1, lower($2), $3, $4)
            RETURNING permission_id, email, sub_account_id, access
            "#,
        )
        .bind(permission_id)
        .bind(&permission.email)
        .bind(permission.sub_account_id)
        .bind(permission.access)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to insert permission: {}", e)))?;

        timer.observe_duration();
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}
