use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use workhub_auth::StoreError;
use workhub_core::{CompanyId, UserId};

use super::{decode_error, map_sqlx_error};
use crate::membership::{MembershipLink, MembershipStore};

/// Membership links backed by the `company_users` table.
///
/// The `(company_id, user_id)` unique constraint makes concurrent duplicate
/// inserts fail with `23505`, which surfaces as [`StoreError::UniqueViolation`].
/// `seq` preserves insertion order.
#[derive(Debug, Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    #[instrument(skip(self), fields(company_id = %company_id, user_id = %user_id), err)]
    async fn insert(&self, company_id: CompanyId, user_id: UserId) -> Result<MembershipLink, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO company_users (company_id, user_id)
            VALUES ($1, $2)
            RETURNING created_at
            "#,
        )
        .bind(company_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_membership", e))?;

        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| decode_error("insert_membership", e))?;
        Ok(MembershipLink {
            company_id,
            user_id,
            created_at,
        })
    }

    async fn exists(&self, company_id: CompanyId, user_id: UserId) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM company_users WHERE company_id = $1 AND user_id = $2) AS present",
        )
        .bind(company_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("membership_exists", e))?;
        row.try_get("present").map_err(|e| decode_error("membership_exists", e))
    }

    async fn user_ids(&self, company_id: CompanyId) -> Result<Vec<UserId>, StoreError> {
        let rows = sqlx::query("SELECT user_id FROM company_users WHERE company_id = $1 ORDER BY seq ASC")
            .bind(company_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("membership_user_ids", e))?;
        rows.iter()
            .map(|r| {
                r.try_get::<Uuid, _>("user_id")
                    .map(UserId::from_uuid)
                    .map_err(|e| decode_error("membership_user_ids", e))
            })
            .collect()
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn delete_by_company(&self, company_id: CompanyId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM company_users WHERE company_id = $1")
            .bind(company_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_memberships_by_company", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn delete_by_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM company_users WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_memberships_by_user", e))?;
        Ok(result.rows_affected())
    }
}
