use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use workhub_auth::{CredentialRecord, NewPrincipal, Principal, PrincipalStore, Role, StoreError};
use workhub_core::{CompanyId, UserId};

use super::{decode_error, map_sqlx_error};
use crate::principals::{PrincipalAdmin, PrincipalUpdate};

const COLUMNS: &str = "id, email, full_name, password_hash, role, company_id, is_active, created_at";

/// Principals backed by the `users` table.
#[derive(Debug, Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_credential(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.map(|r| credential_from_row(operation, &r)).transpose()
    }
}

fn credential_from_row(operation: &str, row: &sqlx::postgres::PgRow) -> Result<CredentialRecord, StoreError> {
    let decode = |e: sqlx::Error| decode_error(operation, e);

    let role: String = row.try_get("role").map_err(decode)?;
    let role: Role = role.parse().map_err(|e| decode_error(operation, e))?;
    let company_id: Option<Uuid> = row.try_get("company_id").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

    Ok(CredentialRecord {
        principal: Principal {
            id: UserId::from_uuid(row.try_get("id").map_err(decode)?),
            identity: row.try_get("email").map_err(decode)?,
            full_name: row.try_get("full_name").map_err(decode)?,
            role,
            company_id: company_id.map(CompanyId::from_uuid),
            active: row.try_get("is_active").map_err(decode)?,
            created_at,
        },
        secret_hash: row.try_get("password_hash").map_err(decode)?,
    })
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    #[instrument(skip(self), err)]
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self.find_credential(identity).await?.map(|r| r.principal))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        let query = sqlx::query(&sql).bind(id.as_uuid());
        Ok(self
            .fetch_credential("find_by_id", query)
            .await?
            .map(|r| r.principal))
    }

    #[instrument(skip(self), err)]
    async fn find_credential(&self, identity: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        let query = sqlx::query(&sql).bind(identity);
        self.fetch_credential("find_credential", query).await
    }

    #[instrument(skip(self), err)]
    async fn exists_by_identity(&self, identity: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1) AS present")
            .bind(identity)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_by_identity", e))?;
        row.try_get("present")
            .map_err(|e| decode_error("exists_by_identity", e))
    }

    #[instrument(skip(self, new), fields(identity = %new.identity, role = %new.role), err)]
    async fn insert(&self, new: NewPrincipal) -> Result<Principal, StoreError> {
        let id = UserId::new();
        let sql = format!(
            "INSERT INTO users (id, email, full_name, password_hash, role, company_id, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(&new.identity)
            .bind(&new.full_name)
            .bind(&new.secret_hash)
            .bind(new.role.as_str())
            .bind(new.company_id.map(Uuid::from))
            .bind(new.active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_principal", e))?;
        Ok(credential_from_row("insert_principal", &row)?.principal)
    }
}

#[async_trait]
impl PrincipalAdmin for PgPrincipalStore {
    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM users ORDER BY created_at ASC, id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_principals", e))?;
        rows.iter()
            .map(|r| credential_from_row("list_principals", r).map(|c| c.principal))
            .collect()
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn detach_company(&self, company_id: CompanyId) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE users SET company_id = NULL WHERE company_id = $1")
            .bind(company_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("detach_company", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, changes), fields(user_id = %id), err)]
    async fn update(&self, id: UserId, changes: PrincipalUpdate) -> Result<Option<Principal>, StoreError> {
        let sql = format!(
            "UPDATE users SET \
                full_name = COALESCE($2, full_name), \
                role = COALESCE($3, role), \
                is_active = COALESCE($4, is_active), \
                company_id = CASE WHEN $5 THEN $6 ELSE company_id END, \
                password_hash = COALESCE($7, password_hash), \
                email = COALESCE($8, email) \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(changes.full_name)
            .bind(changes.role.map(|r| r.as_str()))
            .bind(changes.active)
            .bind(changes.company_id.is_some())
            .bind(changes.company_id.flatten().map(Uuid::from))
            .bind(changes.secret_hash)
            .bind(changes.identity)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_principal", e))?;
        row.map(|r| credential_from_row("update_principal", &r).map(|c| c.principal))
            .transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_principal", e))?;
        Ok(result.rows_affected() > 0)
    }
}
