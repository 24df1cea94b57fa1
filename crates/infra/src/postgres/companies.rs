use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use workhub_auth::{CompanyDirectory, StoreError};
use workhub_core::CompanyId;

use super::{decode_error, map_sqlx_error};
use crate::companies::{Company, CompanyStore, NewCompany};

/// Companies backed by the `companies` table.
#[derive(Debug, Clone)]
pub struct PgCompanyStore {
    pool: PgPool,
}

impl PgCompanyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn company_from_row(operation: &str, row: &sqlx::postgres::PgRow) -> Result<Company, StoreError> {
    let decode = |e: sqlx::Error| decode_error(operation, e);
    Ok(Company {
        id: CompanyId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

#[async_trait]
impl CompanyDirectory for PgCompanyStore {
    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn company_exists(&self, id: CompanyId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM companies WHERE id = $1) AS present")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("company_exists", e))?;
        row.try_get("present").map_err(|e| decode_error("company_exists", e))
    }
}

#[async_trait]
impl CompanyStore for PgCompanyStore {
    #[instrument(skip(self), fields(name = %company.name), err)]
    async fn create(&self, company: NewCompany) -> Result<Company, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO companies (id, name)
            VALUES ($1, $2)
            RETURNING id, name, created_at
            "#,
        )
        .bind(CompanyId::new().as_uuid())
        .bind(&company.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_company", e))?;
        company_from_row("create_company", &row)
    }

    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn find(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM companies WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_company", e))?;
        row.map(|r| company_from_row("find_company", &r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_by_name(&self, name: &str) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM companies WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_company_by_name", e))?;
        row.map(|r| company_from_row("find_company_by_name", &r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Company>, StoreError> {
        let rows = sqlx::query("SELECT id, name, created_at FROM companies ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_companies", e))?;
        rows.iter().map(|r| company_from_row("list_companies", r)).collect()
    }

    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn rename(&self, id: CompanyId, name: &str) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query("UPDATE companies SET name = $2 WHERE id = $1 RETURNING id, name, created_at")
            .bind(id.as_uuid())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("rename_company", e))?;
        row.map(|r| company_from_row("rename_company", &r)).transpose()
    }

    #[instrument(skip(self), fields(company_id = %id), err)]
    async fn delete(&self, id: CompanyId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_company", e))?;
        Ok(result.rows_affected() > 0)
    }
}
