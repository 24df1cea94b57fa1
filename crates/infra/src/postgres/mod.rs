//! Postgres-backed stores.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `MissingReference` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |
//!
//! All stores share one `PgPool`; the schema is created by [`ensure_schema`].

mod companies;
mod membership;
mod principals;

pub use companies::PgCompanyStore;
pub use membership::PgMembershipStore;
pub use principals::PgPrincipalStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use workhub_auth::StoreError;

const SCHEMA: &str = include_str!("../../migrations/0001_workhub_auth.sql");

/// Open a connection pool against `database_url`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create tables, constraints and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    tracing::info!("database schema ensured");
    Ok(())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::MissingReference(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn decode_error(operation: &str, err: impl core::fmt::Display) -> StoreError {
    StoreError::Backend(format!("failed to decode row in {}: {}", operation, err))
}

/// These run only when `DATABASE_URL` points at a disposable database.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::companies::{CompanyStore, NewCompany};
    use crate::membership::MembershipStore;
    use crate::principals::{PrincipalAdmin, PrincipalUpdate};
    use workhub_auth::{NewPrincipal, PrincipalStore, Role};
    use workhub_core::{CompanyId, UserId};

    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = connect(&url, 2).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        Some(pool)
    }

    async fn seed(pool: &PgPool) -> (CompanyId, UserId) {
        let tag = uuid::Uuid::now_v7();
        let company = PgCompanyStore::new(pool.clone())
            .create(NewCompany {
                name: format!("company-{tag}"),
            })
            .await
            .unwrap();
        let user = PgPrincipalStore::new(pool.clone())
            .insert(NewPrincipal {
                identity: format!("{tag}@workhub.test"),
                full_name: "Pg".to_string(),
                secret_hash: "h".to_string(),
                role: Role::Staff,
                company_id: Some(company.id),
                active: true,
            })
            .await
            .unwrap();
        (company.id, user.id)
    }

    #[tokio::test]
    async fn duplicate_link_is_rejected_by_the_table() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let (company, user) = seed(&pool).await;
        let links = PgMembershipStore::new(pool);

        links.insert(company, user).await.unwrap();
        let err = links.insert(company, user).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)), "{err:?}");
        assert_eq!(links.user_ids(company).await.unwrap(), vec![user]);
    }

    #[tokio::test]
    async fn link_to_missing_rows_is_a_missing_reference() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let (company, _) = seed(&pool).await;
        let err = PgMembershipStore::new(pool)
            .insert(company, UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)), "{err:?}");
    }

    #[tokio::test]
    async fn duplicate_identity_is_rejected_by_the_table() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let principals = PgPrincipalStore::new(pool.clone());
        let (_, user) = seed(&pool).await;
        let existing = principals.find_by_id(user).await.unwrap().unwrap();

        let err = principals
            .insert(NewPrincipal {
                identity: existing.identity,
                full_name: "Again".to_string(),
                secret_hash: "h".to_string(),
                role: Role::Staff,
                company_id: None,
                active: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn update_changes_role_and_clears_company() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let principals = PgPrincipalStore::new(pool.clone());
        let (_, user) = seed(&pool).await;

        let updated = principals
            .update(
                user,
                PrincipalUpdate {
                    role: Some(Role::Manager),
                    active: Some(false),
                    company_id: Some(None),
                    ..PrincipalUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.role, Role::Manager);
        assert!(!updated.active);
        assert_eq!(updated.company_id, None);
        assert_eq!(updated.full_name, "Pg");

        assert!(principals.update(UserId::new(), PrincipalUpdate::default()).await.unwrap().is_none());
    }
}
