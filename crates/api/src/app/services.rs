//! Service wiring: pick the storage backend and assemble the auth core,
//! membership ledger and deprovisioner on top of it.

use std::sync::Arc;

use anyhow::{Context, Result};

use workhub_auth::{
    AuthenticationFlow, BcryptHasher, Clock, CompanyDirectory, CredentialHasher, Hs256Signer, NewPrincipal,
    PrincipalStore, Role, SecurityContextResolver, SystemClock, TokenCodec, hash_secret,
};
use workhub_core::validate;
use workhub_infra::{
    CompanyStore, Deprovisioner, LedgerError, MembershipLedger, MembershipStore, NewCompany, PrincipalAdmin,
    memory::{InMemoryCompanyStore, InMemoryMembershipStore, InMemoryPrincipalStore},
    postgres::{self, PgCompanyStore, PgMembershipStore, PgPrincipalStore},
};

use crate::config::{ApiConfig, BootstrapAdmin, StorageConfig};
use crate::middleware::AuthState;

/// The three stores, each viewed through every trait a consumer needs.
#[derive(Clone)]
pub struct Stores {
    pub principals: Arc<dyn PrincipalStore>,
    pub principal_admin: Arc<dyn PrincipalAdmin>,
    pub company_directory: Arc<dyn CompanyDirectory>,
    pub companies: Arc<dyn CompanyStore>,
    pub memberships: Arc<dyn MembershipStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let companies = Arc::new(InMemoryCompanyStore::new());
        Self {
            principals: principals.clone(),
            principal_admin: principals,
            company_directory: companies.clone(),
            companies,
            memberships: Arc::new(InMemoryMembershipStore::new()),
        }
    }

    pub async fn postgres(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = postgres::connect(database_url, max_connections)
            .await
            .with_context(|| "connect to postgres")?;
        postgres::ensure_schema(&pool)
            .await
            .with_context(|| "apply workhub schema")?;

        let principals = Arc::new(PgPrincipalStore::new(pool.clone()));
        let companies = Arc::new(PgCompanyStore::new(pool.clone()));
        Ok(Self {
            principals: principals.clone(),
            principal_admin: principals,
            company_directory: companies.clone(),
            companies,
            memberships: Arc::new(PgMembershipStore::new(pool)),
        })
    }

    pub async fn from_config(storage: &StorageConfig) -> Result<Self> {
        match storage {
            StorageConfig::InMemory => {
                tracing::info!("using in-memory stores");
                Ok(Self::in_memory())
            }
            StorageConfig::Postgres {
                database_url,
                max_connections,
            } => {
                tracing::info!(max_connections, "using postgres stores");
                Self::postgres(database_url, *max_connections).await
            }
        }
    }
}

/// Everything the HTTP handlers call into.
pub struct AppServices {
    pub auth: AuthenticationFlow,
    /// Shared with the auth flow; used for admin-created and updated secrets.
    pub hasher: Arc<dyn CredentialHasher>,
    pub principals: Arc<dyn PrincipalAdmin>,
    pub companies: Arc<dyn CompanyStore>,
    pub ledger: Arc<MembershipLedger>,
    pub deprovisioner: Deprovisioner,
}

pub async fn build_services(config: &ApiConfig) -> Result<(AppServices, AuthState)> {
    let stores = Stores::from_config(&config.storage).await?;
    build_services_with(config, stores).await
}

/// Assemble services over already-constructed stores.
pub async fn build_services_with(config: &ApiConfig, stores: Stores) -> Result<(AppServices, AuthState)> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let signer = Hs256Signer::new(config.jwt_secret.as_bytes()).with_context(|| "build token signer")?;
    let codec = TokenCodec::new(Arc::new(signer), config.token_ttl);
    let hasher: Arc<dyn CredentialHasher> = Arc::new(match config.bcrypt_cost {
        Some(cost) => BcryptHasher::new(cost),
        None => BcryptHasher::default(),
    });

    let ledger = Arc::new(MembershipLedger::new(
        stores.memberships.clone(),
        stores.principals.clone(),
        stores.company_directory.clone(),
    ));
    let deprovisioner = Deprovisioner::new(ledger.clone(), stores.principal_admin.clone(), stores.companies.clone());

    let auth = AuthenticationFlow::new(
        stores.principals.clone(),
        stores.company_directory.clone(),
        Arc::clone(&hasher),
        codec.clone(),
        clock.clone(),
    );

    let auth_state = AuthState {
        codec,
        resolver: SecurityContextResolver::new(stores.principals.clone()),
        clock,
    };

    let services = AppServices {
        auth,
        hasher,
        principals: stores.principal_admin,
        companies: stores.companies,
        ledger,
        deprovisioner,
    };

    if let Some(admin) = &config.bootstrap_admin {
        seed_admin(&services, admin)
            .await
            .with_context(|| "seed bootstrap admin")?;
    }

    Ok((services, auth_state))
}

/// Create the bootstrap company and ADMIN principal if they do not exist yet.
async fn seed_admin(services: &AppServices, admin: &BootstrapAdmin) -> Result<()> {
    let email = validate::identity(&admin.email)?;
    validate::secret(&admin.password)?;
    let company_name = validate::non_blank("company name", &admin.company_name)?;

    let company = match services.companies.find_by_name(&company_name).await? {
        Some(c) => c,
        None => services.companies.create(NewCompany { name: company_name }).await?,
    };

    let principal = match services.principals.find_by_identity(&email).await? {
        Some(p) => p,
        None => {
            let secret_hash = hash_secret(&services.hasher, &admin.password).await?;
            let p = services
                .principals
                .insert(NewPrincipal {
                    identity: email,
                    full_name: admin.full_name.clone(),
                    secret_hash,
                    role: Role::Admin,
                    company_id: Some(company.id),
                    active: true,
                })
                .await?;
            tracing::info!(principal_id = %p.id, company_id = %company.id, "bootstrap admin created");
            p
        }
    };

    match services.ledger.add(company.id, principal.id).await {
        Ok(_) | Err(LedgerError::AlreadyMember { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
