//! API server configuration sourced from environment variables.

use std::net::SocketAddr;

use anyhow::{Context, Result, bail};

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

/// Seeds a company and an ADMIN principal at startup when both are absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// `None` uses the bcrypt default cost.
    pub bcrypt_cost: Option<u32>,
    pub storage: StorageConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ApiConfig {
    /// In-memory configuration with a one-day token lifetime.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: jwt_secret.into(),
            token_ttl: chrono::Duration::seconds(86_400),
            bcrypt_cost: None,
            storage: StorageConfig::InMemory,
            bootstrap_admin: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("WORKHUB_BIND")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse WORKHUB_BIND")?;

        let ttl_secs: i64 = lookup("WORKHUB_TOKEN_TTL_SECS")
            .unwrap_or_else(|| "86400".to_string())
            .parse()
            .with_context(|| "parse WORKHUB_TOKEN_TTL_SECS")?;
        if ttl_secs <= 0 {
            bail!("WORKHUB_TOKEN_TTL_SECS must be positive, got {ttl_secs}");
        }

        let bcrypt_cost = lookup("WORKHUB_BCRYPT_COST")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .with_context(|| "parse WORKHUB_BCRYPT_COST")?;

        let use_persistent: bool = lookup("USE_PERSISTENT_STORES")
            .unwrap_or_else(|| "false".to_string())
            .parse()
            .with_context(|| "parse USE_PERSISTENT_STORES")?;
        let storage = if use_persistent {
            let database_url = lookup("DATABASE_URL")
                .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;
            let max_connections = lookup("WORKHUB_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .with_context(|| "parse WORKHUB_DB_MAX_CONNECTIONS")?;
            StorageConfig::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StorageConfig::InMemory
        };

        // The dev fallback is only acceptable for throwaway in-memory state.
        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if storage != StorageConfig::InMemory => {
                bail!("JWT_SECRET must be set when USE_PERSISTENT_STORES=true")
            }
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let bootstrap_admin = match (
            lookup("WORKHUB_BOOTSTRAP_ADMIN_EMAIL"),
            lookup("WORKHUB_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                full_name: lookup("WORKHUB_BOOTSTRAP_ADMIN_NAME")
                    .unwrap_or_else(|| "Administrator".to_string()),
                company_name: lookup("WORKHUB_BOOTSTRAP_COMPANY")
                    .unwrap_or_else(|| "Workhub".to_string()),
            }),
            (None, None) => None,
            _ => bail!(
                "WORKHUB_BOOTSTRAP_ADMIN_EMAIL and WORKHUB_BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_ttl: chrono::Duration::seconds(ttl_secs),
            bcrypt_cost,
            storage,
            bootstrap_admin,
        })
    }
}
