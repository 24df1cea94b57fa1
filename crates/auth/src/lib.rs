//! `workhub-auth`: authentication and declarative authorization core.
//!
//! This crate is decoupled from HTTP and from any concrete storage: it consumes
//! the [`PrincipalStore`] and [`CompanyDirectory`] collaborators and exposes
//! token issuing/validation, credential verification, the login/register flow,
//! the per-request [`SecurityContext`] and the role requirement enforcer.

pub mod authorize;
pub mod claims;
pub mod clock;
pub mod context;
pub mod credentials;
pub mod flow;
pub mod principal;
pub mod roles;
pub mod store;
pub mod token;

pub use authorize::{AccessPolicy, AuthzError, RequirementSite, RoleRequirement, enforce};
pub use claims::{Claims, TokenValidationError, validate_claims};
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{SecurityContext, SecurityContextResolver};
pub use credentials::{BcryptHasher, CredentialHasher, CredentialVerifier, HashError, hash_secret, verify_secret};
pub use flow::{AuthError, AuthSession, AuthenticationFlow, LoginRequest, RegisterRequest};
pub use principal::{NewPrincipal, Principal};
pub use roles::Role;
pub use store::{CompanyDirectory, CredentialRecord, PrincipalStore, StoreError};
pub use token::{Hs256Signer, Signer, SignerError, TokenCodec, TokenInvalid};
