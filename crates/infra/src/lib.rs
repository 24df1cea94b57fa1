//! Infrastructure layer: storage adapters for the auth core, the company
//! membership ledger and ordered deletion.
//!
//! Every store comes in two flavours: in-memory (tests, local development)
//! and Postgres via `sqlx`.

pub mod companies;
pub mod lifecycle;
pub mod membership;
pub mod memory;
pub mod postgres;
pub mod principals;

pub use companies::{Company, CompanyStore, NewCompany};
pub use lifecycle::{Deprovisioner, LifecycleError};
pub use membership::{LedgerError, MembershipLedger, MembershipLink, MembershipStore};
pub use principals::{PrincipalAdmin, PrincipalUpdate};
