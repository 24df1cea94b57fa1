//! In-memory stores for tests and local development.
//!
//! Each store keeps rows in insertion order behind a single `RwLock`, and
//! every uniqueness check runs under the same write guard as the insert.

mod companies;
mod membership;
mod principals;

pub use companies::InMemoryCompanyStore;
pub use membership::InMemoryMembershipStore;
pub use principals::InMemoryPrincipalStore;

use std::sync::PoisonError;

use workhub_auth::StoreError;

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}
