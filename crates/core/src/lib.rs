//! `workhub-core`: shared domain building blocks.
//!
//! Identifiers and the domain error model used by every other crate. No
//! infrastructure concerns live here.

pub mod error;
pub mod id;
pub mod validate;

pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, UserId};
