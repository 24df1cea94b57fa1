//! Request-scoped values handed to handlers.
//!
//! The [`SecurityContext`] itself is inserted into request extensions by the
//! auth middleware; the extractors here read it back explicitly.

use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;
use axum::response::Response;

use workhub_auth::{Principal, SecurityContext};

use crate::app::errors;

/// The request path as seen by the client, before any `nest` stripping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqPath(pub String);

impl ReqPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn of(parts: &Parts) -> Self {
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        Self(path)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ReqPath {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::of(parts))
    }
}

/// Security context of the current request; anonymous if the middleware did not run.
pub fn security_context(parts: &Parts) -> SecurityContext {
    parts
        .extensions
        .get::<SecurityContext>()
        .cloned()
        .unwrap_or_default()
}

/// The authenticated principal. Rejects with 401 when there is none.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match security_context(parts).current_principal() {
            Some(p) => Ok(Self(p.clone())),
            None => Err(errors::unauthenticated(ReqPath::of(parts).as_str())),
        }
    }
}
