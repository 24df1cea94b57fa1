use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use workhub_auth::{Clock, SecurityContextResolver, TokenCodec};

use crate::app::errors;
use crate::context::ReqPath;

#[derive(Clone)]
pub struct AuthState {
    pub codec: TokenCodec,
    pub resolver: SecurityContextResolver,
    pub clock: Arc<dyn Clock>,
}

/// Attach a [`workhub_auth::SecurityContext`] to every request.
///
/// Never rejects on its own: a missing or invalid token yields an anonymous
/// context and the route guards decide what that means.
pub async fn auth_middleware(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let claims = extract_bearer(req.headers()).and_then(|token| {
        state
            .codec
            .verify(token, state.clock.now())
            .map_err(|_| tracing::debug!("bearer token rejected"))
            .ok()
    });

    let ctx = match state.resolver.resolve(claims.as_ref()).await {
        Ok(ctx) => ctx,
        Err(e) => {
            let (parts, _) = req.into_parts();
            return errors::store_error(&e, ReqPath::of(&parts).as_str());
        }
    };

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer a.b.c"));
        assert_eq!(extract_bearer(&headers), Some("a.b.c"));
    }
}
