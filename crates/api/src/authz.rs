//! Role guards bound at route-registration time.
//!
//! A policy is attached either to a whole router group ([`guard_group`]) or to
//! a single method route ([`guard_route`]). Group guards are layered outside
//! the routes they wrap, so they always run before call guards, and both run
//! before the handler body. A denial short-circuits the request.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use workhub_auth::{AccessPolicy, SecurityContext};

use crate::app::errors;
use crate::context::ReqPath;

/// Enforce `policy` against the request's security context.
pub async fn enforce_policy(State(policy): State<Arc<AccessPolicy>>, req: Request, next: Next) -> Response {
    let ctx = req
        .extensions()
        .get::<SecurityContext>()
        .cloned()
        .unwrap_or_default();

    match policy.enforce(&ctx) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            let (parts, _) = req.into_parts();
            errors::authz_error(&e, ReqPath::of(&parts).as_str())
        }
    }
}

/// Guard every route of `router` with a group-level policy.
pub fn guard_group<S>(router: Router<S>, policy: AccessPolicy) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(Arc::new(policy), enforce_policy))
}

/// Guard a single method route with a call-level policy.
pub fn guard_route<S>(route: MethodRouter<S>, policy: AccessPolicy) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(middleware::from_fn_with_state(Arc::new(policy), enforce_policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Extension, body::Body, http::StatusCode, routing::post};
    use chrono::Utc;
    use tower::ServiceExt;
    use workhub_auth::{Principal, Role};
    use workhub_core::{CompanyId, UserId};

    fn ctx(role: Option<Role>) -> SecurityContext {
        match role {
            None => SecurityContext::anonymous(),
            Some(role) => SecurityContext::authenticated(Principal {
                id: UserId::new(),
                identity: "t@x.com".to_string(),
                full_name: "T".to_string(),
                role,
                company_id: Some(CompanyId::new()),
                active: true,
                created_at: Utc::now(),
            }),
        }
    }

    fn app(policy: AccessPolicy, calls: Arc<AtomicUsize>, ctx: SecurityContext) -> Router {
        let handler = move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                StatusCode::OK
            }
        };
        Router::new()
            .route("/op", guard_route(post(handler), policy))
            .layer(Extension(ctx))
    }

    async fn call(policy: AccessPolicy, role: Option<Role>) -> (StatusCode, usize) {
        let calls = Arc::new(AtomicUsize::new(0));
        let res = app(policy, calls.clone(), ctx(role))
            .oneshot(axum::http::Request::post("/op").body(Body::empty()).unwrap())
            .await
            .unwrap();
        (res.status(), calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn any_of_set_is_matched_literally() {
        let policy = || AccessPolicy::call().require_any([Role::Staff, Role::Manager]);
        assert_eq!(call(policy(), Some(Role::Staff)).await, (StatusCode::OK, 1));
        assert_eq!(call(policy(), Some(Role::Manager)).await, (StatusCode::OK, 1));
        assert_eq!(call(policy(), Some(Role::Admin)).await, (StatusCode::FORBIDDEN, 0));
    }

    #[tokio::test]
    async fn anonymous_caller_is_unauthorized_and_body_never_runs() {
        let policy = AccessPolicy::call().require_role(Role::Staff);
        assert_eq!(call(policy, None).await, (StatusCode::UNAUTHORIZED, 0));
    }

    #[tokio::test]
    async fn empty_requirement_set_denies_admin() {
        let policy = AccessPolicy::call().require_any(Vec::<Role>::new());
        assert_eq!(call(policy, Some(Role::Admin)).await, (StatusCode::FORBIDDEN, 0));
    }

    #[tokio::test]
    async fn group_guard_applies_before_call_guard() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::OK
            }
        };

        let group = guard_group(
            Router::new().route(
                "/op",
                guard_route(post(handler), AccessPolicy::call().require_role(Role::Staff)),
            ),
            AccessPolicy::group().require_any([Role::Admin]),
        );

        // Staff passes the call guard but not the group guard.
        let res = group
            .layer(Extension(ctx(Some(Role::Staff))))
            .oneshot(axum::http::Request::post("/op").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
