use std::sync::Arc;

use axum::http::{StatusCode, header};
use tracing::{debug, error};

use super::{Middleware, Next};
use crate::{Context, jwt::TokenValidator};

pub const JWT_MIDDLEWARE_ID: &str = "JWTMiddleware";

/// Rejects requests without a valid token with `401 Unauthorized`.
///
/// The raw token is read from the configured query key, then the form key,
/// then an `Authorization: Bearer` header. Validated claims are stored on
/// the context.
#[derive(Default)]
pub struct JwtMiddleware {
    validator: Option<Arc<dyn TokenValidator>>,
}

impl JwtMiddleware {
    /// Validate with the application's JWT service.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(validator: Arc<dyn TokenValidator>) -> Self {
        Self {
            validator: Some(validator),
        }
    }

    fn raw_token(ctx: &Context) -> Option<String> {
        let config = &ctx.config().jwt;
        let request = ctx.request();
        request
            .query(&config.query_key)
            .or_else(|| request.post_form_value(&config.form_key))
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
            .or_else(|| {
                request
                    .header(header::AUTHORIZATION.as_str())
                    .and_then(bearer)
                    .map(str::to_owned)
            })
    }
}

fn bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_at_checked(7)?;
    (scheme.eq_ignore_ascii_case("bearer ") && !token.is_empty()).then_some(token)
}

impl Middleware for JwtMiddleware {
    fn id(&self) -> &str {
        JWT_MIDDLEWARE_ID
    }

    fn handle(&self, ctx: &mut Context, next: &Next) {
        if ctx.skips(JWT_MIDDLEWARE_ID) {
            next.run(ctx);
            return;
        }

        let validator = self.validator.clone().or_else(|| {
            ctx.jwt()
                .map(|service| service.clone() as Arc<dyn TokenValidator>)
        });
        let Some(validator) = validator else {
            error!("JWT middleware installed but JWT is disabled");
            ctx.response_mut()
                .error(StatusCode::INTERNAL_SERVER_ERROR, None);
            return;
        };

        let Some(raw_token) = Self::raw_token(ctx) else {
            ctx.response_mut().unauthorized(None);
            return;
        };

        match validator.validate(&raw_token) {
            Ok(claims) => {
                ctx.set_claims(claims);
                next.run(ctx);
            }
            Err(err) => {
                debug!("rejected token: {}", err);
                ctx.response_mut().unauthorized(Some(&err.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::AppState,
        config::MvcConfig,
        context::tests::context_with,
        jwt::JwtService,
        middleware::{Chain, Handler},
    };
    use axum::http::Method;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Arc<AppState>, Handler, Arc<AtomicUsize>) {
        let app = Arc::new(AppState::new(MvcConfig::default()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut chain = Chain::new();
        chain.push(JwtMiddleware::new());
        let handler = chain.terminate(Arc::new(move |_: &mut Context| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (app, handler, hits)
    }

    fn token(app: &AppState) -> String {
        app.jwt()
            .unwrap()
            .issue(Some("1"), HashMap::new())
            .unwrap()
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let (app, handler, hits) = setup();
        let mut ctx = context_with(app, Method::GET, "/");
        handler(&mut ctx);
        assert_eq!(ctx.response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_token_from_query() {
        let (app, handler, hits) = setup();
        let uri = format!("/?_jwt={}", token(&app));
        let mut ctx = context_with(app, Method::GET, &uri);
        handler(&mut ctx);
        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(ctx.user().unwrap().id(), Some(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_token_is_unauthorized() {
        let (app, handler, hits) = setup();
        let mut ctx = context_with(app, Method::GET, "/?_jwt=garbage");
        handler(&mut ctx);
        assert_eq!(ctx.response().status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.claims().is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_skipped_action_bypasses_validation() {
        let (app, handler, hits) = setup();
        let mut ctx = context_with(app, Method::GET, "/");
        let info = crate::controller::tests::controller_info();
        let action = crate::action::ActionInfo::new("ActionLogin", "Login", "login", 0, info);
        ctx.bind(Arc::new(action), Arc::new([JWT_MIDDLEWARE_ID].into()));
        handler(&mut ctx);
        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_custom_validator() {
        let service = Arc::new(JwtService::new("other", b"k", 60));
        let raw = service.issue(None, HashMap::new()).unwrap();
        let mut chain = Chain::new();
        chain.push(JwtMiddleware::with_validator(service));
        let handler = chain.terminate(Arc::new(|_: &mut Context| {}));

        let app = Arc::new(AppState::new(MvcConfig::default()));
        let mut ctx = context_with(app, Method::GET, &format!("/?_jwt={raw}"));
        handler(&mut ctx);
        assert_eq!(ctx.claims().unwrap().iss, "other");
    }

    #[test]
    fn test_bearer_parsing() {
        assert_eq!(bearer("Bearer abc"), Some("abc"));
        assert_eq!(bearer("bearer abc"), Some("abc"));
        assert_eq!(bearer("Basic abc"), None);
        assert_eq!(bearer("Bearer "), None);
        assert_eq!(bearer("short"), None);
    }
}
