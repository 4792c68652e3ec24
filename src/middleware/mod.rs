//! Middleware run in front of every controller action.
//!
//! A [`Chain`] is an ordered list of [`Middleware`] units composed once at
//! startup into a single [`Handler`] per route, terminating in that route's
//! dispatcher. Units run in list order; a unit that does not call
//! [`Next::run`] stops the request there.
//!
//! Honoring the action's skip-set is up to each unit: a middleware whose
//! [`Middleware::id`] appears in [`Context::skip_middlewares`] should forward
//! to `next` without doing its own work.
//!
//! This module also provides the tower-level layers used by
//! [`EywaApp`](crate::EywaApp): request context propagation and request
//! logging.

mod header;
mod jwt;
mod request_context;

use std::sync::Arc;

use crate::Context;

pub use header::{HEADER_MIDDLEWARE_ID, HeaderMiddleware};
pub use jwt::{JWT_MIDDLEWARE_ID, JwtMiddleware};
pub use request_context::{
    RequestContext, request_context_middleware_fn, request_logging_middleware,
};

/// A composed request handler.
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

pub trait Middleware: Send + Sync + 'static {
    /// Identifier matched against skip-sets.
    fn id(&self) -> &str;

    fn handle(&self, ctx: &mut Context, next: &Next);
}

/// The rest of the chain after the current unit.
#[derive(Clone)]
pub struct Next {
    inner: Handler,
}

impl Next {
    pub fn run(&self, ctx: &mut Context) {
        (self.inner)(ctx)
    }
}

/// Ordered middleware list, fixed once the application starts serving.
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: impl Middleware) {
        self.middlewares.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.middlewares.iter().map(|m| m.id())
    }

    /// Compose the chain in front of `endpoint`. An empty chain yields
    /// `endpoint` itself.
    pub fn terminate(&self, endpoint: Handler) -> Handler {
        self.middlewares.iter().rev().fold(endpoint, |inner, middleware| {
            let middleware = middleware.clone();
            let next = Next { inner };
            Arc::new(move |ctx: &mut Context| middleware.handle(ctx, &next))
        })
    }
}

struct FnMiddleware<F> {
    id: String,
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Context, &Next) + Send + Sync + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn handle(&self, ctx: &mut Context, next: &Next) {
        (self.f)(ctx, next)
    }
}

/// Middleware from a closure. The closure is responsible for checking
/// `ctx.skips(id)` itself.
pub fn from_fn<F>(id: impl Into<String>, f: F) -> impl Middleware
where
    F: Fn(&mut Context, &Next) + Send + Sync + 'static,
{
    FnMiddleware { id: id.into(), f }
}
