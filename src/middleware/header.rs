use axum::http::{HeaderName, HeaderValue};

use super::{Middleware, Next};
use crate::Context;

pub const HEADER_MIDDLEWARE_ID: &str = "HeaderMiddleware";

/// Adds fixed headers to every response it sees.
pub struct HeaderMiddleware {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderMiddleware {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl Default for HeaderMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for HeaderMiddleware {
    fn id(&self) -> &str {
        HEADER_MIDDLEWARE_ID
    }

    fn handle(&self, ctx: &mut Context, next: &Next) {
        if !ctx.skips(HEADER_MIDDLEWARE_ID) {
            let headers = ctx.response_mut().headers_mut();
            for (name, value) in &self.headers {
                headers.append(name.clone(), value.clone());
            }
        }
        next.run(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::tests::context, middleware::Chain};
    use axum::http::Method;
    use std::sync::Arc;

    #[test]
    fn test_headers_are_added() {
        let mut chain = Chain::new();
        chain.push(HeaderMiddleware::new().header(
            HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static("eywa"),
        ));
        let handler = chain.terminate(Arc::new(|_: &mut Context| {}));

        let mut ctx = context(Method::GET, "/");
        handler(&mut ctx);
        assert_eq!(ctx.response().headers()["x-powered-by"], "eywa");
    }
}
