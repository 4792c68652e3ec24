//! Error pages, fallbacks and panic recovery.

use std::{
    any::Any,
    backtrace::Backtrace,
    cell::{Cell, RefCell},
    panic::{self, AssertUnwindSafe},
    sync::{Arc, LazyLock, Once},
};

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
};
use minijinja::{Environment, context};
use tracing::error;

use crate::{AppError, Context, response::Response};

/// Invoked with the request context after a controller or middleware panics.
/// Whatever it leaves in the response is flushed.
pub type PanicHandler = Arc<dyn Fn(&mut Context, &PanicReport) + Send + Sync>;

const ERROR_TEMPLATE: &str = r#"<html>
<head>
    <title>{{ title }}</title>
    <style>
        h1, h2 { text-align: center; }
        hr { border: 1px dotted; color: rgba(3, 169, 244, 0.12); clear: both; }
        .info { color: red; font-weight: bold; text-align: center; }
        .stack { margin: 20px 30px; white-space: pre-wrap; }
    </style>
</head>
<body>
<h1>{{ status }} {{ title }}</h1>
{%- if detail %}
<hr><div class="info">{% if location %}{{ location }}: {% endif %}{{ detail }}</div>
{%- endif %}
{%- if backtrace %}
<br><hr><h2>STACK INFO:</h2><hr><div class="stack">{{ backtrace }}</div>
{%- endif %}
</body>
</html>
"#;

static ERROR_PAGES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    if let Err(err) = env.add_template("error.html", ERROR_TEMPLATE) {
        error!("invalid error page template: {}", err);
    }
    env
});

/// What a caught panic left behind.
#[derive(Debug, Clone, Default)]
pub struct PanicReport {
    message: String,
    location: Option<String>,
    backtrace: Option<String>,
}

impl PanicReport {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic".to_owned()
        };
        let (location, backtrace) = LAST_PANIC.take().unzip();
        Self {
            message,
            location,
            backtrace: backtrace.flatten(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `file:line:column` of the panic.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Captured in dev mode only.
    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }
}

thread_local! {
    /// `Some(dev)` while a request runs inside [`catch`].
    static CAPTURING: Cell<Option<bool>> = const { Cell::new(None) };
    static LAST_PANIC: RefCell<Option<(String, Option<String>)>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Record panics raised while dispatching instead of printing them.
/// Panics elsewhere go to the previously installed hook.
pub(crate) fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let Some(dev) = CAPTURING.get() else {
                previous(info);
                return;
            };
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_default();
            let backtrace = dev.then(|| Backtrace::force_capture().to_string());
            LAST_PANIC.set(Some((location, backtrace)));
        }));
    });
}

/// Run `f`, turning a panic into a [`PanicReport`].
pub(crate) fn catch<R>(dev: bool, f: impl FnOnce() -> R) -> std::result::Result<R, PanicReport> {
    let outer = CAPTURING.replace(Some(dev));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.set(outer);
    result.map_err(PanicReport::from_payload)
}

/// HTML error page; details are only shown in dev mode.
pub fn error_page(
    status: StatusCode,
    detail: Option<&str>,
    report: Option<&PanicReport>,
    dev: bool,
) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    let page = ERROR_PAGES.get_template("error.html").and_then(|template| {
        template.render(context! {
            status => status.as_u16(),
            title,
            detail => dev.then_some(detail).flatten(),
            location => report.filter(|_| dev).and_then(PanicReport::location),
            backtrace => report.filter(|_| dev).and_then(PanicReport::backtrace),
        })
    });
    page.unwrap_or_else(|err| {
        error!("failed to render error page: {}", err);
        format!("<h1>{} {}</h1>", status.as_u16(), title)
    })
}

/// Replace the buffered response with a 500 error page.
pub fn default_panic_handler() -> PanicHandler {
    Arc::new(|ctx: &mut Context, report: &PanicReport| {
        error!(
            path = ctx.request().path(),
            location = report.location(),
            "panic while handling request: {}",
            report.message()
        );
        let dev = ctx.config().is_dev();
        let body = error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some(report.message()),
            Some(report),
            dev,
        );
        let response = ctx.response_mut();
        *response = Response::new();
        response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.set_html_header();
        response.set_body(body);
    })
}

/// Turn an error returned by an action into an error page.
pub(crate) fn action_error(ctx: &mut Context, err: &AppError) {
    error!(path = ctx.request().path(), "action failed: {}", err);
    let status = err.status();
    let body = error_page(status, Some(&err.to_string()), None, ctx.config().is_dev());
    let response = ctx.response_mut();
    response.set_status(status);
    response.set_html_header();
    response.set_body(body);
}

/// Standalone error page for router fallbacks.
pub(crate) fn error_response(status: StatusCode, dev: bool) -> axum::response::Response {
    (status, Html(error_page(status, None, None, dev))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::context;
    use axum::http::Method;

    #[test]
    fn test_error_page_hides_details_in_pro_mode() {
        let report = PanicReport {
            message: "boom".into(),
            location: Some("lib.rs:1:1".into()),
            backtrace: Some("frames".into()),
        };
        let page = error_page(StatusCode::INTERNAL_SERVER_ERROR, Some("boom"), Some(&report), false);
        assert!(page.contains("<h1>500 Internal Server Error</h1>"));
        assert!(!page.contains("boom"));
        assert!(!page.contains("frames"));

        let page = error_page(StatusCode::INTERNAL_SERVER_ERROR, Some("boom"), Some(&report), true);
        assert!(page.contains("lib.rs:1:1: boom"));
        assert!(page.contains("STACK INFO"));
    }

    #[test]
    fn test_error_page_escapes_detail() {
        let page = error_page(StatusCode::NOT_FOUND, Some("<script>"), None, true);
        assert!(page.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_catch_reports_panic() {
        install_panic_hook();
        let report = catch::<()>(true, || panic!("exploded {}", 42)).unwrap_err();
        assert_eq!(report.message(), "exploded 42");
        assert!(report.location().unwrap().contains("handler.rs"));
        assert!(report.backtrace().is_some());

        assert_eq!(catch(false, || 7).unwrap(), 7);
    }

    #[test]
    fn test_default_panic_handler_resets_response() {
        let mut ctx = context(Method::GET, "/");
        ctx.response_mut().set_body("partial");
        ctx.response_mut().set_header("x-partial", "1").unwrap();
        let report = PanicReport {
            message: "boom".into(),
            ..Default::default()
        };
        default_panic_handler()(&mut ctx, &report);
        assert_eq!(ctx.response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(ctx.response().headers().get("x-partial").is_none());
        assert!(!ctx.response().body().contains("partial"));
    }

    #[test]
    fn test_action_error_uses_error_status() {
        let mut ctx = context(Method::GET, "/");
        action_error(&mut ctx, &AppError::TokenError("expired".into()));
        assert_eq!(ctx.response().status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.response().body().contains("expired"));
    }
}
