//! Per-request state shared by middleware, the controller and its action.

use std::{
    any::Any,
    collections::HashMap,
    num::ParseIntError,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use tracing::{Span, warn};

use crate::{
    AppError, Result,
    action::{ActionInfo, SkipMiddlewares},
    app::AppState,
    cache::Cache,
    config::MvcConfig,
    jwt::{Claims, JwtService, JwtUser},
    middleware::RequestContext,
    request::Request,
    response::{Response, ResponseWriter},
    session::Session,
};

/// Path parameters captured by the router, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// Raw value, empty when the parameter is absent.
    pub fn string(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn int(&self, name: &str) -> Result<i64, ParseIntError> {
        self.string(name).parse()
    }

    /// False only for an absent or empty value and `0`.
    pub fn bool(&self, name: &str) -> bool {
        let value = self.string(name);
        !(value.is_empty() || value == "0")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Typed scratch space middleware use to hand data to later stages.
#[derive(Default)]
pub struct Values(HashMap<String, Box<dyn Any + Send>>);

impl Values {
    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.0.insert(key.into(), Box::new(value));
    }

    /// `None` when absent or stored with another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.0.get(key).and_then(|value| value.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.0.get_mut(key).and_then(|value| value.downcast_mut())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl std::fmt::Debug for Values {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

pub struct Context {
    app: Arc<AppState>,
    request: Request,
    response: Response,
    params: Params,
    session: Option<Session>,
    log: Option<Span>,
    values: Values,
    claims: Option<Claims>,
    skip_middlewares: Arc<SkipMiddlewares>,
    action: Option<Arc<ActionInfo>>,
    request_context: Option<RequestContext>,
    layout_enabled: bool,
    flushed: bool,
}

impl Context {
    pub fn new(app: Arc<AppState>, request: Request, params: Params) -> Self {
        Self {
            app,
            request,
            response: Response::new(),
            params,
            session: None,
            log: None,
            values: Values::default(),
            claims: None,
            skip_middlewares: Arc::default(),
            action: None,
            request_context: None,
            layout_enabled: true,
            flushed: false,
        }
    }

    pub(crate) fn bind(&mut self, action: Arc<ActionInfo>, skip: Arc<SkipMiddlewares>) {
        self.action = Some(action);
        self.skip_middlewares = skip;
    }

    pub(crate) fn set_log(&mut self, span: Span) {
        self.log = Some(span);
    }

    pub(crate) fn set_request_context(&mut self, request_context: RequestContext) {
        self.request_context = Some(request_context);
    }

    pub fn app(&self) -> &Arc<AppState> {
        &self.app
    }

    pub fn config(&self) -> &MvcConfig {
        self.app.config()
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        self.app.cache()
    }

    pub fn jwt(&self) -> Option<&Arc<JwtService>> {
        self.app.jwt()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Values {
        &mut self.values
    }

    /// Request span, present when request logging is enabled.
    pub fn log(&self) -> Option<&Span> {
        self.log.as_ref()
    }

    /// Action selected for this request.
    pub fn action(&self) -> Option<&Arc<ActionInfo>> {
        self.action.as_ref()
    }

    pub fn request_context(&self) -> Option<&RequestContext> {
        self.request_context.as_ref()
    }

    pub fn skip_middlewares(&self) -> &SkipMiddlewares {
        &self.skip_middlewares
    }

    /// Whether the middleware identified by `id` must bypass its side effect.
    pub fn skips(&self, id: &str) -> bool {
        self.skip_middlewares.contains(id)
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    pub fn set_claims(&mut self, claims: Claims) {
        self.claims = Some(claims);
    }

    pub fn user(&self) -> Option<JwtUser> {
        self.claims.clone().map(JwtUser::new)
    }

    pub fn layout_enabled(&self) -> bool {
        self.layout_enabled
    }

    pub fn set_layout(&mut self, enabled: bool) {
        self.layout_enabled = enabled;
    }

    /// Session loaded so far, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Load the session on first use. A request without a valid session
    /// cookie gets a fresh session.
    pub fn get_session(&mut self) -> Result<&mut Session> {
        if self.session.is_none() {
            let store = self
                .app
                .session_store()
                .ok_or_else(|| AppError::SessionError("sessions are disabled".into()))?;
            let name = &self.app.config().session.name;
            let session = match store.get(&self.request, name) {
                Ok(session) => session,
                Err(_) => store.new_session(name)?,
            };
            self.session = Some(session);
        }
        self.session
            .as_mut()
            .ok_or_else(|| AppError::SessionError("session unavailable".into()))
    }

    /// Persist a loaded session. Failures are logged, not returned.
    pub fn save_session(&mut self) {
        let (Some(session), Some(store)) = (&self.session, self.app.session_store()) else {
            return;
        };
        if let Err(err) = store.save(&mut self.response, session) {
            warn!("failed to save session {}: {}", session.id(), err);
        }
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Send the buffered response. Only the first call writes.
    pub(crate) fn flush(&mut self, writer: &mut dyn ResponseWriter) {
        if self.flushed {
            warn!(path = self.request.path(), "response already flushed");
            return;
        }
        self.flushed = true;
        self.response.write_to(writer);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("params", &self.params)
            .field("status", &self.response.status())
            .field("flushed", &self.flushed)
            .finish_non_exhaustive()
    }
}

/// Owns a context and flushes it into `W` exactly once, when dropped.
pub(crate) struct FlushGuard<W: ResponseWriter> {
    ctx: Context,
    writer: W,
}

impl<W: ResponseWriter> FlushGuard<W> {
    pub(crate) fn new(ctx: Context, writer: W) -> Self {
        Self { ctx, writer }
    }
}

impl<W: ResponseWriter> Deref for FlushGuard<W> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.ctx
    }
}

impl<W: ResponseWriter> DerefMut for FlushGuard<W> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }
}

impl<W: ResponseWriter> Drop for FlushGuard<W> {
    fn drop(&mut self) {
        self.ctx.flush(&mut self.writer);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        body::Bytes,
        http::{HeaderMap, Method, StatusCode},
    };

    /// Records every flushed response.
    #[derive(Default, Clone)]
    pub(crate) struct RecordingWriter {
        status: Option<StatusCode>,
        pub(crate) writes: Arc<std::sync::Mutex<Vec<(StatusCode, String)>>>,
    }

    impl ResponseWriter for RecordingWriter {
        fn write_head(&mut self, status: StatusCode, _: &HeaderMap) {
            self.status = Some(status);
        }

        fn write_body(&mut self, body: &str) {
            let status = self.status.take().unwrap_or(StatusCode::OK);
            self.writes.lock().unwrap().push((status, body.to_owned()));
        }
    }

    pub(crate) fn context(method: Method, uri: &str) -> Context {
        context_with(Arc::new(AppState::new(MvcConfig::default())), method, uri)
    }

    pub(crate) fn context_with(app: Arc<AppState>, method: Method, uri: &str) -> Context {
        let req = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap();
        Context::new(app, Request::from(req), Params::default())
    }

    #[test]
    fn test_params_accessors() {
        let params: Params = [("id", "42"), ("flag", "FALSE"), ("on", "yes"), ("off", "0")]
            .into_iter()
            .collect();
        assert_eq!(params.string("id"), "42");
        assert_eq!(params.string("missing"), "");
        assert_eq!(params.int("id").unwrap(), 42);
        assert!(params.int("on").is_err());
        assert!(params.int("missing").is_err());
        assert!(params.bool("flag"));
        assert!(!params.bool("off"));
        assert!(!params.bool("missing"));
        assert!(params.bool("on"));
        assert!(params.bool("id"));
    }

    #[test]
    fn test_values_are_typed() {
        let mut values = Values::default();
        values.insert("user", 7_u32);
        assert_eq!(values.get::<u32>("user"), Some(&7));
        assert_eq!(values.get::<String>("user"), None);
        *values.get_mut::<u32>("user").unwrap() += 1;
        assert_eq!(values.get::<u32>("user"), Some(&8));
        assert!(values.remove("user"));
        assert!(!values.contains("user"));
    }

    #[test]
    fn test_flush_writes_once() {
        let writer = RecordingWriter::default();
        let mut ctx = context(Method::GET, "/");
        ctx.response_mut().set_body("hello");
        let mut sink = writer.clone();
        ctx.flush(&mut sink);
        ctx.flush(&mut sink);
        assert!(ctx.is_flushed());
        assert_eq!(writer.writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_flush_guard_flushes_on_drop() {
        let writer = RecordingWriter::default();
        {
            let mut guard = FlushGuard::new(context(Method::GET, "/"), writer.clone());
            guard.response_mut().set_body("done");
        }
        let writes = writer.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, "done");
    }

    #[test]
    fn test_skips_follows_bound_action_set() {
        let mut ctx = context(Method::GET, "/");
        assert!(!ctx.skips("JWTMiddleware"));
        let info = crate::controller::tests::controller_info();
        let action = ActionInfo::new("ActionIndex", "Index", "index", 0, info);
        ctx.bind(Arc::new(action), Arc::new(["JWTMiddleware"].into()));
        assert!(ctx.skips("JWTMiddleware"));
        assert_eq!(ctx.action().unwrap().name(), "Index");
    }

    #[test]
    fn test_session_is_loaded_lazily_and_saved() {
        let mut config = MvcConfig::default();
        config.session.enable = true;
        let app = Arc::new(AppState::new(config));
        let mut ctx = context_with(app.clone(), Method::GET, "/");
        assert!(ctx.session().is_none());

        ctx.get_session().unwrap().set("count", 1).unwrap();
        let id = ctx.session().unwrap().id().to_owned();
        ctx.save_session();

        let cookie = ctx.response().headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with(&format!("GOSESSION={id}")));
    }

    #[test]
    fn test_session_disabled() {
        let mut ctx = context(Method::GET, "/");
        assert!(matches!(ctx.get_session(), Err(AppError::SessionError(_))));
        ctx.save_session();
        assert!(ctx.response().headers().get("set-cookie").is_none());
    }
}
