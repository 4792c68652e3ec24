//! EywaApp builder: controller registration, router assembly and serving.
//!
//! Controllers are registered up front; [`EywaApp::into_router`] then
//! composes the middleware chain in front of every action once and mounts
//! one axum route per pattern.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    convert::Infallible,
    path::PathBuf,
    sync::Arc,
};

use axum::{
    Router,
    extract::{RawPathParams, Request as AxumRequest, rejection::RawPathParamsRejection},
    http::{StatusCode, header, request::Parts},
    response::Response as AxumResponse,
    routing::{MethodFilter, MethodRouter, any},
};
use tokio::net::TcpListener;
use tower::{Layer, ServiceExt};
use tower_http::{normalize_path::NormalizePathLayer, services::ServeDir};
use tracing::{error, info, warn};

use crate::{
    AppError, Context, Result,
    action::{ActionDescriptor, RestDescriptor},
    cache::{Cache, MemoryCache},
    config::MvcConfig,
    context::Params,
    controller::{RestController, WebController},
    dispatcher::{Bound, RouteTarget, Target},
    handler::{self, PanicHandler},
    jwt::JwtService,
    middleware::{Chain, Middleware, RequestContext},
    registry::{self, RestResource, WebAction},
    request::Request,
    response::OneshotWriter,
    session::{MemorySessionStore, SessionStore},
    view::{MiniJinjaRenderer, ViewRenderer},
};

/// Builds the response for an unmatched path or verb.
pub type FallbackHandler = Arc<dyn Fn(&Parts) -> AxumResponse + Send + Sync>;

type RouterLayer = Box<dyn FnOnce(Router) -> Router + Send>;

/// Application-wide services shared by every request.
pub struct AppState {
    config: Arc<MvcConfig>,
    session_store: Option<Arc<dyn SessionStore>>,
    cache: Arc<dyn Cache>,
    jwt: Option<Arc<JwtService>>,
    renderer: Arc<dyn ViewRenderer>,
    panic_handler: PanicHandler,
}

impl AppState {
    /// Default services for `config`: an in-memory session store when
    /// sessions are enabled, a JWT service when JWT is enabled, an in-memory
    /// cache and a MiniJinja renderer that caches templates outside dev mode.
    pub fn new(config: MvcConfig) -> Self {
        let session_store = config.session.enable.then(|| {
            Arc::new(MemorySessionStore::new(config.session.max_age)) as Arc<dyn SessionStore>
        });
        let jwt = config
            .jwt
            .enable
            .then(|| Arc::new(JwtService::from_config(&config.jwt)));
        let renderer: Arc<dyn ViewRenderer> = if config.is_dev() {
            Arc::new(MiniJinjaRenderer::new())
        } else {
            Arc::new(MiniJinjaRenderer::cached())
        };

        Self {
            config: Arc::new(config),
            session_store,
            cache: Arc::new(MemoryCache::new()),
            jwt,
            renderer,
            panic_handler: handler::default_panic_handler(),
        }
    }

    pub fn config(&self) -> &MvcConfig {
        &self.config
    }

    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.session_store.as_ref()
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn jwt(&self) -> Option<&Arc<JwtService>> {
        self.jwt.as_ref()
    }

    pub fn renderer(&self) -> &Arc<dyn ViewRenderer> {
        &self.renderer
    }

    pub fn panic_handler(&self) -> &PanicHandler {
        &self.panic_handler
    }

    pub(crate) fn set_panic_handler(&mut self, handler: PanicHandler) {
        self.panic_handler = handler;
    }
}

/// Builder for an MVC application.
///
/// # Example
/// ```ignore
/// use eywa_mvc::prelude::*;
///
/// EywaApp::new(MvcConfig::load()?)
///     .middleware(JwtMiddleware::new())
///     .register_web_controller::<PostController>()?
///     .register_rest_controller::<UserController>("/users")?
///     .request_context()
///     .request_logging()
///     .serve()
///     .await?;
/// ```
pub struct EywaApp {
    state: AppState,
    middlewares: Chain,
    actions: Vec<WebAction>,
    resources: Vec<RestResource>,
    static_dirs: Vec<(String, PathBuf)>,
    not_found: Option<FallbackHandler>,
    method_not_allowed: Option<FallbackHandler>,
    layers: Vec<RouterLayer>,
}

impl EywaApp {
    pub fn new(config: MvcConfig) -> Self {
        Self {
            state: AppState::new(config),
            middlewares: Chain::new(),
            actions: Vec::new(),
            resources: Vec::new(),
            static_dirs: Vec::new(),
            not_found: None,
            method_not_allowed: None,
            layers: Vec::new(),
        }
    }

    pub fn config(&self) -> &MvcConfig {
        self.state.config()
    }

    /// Register every routed action of `C`.
    ///
    /// Fails without registering anything if an action name does not start
    /// with an uppercase ASCII letter.
    pub fn register_web_controller<C: WebController>(mut self) -> Result<Self> {
        let actions = registry::web_actions::<C>(self.state.config())?;
        self.actions.extend(actions);
        Ok(self)
    }

    /// Serve the verb methods of `C` (`Get`, `Post`, ...) on `route`.
    ///
    /// A controller without verb methods is skipped with a warning.
    pub fn register_rest_controller<C: RestController>(mut self, route: &str) -> Result<Self> {
        if let Some(resource) = registry::rest_resource::<C>(route, self.state.config())? {
            self.resources.push(resource);
        }
        Ok(self)
    }

    /// Append a middleware to the chain run in front of every action.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.state.session_store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.state.cache = cache;
        self
    }

    pub fn jwt(mut self, jwt: Arc<JwtService>) -> Self {
        self.state.jwt = Some(jwt);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn ViewRenderer>) -> Self {
        self.state.renderer = renderer;
        self
    }

    pub fn panic_handler(mut self, handler: PanicHandler) -> Self {
        self.state.set_panic_handler(handler);
        self
    }

    pub fn not_found(mut self, handler: FallbackHandler) -> Self {
        self.not_found = Some(handler);
        self
    }

    pub fn method_not_allowed(mut self, handler: FallbackHandler) -> Self {
        self.method_not_allowed = Some(handler);
        self
    }

    /// Serve files under `dir` at `/<route>`.
    pub fn static_files(mut self, route: &str, dir: impl Into<PathBuf>) -> Self {
        self.static_dirs
            .push((format!("/{}", route.trim_matches('/')), dir.into()));
        self
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.actions.iter().map(|action| &action.descriptor)
    }

    pub fn resources(&self) -> impl Iterator<Item = &RestDescriptor> {
        self.resources.iter().map(|resource| &resource.descriptor)
    }

    /// Apply a tower layer to the assembled router.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: tower::Layer<axum::routing::Route> + Clone + Send + Sync + 'static,
        L::Service: tower::Service<axum::extract::Request> + Clone + Send + Sync + 'static,
        <L::Service as tower::Service<axum::extract::Request>>::Future: Send + 'static,
        <L::Service as tower::Service<axum::extract::Request>>::Response:
            axum::response::IntoResponse + 'static,
        <L::Service as tower::Service<axum::extract::Request>>::Error:
            Into<Infallible> + 'static,
    {
        self.layers
            .push(Box::new(move |router: Router| router.layer(layer)));
        self
    }

    /// Compress responses (gzip, deflate, brotli) per `Accept-Encoding`.
    pub fn compression(self) -> Self {
        self.layer(tower_http::compression::CompressionLayer::new())
    }

    /// Structured access log. Call after `.request_context()`.
    pub fn request_logging(self) -> Self {
        self.layer(crate::middleware::request_logging_middleware())
    }

    /// Correlation ID and language propagation, see [`RequestContext`].
    pub fn request_context(self) -> Self {
        self.layer(axum::middleware::from_fn(
            crate::middleware::request_context_middleware_fn,
        ))
    }

    /// Assemble the router: compose the chain per action and mount every
    /// route. Fails on an invalid configuration, a malformed or conflicting
    /// pattern, or a pattern registered twice for the same verb.
    pub fn into_router(self) -> Result<Router> {
        self.state.config().validate()?;
        handler::install_panic_hook();
        let state = Arc::new(self.state);
        let config = state.config();
        let dev = config.is_dev();

        let mut patterns = matchit::Router::new();
        let mut routes: BTreeMap<String, MethodRouter> = BTreeMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for WebAction {
            descriptor,
            endpoint,
        } in self.actions
        {
            let info = descriptor.info();
            let target = RouteTarget::new(
                state.clone(),
                Target::Action(Bound {
                    handler: self.middlewares.terminate(endpoint),
                    action: info.clone(),
                    skip: descriptor.skip_middlewares().clone(),
                }),
            );

            for route in descriptor.routes() {
                if !routes.contains_key(route) {
                    check_pattern(&mut patterns, route)?;
                }
                for method in descriptor.methods() {
                    if !seen.insert((route.clone(), method.to_string())) {
                        return Err(AppError::DuplicateRoute {
                            path: route.clone(),
                            method: method.to_string(),
                        });
                    }
                    let filter = MethodFilter::try_from(method.clone()).map_err(|e| {
                        AppError::ConfigError(format!("{method} {route}: {e}"))
                    })?;
                    info!(
                        "Register web controller's route: {} {} -> {}.{}",
                        method,
                        route,
                        info.controller().full_name(),
                        info.full_name()
                    );
                    let entry = routes.remove(route).unwrap_or_else(MethodRouter::new);
                    routes.insert(
                        route.clone(),
                        entry.on(filter, route_handler(target.clone())),
                    );
                }
            }
        }

        let method_field = config.action.method_field.clone();
        let mut resources: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for RestResource {
            descriptor,
            endpoints,
        } in self.resources
        {
            let route = descriptor.route().to_owned();
            if routes.contains_key(&route) || resources.contains_key(&route) {
                return Err(AppError::DuplicateRoute {
                    path: route,
                    method: "*".into(),
                });
            }
            check_pattern(&mut patterns, &route)?;

            let mut verbs = HashMap::new();
            for (verb, endpoint) in endpoints {
                let Some(method) = descriptor.method(&verb) else {
                    continue;
                };
                info!(
                    "Register restful controller's route: {} {} -> {}.{}",
                    verb,
                    route,
                    descriptor.controller().full_name(),
                    method.info().full_name()
                );
                verbs.insert(
                    verb,
                    Bound {
                        handler: self.middlewares.terminate(endpoint),
                        action: method.info().clone(),
                        skip: method.skip_middlewares().clone(),
                    },
                );
            }
            let target = RouteTarget::new(
                state.clone(),
                Target::Resource {
                    method_field: method_field.clone(),
                    verbs,
                },
            );
            resources.insert(route, any(route_handler(target)));
        }

        let not_found = self
            .not_found
            .unwrap_or_else(|| default_fallback(StatusCode::NOT_FOUND, dev));
        let method_not_allowed = if config.router.handle_method_not_allowed {
            self.method_not_allowed
                .unwrap_or_else(|| default_fallback(StatusCode::METHOD_NOT_ALLOWED, dev))
        } else {
            not_found.clone()
        };

        let mut router = Router::new();
        for (path, method_router) in routes {
            let method_router = method_router.fallback(fallback(method_not_allowed.clone()));
            router = router.route(&path, method_router);
        }
        // No 405 fallback here: `any()` occupies the fallback slot.
        for (path, method_router) in resources {
            router = router.route(&path, method_router);
        }
        for (route, dir) in self.static_dirs {
            if route == "/" {
                return Err(AppError::ConfigError(
                    "static files cannot be served at the root".into(),
                ));
            }
            check_pattern(&mut patterns, &route)?;
            check_pattern(&mut patterns, &format!("{route}/{{*path}}"))?;
            info!("Serve static files: {} -> {}", route, dir.display());
            router = router.nest_service(&route, ServeDir::new(dir));
        }
        router = router.fallback(fallback(not_found));

        for layer in self.layers {
            router = layer(router);
        }
        Ok(router)
    }

    /// Bind `server.host` and serve until the listener fails.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config().server.host.clone();
        let trim_trailing_slash = self.config().router.redirect_trailing_slash;
        let router = self.into_router()?;
        serve_router(&addr, router, trim_trailing_slash).await
    }
}

/// Reject patterns axum refuses to mount.
fn check_pattern(patterns: &mut matchit::Router<()>, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(AppError::ConfigError(format!(
            "route \"{path}\" must start with '/'"
        )));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(AppError::ConfigError(format!(
            "route \"{path}\": captures are written {{name}} or {{*name}}"
        )));
    }
    patterns
        .insert(path, ())
        .map_err(|e| AppError::ConfigError(format!("route \"{path}\": {e}")))
}

fn default_fallback(status: StatusCode, dev: bool) -> FallbackHandler {
    Arc::new(move |_: &Parts| handler::error_response(status, dev))
}

fn fallback(
    handler: FallbackHandler,
) -> impl Fn(AxumRequest) -> std::future::Ready<AxumResponse> + Clone + Send + Sync + 'static {
    move |req: AxumRequest| {
        let (parts, _) = req.into_parts();
        std::future::ready(handler(&parts))
    }
}

fn route_handler(
    target: RouteTarget,
) -> impl Fn(Result<RawPathParams, RawPathParamsRejection>, AxumRequest) -> DispatchFuture
+ Clone
+ Send
+ Sync
+ 'static {
    move |params, req| Box::pin(dispatch(target.clone(), params.ok(), req))
}

type DispatchFuture = std::pin::Pin<Box<dyn std::future::Future<Output = AxumResponse> + Send>>;

/// Buffer the request, then run the synchronous chain off the async runtime.
async fn dispatch(
    target: RouteTarget,
    params: Option<RawPathParams>,
    req: AxumRequest,
) -> AxumResponse {
    let app = target.app().clone();
    let config = app.config();
    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, config.server.body_limit).await {
        Ok(body) => body,
        Err(err) => {
            warn!(path = parts.uri.path(), "failed to read request body: {}", err);
            return handler::error_response(StatusCode::PAYLOAD_TOO_LARGE, config.is_dev());
        }
    };

    let request_context = parts.extensions.get::<RequestContext>().cloned();
    let params: Params = params
        .map(|params| params.iter().collect())
        .unwrap_or_default();
    let mut ctx = Context::new(app.clone(), Request::from_parts(parts, body), params);
    if let Some(request_context) = request_context {
        ctx.set_request_context(request_context);
    }

    let (writer, rx) = OneshotWriter::channel();
    tokio::task::spawn_blocking(move || target.serve(ctx, writer));
    match rx.await {
        Ok(response) => response,
        Err(_) => {
            error!("request dropped before a response was flushed");
            handler::error_response(StatusCode::INTERNAL_SERVER_ERROR, app.config().is_dev())
        }
    }
}

async fn serve_router(addr: &str, router: Router, trim_trailing_slash: bool) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("🚀 Server listening on http://{}", addr);

    if trim_trailing_slash {
        let service = NormalizePathLayer::trim_trailing_slash().layer(router);
        axum::serve(
            listener,
            axum::ServiceExt::<AxumRequest>::into_make_service(service),
        )
        .await?;
    } else {
        axum::serve(listener, router).await?;
    }
    Ok(())
}

/// Routes requests to an application by `Host`, port ignored.
#[derive(Default)]
pub struct Hosts {
    apps: HashMap<String, Router>,
    default: Option<Router>,
}

impl Hosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: &str, app: EywaApp) -> Result<Self> {
        self.apps
            .insert(host.to_ascii_lowercase(), app.into_router()?);
        Ok(self)
    }

    /// Application for hosts without an entry of their own.
    pub fn default_app(mut self, app: EywaApp) -> Result<Self> {
        self.default = Some(app.into_router()?);
        Ok(self)
    }

    pub fn into_router(self) -> Router {
        let apps = Arc::new(self.apps);
        let default = self.default;
        Router::new().fallback(move |req: AxumRequest| {
            let router = host_of(&req)
                .and_then(|host| apps.get(&host).cloned())
                .or_else(|| default.clone());
            async move {
                match router {
                    Some(router) => match router.oneshot(req).await {
                        Ok(response) => response,
                        Err(never) => match never {},
                    },
                    None => handler::error_response(StatusCode::NOT_FOUND, false),
                }
            }
        })
    }

    pub async fn serve(self, addr: &str) -> Result<()> {
        serve_router(addr, self.into_router(), true).await
    }
}

fn host_of(req: &AxumRequest) -> Option<String> {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| req.uri().host())?;
    let name = match host.rfind(']') {
        // [v6 address], port optional
        Some(end) => &host[..=end],
        None => match host.split_once(':') {
            Some((name, port)) if !port.contains(':') => name,
            _ => host,
        },
    };
    Some(name.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ActionRoute, ActionRoutes, Controller, MethodTable};
    use axum::{body::Body, http::Method, response::IntoResponse};

    #[derive(Default)]
    struct PageController;

    impl Controller for PageController {
        fn methods() -> MethodTable<Self> {
            MethodTable::new()
                .method("ActionHome", |_, ctx| {
                    ctx.render_text("home");
                    Ok(())
                })
                .method("ActionShow", |_, ctx| {
                    let id = ctx.params().string("id").to_owned();
                    ctx.render_text(format!("page {id}"));
                    Ok(())
                })
        }
    }

    impl WebController for PageController {
        fn actions() -> ActionRoutes {
            ActionRoutes::from([
                ("Home", ActionRoute::new("/").route("/home")),
                (
                    "Show",
                    ActionRoute::new("/pages/{id}").methods([Method::GET]),
                ),
            ])
        }
    }

    #[derive(Default)]
    struct ClashController;

    impl Controller for ClashController {
        fn methods() -> MethodTable<Self> {
            MethodTable::new().method("ActionOther", |_, _| Ok(()))
        }
    }

    impl WebController for ClashController {
        fn actions() -> ActionRoutes {
            ActionRoutes::from([("Other", ActionRoute::new("/home"))])
        }
    }

    async fn call(
        router: Router,
        method: Method,
        uri: &str,
        host: Option<&str>,
    ) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(host) = host {
            builder = builder.header(header::HOST, host);
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn app() -> EywaApp {
        EywaApp::new(MvcConfig::default())
            .register_web_controller::<PageController>()
            .unwrap()
    }

    #[tokio::test]
    async fn test_routes_are_mounted() {
        let app = app();
        assert_eq!(app.actions().count(), 2);
        let router = app.into_router().unwrap();

        assert_eq!(call(router.clone(), Method::GET, "/home", None).await.1, "home");
        assert_eq!(call(router.clone(), Method::POST, "/", None).await.1, "home");
        assert_eq!(
            call(router.clone(), Method::GET, "/pages/7", None).await.1,
            "page 7"
        );
    }

    #[tokio::test]
    async fn test_fallbacks_render_error_pages() {
        let router = app().into_router().unwrap();

        let (status, body) = call(router.clone(), Method::GET, "/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("404 Not Found"));

        let (status, body) = call(router, Method::POST, "/pages/7", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(body.contains("405 Method Not Allowed"));
    }

    #[tokio::test]
    async fn test_method_not_allowed_disabled_yields_404() {
        let mut config = MvcConfig::default();
        config.router.handle_method_not_allowed = false;
        let router = EywaApp::new(config)
            .register_web_controller::<PageController>()
            .unwrap()
            .into_router()
            .unwrap();
        let (status, _) = call(router, Method::POST, "/pages/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_not_found() {
        let router = app()
            .not_found(Arc::new(|parts: &Parts| {
                (StatusCode::NOT_FOUND, format!("no {}", parts.uri.path())).into_response()
            }))
            .into_router()
            .unwrap();
        let (_, body) = call(router, Method::GET, "/nope", None).await;
        assert_eq!(body, "no /nope");
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let result = app()
            .register_web_controller::<ClashController>()
            .unwrap()
            .into_router();
        assert!(matches!(
            result,
            Err(AppError::DuplicateRoute { ref path, ref method }) if path == "/home" && method == "GET"
        ));
    }

    #[tokio::test]
    async fn test_hosts_dispatch_by_host_name() {
        #[derive(Default)]
        struct AdminController;

        impl Controller for AdminController {
            fn methods() -> MethodTable<Self> {
                MethodTable::new().method("ActionHome", |_, ctx| {
                    ctx.render_text("admin");
                    Ok(())
                })
            }
        }

        impl WebController for AdminController {
            fn actions() -> ActionRoutes {
                ActionRoutes::from([("Home", ActionRoute::new("/home"))])
            }
        }

        let admin = EywaApp::new(MvcConfig::default())
            .register_web_controller::<AdminController>()
            .unwrap();
        let router = Hosts::new()
            .host("Admin.example.com", admin)
            .unwrap()
            .default_app(app())
            .unwrap()
            .into_router();

        let (_, body) = call(
            router.clone(),
            Method::GET,
            "/home",
            Some("admin.example.com:8080"),
        )
        .await;
        assert_eq!(body, "admin");
        let (_, body) = call(router, Method::GET, "/home", Some("www.example.com")).await;
        assert_eq!(body, "home");
    }

    #[test]
    fn test_host_of_strips_port() {
        let req = axum::http::Request::builder()
            .uri("/")
            .header(header::HOST, "Example.com:3000")
            .body(Body::empty())
            .unwrap();
        assert_eq!(host_of(&req).as_deref(), Some("example.com"));
    }

    #[derive(Default)]
    struct ItemController;

    impl Controller for ItemController {
        fn methods() -> MethodTable<Self> {
            MethodTable::new()
                .method("Get", |_, ctx| {
                    ctx.render_text("get");
                    Ok(())
                })
                .method("Post", |_, ctx| {
                    ctx.render_text("post");
                    Ok(())
                })
        }

        fn before_action(&mut self, ctx: &mut Context) -> bool {
            if ctx.request().query("deny").is_some() {
                ctx.response_mut().forbidden(None);
                return false;
            }
            true
        }
    }

    impl crate::controller::RestController for ItemController {}

    fn items() -> Router {
        EywaApp::new(MvcConfig::default())
            .register_rest_controller::<ItemController>("/items/{id}")
            .unwrap()
            .into_router()
            .unwrap()
    }

    #[tokio::test]
    async fn test_resource_routes_dispatch_by_verb() {
        let router = items();
        assert_eq!(
            call(router.clone(), Method::GET, "/items/1", None).await,
            (StatusCode::OK, "get".to_owned())
        );
        assert_eq!(
            call(router.clone(), Method::POST, "/items/1", None).await,
            (StatusCode::OK, "post".to_owned())
        );
        assert_eq!(
            call(router.clone(), Method::GET, "/items/1?_method=post", None).await,
            (StatusCode::OK, "post".to_owned())
        );

        let (status, _) = call(router.clone(), Method::GET, "/items/1?_method=DELETE", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = call(router.clone(), Method::PUT, "/items/1", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _) = call(router, Method::GET, "/items/1?deny=1", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_resource_route_clashing_with_web_route() {
        let result = app()
            .register_rest_controller::<ItemController>("/home")
            .unwrap()
            .into_router();
        assert!(matches!(result, Err(AppError::DuplicateRoute { ref path, .. }) if path == "/home"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = MvcConfig::default();
        config.action.prefix.clear();
        config.action.suffix.clear();
        let result = EywaApp::new(config).into_router();
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_malformed_patterns_are_config_errors() {
        let app = || EywaApp::new(MvcConfig::default());
        for route in ["items", "/items/:id", "/items/*rest"] {
            let result = app()
                .register_rest_controller::<ItemController>(route)
                .unwrap()
                .into_router();
            assert!(
                matches!(result, Err(AppError::ConfigError(_))),
                "{route} accepted"
            );
        }

        let result = app()
            .register_web_controller::<PageController>()
            .unwrap()
            .register_rest_controller::<ItemController>("/pages/{slug}")
            .unwrap()
            .into_router();
        assert!(matches!(result, Err(AppError::ConfigError(_))));

        let result = app().static_files("", "public").into_router();
        assert!(matches!(result, Err(AppError::ConfigError(_))));
        assert!(app().static_files("assets", "public").into_router().is_ok());
    }

    #[test]
    fn test_host_of_ipv6() {
        let host = |value: &str| {
            let req = axum::http::Request::builder()
                .uri("/")
                .header(header::HOST, value)
                .body(Body::empty())
                .unwrap();
            host_of(&req)
        };
        assert_eq!(host("[::1]").as_deref(), Some("[::1]"));
        assert_eq!(host("[::1]:8080").as_deref(), Some("[::1]"));
        assert_eq!(host("::1").as_deref(), Some("::1"));
        assert_eq!(host("localhost").as_deref(), Some("localhost"));
    }
}
