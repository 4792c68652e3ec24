//! Controller traits and the tables a controller exposes at registration.
//!
//! A controller is a plain struct implementing [`Controller`]. A fresh
//! instance is built (through `Default`) for every request; its lifecycle
//! hooks run in a fixed order around the selected action:
//!
//! `init` → `before_action` → action → `before_response`
//!
//! Returning `false` from `before_action` vetoes the request: neither the
//! action nor `before_response` runs, and whatever the hook wrote to the
//! response is sent as-is.
//!
//! # Example
//!
//! ```ignore
//! use eywa_mvc::prelude::*;
//!
//! #[derive(Default)]
//! struct PostController;
//!
//! impl PostController {
//!     fn index(&mut self, ctx: &mut Context) -> Result<()> {
//!         ctx.render_text("posts");
//!         Ok(())
//!     }
//! }
//!
//! impl Controller for PostController {
//!     fn methods() -> MethodTable<Self> {
//!         MethodTable::new().method("ActionIndex", Self::index)
//!     }
//! }
//!
//! impl WebController for PostController {
//!     fn actions() -> ActionRoutes {
//!         ActionRoutes::from([("Index", ActionRoute::new("/posts"))])
//!     }
//! }
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::http::Method;

use crate::{
    Context, Result,
    action::{ActionInfo, SkipMiddlewares},
    config::MvcConfig,
    naming,
};

/// An action bound to its controller type.
pub type ActionFn<C> = fn(&mut C, &mut Context) -> Result<()>;

/// Action routes keyed by action name without the configured affixes.
pub type ActionRoutes = HashMap<&'static str, ActionRoute>;

/// Skip-sets keyed by method-table name (web) or upper-case verb (REST).
pub type SkipMap = HashMap<&'static str, SkipMiddlewares>;

/// Lifecycle shared by web and REST controllers.
pub trait Controller: Default + Send + 'static {
    /// Every method the controller exposes, in declaration order.
    fn methods() -> MethodTable<Self>;

    fn skip_middlewares() -> SkipMap {
        SkipMap::new()
    }

    fn init(&mut self, action: &ActionInfo, ctx: &mut Context) {
        let _ = (action, ctx);
    }

    fn before_action(&mut self, ctx: &mut Context) -> bool {
        let _ = ctx;
        true
    }

    /// Runs after the action. Persists the session by default; overrides
    /// should call [`Context::save_session`] themselves.
    fn before_response(&mut self, ctx: &mut Context) {
        ctx.save_session();
    }
}

/// Controller whose actions are routed by [`WebController::actions`].
pub trait WebController: Controller {
    fn actions() -> ActionRoutes;

    /// Layout file under `<view root>/layouts`, `None` disables layouts.
    fn layout() -> Option<&'static str> {
        Some("main.html")
    }
}

/// Resource controller: methods named after HTTP verbs (`Get`, `Post`,
/// `Put`, `Patch`, `Delete`) serve one route.
pub trait RestController: Controller {}

/// Method table of a controller type, dispatched by index.
pub struct MethodTable<C> {
    methods: Vec<(&'static str, ActionFn<C>)>,
}

impl<C> Default for MethodTable<C> {
    fn default() -> Self {
        Self {
            methods: Vec::new(),
        }
    }
}

impl<C> MethodTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, name: &'static str, action: ActionFn<C>) -> Self {
        self.methods.push((name, action));
        self
    }

    pub fn get(&self, index: usize) -> Option<ActionFn<C>> {
        self.methods.get(index).map(|(_, action)| *action)
    }

    pub fn name(&self, index: usize) -> Option<&'static str> {
        self.methods.get(index).map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &'static str)> + '_ {
        self.methods
            .iter()
            .enumerate()
            .map(|(index, (name, _))| (index, *name))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Route patterns and verbs of one web action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRoute {
    routes: Vec<String>,
    methods: Vec<Method>,
}

impl ActionRoute {
    /// `route` served for `GET` and `POST`.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            routes: vec![route.into()],
            methods: vec![Method::GET, Method::POST],
        }
    }

    /// Serve an additional pattern.
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.routes.push(route.into());
        self
    }

    /// Replace the allowed verbs.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    pub fn allowed_methods(&self) -> &[Method] {
        &self.methods
    }
}

/// Immutable description of a registered controller type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInfo {
    full_name: String,
    name: String,
    pretty_name: String,
    source_path: String,
    views_path: PathBuf,
    layout: Option<PathBuf>,
}

impl ControllerInfo {
    pub(crate) fn of<C: 'static>(config: &MvcConfig, layout: Option<&str>) -> Self {
        let type_name = std::any::type_name::<C>();
        let full_name = naming::short_type_name(type_name).to_owned();
        let name = naming::controller_name(&full_name, config).unwrap_or_else(|| {
            tracing::warn!(
                "controller {} does not match prefix {:?} / suffix {:?}",
                full_name,
                config.controller.prefix,
                config.controller.suffix
            );
            full_name.clone()
        });
        let pretty_name = naming::pretty_name(&name);

        let root = Path::new(&config.view.root);
        let views_path = root.join(&pretty_name);
        let layout = layout
            .filter(|layout| !layout.is_empty())
            .map(|layout| root.join("layouts").join(layout));

        Self {
            full_name,
            name,
            pretty_name,
            source_path: naming::module_path(type_name).to_owned(),
            views_path,
            layout,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pretty_name(&self) -> &str {
        &self.pretty_name
    }

    /// Module path of the controller type.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn views_path(&self) -> &Path {
        &self.views_path
    }

    pub fn layout(&self) -> Option<&Path> {
        self.layout.as_deref()
    }
}
