//! Immutable descriptors built when controllers are registered.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use axum::http::Method;

use crate::controller::ControllerInfo;

/// Verbs a REST controller can serve, in registration order.
pub const REST_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// Middleware identifiers whose side effect is bypassed for an action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipMiddlewares(HashSet<String>);

impl SkipMiddlewares {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for SkipMiddlewares {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for SkipMiddlewares {
    fn from(ids: [S; N]) -> Self {
        ids.into_iter().collect()
    }
}

/// What a controller's `init` hook learns about the action it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInfo {
    full_name: String,
    name: String,
    pretty_name: String,
    index: usize,
    controller: Arc<ControllerInfo>,
}

impl ActionInfo {
    pub(crate) fn new(
        full_name: impl Into<String>,
        name: impl Into<String>,
        pretty_name: impl Into<String>,
        index: usize,
        controller: Arc<ControllerInfo>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            name: name.into(),
            pretty_name: pretty_name.into(),
            index,
            controller,
        }
    }

    /// Method-table name, affixes included.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kebab-case name used to locate the default view file.
    pub fn pretty_name(&self) -> &str {
        &self.pretty_name
    }

    /// Position in the controller's method table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn controller(&self) -> &ControllerInfo {
        &self.controller
    }
}

/// One exposed web action.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    routes: Vec<String>,
    methods: Vec<Method>,
    info: Arc<ActionInfo>,
    skip_middlewares: Arc<SkipMiddlewares>,
}

impl ActionDescriptor {
    pub(crate) fn new(
        routes: Vec<String>,
        methods: Vec<Method>,
        info: ActionInfo,
        skip_middlewares: SkipMiddlewares,
    ) -> Self {
        Self {
            routes,
            methods,
            info: Arc::new(info),
            skip_middlewares: Arc::new(skip_middlewares),
        }
    }

    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn info(&self) -> &Arc<ActionInfo> {
        &self.info
    }

    pub fn skip_middlewares(&self) -> &Arc<SkipMiddlewares> {
        &self.skip_middlewares
    }
}

/// A REST controller method serving one verb.
#[derive(Debug, Clone)]
pub struct RestMethod {
    info: Arc<ActionInfo>,
    skip_middlewares: Arc<SkipMiddlewares>,
}

impl RestMethod {
    pub(crate) fn new(info: ActionInfo, skip_middlewares: SkipMiddlewares) -> Self {
        Self {
            info: Arc::new(info),
            skip_middlewares: Arc::new(skip_middlewares),
        }
    }

    pub fn info(&self) -> &Arc<ActionInfo> {
        &self.info
    }

    pub fn skip_middlewares(&self) -> &Arc<SkipMiddlewares> {
        &self.skip_middlewares
    }
}

/// One resource route and the verb-specific methods behind it.
#[derive(Debug, Clone)]
pub struct RestDescriptor {
    route: String,
    controller: Arc<ControllerInfo>,
    methods: BTreeMap<String, RestMethod>,
}

impl RestDescriptor {
    pub(crate) fn new(
        route: impl Into<String>,
        controller: Arc<ControllerInfo>,
        methods: BTreeMap<String, RestMethod>,
    ) -> Self {
        Self {
            route: route.into(),
            controller,
            methods,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn controller(&self) -> &ControllerInfo {
        &self.controller
    }

    /// Method serving `verb` (upper-case), if any.
    pub fn method(&self, verb: &str) -> Option<&RestMethod> {
        self.methods.get(verb)
    }

    pub fn verbs(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn methods(&self) -> &BTreeMap<String, RestMethod> {
        &self.methods
    }
}
