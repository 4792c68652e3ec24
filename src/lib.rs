//! # eywa-mvc
//!
//! Convention-based MVC controllers for EYWA services on Axum.
//!
//! ## Features
//!
//! - **Web controllers**: exported methods become actions, routed by name or
//!   by an explicit route table
//! - **RESTful controllers**: one route per resource, dispatched by verb with
//!   `_method` simulation for HTML forms
//! - **Action lifecycle**: `init`, `before_action` (with veto) and
//!   `before_response` around every action, with a single flush per request
//! - **Middleware chain**: ordered units with per-action skip-sets
//! - **Request context**: params, sessions, JWT claims, views and a
//!   per-request log span
//! - **Panic recovery**: diagnostic error pages in development mode
//!
//! ## Quick Start
//!
//! ```ignore
//! use eywa_mvc::prelude::*;
//!
//! #[derive(Default)]
//! struct PostController;
//!
//! impl PostController {
//!     fn action_index(&mut self, ctx: &mut Context) -> Result<()> {
//!         ctx.render_text("posts");
//!         Ok(())
//!     }
//! }
//!
//! impl Controller for PostController {
//!     fn methods() -> MethodTable<Self> {
//!         MethodTable::new().method("ActionIndex", Self::action_index)
//!     }
//! }
//!
//! impl WebController for PostController {
//!     fn actions() -> ActionRoutes {
//!         ActionRoutes::from([("Index", ActionRoute::new("/posts"))])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = MvcConfig::load()?;
//!     eywa_mvc::telemetry::init_tracing(&config.log)?;
//!
//!     EywaApp::new(config)
//!         .middleware(JwtMiddleware::new())
//!         .register_web_controller::<PostController>()?
//!         .serve()
//!         .await
//! }
//! ```

pub mod action;
mod app;
pub mod cache;
pub mod config;
mod context;
pub mod controller;
pub mod dispatcher;
mod error;
pub mod handler;
pub mod jwt;
pub mod middleware;
pub mod naming;
mod registry;
pub mod request;
pub mod response;
pub mod session;
pub mod telemetry;
pub mod view;

pub use app::{AppState, EywaApp, FallbackHandler, Hosts};
pub use context::{Context, Params, Values};
pub use error::{AppError, Result};

// Re-export common dependencies
pub use axum::{
    self, Router,
    http::{Method, StatusCode},
};
pub use serde::{Deserialize, Serialize};
pub use serde_json::{self, json};
pub use tokio;
pub use tracing::{debug, error, info, instrument, warn};

/// Prelude for easy importing
pub mod prelude {
    pub use super::{
        AppError, AppState, Context, Deserialize, EywaApp, Hosts, Method, Params, Result,
        Router, Serialize, StatusCode, debug, error, info, json, warn,
    };
    pub use crate::action::{ActionInfo, SkipMiddlewares};
    pub use crate::config::{EywaConfig, Mode, MvcConfig};
    pub use crate::controller::{
        ActionRoute, ActionRoutes, Controller, MethodTable, RestController, SkipMap,
        WebController,
    };
    pub use crate::jwt::{Claims, JwtService, JwtUser, TokenValidator};
    pub use crate::middleware::{
        HeaderMiddleware, JwtMiddleware, Middleware, Next, RequestContext, from_fn,
    };
    pub use crate::session::Session;
}
