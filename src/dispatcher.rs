//! Runs the controller lifecycle for a matched route.
//!
//! Every request that reaches a route target ends in exactly one flush,
//! whether the action ran, `before_action` vetoed it, no verb matched, or
//! something panicked along the way.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info_span, warn};

use crate::{
    Context,
    action::{ActionInfo, SkipMiddlewares},
    app::AppState,
    context::FlushGuard,
    controller::{ActionFn, Controller, MethodTable},
    handler,
    middleware::Handler,
    request::Request,
    response::ResponseWriter,
};

/// How far the lifecycle got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `before_action` returned false.
    Vetoed,
    /// The action and `before_response` ran.
    Executed,
}

/// Build a fresh controller and run it for `action`.
pub fn run_lifecycle<C: Controller>(
    action: &ActionInfo,
    ctx: &mut Context,
    method: ActionFn<C>,
) -> Outcome {
    let mut controller = C::default();
    controller.init(action, ctx);

    if !controller.before_action(ctx) {
        debug!(action = action.full_name(), "action vetoed by before_action");
        return Outcome::Vetoed;
    }

    if let Err(err) = method(&mut controller, ctx) {
        handler::action_error(ctx, &err);
    }

    controller.before_response(ctx);
    Outcome::Executed
}

/// Terminal handler dispatching to entry `action.index()` of `table`.
pub(crate) fn endpoint<C: Controller>(
    table: Arc<MethodTable<C>>,
    action: Arc<ActionInfo>,
) -> Handler {
    Arc::new(move |ctx: &mut Context| match table.get(action.index()) {
        Some(method) => {
            run_lifecycle(&action, ctx, method);
        }
        None => {
            warn!(action = action.full_name(), "method table entry missing");
            ctx.response_mut()
                .error(axum::http::StatusCode::INTERNAL_SERVER_ERROR, None);
        }
    })
}

/// A composed handler together with the action it serves.
#[derive(Clone)]
pub(crate) struct Bound {
    pub(crate) handler: Handler,
    pub(crate) action: Arc<ActionInfo>,
    pub(crate) skip: Arc<SkipMiddlewares>,
}

#[derive(Clone)]
pub(crate) enum Target {
    Action(Bound),
    /// Verb-keyed handlers of a resource route.
    Resource {
        method_field: String,
        verbs: HashMap<String, Bound>,
    },
}

/// What a router entry dispatches to.
#[derive(Clone)]
pub(crate) struct RouteTarget {
    app: Arc<AppState>,
    target: Target,
}

impl RouteTarget {
    pub(crate) fn new(app: Arc<AppState>, target: Target) -> Self {
        Self { app, target }
    }

    pub(crate) fn app(&self) -> &Arc<AppState> {
        &self.app
    }

    /// Pick the handler for `request`. A simulated verb in the body or
    /// query overrides the actual one for resource routes.
    fn resolve(&self, request: &Request) -> Option<&Bound> {
        match &self.target {
            Target::Action(bound) => Some(bound),
            Target::Resource {
                method_field,
                verbs,
            } => match request.simulated_method(method_field) {
                Some(verb) => verbs.get(&verb),
                None => {
                    let verb = request.method().as_str();
                    verbs
                        .get(verb)
                        .or_else(|| request.is_head().then(|| verbs.get("GET")).flatten())
                }
            },
        }
    }

    /// Run the request through the chain and flush once into `writer`.
    pub(crate) fn serve<W: ResponseWriter>(&self, ctx: Context, writer: W) {
        let mut ctx = FlushGuard::new(ctx, writer);

        let Some(bound) = self.resolve(ctx.request()) else {
            debug!(
                method = %ctx.request().method(),
                path = ctx.request().path(),
                "no method for verb"
            );
            ctx.response_mut().method_not_allowed(None);
            return;
        };
        ctx.bind(bound.action.clone(), bound.skip.clone());

        let config = self.app.config();
        let span = config.log.enable.then(|| {
            info_span!(
                "action",
                controller = bound.action.controller().name(),
                action = bound.action.name(),
                method = %ctx.request().method(),
                path = ctx.request().path(),
                correlation_id = ctx
                    .request_context()
                    .map(|rc| tracing::field::display(rc.correlation_id)),
            )
        });
        if let Some(span) = &span {
            ctx.set_log(span.clone());
        }
        let _entered = span.as_ref().map(|span| span.enter());

        handler::install_panic_hook();
        let handler = &bound.handler;
        if let Err(report) = handler::catch(config.is_dev(), || handler(&mut *ctx)) {
            (self.app.panic_handler())(&mut *ctx, &report);
        }
    }
}
