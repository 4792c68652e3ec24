//! Controller registry: turns a controller type into dispatch descriptors.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    AppError, Result,
    action::{ActionDescriptor, ActionInfo, REST_METHODS, RestDescriptor, RestMethod},
    config::MvcConfig,
    controller::{ControllerInfo, RestController, WebController},
    dispatcher,
    middleware::Handler,
    naming,
};

/// A web action and the endpoint that runs it.
pub(crate) struct WebAction {
    pub(crate) descriptor: ActionDescriptor,
    pub(crate) endpoint: Handler,
}

/// A resource and one endpoint per verb.
pub(crate) struct RestResource {
    pub(crate) descriptor: RestDescriptor,
    pub(crate) endpoints: BTreeMap<String, Handler>,
}

/// Build one descriptor per method-table entry that has a declared route.
///
/// Nothing is returned unless every action name is valid.
pub(crate) fn web_actions<C: WebController>(config: &MvcConfig) -> Result<Vec<WebAction>> {
    let controller = Arc::new(ControllerInfo::of::<C>(config, C::layout()));
    let table = Arc::new(C::methods());

    let mut routes: HashMap<String, _> = C::actions()
        .into_iter()
        .map(|(key, route)| (naming::action_method_name(key, config), route))
        .collect();
    let skip_map = C::skip_middlewares();

    let mut actions = Vec::new();
    for (index, full_name) in table.iter() {
        let Some(route) = routes.remove(full_name) else {
            continue;
        };
        if !naming::is_exported(full_name) {
            return Err(AppError::InvalidActionName(full_name.to_owned()));
        }

        let name = naming::action_name(full_name, config);
        let pretty_name = naming::pretty_name(&name);
        let info = ActionInfo::new(full_name, name, pretty_name, index, controller.clone());
        let skip = skip_map.get(full_name).cloned().unwrap_or_default();

        debug!(
            controller = controller.full_name(),
            action = full_name,
            index,
            "web action registered"
        );
        let descriptor = ActionDescriptor::new(
            route.routes().to_vec(),
            route.allowed_methods().to_vec(),
            info,
            skip,
        );
        let endpoint = dispatcher::endpoint(table.clone(), descriptor.info().clone());
        actions.push(WebAction {
            descriptor,
            endpoint,
        });
    }

    for unmatched in routes.keys() {
        warn!(
            "controller {} declares a route for {} but has no such method",
            controller.full_name(),
            unmatched
        );
    }

    Ok(actions)
}

/// Collect the verb methods of a resource controller.
///
/// A controller without any verb method yields `Ok(None)`.
pub(crate) fn rest_resource<C: RestController>(
    route: &str,
    config: &MvcConfig,
) -> Result<Option<RestResource>> {
    let controller = Arc::new(ControllerInfo::of::<C>(config, None));
    let table = Arc::new(C::methods());
    let skip_map = C::skip_middlewares();

    let mut methods = BTreeMap::new();
    let mut endpoints = BTreeMap::new();
    for (index, full_name) in table.iter() {
        let verb = full_name.to_ascii_uppercase();
        if !REST_METHODS.iter().any(|m| m.as_str() == verb) {
            continue;
        }
        if !naming::is_exported(full_name) {
            return Err(AppError::InvalidActionName(full_name.to_owned()));
        }

        let pretty_name = naming::pretty_name(full_name);
        let info = ActionInfo::new(full_name, full_name, pretty_name, index, controller.clone());
        let skip = skip_map.get(verb.as_str()).cloned().unwrap_or_default();
        let method = RestMethod::new(info, skip);

        endpoints.insert(
            verb.clone(),
            dispatcher::endpoint(table.clone(), method.info().clone()),
        );
        if methods.insert(verb.clone(), method).is_some() {
            warn!(
                "controller {} defines {} more than once, the last one wins",
                controller.full_name(),
                verb
            );
        }
    }

    if methods.is_empty() {
        warn!(
            "Failed to register restful controller named \"{}\": no valid methods.",
            controller.name()
        );
        return Ok(None);
    }

    Ok(Some(RestResource {
        descriptor: RestDescriptor::new(route, controller, methods),
        endpoints,
    }))
}
