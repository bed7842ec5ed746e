use std::borrow::Cow;

use indexmap::IndexMap;

use crate::{
    env::{value_to_string, Environment},
    spec::{Parameter, RequestSpec},
};

use super::{
    basic_auth, construct_path, parameter_value, resolve_port, RequestDescriptor, RequestOptions,
    HOST, PROTOCOL,
};

pub(super) fn build(definition: &RequestSpec, title: &str, env: &Environment) -> RequestDescriptor {
    let env = with_defaults(definition, env);
    let env: &Environment = &env;

    let protocol = env
        .get_string(PROTOCOL)
        .or_else(|| definition.protocol.clone())
        .unwrap_or_default();
    let declared_port = definition
        .port
        .as_ref()
        .filter(|port| !port.is_null())
        .map(value_to_string);
    let port = resolve_port(env, declared_port, &protocol);
    let host = env
        .get_string(HOST)
        .or_else(|| definition.host.clone())
        .unwrap_or_default();

    let method = definition
        .method
        .as_deref()
        .filter(|method| !method.is_empty())
        .unwrap_or("GET")
        .to_ascii_uppercase();

    let auth = definition
        .auth
        .as_deref()
        .filter(|auth| auth.eq_ignore_ascii_case("basic"))
        .map(|_| basic_auth(env));

    RequestDescriptor {
        title: title.to_string(),
        options: RequestOptions {
            protocol,
            host,
            port,
            method,
            path: construct_path(definition.path.as_deref().unwrap_or_default(), env),
            headers: construct_parameters(&definition.headers, env),
            query_string: construct_parameters(&definition.query, env),
            auth,
            form: None,
            body: definition.body.clone().filter(|body| !body.is_null()),
        },
    }
}

/// Declared defaults sit underneath the caller's environment.
fn with_defaults<'a>(definition: &RequestSpec, env: &'a Environment) -> Cow<'a, Environment> {
    let defaults = &definition.parameters.defaults;
    if defaults.is_empty() {
        return Cow::Borrowed(env);
    }

    let mut layered: Environment = defaults
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    layered.merge(
        env.iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    Cow::Owned(layered)
}

fn construct_parameters(parameters: &[Parameter], env: &Environment) -> IndexMap<String, String> {
    parameters
        .iter()
        .filter_map(|param| parameter_value(param, env, true).map(|value| (param.name.clone(), value)))
        .collect()
}

/// Names listed in `parameters.required` with no value in `env` or in the
/// declared defaults.
pub fn missing_parameters(definition: &RequestSpec, env: &Environment) -> Vec<String> {
    definition
        .parameters
        .required
        .iter()
        .filter(|name| {
            !env.contains(name)
                && !definition
                    .parameters
                    .defaults
                    .get(name.as_str())
                    .map(|value| !value.is_null())
                    .unwrap_or(false)
        })
        .cloned()
        .collect()
}
