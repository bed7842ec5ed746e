use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::{
    env::{expand_placeholders, value_to_string, Environment},
    error::SpecError,
    spec::{LoadedSpec, Parameter, SpecDocument},
};

mod operation;
mod request;

pub use request::missing_parameters;

pub const PROTOCOL: &str = "PROTOCOL";
pub const HOST: &str = "HOST";
pub const PORT: &str = "PORT";
pub const USER: &str = "USER";
pub const PASSWORD: &str = "PASSWORD";

/// A fully resolved request, ready to hand to an executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestDescriptor {
    pub title: String,
    pub options: RequestOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub protocol: String,
    pub host: String,
    pub port: String,
    pub method: String,
    pub path: String,
    pub headers: IndexMap<String, String>,
    pub query_string: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<FormData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormData {
    pub fields: IndexMap<String, String>,
    pub files: IndexMap<String, String>,
}

/// Turns the operation (or standalone request) called `name` into a request
/// descriptor, letting environment values override anything the spec says.
pub fn build_request(
    spec: &LoadedSpec,
    name: &str,
    env: &Environment,
) -> Result<RequestDescriptor, SpecError> {
    match &spec.document {
        SpecDocument::Operations(api) => {
            let resolved = api
                .resolve_operation(name)
                .ok_or_else(|| SpecError::OperationNotFound(name.to_string()))?;
            Ok(operation::build(api, &resolved, spec.path.parent(), name, env))
        }
        SpecDocument::Request(definition) => Ok(request::build(definition, name, env)),
    }
}

pub(crate) fn resolve_port(env: &Environment, declared: Option<String>, protocol: &str) -> String {
    if let Some(port) = env.get_string(PORT) {
        return port;
    }
    if let Some(port) = declared {
        return port;
    }
    if protocol == "http:" {
        "80".to_string()
    } else {
        "443".to_string()
    }
}

/// Drops any query string from the template, then expands placeholders.
pub(crate) fn construct_path(template: &str, env: &Environment) -> String {
    let base = match template.find('?') {
        Some(index) if index > 0 => &template[..index],
        _ => template,
    };
    expand_placeholders(base, env)
}

pub(crate) fn basic_auth(env: &Environment) -> String {
    format!(
        "{}:{}",
        env.get_string(USER).unwrap_or_default(),
        env.get_string(PASSWORD).unwrap_or_default()
    )
}

/// Environment value first, then the expanded schema default, then (when
/// allowed) the expanded literal value.
pub(crate) fn parameter_value(
    param: &Parameter,
    env: &Environment,
    allow_literal: bool,
) -> Option<String> {
    if let Some(value) = env.get_string(&param.name) {
        return Some(value);
    }

    let fallback = param
        .schema
        .as_ref()
        .and_then(|schema| schema.default.as_ref())
        .or(if allow_literal {
            param.value.as_ref()
        } else {
            None
        })
        .filter(|value| !value.is_null())?;

    Some(expand_placeholders(&value_to_string(fallback), env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resolve_port_prefers_environment_then_declared_then_protocol() {
        let mut env = Environment::new();
        assert_eq!(resolve_port(&env, None, "http:"), "80");
        assert_eq!(resolve_port(&env, None, "https:"), "443");
        assert_eq!(resolve_port(&env, None, ""), "443");
        assert_eq!(resolve_port(&env, Some("8080".into()), "http:"), "8080");

        env.set(PORT, 9000);
        assert_eq!(resolve_port(&env, Some("8080".into()), "http:"), "9000");
    }

    #[test]
    fn construct_path_strips_query_and_expands() {
        let mut env = Environment::new();
        env.set("petId", 7);

        assert_eq!(construct_path("/pets/{petId}?limit=10", &env), "/pets/7");
        assert_eq!(construct_path("/pets/{missing}", &env), "/pets/{missing}");
        assert_eq!(construct_path("?only=query", &env), "?only=query");
    }

    #[test]
    fn basic_auth_renders_missing_credentials_as_empty() {
        let mut env = Environment::new();
        env.set(USER, "ada");
        assert_eq!(basic_auth(&env), "ada:");

        env.set(PASSWORD, "secret");
        assert_eq!(basic_auth(&env), "ada:secret");
    }

    #[test]
    fn parameter_value_precedence() {
        let mut env = Environment::new();
        env.set("region", "eu");

        let param = Parameter {
            name: "X-Trace".to_string(),
            location: Some("header".to_string()),
            schema: Some(Schema {
                default: Some(json!("trace-{region}")),
                ..Schema::default()
            }),
            value: Some(json!("literal")),
        };
        assert_eq!(
            parameter_value(&param, &env, true).as_deref(),
            Some("trace-eu")
        );

        env.set("X-Trace", "from-env");
        assert_eq!(
            parameter_value(&param, &env, false).as_deref(),
            Some("from-env")
        );

        let literal_only = Parameter {
            name: "limit".to_string(),
            value: Some(json!(25)),
            ..Parameter::default()
        };
        assert_eq!(
            parameter_value(&literal_only, &env, true).as_deref(),
            Some("25")
        );
        assert_eq!(parameter_value(&literal_only, &env, false), None);
    }
}
