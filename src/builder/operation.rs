use std::{fs, path::Path};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::{
    env::{expand_placeholders, Environment},
    spec::{Operation, OperationSpec, ResolvedOperation, Schema},
};

use super::{
    basic_auth, construct_path, parameter_value, resolve_port, FormData, RequestDescriptor,
    RequestOptions, HOST, PROTOCOL,
};

const MULTIPART: &str = "multipart/form-data";
const JSON: &str = "application/json";

pub(super) fn build(
    api: &OperationSpec,
    resolved: &ResolvedOperation<'_>,
    spec_dir: Option<&Path>,
    title: &str,
    env: &Environment,
) -> RequestDescriptor {
    let server = server_url(api, env);

    let protocol = env.get_string(PROTOCOL).unwrap_or_else(|| {
        server
            .as_ref()
            .map(|url| format!("{}:", url.scheme()))
            .unwrap_or_default()
    });
    let port = resolve_port(
        env,
        server
            .as_ref()
            .and_then(|url| url.port())
            .map(|port| port.to_string()),
        &protocol,
    );
    let host = env.get_string(HOST).unwrap_or_else(|| {
        server
            .as_ref()
            .and_then(|url| url.host_str())
            .unwrap_or_default()
            .to_string()
    });

    let operation = resolved.operation;

    RequestDescriptor {
        title: title.to_string(),
        options: RequestOptions {
            protocol,
            host,
            port,
            method: resolved.method.to_ascii_uppercase(),
            path: construct_path(resolved.path, env),
            headers: construct_parameters(operation, env, &["header"]),
            query_string: construct_parameters(operation, env, &["query", "path"]),
            auth: construct_auth(api, operation, env),
            form: construct_form(operation, env),
            body: construct_body(operation, spec_dir),
        },
    }
}

// An unparsable server URL leaves protocol and host empty. Only scheme, host
// and port are used; a base path on the server URL is not prefixed.
fn server_url(api: &OperationSpec, env: &Environment) -> Option<Url> {
    let raw = api.servers.first()?.url.as_deref()?;
    let expanded = expand_placeholders(raw, env);
    match Url::parse(&expanded) {
        Ok(url) => {
            if !matches!(url.path(), "" | "/") {
                debug!(url = %expanded, "server url base path is not applied");
            }
            Some(url)
        }
        Err(err) => {
            debug!(url = %expanded, error = %err, "ignoring unparsable server url");
            None
        }
    }
}

fn construct_parameters(
    operation: &Operation,
    env: &Environment,
    locations: &[&str],
) -> IndexMap<String, String> {
    operation
        .parameters
        .iter()
        .filter(|param| {
            param
                .location
                .as_deref()
                .map(|location| locations.contains(&location))
                .unwrap_or(false)
        })
        .filter_map(|param| {
            parameter_value(param, env, false).map(|value| (param.name.clone(), value))
        })
        .collect()
}

// Only the first security requirement is consulted, and only HTTP basic is
// understood.
fn construct_auth(api: &OperationSpec, operation: &Operation, env: &Environment) -> Option<String> {
    let requirement = operation.security.first()?;
    let uses_basic = requirement.keys().any(|name| {
        api.components
            .security_schemes
            .get(name)
            .and_then(|scheme| scheme.scheme.as_deref())
            .map(|scheme| scheme.eq_ignore_ascii_case("basic"))
            .unwrap_or(false)
    });
    uses_basic.then(|| basic_auth(env))
}

fn content_schema<'a>(operation: &'a Operation, media_type: &str) -> Option<&'a Schema> {
    operation
        .request_body
        .as_ref()?
        .content
        .get(media_type)?
        .schema
        .as_ref()
}

fn construct_form(operation: &Operation, env: &Environment) -> Option<FormData> {
    let schema = content_schema(operation, MULTIPART)?;
    let mut form = FormData::default();

    for (name, property) in &schema.properties {
        let Some(value) = env.get_string(name) else {
            continue;
        };
        if property.format.as_deref() == Some("binary") {
            form.files.insert(name.clone(), value);
        } else {
            form.fields.insert(name.clone(), value);
        }
    }

    Some(form)
}

// The JSON body comes from the schema alone; only multipart forms read the
// environment.
fn construct_body(operation: &Operation, spec_dir: Option<&Path>) -> Option<Value> {
    let schema = content_schema(operation, JSON)?;

    if let Some(reference) = schema.reference.as_deref() {
        let file = reference.split('#').next().unwrap_or_default();
        if !file.is_empty() {
            let path = spec_dir
                .map(|dir| dir.join(file))
                .unwrap_or_else(|| Path::new(file).to_path_buf());
            return match fs::read_to_string(&path) {
                Ok(contents) => Some(Value::String(contents)),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unable to read body reference");
                    None
                }
            };
        }
        debug!(reference, "document-local schema reference, using property defaults");
    }

    let body: Map<String, Value> = schema
        .properties
        .iter()
        .filter_map(|(name, property)| {
            property
                .default
                .as_ref()
                .map(|value| (name.clone(), value.clone()))
        })
        .collect();
    Some(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::build_request,
        error::SpecError,
        spec::{parse_spec_value, LoadedSpec},
    };
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn petstore(dir: &Path) -> LoadedSpec {
        let document = parse_spec_value(json!({
            "servers": [{"url": "https://petstore.example.com/v1"}],
            "components": {
                "securitySchemes": {
                    "basicAuth": {"type": "http", "scheme": "basic"},
                    "apiKey": {"type": "apiKey"}
                }
            },
            "paths": {
                "/pets/{petId}?verbose=true": {
                    "get": {
                        "operationId": "showPet",
                        "parameters": [
                            {"name": "X-Request-Id", "in": "header", "schema": {"default": "req-{petId}"}},
                            {"name": "X-Empty", "in": "header"},
                            {"name": "limit", "in": "query", "schema": {"default": 10}},
                            {"name": "petId", "in": "path"},
                            {"name": "cookie", "in": "cookie", "schema": {"default": "c"}}
                        ],
                        "security": [{"basicAuth": []}]
                    }
                },
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "security": [{"apiKey": []}],
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "properties": {
                                            "name": {"type": "string", "default": "rex"},
                                            "tag": {"type": "string"},
                                            "age": {"type": "integer", "default": 3}
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "put": {
                        "operationId": "uploadPet",
                        "requestBody": {
                            "content": {
                                "multipart/form-data": {
                                    "schema": {
                                        "properties": {
                                            "photo": {"type": "string", "format": "binary"},
                                            "caption": {"type": "string"},
                                            "unused": {"type": "string"}
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "patch": {
                        "operationId": "replacePet",
                        "requestBody": {
                            "content": {
                                "application/json": {"schema": {"$ref": "bodies/pet.json"}}
                            }
                        }
                    }
                }
            }
        }))
        .expect("valid spec");

        LoadedSpec {
            path: dir.join("petstore.json"),
            document,
        }
    }

    #[test]
    fn derives_connection_details_from_the_server_url() -> Result<()> {
        let spec = petstore(Path::new("/tmp"));
        let mut env = Environment::new();
        env.set("petId", 12);

        let request = build_request(&spec, "showPet", &env)?;

        assert_eq!(request.title, "showPet");
        assert_eq!(request.options.protocol, "https:");
        assert_eq!(request.options.host, "petstore.example.com");
        assert_eq!(request.options.port, "443");
        assert_eq!(request.options.method, "GET");
        assert_eq!(request.options.path, "/pets/12", "server base path /v1 is not prefixed");
        Ok(())
    }

    #[test]
    fn environment_overrides_server_details() -> Result<()> {
        let spec = petstore(Path::new("/tmp"));
        let mut env = Environment::new();
        env.set(HOST, "localhost");
        env.set(PROTOCOL, "http:");
        env.set("PORT", 3000);

        let request = build_request(&spec, "showPet", &env)?;

        assert_eq!(request.options.host, "localhost");
        assert_eq!(request.options.protocol, "http:");
        assert_eq!(request.options.port, "3000");
        Ok(())
    }

    #[test]
    fn host_override_wins_for_every_operation() -> Result<()> {
        let spec = petstore(Path::new("/tmp"));
        let mut env = Environment::new();
        env.set(HOST, "override.internal");

        for name in ["showPet", "createPet", "uploadPet", "replacePet"] {
            let request = build_request(&spec, name, &env)?;
            assert_eq!(request.options.host, "override.internal");
        }
        Ok(())
    }

    #[test]
    fn builds_headers_and_query_parameters() -> Result<()> {
        let spec = petstore(Path::new("/tmp"));
        let mut env = Environment::new();
        env.set("petId", 5);

        let request = build_request(&spec, "showPet", &env)?;

        let headers: Vec<_> = request.options.headers.into_iter().collect();
        assert_eq!(
            headers,
            vec![("X-Request-Id".to_string(), "req-5".to_string())]
        );
        let query: Vec<_> = request.options.query_string.into_iter().collect();
        assert_eq!(
            query,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("petId".to_string(), "5".to_string())
            ]
        );
        Ok(())
    }

    #[test]
    fn basic_auth_only_when_scheme_is_basic() -> Result<()> {
        let spec = petstore(Path::new("/tmp"));
        let mut env = Environment::new();
        env.set("USER", "ada");
        env.set("PASSWORD", "lovelace");

        let secured = build_request(&spec, "showPet", &env)?;
        assert_eq!(secured.options.auth.as_deref(), Some("ada:lovelace"));

        let api_key = build_request(&spec, "createPet", &env)?;
        assert_eq!(api_key.options.auth, None);
        Ok(())
    }

    #[test]
    fn json_body_is_built_from_property_defaults() -> Result<()> {
        let spec = petstore(Path::new("/tmp"));
        let mut env = Environment::new();
        env.set("name", "session-user");
        env.set("tag", "captured");

        let request = build_request(&spec, "createPet", &env)?;
        assert_eq!(request.options.body, Some(json!({"name": "rex", "age": 3})));
        assert_eq!(request.options.form, None);
        Ok(())
    }

    #[test]
    fn multipart_form_splits_files_and_fields() -> Result<()> {
        let spec = petstore(Path::new("/tmp"));
        let mut env = Environment::new();
        env.set("photo", "/tmp/rex.png");
        env.set("caption", "good boy");

        let request = build_request(&spec, "uploadPet", &env)?;
        let form = request.options.form.expect("form data");

        assert_eq!(form.files.get("photo").map(String::as_str), Some("/tmp/rex.png"));
        assert_eq!(form.fields.get("caption").map(String::as_str), Some("good boy"));
        assert!(!form.fields.contains_key("unused"));
        assert_eq!(request.options.body, None);
        Ok(())
    }

    #[test]
    fn body_reference_is_loaded_verbatim() -> Result<()> {
        let temp = tempdir()?;
        std::fs::create_dir_all(temp.path().join("bodies"))?;
        std::fs::write(temp.path().join("bodies/pet.json"), "{\"name\": \"{petName}\"}")?;

        let spec = petstore(temp.path());
        let request = build_request(&spec, "replacePet", &Environment::new())?;
        assert_eq!(
            request.options.body,
            Some(Value::String("{\"name\": \"{petName}\"}".to_string()))
        );

        let missing = petstore(&PathBuf::from("/does/not/exist"));
        let request = build_request(&missing, "replacePet", &Environment::new())?;
        assert_eq!(request.options.body, None);
        Ok(())
    }

    #[test]
    fn malformed_server_url_falls_back_to_empty() -> Result<()> {
        let document = parse_spec_value(json!({
            "servers": [{"url": "not a url"}],
            "paths": {"/ping": {"get": {"operationId": "ping"}}}
        }))?;
        let spec = LoadedSpec {
            path: PathBuf::from("ping.json"),
            document,
        };

        let request = build_request(&spec, "ping", &Environment::new())?;
        assert_eq!(request.options.protocol, "");
        assert_eq!(request.options.host, "");
        assert_eq!(request.options.port, "443");
        Ok(())
    }

    #[test]
    fn server_url_port_and_placeholders_are_honoured() -> Result<()> {
        let document = parse_spec_value(json!({
            "servers": [{"url": "http://{API_HOST}:8080"}],
            "paths": {"/ping": {"get": {"operationId": "ping"}}}
        }))?;
        let spec = LoadedSpec {
            path: PathBuf::from("ping.json"),
            document,
        };
        let mut env = Environment::new();
        env.set("API_HOST", "api.local");

        let request = build_request(&spec, "ping", &env)?;
        assert_eq!(request.options.protocol, "http:");
        assert_eq!(request.options.host, "api.local");
        assert_eq!(request.options.port, "8080");
        Ok(())
    }

    #[test]
    fn unknown_operation_is_not_found() {
        let spec = petstore(Path::new("/tmp"));
        let err = build_request(&spec, "doesNotExist", &Environment::new()).unwrap_err();
        assert!(matches!(err, SpecError::OperationNotFound(name) if name == "doesNotExist"));
    }
}
