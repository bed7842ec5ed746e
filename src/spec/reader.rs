use std::{fs, path::Path};

use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::SpecError;

use super::model::{LoadedSpec, OperationSpec, RequestSpec, SpecDocument};

pub fn load_spec(path: &Path) -> Result<LoadedSpec, SpecError> {
    let raw = read_document(path)?;
    let document = parse_spec_value(raw).map_err(|err| SpecError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    debug!(
        path = %path.display(),
        kind = document.kind(),
        "loaded spec"
    );

    Ok(LoadedSpec {
        path: path.to_path_buf(),
        document,
    })
}

/// Documents with a `paths` key are OpenAPI style; anything else is a
/// standalone request.
pub fn parse_spec_value(raw: Value) -> Result<SpecDocument, serde_json::Error> {
    if raw.get("paths").is_some() {
        serde_json::from_value::<OperationSpec>(raw).map(SpecDocument::Operations)
    } else {
        serde_json::from_value::<RequestSpec>(raw).map(SpecDocument::Request)
    }
}

/// Reads a JSON or YAML file into a JSON value, choosing the format from the
/// file extension.
pub fn read_document(path: &Path) -> Result<Value, SpecError> {
    let contents = fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_document(&contents, is_yaml(path)).map_err(|message| SpecError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

pub fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}

pub fn is_spec_file(path: &Path) -> bool {
    is_yaml(path)
        || path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
}

fn parse_document(contents: &str, yaml: bool) -> Result<Value, String> {
    if yaml {
        let value: serde_yaml::Value =
            serde_yaml::from_str(contents).map_err(|err| err.to_string())?;
        yaml_to_json(value)
    } else {
        serde_json::from_str(contents).map_err(|err| err.to_string())
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(flag) => Value::Bool(flag),
        serde_yaml::Value::Number(number) => yaml_number(&number)?,
        serde_yaml::Value::String(text) => Value::String(text),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => {
            let tagged = *tagged;
            yaml_to_json(tagged.value)?
        }
    })
}

// Response codes are usually written as bare integers in YAML.
fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    match key {
        serde_yaml::Value::String(text) => Ok(text),
        serde_yaml::Value::Number(number) => Ok(number.to_string()),
        serde_yaml::Value::Bool(flag) => Ok(flag.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        other => Err(format!("unsupported mapping key {:?}", other)),
    }
}

fn yaml_number(number: &serde_yaml::Number) -> Result<Value, String> {
    if let Some(int) = number.as_i64() {
        Ok(Value::from(int))
    } else if let Some(uint) = number.as_u64() {
        Ok(Value::from(uint))
    } else {
        number
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("unsupported number {}", number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const PETSTORE_YAML: &str = r#"
openapi: 3.0.0
servers:
  - url: https://petstore.example.com:8443/v1
paths:
  /pets:
    parameters:
      - name: shared
        in: query
    get:
      operationId: listPets
      summary: List all pets
      responses:
        200:
          description: ok
          x-capture:
            firstPet: /0/id
    post:
      operationId: createPet
  /pets/{petId}:
    get:
      operationId: showPetById
"#;

    #[test]
    fn loads_yaml_operation_specs() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("pets.yaml");
        fs::write(&path, PETSTORE_YAML)?;

        let loaded = load_spec(&path)?;
        let SpecDocument::Operations(spec) = loaded.document else {
            panic!("expected an operation spec");
        };

        assert_eq!(spec.paths.len(), 2);
        let methods: Vec<_> = spec.paths["/pets"].keys().cloned().collect();
        assert_eq!(methods, vec!["get", "post"]);

        let resolved = spec.resolve_operation("listPets").expect("operation");
        assert_eq!(resolved.path, "/pets");
        assert_eq!(resolved.method, "get");
        assert_eq!(
            resolved.operation.responses["200"].capture["firstPet"],
            Value::from("/0/id")
        );
        Ok(())
    }

    #[test]
    fn resolve_operation_returns_none_for_unknown_ids() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("pets.yml");
        fs::write(&path, PETSTORE_YAML)?;

        let SpecDocument::Operations(spec) = load_spec(&path)?.document else {
            panic!("expected an operation spec");
        };
        assert!(spec.resolve_operation("doesNotExist").is_none());
        Ok(())
    }

    #[test]
    fn loads_standalone_json_requests() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("ping.json");
        fs::write(
            &path,
            r#"{"requestId": "ping", "method": "get", "host": "example.com", "port": 8080, "path": "/ping"}"#,
        )?;

        let SpecDocument::Request(request) = load_spec(&path)?.document else {
            panic!("expected a standalone request");
        };
        assert_eq!(request.request_id.as_deref(), Some("ping"));
        assert_eq!(request.port, Some(Value::from(8080)));
        Ok(())
    }

    #[test]
    fn accepts_type_arrays_and_loose_captures() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("users.yaml");
        fs::write(
            &path,
            r#"
openapi: 3.1.0
components:
  securitySchemes:
    basic:
      type: http
      scheme: basic
paths:
  /u:
    get:
      operationId: getUser
      parameters:
        - name: filter
          in: query
          schema:
            type: [string, "null"]
            default: d
      responses:
        200:
          x-capture:
            id: /id
            count: 3
"#,
        )?;

        let SpecDocument::Operations(spec) = load_spec(&path)?.document else {
            panic!("expected an operation spec");
        };
        let resolved = spec.resolve_operation("getUser").expect("operation");
        let default = resolved.operation.parameters[0]
            .schema
            .as_ref()
            .and_then(|schema| schema.default.clone());
        assert_eq!(default, Some(Value::from("d")));
        assert_eq!(resolved.operation.responses["200"].capture.len(), 2);
        Ok(())
    }

    #[test]
    fn malformed_content_is_a_parse_error() -> Result<()> {
        let temp = tempdir()?;
        let json = temp.path().join("broken.json");
        fs::write(&json, "{\"paths\": ")?;
        let yaml = temp.path().join("broken.yaml");
        fs::write(&yaml, "paths: [unclosed")?;

        assert!(matches!(load_spec(&json), Err(SpecError::Parse { .. })));
        assert!(matches!(load_spec(&yaml), Err(SpecError::Parse { .. })));
        assert!(matches!(
            load_spec(&temp.path().join("missing.json")),
            Err(SpecError::Io { .. })
        ));
        Ok(())
    }

    #[test]
    fn spec_file_detection_uses_extension() {
        assert!(is_spec_file(Path::new("a/b.json")));
        assert!(is_spec_file(Path::new("a/b.YAML")));
        assert!(is_spec_file(Path::new("b.yml")));
        assert!(!is_spec_file(Path::new("b.txt")));
        assert!(!is_spec_file(Path::new("json")));
    }
}
