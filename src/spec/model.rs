use std::{collections::HashSet, path::PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Path item keys treated as operations.
pub static HTTP_METHODS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "get", "put", "post", "delete", "options", "head", "patch", "trace",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone)]
pub struct LoadedSpec {
    pub path: PathBuf,
    pub document: SpecDocument,
}

#[derive(Debug, Clone)]
pub enum SpecDocument {
    Operations(OperationSpec),
    Request(RequestSpec),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OperationSpec {
    pub servers: Vec<Server>,
    pub components: Components,
    #[serde(deserialize_with = "deserialize_paths")]
    pub paths: IndexMap<String, IndexMap<String, Operation>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Server {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Components {
    #[serde(rename = "securitySchemes")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityScheme {
    pub scheme: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Operation {
    #[serde(rename = "operationId")]
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub parameters: Vec<Parameter>,
    pub security: Vec<IndexMap<String, Value>>,
    #[serde(rename = "requestBody")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, Response>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: Option<String>,
    pub schema: Option<Schema>,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestBody {
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaType {
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Schema {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    pub format: Option<String>,
    pub default: Option<Value>,
    pub properties: IndexMap<String, Schema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Response {
    pub description: Option<String>,
    /// Expressions are kept raw so one malformed entry fails on its own.
    #[serde(rename = "x-capture")]
    pub capture: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestSpec {
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
    pub summary: Option<String>,
    pub method: Option<String>,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub port: Option<Value>,
    pub path: Option<String>,
    pub headers: Vec<Parameter>,
    pub query: Vec<Parameter>,
    pub auth: Option<String>,
    pub body: Option<Value>,
    pub parameters: RequestParameters,
    pub responses: IndexMap<String, Response>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestParameters {
    pub required: Vec<String>,
    pub defaults: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ResolvedOperation<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub operation: &'a Operation,
}

impl SpecDocument {
    pub fn kind(&self) -> &'static str {
        match self {
            SpecDocument::Operations(_) => "operations",
            SpecDocument::Request(_) => "request",
        }
    }

    pub fn responses_for(&self, name: &str) -> Option<&IndexMap<String, Response>> {
        match self {
            SpecDocument::Operations(spec) => spec
                .resolve_operation(name)
                .map(|resolved| &resolved.operation.responses),
            SpecDocument::Request(request) => Some(&request.responses),
        }
    }
}

impl OperationSpec {
    /// First operation, in declaration order, whose `operationId` matches.
    pub fn resolve_operation(&self, operation_id: &str) -> Option<ResolvedOperation<'_>> {
        self.paths.iter().find_map(|(path, methods)| {
            methods.iter().find_map(|(method, operation)| {
                (operation.operation_id.as_deref() == Some(operation_id)).then_some(
                    ResolvedOperation {
                        path,
                        method,
                        operation,
                    },
                )
            })
        })
    }

    pub fn operations(&self) -> impl Iterator<Item = ResolvedOperation<'_>> {
        self.paths.iter().flat_map(|(path, methods)| {
            methods.iter().map(move |(method, operation)| ResolvedOperation {
                path,
                method,
                operation,
            })
        })
    }
}

// Path items may carry non-operation keys (`parameters`, `summary`, ...);
// only HTTP method keys are read as operations.
fn deserialize_paths<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, IndexMap<String, Operation>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: IndexMap<String, IndexMap<String, Value>> = IndexMap::deserialize(deserializer)?;
    let mut paths = IndexMap::with_capacity(raw.len());

    for (path, item) in raw {
        let mut operations = IndexMap::new();
        for (method, value) in item {
            if !HTTP_METHODS.contains(method.to_ascii_lowercase().as_str()) {
                continue;
            }
            let operation: Operation = serde_json::from_value(value).map_err(|err| {
                serde::de::Error::custom(format!("{} {}: {}", method, path, err))
            })?;
            operations.insert(method, operation);
        }
        paths.insert(path, operations);
    }

    Ok(paths)
}
