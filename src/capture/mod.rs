use serde_json::{json, Map, Value};
use serde_json_path::JsonPath;
use tracing::{debug, warn};

use crate::{error::CaptureError, executor::ExecutionResult, spec::LoadedSpec};

/// Values extracted from a response, keyed by the variable they populate.
pub type Captured = Map<String, Value>;

/// Evaluates the `x-capture` expressions declared for the response status of
/// `name`. Expressions that fail or match nothing are left out.
pub fn capture(spec: &LoadedSpec, name: &str, result: &ExecutionResult) -> Captured {
    let mut captured = Captured::new();

    let Some(status) = result.status_code else {
        return captured;
    };
    let Some(responses) = spec.document.responses_for(name) else {
        return captured;
    };
    let Some(response) = responses.get(&status.to_string()) else {
        return captured;
    };

    for (variable, expression) in &response.capture {
        let Some(expression) = expression.as_str() else {
            warn!(variable = %variable, "capture expression is not a string");
            continue;
        };
        match evaluate(expression, result) {
            Ok(Some(value)) => {
                debug!(variable = %variable, "captured value");
                captured.insert(variable.clone(), value);
            }
            Ok(None) => debug!(variable = %variable, expression = %expression, "nothing to capture"),
            Err(err) => warn!(variable = %variable, error = %err, "capture failed"),
        }
    }

    captured
}

/// `$...` is a JSON pointer into `{"response": result}`, `?...` a JSONPath
/// query over the body (always an array of matches), anything else a JSON
/// pointer into the body.
pub fn evaluate(expression: &str, result: &ExecutionResult) -> Result<Option<Value>, CaptureError> {
    if let Some(pointer) = expression.strip_prefix('$') {
        let root = json!({ "response": serde_json::to_value(result)? });
        return Ok(lookup(&root, pointer));
    }

    if let Some(query) = expression.strip_prefix('?') {
        let query = if query.starts_with('$') {
            query.to_string()
        } else {
            format!("${}", query)
        };
        let path = JsonPath::parse(&query).map_err(|err| CaptureError::InvalidQuery {
            expression: expression.to_string(),
            message: err.to_string(),
        })?;
        let matches: Vec<Value> = path.query(&result.body).all().into_iter().cloned().collect();
        return Ok(Some(Value::Array(matches)));
    }

    Ok(lookup(&result.body, expression))
}

// An empty pointer addresses the whole document.
fn lookup(root: &Value, pointer: &str) -> Option<Value> {
    root.pointer(pointer).cloned()
}

/// Every JSON pointer present in `value`, sorted. The root itself is left out.
pub fn pointer_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(value, String::new(), &mut paths);
    paths.sort();
    paths
}

fn collect_paths(value: &Value, prefix: String, paths: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = format!("{}/{}", prefix, escape_token(key));
                collect_paths(child, path.clone(), paths);
                paths.push(path);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = format!("{}/{}", prefix, index);
                collect_paths(child, path.clone(), paths);
                paths.push(path);
            }
        }
        _ => {}
    }
}

fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
