use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Local;
use uuid::Uuid;

use crate::files::{project_root, LOG};

use super::models::ExecutionResult;

/// Writes `result` as pretty JSON to
/// `{root}[/project]/log/{title}/{status}_{timestamp}_{suffix}.json`.
pub fn write_response_log(
    working_folder: &Path,
    project: Option<&str>,
    title: &str,
    result: &ExecutionResult,
) -> Result<PathBuf> {
    let dir = project_root(working_folder, project)
        .join(LOG)
        .join(sanitize_component(title));
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let path = dir.join(log_file_name(result));
    let contents = serde_json::to_string_pretty(result).context("serializing response")?;
    fs::write(&path, contents)
        .with_context(|| format!("writing response log {}", path.display()))?;
    Ok(path)
}

fn log_file_name(result: &ExecutionResult) -> String {
    let timestamp = Local::now().format("%Y_%m_%d_%H%M%S_%3f");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}.json", result.status_label(), timestamp, &suffix[..8])
}

pub(crate) fn sanitize_component(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => ch,
            _ => '-',
        })
        .collect();
    let trimmed = sanitized.trim_matches(|ch| ch == '-' || ch == '.');
    if trimmed.is_empty() {
        "request".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use regex::Regex;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[test]
    fn sanitize_component_replaces_invalid_characters() {
        assert_eq!(sanitize_component("Hello World!"), "Hello-World");
        assert_eq!(sanitize_component("../etc"), "etc");
        assert_eq!(sanitize_component("***"), "request");
        assert_eq!(sanitize_component("getPet_v2"), "getPet_v2");
    }

    #[test]
    fn writes_logs_under_the_project() -> Result<()> {
        let temp = tempdir()?;
        let result = ExecutionResult::success(200, 5, Default::default(), json!({"id": 1}));

        let path = write_response_log(temp.path(), Some("shop"), "getPet", &result)?;

        assert_eq!(
            path.parent(),
            Some(temp.path().join("shop").join(LOG).join("getPet").as_path())
        );
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let pattern = Regex::new(r"^200_\d{4}_\d{2}_\d{2}_\d{6}_\d{3}_[0-9a-f]{8}\.json$")?;
        assert!(pattern.is_match(name), "unexpected log name {name}");

        let written: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(written["statusCode"], json!(200));
        assert_eq!(written["body"], json!({"id": 1}));
        Ok(())
    }

    #[test]
    fn failures_are_logged_as_error() -> Result<()> {
        let temp = tempdir()?;
        let result = ExecutionResult::failure("refused", 1);

        let path = write_response_log(temp.path(), None, "getPet", &result)?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        assert!(name.starts_with("error_"));
        assert!(path.starts_with(temp.path().join(LOG)));
        Ok(())
    }
}
