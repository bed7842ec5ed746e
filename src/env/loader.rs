use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::warn;

use crate::files::{find_file, ENVIRONMENT};

use super::Environment;

/// Merges the flat JSON object stored at `path` into `env`.
pub fn load_env_file(path: &Path, env: &mut Environment) -> Result<PathBuf> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading env file {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing env file {}", path.display()))?;

    let Value::Object(values) = parsed else {
        bail!("env file {} must contain a JSON object", path.display());
    };
    env.merge(values);

    Ok(path.to_path_buf())
}

/// Builds an environment from comma separated source names, merged in the
/// order given. Names that resolve to no file are skipped.
pub fn gather_environment(
    working_folder: &Path,
    names: Option<&str>,
) -> Result<(Environment, Vec<PathBuf>)> {
    let mut env = Environment::new();
    let mut env_files = Vec::new();

    let Some(names) = names else {
        return Ok((env, env_files));
    };

    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match find_file(working_folder, name, ENVIRONMENT, None) {
            Some(path) => env_files.push(load_env_file(&path, &mut env)?),
            None => warn!(environment = name, "environment file not found"),
        }
    }

    Ok((env, env_files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_env(root: &Path, name: &str, contents: &str) -> Result<PathBuf> {
        let dir = root.join(ENVIRONMENT);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{name}.json"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn load_env_file_merges_values() -> Result<()> {
        let temp = tempdir()?;
        let path = write_env(
            temp.path(),
            "vars",
            r#"{"FOO": "bar", "COUNT": 3, "IDS": [1, 2]}"#,
        )?;

        let mut env = Environment::new();
        env.set("FOO", "old");
        load_env_file(&path, &mut env)?;

        assert_eq!(env.get("FOO"), Some(&json!("bar")));
        assert_eq!(env.get("COUNT"), Some(&json!(3)));
        assert_eq!(env.get("IDS"), Some(&json!([1, 2])));
        Ok(())
    }

    #[test]
    fn load_env_file_rejects_non_objects() -> Result<()> {
        let temp = tempdir()?;
        let path = write_env(temp.path(), "list", "[1, 2]")?;

        let err = load_env_file(&path, &mut Environment::new()).unwrap_err();
        assert!(err.to_string().contains("must contain a JSON object"));
        Ok(())
    }

    #[test]
    fn load_env_file_propagates_parse_errors() -> Result<()> {
        let temp = tempdir()?;
        let path = write_env(temp.path(), "broken", "{not json")?;

        let err = load_env_file(&path, &mut Environment::new()).unwrap_err();
        assert!(err.to_string().contains("parsing env file"));
        Ok(())
    }

    #[test]
    fn gather_environment_merges_sources_in_order() -> Result<()> {
        let temp = tempdir()?;
        write_env(temp.path(), "base", r#"{"HOST": "base.example.com", "USER": "ada"}"#)?;
        write_env(temp.path(), "override", r#"{"HOST": "override.example.com"}"#)?;

        let (env, files) = gather_environment(temp.path(), Some("base, override,missing"))?;

        assert_eq!(env.get_string("HOST").as_deref(), Some("override.example.com"));
        assert_eq!(env.get_string("USER").as_deref(), Some("ada"));
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn gather_environment_without_names_is_empty() -> Result<()> {
        let temp = tempdir()?;
        let (env, files) = gather_environment(temp.path(), None)?;
        assert!(env.is_empty());
        assert!(files.is_empty());
        Ok(())
    }
}
