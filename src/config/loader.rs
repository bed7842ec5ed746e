use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{executor::DEFAULT_TIMEOUT, flow::DEFAULT_FLOW_CONCURRENCY};

pub const CONFIG_FILE: &str = "lynn.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LynnConfig {
    pub working_folder: Option<PathBuf>,
    pub project: Option<String>,
    /// Comma separated environment names.
    pub environment: Option<String>,
    pub auto_save: Option<bool>,
    pub flow_concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: LynnConfig,
    pub path: PathBuf,
    pub dir: PathBuf,
}

/// Reads `lynn.json` from `target`, which may be the file itself or the
/// directory holding it. A missing file is not an error.
pub fn load_config(target: &Path) -> Result<Option<LoadedConfig>> {
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving current directory")?
            .join(target)
    };

    let (file_path, dir) = if resolved.is_dir() {
        (resolved.join(CONFIG_FILE), resolved)
    } else {
        let dir = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (resolved, dir)
    };

    if !file_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&file_path)
        .with_context(|| format!("reading config {}", file_path.display()))?;
    let mut config: LynnConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", file_path.display()))?;

    // Relative working folders are relative to the config file.
    if let Some(folder) = config.working_folder.take() {
        config.working_folder = Some(if folder.is_absolute() {
            folder
        } else {
            dir.join(folder)
        });
    }

    Ok(Some(LoadedConfig {
        config,
        path: file_path,
        dir,
    }))
}

/// Effective settings for a session once config and flags are combined.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub working_folder: PathBuf,
    pub project: Option<String>,
    pub environment: Option<String>,
    pub auto_save: bool,
    pub flow_concurrency: usize,
    pub timeout: Duration,
}

impl Settings {
    pub fn new(working_folder: impl Into<PathBuf>) -> Self {
        Self {
            working_folder: working_folder.into(),
            project: None,
            environment: None,
            auto_save: false,
            flow_concurrency: DEFAULT_FLOW_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides every setting `config` names.
    pub fn apply(mut self, config: &LynnConfig) -> Self {
        if let Some(folder) = &config.working_folder {
            self.working_folder = folder.clone();
        }
        if let Some(project) = &config.project {
            self.project = Some(project.clone());
        }
        if let Some(environment) = &config.environment {
            self.environment = Some(environment.clone());
        }
        if let Some(auto_save) = config.auto_save {
            self.auto_save = auto_save;
        }
        if let Some(concurrency) = config.flow_concurrency {
            self.flow_concurrency = concurrency.max(1);
        }
        if let Some(secs) = config.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        self
    }
}
