use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use tracing::{debug, warn};

use crate::{
    builder::{build_request, missing_parameters, RequestDescriptor},
    capture::{capture, Captured},
    env::Environment,
    error::SessionError,
    executor::{write_response_log, ExecutionResult, RequestExecutor},
    files::{find_file, kind_root, REQUESTS},
    registry::Registry,
    spec::{load_spec, SpecDocument},
};

/// Everything produced by running one named request.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub request: RequestDescriptor,
    pub result: ExecutionResult,
    pub captured: Captured,
    pub log_file: Option<PathBuf>,
}

/// Working folder, request registry and executor shared by interactive
/// commands and flows.
pub struct Workspace {
    working_folder: PathBuf,
    project: Option<String>,
    registry: Registry,
    executor: Arc<dyn RequestExecutor>,
    auto_save: bool,
}

impl Workspace {
    pub fn new(
        working_folder: impl Into<PathBuf>,
        project: Option<String>,
        executor: Arc<dyn RequestExecutor>,
        auto_save: bool,
    ) -> Self {
        let working_folder = working_folder.into();
        let registry = Registry::gather(&kind_root(&working_folder, REQUESTS, project.as_deref()));
        Self {
            working_folder,
            project,
            registry,
            executor,
            auto_save,
        }
    }

    pub fn working_folder(&self) -> &Path {
        &self.working_folder
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn auto_save(&self) -> bool {
        self.auto_save
    }

    pub fn set_auto_save(&mut self, enabled: bool) {
        self.auto_save = enabled;
    }

    /// Registry entry first, then a file under `requests`.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.registry
            .resolve(name)
            .filter(|path| path.is_file())
            .or_else(|| find_file(&self.working_folder, name, REQUESTS, self.project.as_deref()))
    }

    /// Loads, builds and executes `name` against `env`, then evaluates its
    /// captures. `env` is not modified.
    pub async fn run(&self, name: &str, env: &Environment) -> Result<Outcome> {
        let path = self
            .resolve(name)
            .ok_or_else(|| SessionError::RequestNotFound(name.to_string()))?;
        debug!(request = name, path = %path.display(), "resolved request");

        let spec = load_spec(&path)?;
        if let SpecDocument::Request(definition) = &spec.document {
            let missing = missing_parameters(definition, env);
            if !missing.is_empty() {
                return Err(SessionError::MissingParameters {
                    request: name.to_string(),
                    missing,
                }
                .into());
            }
        }

        let request = build_request(&spec, name, env)?;
        let result = self.executor.execute(&request).await;

        let log_file = if self.auto_save {
            self.save(&request.title, &result)
        } else {
            None
        };
        let captured = capture(&spec, name, &result);

        Ok(Outcome {
            request,
            result,
            captured,
            log_file,
        })
    }

    /// Writes a response log, reporting failures as a warning.
    pub fn save(&self, title: &str, result: &ExecutionResult) -> Option<PathBuf> {
        match write_response_log(&self.working_folder, self.project.as_deref(), title, result) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(error = %format!("{:#}", err), "unable to save response");
                None
            }
        }
    }
}
