use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    builder::RequestDescriptor,
    capture::{evaluate, pointer_paths},
    config::Settings,
    env::{gather_environment, load_env_file, lock, Environment, SharedEnvironment},
    error::SessionError,
    executor::{ExecutionResult, RequestExecutor},
    files::{find_file, project_root, ENVIRONMENT, FLOWS},
    flow::{load_flow, FlowEngine, FlowReport, WorkQueue},
    workspace::{Outcome, Workspace},
};

const PROJECT_FILE: &str = "project.json";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// State behind the interactive commands: the environment, the last exchange
/// and the workspace requests run in.
pub struct Session {
    workspace: Workspace,
    environment: Environment,
    project_info: ProjectInfo,
    flow_concurrency: usize,
    last_request: Option<RequestDescriptor>,
    last_response: Option<ExecutionResult>,
}

impl Session {
    pub fn initialize(settings: &Settings, executor: Arc<dyn RequestExecutor>) -> Result<Self> {
        let (environment, env_files) =
            gather_environment(&settings.working_folder, settings.environment.as_deref())?;
        info!(files = env_files.len(), keys = environment.len(), "environment loaded");

        let project_info =
            read_project_info(&settings.working_folder, settings.project.as_deref())?;
        if let Some(title) = &project_info.title {
            info!(title = %title, "project");
        }

        let workspace = Workspace::new(
            settings.working_folder.clone(),
            settings.project.clone(),
            executor,
            settings.auto_save,
        );

        Ok(Self {
            workspace,
            environment,
            project_info,
            flow_concurrency: settings.flow_concurrency,
            last_request: None,
            last_response: None,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn project_info(&self) -> &ProjectInfo {
        &self.project_info
    }

    pub fn working_folder(&self) -> &Path {
        self.workspace.working_folder()
    }

    pub fn auto_save(&self) -> bool {
        self.workspace.auto_save()
    }

    pub fn last_response(&self) -> Option<&ExecutionResult> {
        self.last_response.as_ref()
    }

    /// Executes `name` and merges its captures into the environment.
    pub async fn run_request(&mut self, name: &str) -> Result<Outcome> {
        let outcome = self.workspace.run(name, &self.environment).await?;
        self.environment.merge(outcome.captured.clone());
        self.remember(&outcome);
        Ok(outcome)
    }

    /// Executes `name` once per element of the array `variable`, binding the
    /// element to `variable` for each run. The array is put back afterwards.
    pub async fn for_each(&mut self, variable: &str, name: &str) -> Result<Vec<Outcome>> {
        self.ensure_request(name)?;
        let values = match self.environment.get(variable) {
            None | Some(Value::Null) => {
                return Err(SessionError::VariableMissing(variable.to_string()).into())
            }
            Some(Value::Array(values)) => values.clone(),
            Some(_) => return Err(SessionError::NotAnArray(variable.to_string()).into()),
        };

        let mut queue = WorkQueue::new(1);
        queue.extend(values.iter().cloned());
        let outcomes = self
            .drive(queue, name, |env, _, value| env.set(variable, value))
            .await;

        self.environment.set(variable, Value::Array(values));
        Ok(outcomes)
    }

    /// Executes `name` for every pair of the comma separated environment names
    /// in `x_axis` and `y_axis`. Keys the axis files set are put back before
    /// each pair and once the matrix is done, unless a capture wrote them.
    pub async fn matrix(&mut self, name: &str, x_axis: &str, y_axis: &str) -> Result<Vec<Outcome>> {
        self.ensure_request(name)?;
        let xs = self.axis_environments(x_axis)?;
        let ys = self.axis_environments(y_axis)?;

        let axis_keys: Vec<String> = xs
            .iter()
            .chain(ys.iter())
            .flat_map(|env| env.keys().cloned())
            .collect();
        let snapshot = self.environment.snapshot(&axis_keys);

        let mut queue = WorkQueue::new(1);
        for x in &xs {
            for y in &ys {
                queue.push((x, y));
            }
        }
        let outcomes = self
            .drive(queue, name, |env, captured, (x, y)| {
                env.restore(snapshot.clone(), captured);
                env.merge(x.as_map().clone());
                env.merge(y.as_map().clone());
            })
            .await;

        let captured: Vec<String> = outcomes
            .iter()
            .flat_map(|outcome| outcome.captured.keys().cloned())
            .collect();
        self.environment.restore(snapshot, &captured);
        Ok(outcomes)
    }

    /// Runs every queued item serially against the session environment,
    /// letting `bind` prepare the environment for each run. `bind` also sees
    /// the keys captured by earlier runs.
    async fn drive<T, B>(&mut self, mut queue: WorkQueue<T>, name: &str, bind: B) -> Vec<Outcome>
    where
        B: Fn(&mut Environment, &[String], T),
    {
        let shared: SharedEnvironment = std::mem::take(&mut self.environment).into_shared();
        let outcomes: Mutex<Vec<Outcome>> = Mutex::new(Vec::new());
        let workspace = &self.workspace;

        queue
            .drain(|item| {
                let shared = &shared;
                let outcomes = &outcomes;
                let bind = &bind;
                async move {
                    let snapshot = {
                        let captured: Vec<String> = outcomes
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .iter()
                            .flat_map(|outcome| outcome.captured.keys().cloned())
                            .collect();
                        let mut env = lock(shared);
                        bind(&mut *env, &captured, item);
                        env.clone()
                    };
                    match workspace.run(name, &snapshot).await {
                        Ok(outcome) => {
                            lock(shared).merge(outcome.captured.clone());
                            outcomes
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(outcome);
                        }
                        Err(err) => warn!(request = name, error = %format!("{:#}", err), "iteration failed"),
                    }
                    Vec::new()
                }
            })
            .await;

        self.environment = lock(&shared).clone();
        let outcomes = outcomes.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = outcomes.last() {
            self.remember(last);
        }
        outcomes
    }

    /// Runs the flow file `name` against the session environment, keeping
    /// whatever the flow's top level steps captured.
    pub async fn run_flow(&mut self, name: &str) -> Result<FlowReport> {
        let path = find_file(
            self.workspace.working_folder(),
            name,
            FLOWS,
            self.workspace.project(),
        )
        .or_else(|| find_file(self.workspace.working_folder(), name, FLOWS, None))
        .ok_or_else(|| SessionError::FlowNotFound(name.to_string()))?;
        let flow = load_flow(&path)?;

        let report = FlowEngine::new(&self.workspace)
            .with_concurrency(self.flow_concurrency)
            .run(&flow, self.environment.clone())
            .await;

        self.environment = report.environment.clone();
        if let Some(last) = report.executed.last() {
            self.last_response = Some(last.result.clone());
        }
        Ok(report)
    }

    /// Merges the comma separated environment files `names` into the
    /// environment.
    pub fn load_environment(&mut self, names: &str) -> Result<Vec<PathBuf>> {
        let (loaded, files) = gather_environment(self.workspace.working_folder(), Some(names))?;
        self.environment.merge(loaded.as_map().clone());
        Ok(files)
    }

    pub fn set(&mut self, variable: &str, value: impl Into<Value>) {
        self.environment.set(variable, value);
    }

    pub fn set_array(&mut self, variable: &str) {
        self.environment.set_array(variable);
    }

    pub fn append(&mut self, variable: &str, value: impl Into<Value>) -> Result<(), SessionError> {
        self.environment.append(variable, value)
    }

    /// Clears the environment and forgets the last exchange.
    pub fn reset(&mut self) {
        self.environment.clear();
        self.last_request = None;
        self.last_response = None;
    }

    pub fn set_auto_save(&mut self, enabled: bool) {
        self.workspace.set_auto_save(enabled);
    }

    /// Evaluates a capture expression against the last response.
    pub fn query(&self, expression: &str) -> Result<Option<Value>> {
        let response = self.require_response()?;
        evaluate(expression, response).with_context(|| format!("querying {}", expression))
    }

    /// The last response, or a single top level field of it.
    pub fn response(&self, key: Option<&str>) -> Result<Value> {
        let response = self.require_response()?.to_value();
        Ok(match key {
            Some(key) => response.get(key).cloned().unwrap_or(Value::Null),
            None => response,
        })
    }

    pub fn save(&self) -> Result<PathBuf> {
        let response = self.require_response()?;
        let title = self
            .last_request
            .as_ref()
            .map(|request| request.title.as_str())
            .unwrap_or("response");
        crate::executor::write_response_log(
            self.workspace.working_folder(),
            self.workspace.project(),
            title,
            response,
        )
    }

    /// JSON pointers present in the last response body.
    pub fn schema(&self) -> Result<Vec<String>> {
        Ok(pointer_paths(&self.require_response()?.body))
    }

    /// Known requests with their summaries, sorted by name.
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.workspace
            .registry()
            .list()
            .into_iter()
            .map(|(name, entry)| (name.clone(), entry.summary.clone()))
            .collect()
    }

    fn remember(&mut self, outcome: &Outcome) {
        self.last_request = Some(outcome.request.clone());
        self.last_response = Some(outcome.result.clone());
    }

    fn require_response(&self) -> Result<&ExecutionResult, SessionError> {
        self.last_response.as_ref().ok_or(SessionError::NoResponse)
    }

    fn ensure_request(&self, name: &str) -> Result<(), SessionError> {
        self.workspace
            .resolve(name)
            .map(|_| ())
            .ok_or_else(|| SessionError::RequestNotFound(name.to_string()))
    }

    fn axis_environments(&self, axis: &str) -> Result<Vec<Environment>> {
        axis.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                let mut env = Environment::new();
                match find_file(self.workspace.working_folder(), name, ENVIRONMENT, None) {
                    Some(path) => {
                        load_env_file(&path, &mut env)?;
                    }
                    None => warn!(environment = name, "environment file not found"),
                }
                Ok(env)
            })
            .collect()
    }
}

fn read_project_info(working_folder: &Path, project: Option<&str>) -> Result<ProjectInfo> {
    let path = project_root(working_folder, project).join(PROJECT_FILE);
    if !path.is_file() {
        return Ok(ProjectInfo::default());
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("reading project file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing project file {}", path.display()))
}
