use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    env::{lock, Environment, SharedEnvironment},
    error::SessionError,
    executor::ExecutionResult,
    workspace::Workspace,
};

use super::{
    model::{Flow, FlowStep, ForEachGroup},
    queue::WorkQueue,
};

pub const DEFAULT_FLOW_CONCURRENCY: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub request: String,
    pub result: ExecutionResult,
}

/// What happened while a flow ran.
#[derive(Debug, Clone, Default)]
pub struct FlowReport {
    /// Executed steps in completion order.
    pub executed: Vec<StepRecord>,
    /// Steps whose request could not be resolved.
    pub skipped: Vec<String>,
    /// Steps that failed to run or whose continuations could not be built.
    pub failed: Vec<(String, String)>,
    /// The flow's root environment once every step finished.
    pub environment: Environment,
}

struct WorkItem<'f> {
    step: &'f FlowStep,
    env: SharedEnvironment,
}

pub struct FlowEngine<'w> {
    workspace: &'w Workspace,
    concurrency: usize,
}

impl<'w> FlowEngine<'w> {
    pub fn new(workspace: &'w Workspace) -> Self {
        Self {
            workspace,
            concurrency: DEFAULT_FLOW_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs every step of `flow` and its continuations, returning once all of
    /// them have finished.
    pub async fn run(&self, flow: &Flow, env: Environment) -> FlowReport {
        let root = env.into_shared();
        let report = Mutex::new(FlowReport::default());

        let mut queue = WorkQueue::new(self.concurrency);
        queue.extend(flow.steps.iter().map(|step| WorkItem {
            step,
            env: Arc::clone(&root),
        }));

        let processed = queue.drain(|item| self.run_step(item, &report)).await;

        let mut report = report.into_inner().unwrap_or_else(PoisonError::into_inner);
        report.environment = lock(&root).clone();
        info!(
            processed,
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "flow finished"
        );
        report
    }

    async fn run_step<'f>(
        &self,
        item: WorkItem<'f>,
        report: &Mutex<FlowReport>,
    ) -> Vec<WorkItem<'f>> {
        let name = item.step.request.as_str();
        let snapshot = lock(&item.env).clone();

        let outcome = match self.workspace.run(name, &snapshot).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let mut report = report.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(SessionError::RequestNotFound(_)) = err.downcast_ref::<SessionError>() {
                    warn!(request = name, "unable to find request, skipping step");
                    report.skipped.push(name.to_string());
                } else {
                    warn!(request = name, error = %format!("{:#}", err), "step failed");
                    report.failed.push((name.to_string(), format!("{:#}", err)));
                }
                return Vec::new();
            }
        };

        lock(&item.env).merge(outcome.captured);
        report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .executed
            .push(StepRecord {
                request: name.to_string(),
                result: outcome.result,
            });

        match continuations(item.step, &item.env) {
            Ok(children) => children,
            Err(err) => {
                warn!(request = name, error = %err, "unable to continue flow branch");
                report
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .failed
                    .push((name.to_string(), err.to_string()));
                Vec::new()
            }
        }
    }
}

/// Only the first continuation kind declared on a step is followed.
fn continuations<'f>(
    step: &'f FlowStep,
    env: &SharedEnvironment,
) -> Result<Vec<WorkItem<'f>>, SessionError> {
    if let Some(next) = &step.next_steps {
        return Ok(next
            .steps
            .iter()
            .map(|step| WorkItem {
                step,
                env: Arc::clone(env),
            })
            .collect());
    }
    if let Some(group) = &step.for_each_steps {
        return fan_out(group, env, false);
    }
    if let Some(group) = &step.for_each_first_steps {
        return fan_out(group, env, true);
    }
    Ok(Vec::new())
}

fn fan_out<'f>(
    group: &'f ForEachGroup,
    env: &SharedEnvironment,
    first: bool,
) -> Result<Vec<WorkItem<'f>>, SessionError> {
    let base = lock(env).clone();
    let name = &group.environment;

    let values = match base.get(name) {
        None | Some(Value::Null) => return Err(SessionError::VariableMissing(name.clone())),
        Some(Value::Array(values)) if !first => values.clone(),
        Some(Value::Array(values)) => match values.first() {
            Some(Value::Array(inner)) => inner.clone(),
            _ => return Err(SessionError::NotAnArray(format!("{}[0]", name))),
        },
        Some(_) => return Err(SessionError::NotAnArray(name.clone())),
    };

    let mut items = Vec::with_capacity(values.len() * group.steps.len());
    for value in values {
        let mut branch = base.clone();
        branch.set(name.clone(), value);
        let branch = branch.into_shared();
        items.extend(group.steps.iter().map(|step| WorkItem {
            step,
            env: Arc::clone(&branch),
        }));
    }
    Ok(items)
}
