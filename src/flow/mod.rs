mod engine;
mod model;
mod queue;

pub use engine::{FlowEngine, FlowReport, StepRecord, DEFAULT_FLOW_CONCURRENCY};
pub use model::{load_flow, Flow, FlowStep, ForEachGroup, StepGroup};
pub use queue::WorkQueue;
