mod models;
#[cfg(feature = "cli")]
mod printer;
mod runner;
mod writer;

pub use models::{decode_body, ExecutionResult};
#[cfg(feature = "cli")]
pub use printer::{format_summary, print_error, print_execution_result, print_value};
pub use runner::{request_url, HttpExecutor, RequestExecutor, DEFAULT_TIMEOUT};
pub use writer::write_response_log;
