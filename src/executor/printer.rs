use colored::{Color, Colorize};
use serde_json::Value;

use super::models::ExecutionResult;

/// One line summary: `title [status] Nms`.
pub fn format_summary(title: &str, result: &ExecutionResult) -> String {
    let status = format!("[{}]", result.status_label()).color(status_color(result.status_code));
    format!(
        "{} {} {}",
        title.bold(),
        status,
        format!("{}ms", result.response_time).dimmed()
    )
}

pub fn print_execution_result(title: &str, result: &ExecutionResult) {
    println!("{}", format_summary(title, result));
    if let Some(error) = &result.error {
        println!("{}", error.red());
    }
}

/// Pretty JSON in yellow, as the shell shows query and response output.
pub fn print_value(value: &Value) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    println!("{}", rendered.yellow());
}

pub fn print_error(message: impl std::fmt::Display) {
    eprintln!("{}", message.to_string().red());
}

fn status_color(status: Option<u16>) -> Color {
    match status {
        None => Color::Red,
        Some(status) if status >= 400 => Color::Red,
        Some(status) if status >= 300 => Color::Yellow,
        Some(_) => Color::Green,
    }
}
