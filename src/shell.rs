use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    env::value_to_string,
    executor::{print_error, print_execution_result, print_value},
    flow::FlowReport,
    session::Session,
    workspace::Outcome,
};

const PROMPT: &str = "lynn> ";

const HELP: &[(&str, &str)] = &[
    ("request <name>", "Execute a request"),
    ("forEach <variable> <request>", "Execute a request once per array element"),
    ("matrix <request> <xaxis> <yaxis>", "Execute a request for every pair of environments"),
    ("flow <name>", "Run a flow file"),
    ("environment [names]", "Merge environment files, or show the environment"),
    ("set <variable> <value>", "Set a value in the environment"),
    ("setArray <variable>", "Make an environment entry an empty array"),
    ("append <variable> <value>", "Append a value to an environment array"),
    ("reset", "Clear the environment and the last response"),
    ("autoSave [true|false]", "Turn saving of responses on or off"),
    ("query <expression>", "Query the last response"),
    ("response [key]", "Show the last response"),
    ("save", "Save the last response to the log folder"),
    ("schema", "List the JSON pointers in the last response body"),
    ("requests", "List the available requests"),
    ("config", "Show the current settings"),
    ("help", "Show this list"),
    ("quit", "Leave the shell"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run_shell(session: &mut Session) -> Result<()> {
    let info = session.project_info().clone();
    if let Some(title) = &info.title {
        println!("{}", title.yellow());
    }
    if let Some(description) = &info.description {
        println!("{}", description.yellow());
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match execute_line(session, &line).await {
            Ok(Control::Quit) => break,
            Ok(Control::Continue) => {}
            Err(err) => print_error(format!("{:#}", err)),
        }
    }

    Ok(())
}

/// Runs one shell command line against `session`.
pub async fn execute_line(session: &mut Session, line: &str) -> Result<Control> {
    let words = shell_words::split(line).map_err(|err| anyhow!("{}", err))?;
    let Some((command, args)) = words.split_first() else {
        return Ok(Control::Continue);
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match (command.as_str(), args.as_slice()) {
        ("request", [name]) => report_outcome(&session.run_request(name).await?),
        ("forEach", [variable, request]) => {
            for outcome in session.for_each(variable, request).await? {
                report_outcome(&outcome);
            }
        }
        ("matrix", [request, x_axis, y_axis]) => {
            for outcome in session.matrix(request, x_axis, y_axis).await? {
                report_outcome(&outcome);
            }
        }
        ("flow", [name]) => report_flow(&session.run_flow(name).await?),
        ("environment", []) => {
            for (key, value) in session.environment().iter() {
                println!("{}", format!("{}: {}", key, value_to_string(value)).yellow());
            }
        }
        ("environment", [names]) => {
            let files = session.load_environment(names)?;
            println!("{}", format!("Loaded {} environment file(s)", files.len()).yellow());
        }
        ("set", [variable, value]) => {
            session.set(variable, *value);
            println!("{}", format!("{} set to {}", variable, value).yellow());
        }
        ("setArray", [variable]) => {
            session.set_array(variable);
            println!("{}", format!("{} set to an empty array", variable).yellow());
        }
        ("append", [variable, value]) => {
            session.append(variable, *value)?;
            println!("{}", format!("Appended {} to array {}", value, variable).yellow());
        }
        ("reset", []) => session.reset(),
        ("autoSave", rest) if rest.len() <= 1 => {
            if let Some(flag) = rest.first() {
                session.set_auto_save(*flag == "true");
            }
            println!("{}", format!("AutoSave enabled: {}", session.auto_save()).yellow());
        }
        ("query", [expression]) => print_value(&session.query(expression)?.unwrap_or(Value::Null)),
        ("response", []) => print_value(&session.response(None)?),
        ("response", [key]) => print_value(&session.response(Some(key))?),
        ("save", []) => {
            let path = session.save()?;
            println!("{}", format!("Response saved to {}", path.display()).green());
        }
        ("schema", []) => {
            for path in session.schema()? {
                println!("{}", path.yellow());
            }
        }
        ("requests", []) => {
            for (name, summary) in session.requests() {
                println!("{} - {}", name.yellow(), summary.unwrap_or_default());
            }
        }
        ("config", []) => {
            println!(
                "{}",
                format!("Working Folder: {}", session.working_folder().display()).yellow()
            );
            println!("{}", format!("Auto Save is {}", session.auto_save()).yellow());
        }
        ("help", []) => {
            for (usage, description) in HELP {
                println!("{:<36} {}", usage.bold(), description);
            }
        }
        ("quit" | "exit", []) => return Ok(Control::Quit),
        (command, _) => {
            if HELP.iter().any(|(usage, _)| usage.split(' ').next() == Some(command)) {
                bail!("wrong arguments for {}, see help", command);
            }
            bail!("unknown command {}, see help", command);
        }
    }

    Ok(Control::Continue)
}

pub fn report_outcome(outcome: &Outcome) {
    print_execution_result(&outcome.request.title, &outcome.result);
    if let Some(path) = &outcome.log_file {
        println!("{}", format!("saved {}", path.display()).dimmed());
    }
}

pub fn report_flow(report: &FlowReport) {
    for step in &report.executed {
        print_execution_result(&format!("--> {}", step.request), &step.result);
    }
    for name in &report.skipped {
        print_error(format!("unable to find request {}", name));
    }
    for (name, error) in &report.failed {
        print_error(format!("{}: {}", name, error));
    }
}
