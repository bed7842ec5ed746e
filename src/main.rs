use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use lynn::{
    config::{load_config, Settings},
    executor::{print_error, HttpExecutor},
    session::Session,
    shell::{report_flow, report_outcome, run_shell},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "lynn",
    version,
    about = "Run declarative HTTP requests, capture values and chain them into flows",
    disable_help_subcommand = true
)]
struct Cli {
    /// Directory or file containing lynn.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding requests, environment, flows and logs
    #[arg(short = 'w', long, global = true)]
    working_folder: Option<PathBuf>,

    /// Project folder inside the working folder
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Comma separated environment names to load
    #[arg(short, long, global = true)]
    env: Option<String>,

    /// Save every response under the log folder
    #[arg(long, global = true)]
    auto_save: bool,

    /// Verbose logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a single request
    Request { name: String },
    /// Execute a request once per element of an environment array
    ForEach { variable: String, request: String },
    /// Execute a request for every pair of environment files
    Matrix {
        request: String,
        xaxis: String,
        yaxis: String,
    },
    /// Run a flow file
    Flow { name: String },
    /// List the available requests
    Requests,
    /// Start the interactive shell
    Shell,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        print_error(format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = resolve_settings(&cli)?;
    let executor = Arc::new(HttpExecutor::new(settings.timeout)?);
    let mut session = Session::initialize(&settings, executor)?;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Request { name } => report_outcome(&session.run_request(&name).await?),
        Commands::ForEach { variable, request } => {
            for outcome in session.for_each(&variable, &request).await? {
                report_outcome(&outcome);
            }
        }
        Commands::Matrix {
            request,
            xaxis,
            yaxis,
        } => {
            for outcome in session.matrix(&request, &xaxis, &yaxis).await? {
                report_outcome(&outcome);
            }
        }
        Commands::Flow { name } => report_flow(&session.run_flow(&name).await?),
        Commands::Requests => {
            for (name, summary) in session.requests() {
                println!("{} - {}", name.yellow(), summary.unwrap_or_default());
            }
        }
        Commands::Shell => run_shell(&mut session).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LYNN_LOG").unwrap_or_else(|_| filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Defaults, then lynn.json, then command line flags.
fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let config_target = cli
        .config
        .as_ref()
        .map(|path| resolve_relative(&cwd, path))
        .unwrap_or_else(|| cwd.clone());
    let loaded = load_config(&config_target).context("loading configuration")?;

    let mut settings = Settings::new(default_working_folder());
    if let Some(loaded) = &loaded {
        settings = settings.apply(&loaded.config);
    }

    if let Some(folder) = &cli.working_folder {
        settings.working_folder = resolve_relative(&cwd, folder);
    }
    if cli.project.is_some() {
        settings.project = cli.project.clone();
    }
    if cli.env.is_some() {
        settings.environment = cli.env.clone();
    }
    if cli.auto_save {
        settings.auto_save = true;
    }
    Ok(settings)
}

fn default_working_folder() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".lynn"))
        .unwrap_or_else(|| PathBuf::from(".lynn"))
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
