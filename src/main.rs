//! Promaly CLI
//!
//! Runs one Prometheus range query and writes the rendered result.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use promaly::config::{generate_default_config, Config, LoggingConfig};
use promaly::{query_range, render, write_output, OutputTarget};

#[derive(Parser, Debug)]
#[command(name = "promaly")]
#[command(about = "Query a Prometheus range and render the result")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Prometheus server URL [default: http://localhost:9090]
    #[arg(long)]
    server: Option<String>,

    /// Basic auth user
    #[arg(long)]
    user: Option<String>,

    /// Basic auth password
    #[arg(long)]
    password: Option<String>,

    /// PromQL expression [default: up]
    #[arg(long)]
    query: Option<String>,

    /// Range start: timestamp, date or phrase such as "1 hour ago" [default: 1 hour ago]
    #[arg(long, allow_hyphen_values = true)]
    start: Option<String>,

    /// Range end; empty means now
    #[arg(long, allow_hyphen_values = true)]
    end: Option<String>,

    /// Sampling step ("30s", "1m", "1h30m"); 0 derives it from the range [default: 1m]
    #[arg(long)]
    step: Option<String>,

    /// Query deadline in seconds [default: 120]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Title for json and table output [default: Prometheus metrics]
    #[arg(long)]
    title: Option<String>,

    /// Output format: csv, json, ndjson or table [default: csv]
    #[arg(long)]
    format: Option<String>,

    /// Output path, extension appended; "-" for stdout, "" to skip [default: ./graph]
    #[arg(long)]
    file: Option<String>,

    /// Config file (default: search the standard locations)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,

    /// Print version information and exit
    #[arg(long)]
    version: bool,
}

impl Cli {
    /// Flags win over file and environment
    fn apply(&self, config: &mut Config) {
        let overrides = [
            (&self.server, &mut config.server.url),
            (&self.user, &mut config.server.user),
            (&self.password, &mut config.server.password),
            (&self.query, &mut config.query.expression),
            (&self.start, &mut config.query.start),
            (&self.end, &mut config.query.end),
            (&self.step, &mut config.query.step),
            (&self.title, &mut config.output.title),
            (&self.format, &mut config.output.format),
            (&self.file, &mut config.output.file),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }

        if let Some(secs) = self.timeout {
            config.server.timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!(
            "promaly v{} {} {}",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        return ExitCode::SUCCESS;
    }

    if cli.print_config {
        print!("{}", generate_default_config());
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = report(&e);
            tracing::error!("{}", message);
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let source = cli.config.clone().or_else(Config::find_default);
    let mut config = match &source {
        Some(path) => Config::load_with_env(path)?,
        None => Config::from_env()?,
    };
    cli.apply(&mut config);

    init_logging(&config.logging)?;

    match &source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::debug!("Using default config with environment overrides"),
    }

    let format = config.output_format()?;
    let query = config.range_query()?;

    let outcome = query_range(&config.executor_config()?, &query).await?;
    tracing::info!(
        "Fetched {} series for {} ({})",
        outcome.matrix.len(),
        outcome.request.expression,
        outcome.request.range
    );

    let Some(target) = OutputTarget::from_file(&config.output.file, format) else {
        tracing::info!("No output file configured, skipping write");
        return Ok(());
    };

    let bytes = render(&outcome.matrix, &config.output.title, format)
        .with_context(|| format!("failed to render {} output", format))?;
    write_output(&target, &bytes).with_context(|| match target.path() {
        Some(path) => format!("failed to write {}", path.display()),
        None => "failed to write to stdout".to_string(),
    })?;

    Ok(())
}

/// Join the error chain, skipping causes already spelled out by their parent
fn report(err: &anyhow::Error) -> String {
    let mut out = String::new();
    for cause in err.chain() {
        let message = cause.to_string();
        if out.contains(&message) {
            continue;
        }
        if !out.is_empty() {
            out.push_str(": ");
        }
        out.push_str(&message);
    }
    out
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()));

    let writer = match &logging.file {
        Some(file) => BoxMakeWriter::new(std::sync::Mutex::new(open_log_file(Path::new(file))?)),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }

    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
