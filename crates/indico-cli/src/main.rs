//! Indico connector CLI
//!
//! Runs the connector's blocking entry points from the command line. Results
//! are printed to stdout as text; logs go to stderr.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indico_connector::{Connector, ConnectorConfig};
use indico_graphql::HttpClientFactory;
use tracing_subscriber::EnvFilter;

/// Indico connector - submit documents and collect results from Indico
/// workflows.
#[derive(Parser, Debug)]
#[command(name = "indico")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: indico-connector.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Indico API token
    #[arg(long, env = "INDICO_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Indico host, e.g. <https://app.indico.io>
    #[arg(long, env = "INDICO_HOST", global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit documents to a workflow and print the new submission ids
    Submit {
        /// Workflow to submit to
        #[arg(long)]
        workflow_id: i64,

        /// Local file to upload (repeatable)
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<String>,

        /// URL the service downloads a document from (repeatable)
        #[arg(long = "url", value_name = "URL")]
        urls: Vec<String>,
    },

    /// List submissions as JSON
    List {
        /// Submission id to include (repeatable)
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<i64>,

        /// Workflow id to include (repeatable)
        #[arg(long = "workflow-id", value_name = "ID")]
        workflow_ids: Vec<i64>,

        /// Exact input file name
        #[arg(long)]
        input_filename: Option<String>,

        /// Submission status, e.g. COMPLETE
        #[arg(long)]
        status: Option<String>,

        /// "true" or "false"
        #[arg(long)]
        retrieved: Option<String>,

        /// Maximum number of submissions (default from config)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Wait for a submission and print its result as JSON
    #[command(name = "result")]
    SubmissionResult {
        /// Submission to wait for
        submission_id: i64,

        /// Wait for this status instead of for results
        #[arg(long)]
        check_status: Option<String>,

        /// Interval between checks in milliseconds (default from config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Overall timeout in milliseconds (default from config)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Submit a review and print the job result as JSON
    Review {
        /// Submission to review
        submission_id: i64,

        /// Corrected results as JSON text
        #[arg(long)]
        changes: Option<String>,

        /// Reject the submission
        #[arg(long)]
        reject: bool,

        /// Force the submission to complete
        #[arg(long, value_name = "BOOL")]
        force_complete: Option<bool>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> anyhow::Result<String> {
    let config = load_config(args.config.as_deref())?;
    let factory = HttpClientFactory::from_config(&config);
    let connector = Arc::new(Connector::new(config, factory)?);
    install_interrupt_handler(&connector);

    let token = args.token.ok_or_else(|| {
        anyhow::anyhow!("No API token provided\n\nSuggestion: Pass --token or set INDICO_TOKEN")
    })?;
    let host = args.host.ok_or_else(|| {
        anyhow::anyhow!("No host provided\n\nSuggestion: Pass --host or set INDICO_HOST")
    })?;
    connector.init(&token, &host)?;

    let output = match args.command {
        Command::Submit {
            workflow_id,
            files,
            urls,
        } => {
            let ids = connector.workflow_submission(Some(&files), Some(&urls), workflow_id)?;
            format!("{ids:?}")
        }
        Command::List {
            ids,
            workflow_ids,
            input_filename,
            status,
            retrieved,
            limit,
        } => connector.list_submissions(
            Some(&ids),
            Some(&workflow_ids),
            input_filename.as_deref(),
            status.as_deref(),
            retrieved.as_deref(),
            limit,
        )?,
        Command::SubmissionResult {
            submission_id,
            check_status,
            interval_ms,
            timeout_ms,
        } => connector.submission_result(
            submission_id,
            check_status.as_deref(),
            interval_ms,
            timeout_ms,
        )?,
        Command::Review {
            submission_id,
            changes,
            reject,
            force_complete,
        } => connector.submit_review(submission_id, changes.as_deref(), reject, force_complete)?,
    };

    Ok(output)
}

/// Loads configuration, requiring the file to exist when given explicitly.
fn load_config(config_path: Option<&str>) -> anyhow::Result<ConnectorConfig> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            ConnectorConfig::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => ConnectorConfig::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Routes Ctrl+C to the connector so a waiting call ends as cancelled.
fn install_interrupt_handler(connector: &Arc<Connector>) {
    let connector = Arc::clone(connector);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal, cancelling...");
        connector.cancel_all();
    }) {
        tracing::warn!(error = %e, "Failed to install interrupt handler");
    }
}
