#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// sentrygate-cli/src/main.rs
// ============================================================================
// Module: Sentry Gate CLI Entry Point
// Description: Command dispatcher for running the gateway and operating on
// a deployed pipeline (rule validation, queue recovery, config checks).
// Purpose: Provide the single operator-facing binary for the safety
// enforcement pipeline.
// Dependencies: clap, sentrygate-cli, sentrygate-config, sentrygate-core,
// sentrygate-gateway, tokio
// ============================================================================

//! ## Overview
//! Every subcommand loads a [`SafetyConfig`] before doing anything else,
//! and every subcommand that fails to load or validate it exits non-zero
//! without falling back to a default: configuration failures are always
//! fatal, never silently tolerated (`spec.md` §5, "fail-closed
//! configuration").

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use sentrygate_config::SafetyConfig;
use sentrygate_core::CoordinationStore;
use sentrygate_gateway::CONSUMER_GROUP;
use sentrygate_gateway::Worker;
use sentrygate_gateway::WorkerConfig;
use thiserror::Error;
use tokio::sync::watch;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "sentrygate", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and its worker pool.
    Serve(ServeCommand),
    /// Rule engine maintenance.
    Rules {
        /// Selected rules subcommand.
        #[command(subcommand)]
        command: RulesCommand,
    },
    /// Inference queue maintenance.
    Queue {
        /// Selected queue subcommand.
        #[command(subcommand)]
        command: QueueCommand,
    },
    /// Configuration maintenance.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to `sentrygate.toml` or the
    /// `SENTRYGATE_CONFIG` environment variable).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Rule engine subcommands.
#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Validates an operator-authored rule file without starting the
    /// gateway.
    Validate(RulesValidateCommand),
}

/// Arguments for `rules validate`.
#[derive(Args, Debug)]
struct RulesValidateCommand {
    /// Optional config file path; the rule file is read from
    /// `[rules] file_path` in this config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Queue subcommands.
#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// Claims messages that have sat unacknowledged past `min_idle_ms` and
    /// redelivers them to a recovery consumer (`spec.md` §4.15).
    ReplayPending(QueueReplayPendingCommand),
}

/// Arguments for `queue replay-pending`.
#[derive(Args, Debug)]
struct QueueReplayPendingCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Minimum idle time, in milliseconds, before a pending entry is
    /// eligible for reclaim.
    #[arg(long, default_value_t = 30_000)]
    min_idle_ms: u64,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Loads and validates configuration, printing a summary.
    Check(ConfigCheckCommand),
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from `message`.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Rules {
            command: RulesCommand::Validate(command),
        } => command_rules_validate(&command),
        Commands::Queue {
            command: QueueCommand::ReplayPending(command),
        } => command_queue_replay_pending(command).await,
        Commands::Config {
            command: ConfigCommand::Check(command),
        } => command_config_check(&command),
    }
}

// ============================================================================
// SECTION: serve
// ============================================================================

/// Executes the `serve` command: assembles the pipeline, spawns the
/// worker pool, and runs the HTTP gateway until `SIGINT`/`SIGTERM`.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let worker_count = config.server.worker_count;
    let pipeline = sentrygate_cli::build_pipeline(config).map_err(|err| CliError::new(err.to_string()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handles = Vec::with_capacity(worker_count);
    for index in 0..worker_count {
        let worker = Worker::new(
            format!("worker-{index}"),
            pipeline.store.clone(),
            pipeline.audit.clone(),
            pipeline.sandbox.clone(),
            pipeline.postcheck.clone(),
            pipeline.escalation.clone(),
            pipeline.governor.clone(),
            WorkerConfig::default(),
        );
        let worker_shutdown = shutdown_rx.clone();
        worker_handles.push(tokio::spawn(async move {
            worker.run(worker_shutdown).await;
        }));
    }

    let serve_shutdown = shutdown_rx.clone();
    let serve_handle = tokio::spawn(pipeline.state.serve(serve_shutdown));

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);

    for handle in worker_handles {
        let _ = handle.await;
    }
    match serve_handle.await {
        Ok(Ok(())) => Ok(ExitCode::SUCCESS),
        Ok(Err(err)) => Err(CliError::new(err)),
        Err(err) => Err(CliError::new(format!("gateway task panicked: {err}"))),
    }
}

/// Resolves once `SIGINT` (or, on Unix, `SIGTERM`) is received.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let Ok(mut signal) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            std::future::pending::<()>().await;
            return;
        };
        signal.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

// ============================================================================
// SECTION: rules validate
// ============================================================================

/// Executes `rules validate`: loads the configured rule file (if any) and
/// merges it over the built-in set, reporting the resulting rule count.
fn command_rules_validate(command: &RulesValidateCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let engine = sentrygate_cli::build_rule_engine(&config);
    write_stdout_line(&format!(
        "rules ok: version={} file={}",
        engine.version().as_str(),
        config.rules.file_path.as_ref().map_or_else(|| "<none>".to_string(), |p| p.display().to_string()),
    ))
    .map_err(|err| CliError::new(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: queue replay-pending
// ============================================================================

/// Executes `queue replay-pending`: claims stale pending entries from the
/// worker consumer group and reports what was reclaimed so a restarted
/// worker pool picks them up on its next `read_stream` call.
async fn command_queue_replay_pending(command: QueueReplayPendingCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let pipeline = sentrygate_cli::build_pipeline(config).map_err(|err| CliError::new(err.to_string()))?;

    let claimed = pipeline
        .store
        .claim_pending(CONSUMER_GROUP, "replay-pending-cli", command.min_idle_ms)
        .await
        .map_err(|err| CliError::new(format!("failed to claim pending entries: {err}")))?;

    write_stdout_line(&format!("reclaimed {} pending message(s)", claimed.len())).map_err(|err| CliError::new(err.to_string()))?;
    for (entry_id, message) in claimed {
        write_stdout_line(&format!(
            "  entry={entry_id} request_id={} user_id={}",
            message.request_id.as_str(),
            message.user_id.as_str()
        ))
        .map_err(|err| CliError::new(err.to_string()))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: config check
// ============================================================================

/// Executes `config check`: loads and validates configuration, printing a
/// short summary of the resolved settings an operator would want to
/// confirm before a deploy.
fn command_config_check(command: &ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    write_stdout_line(&format!(
        "config ok: bind={} workers={} coordination_store={} audit_store={}",
        config.server.bind,
        config.server.worker_count,
        coordination_store_label(&config),
        config.audit_store.path.display(),
    ))
    .map_err(|err| CliError::new(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

/// Human-readable label for the configured coordination store backend.
fn coordination_store_label(config: &SafetyConfig) -> &'static str {
    match &config.coordination_store {
        sentrygate_config::CoordinationStoreConfig::InMemory => "in_memory",
        sentrygate_config::CoordinationStoreConfig::Redis { .. } => "redis",
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Loads and validates configuration, wrapping the underlying error in a
/// [`CliError`].
fn load_config(path: Option<&std::path::Path>) -> CliResult<SafetyConfig> {
    SafetyConfig::load(path).map_err(|err| CliError::new(format!("configuration error: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
