//! CLI command implementations
//!
//! `start` wires the broker together:
//! 1. Configuration load and validation
//! 2. Topic log registry over the data directory
//! 3. One writer worker thread per configured worker, on a shared context
//! 4. Wait for Ctrl-C (or for every worker to end on its own)
//! 5. Terminate the context, join the workers, sync every open log

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::log::{FileLogRegistry, FlushPolicy, LogConfig, LogRegistry};
use crate::observability::{log_event_with_fields, Event, WorkerMetrics};
use crate::transport::{Endpoint, TransportContext, DEFAULT_RECV_HWM};
use crate::writer::{WorkerExit, WorkerHandle, WriteMode, WriterResult, WriterWorker};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    /// Endpoint the workers connect to (optional, default tcp://127.0.0.1:5556)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Number of writer workers (optional, default 1)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Body framing: "single" or "bulk" (optional, default "single")
    #[serde(default)]
    pub mode: WriteMode,

    /// Prefix of worker routing identities (optional, default "writer")
    #[serde(default = "default_identity_prefix")]
    pub identity_prefix: String,

    /// Inbound high-water mark in frames (optional, default 2000)
    #[serde(default = "default_recv_hwm")]
    pub recv_hwm: usize,

    /// Segment size in bytes (optional, default 512MB)
    #[serde(default = "default_segment_size")]
    pub segment_size: u64,

    /// Messages between syncs (optional, default 1000)
    #[serde(default = "default_flush_messages")]
    pub flush_messages: u64,

    /// Maximum time between syncs in ms (optional, default 1000)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_endpoint() -> String {
    "tcp://127.0.0.1:5556".to_string()
}
fn default_workers() -> usize {
    1
}
fn default_identity_prefix() -> String {
    "writer".to_string()
}
fn default_recv_hwm() -> usize {
    DEFAULT_RECV_HWM
}
fn default_segment_size() -> u64 {
    536870912
} // 512MB
fn default_flush_messages() -> u64 {
    1000
}
fn default_flush_interval_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("endpoint", config.endpoint.as_str()),
                ("mode", config.mode.as_str()),
                ("path", path.to_string_lossy().as_ref()),
                ("workers", config.workers.to_string().as_str()),
            ],
        );

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> CliResult<()> {
        if self.data_dir.is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }

        Endpoint::parse(&self.endpoint)
            .map_err(|e| CliError::config_error(format!("Invalid endpoint: {}", e)))?;

        if self.workers == 0 {
            return Err(CliError::config_error("workers must be > 0"));
        }

        if self.identity_prefix.is_empty() {
            return Err(CliError::config_error("identity_prefix must not be empty"));
        }

        if self.recv_hwm == 0 {
            return Err(CliError::config_error("recv_hwm must be > 0"));
        }

        if self.segment_size == 0 {
            return Err(CliError::config_error("segment_size must be > 0"));
        }

        if self.flush_messages == 0 {
            return Err(CliError::config_error("flush_messages must be > 0"));
        }

        Ok(())
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    /// Storage settings for the topic log registry
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            segment_size: self.segment_size,
            flush: FlushPolicy::new(
                self.flush_messages,
                Duration::from_millis(self.flush_interval_ms),
            ),
        }
    }

    /// Routing identity of worker `index` within broker `instance`
    pub fn worker_identity(&self, instance: &Uuid, index: usize) -> String {
        let instance = instance.simple().to_string();
        format!("{}-{}-{}", self.identity_prefix, &instance[..8], index)
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let result = run_command(cli.command);
    if let Err(e) = &result {
        let _ = write_error(e.code_str(), e.message());
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Start { config } => start(&config),
    }
}

/// Create the data directory
///
/// Topic directories are created on first write.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let data_dir = config.data_path();

    if is_initialized(data_dir) {
        return Err(CliError::already_initialized());
    }

    fs::create_dir_all(data_dir).map_err(|e| {
        CliError::config_error(format!("Failed to create directory {:?}: {}", data_dir, e))
    })?;

    write_response(json!({
        "initialized": true,
        "data_dir": config.data_dir,
    }))?;

    Ok(())
}

/// Run writer workers until Ctrl-C or until every worker has ended
pub fn start(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let data_dir = config.data_path();

    if !is_initialized(data_dir) {
        return Err(CliError::not_initialized());
    }

    let instance = Uuid::new_v4();
    log_event_with_fields(
        Event::BrokerStart,
        &[
            ("data_dir", config.data_dir.as_str()),
            ("instance", instance.to_string().as_str()),
        ],
    );

    let registry = Arc::new(FileLogRegistry::new(data_dir, config.log_config()));
    let context = TransportContext::new();
    let metrics = Arc::new(WorkerMetrics::new());

    let handles = match spawn_workers(&config, &instance, &context, &registry, &metrics) {
        Ok(handles) => handles,
        Err(e) => {
            context.terminate();
            return Err(e);
        }
    };

    log_event_with_fields(
        Event::BrokerServing,
        &[("workers", handles.len().to_string().as_str())],
    );

    let exits = supervise(&context, handles)?;

    registry
        .flush_all()
        .map_err(|e| CliError::boot_failed(format!("Failed to sync topic logs: {}", e)))?;

    let mut workers = Vec::with_capacity(exits.len());
    let mut failures = Vec::new();
    for (identity, exit) in exits {
        match exit {
            Ok(exit) => workers.push(json!({"identity": identity, "exit": exit.as_str()})),
            Err(e) => {
                failures.push(format!("{}: {}", identity, e));
                workers.push(json!({"identity": identity, "error": e.to_string()}));
            }
        }
    }

    if !failures.is_empty() {
        return Err(CliError::worker_failed(failures.join("; ")));
    }

    write_response(json!({
        "instance": instance.to_string(),
        "topics": registry.topics(),
        "workers": Value::Array(workers),
        "metrics": metrics.snapshot(),
    }))?;

    Ok(())
}

fn spawn_workers(
    config: &Config,
    instance: &Uuid,
    context: &TransportContext,
    registry: &Arc<FileLogRegistry>,
    metrics: &Arc<WorkerMetrics>,
) -> CliResult<Vec<WorkerHandle>> {
    let registry: Arc<dyn LogRegistry> = registry.clone();
    let mut handles = Vec::with_capacity(config.workers);

    for index in 0..config.workers {
        let worker = WriterWorker::new(
            context,
            config.endpoint.clone(),
            config.worker_identity(instance, index),
            config.mode,
            Arc::clone(&registry),
        )
        .with_recv_hwm(config.recv_hwm)
        .with_metrics(Arc::clone(metrics));

        let handle = worker
            .spawn()
            .map_err(|e| CliError::boot_failed(format!("Failed to start worker: {}", e)))?;
        handles.push(handle);
    }

    Ok(handles)
}

type WorkerExits = Vec<(String, WriterResult<WorkerExit>)>;

/// Waits for Ctrl-C or for all workers, then collects every exit.
fn supervise(context: &TransportContext, handles: Vec<WorkerHandle>) -> CliResult<WorkerExits> {
    let (done_tx, mut done_rx) = oneshot::channel::<WorkerExits>();

    thread::Builder::new()
        .name("zper-supervisor".to_string())
        .spawn(move || {
            let exits = handles
                .into_iter()
                .map(|handle| {
                    let identity = handle.identity().to_string();
                    (identity, handle.join())
                })
                .collect();
            let _ = done_tx.send(exits);
        })
        .map_err(|e| CliError::boot_failed(format!("Failed to start supervisor: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    runtime.block_on(async {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                let reason = match signal {
                    Ok(()) => "signal".to_string(),
                    Err(e) => format!("signal handler failed: {}", e),
                };
                log_event_with_fields(Event::BrokerShutdown, &[("reason", reason.as_str())]);
                context.terminate();
                done_rx
                    .await
                    .map_err(|_| CliError::worker_failed("Supervisor ended without reporting"))
            }
            exits = &mut done_rx => {
                log_event_with_fields(Event::BrokerShutdown, &[("reason", "workers_ended")]);
                context.terminate();
                exits.map_err(|_| CliError::worker_failed("Supervisor ended without reporting"))
            }
        }
    })
}

fn is_initialized(data_dir: &Path) -> bool {
    data_dir.is_dir()
}
