//! ImageFS volume plugin binary.
//!
//! Stages the helper binary, connects to the container runtime and serves
//! the volume plugin protocol on a Unix domain socket.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use imagefs_core::DriverConfig;
use imagefs_plugin::{DriverContext, DriverSettings, LifecycleDriver, PluginServer};
use imagefs_runtime::{DockerGateway, StagedHelper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// ImageFS volume plugin
#[derive(Parser, Debug)]
#[command(name = "imagefs-plugin", version, about = "Container images as Docker volumes")]
struct Args {
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the plugin socket is created in.
    #[arg(long)]
    socket_dir: Option<PathBuf>,

    /// Plugin name (socket is <socket-dir>/<plugin-name>.sock).
    #[arg(long)]
    plugin_name: Option<String>,

    /// Host directory for the staged helper binary.
    #[arg(long)]
    runtime_dir: Option<PathBuf>,

    /// Helper binary to stage.
    #[arg(long)]
    helper_source: Option<PathBuf>,

    /// Number of `../` steps prepended to merged directories.
    #[arg(long)]
    mount_prefix_depth: Option<usize>,

    /// Grace period in seconds when stopping a backing container.
    #[arg(long)]
    stop_grace_secs: Option<u64>,

    /// Container runtime endpoint (unix:// or tcp://).
    #[arg(long)]
    docker_host: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(DriverConfig, LogFormat)> {
        let mut config = match self.config {
            Some(ref path) => DriverConfig::from_file(path)?,
            None => DriverConfig::default(),
        };

        if let Some(dir) = self.socket_dir {
            config.socket_dir = dir;
        }
        if let Some(name) = self.plugin_name {
            config.plugin_name = name;
        }
        if let Some(dir) = self.runtime_dir {
            config.runtime_dir = dir;
        }
        if let Some(source) = self.helper_source {
            config.helper_source = source;
        }
        if let Some(depth) = self.mount_prefix_depth {
            config.mount_prefix_depth = depth;
        }
        if let Some(secs) = self.stop_grace_secs {
            config.stop_grace_secs = secs;
        }
        if self.docker_host.is_some() {
            config.docker_host = self.docker_host;
        }

        config.validate()?;
        Ok((config, self.log_format))
    }
}

fn init_tracing(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, log_format) = Args::parse().into_config()?;
    init_tracing(&config.log_level, log_format);

    tracing::info!(
        version = imagefs_core::VERSION,
        socket = %config.socket_path().display(),
        runtime_dir = %config.runtime_dir.display(),
        "Starting ImageFS plugin"
    );

    let helper = StagedHelper::stage(&config).context("failed to stage helper binary")?;
    let gateway = DockerGateway::connect(&config)
        .await
        .context("failed to connect to container runtime")?;

    let driver = LifecycleDriver::new(
        DriverContext {
            gateway: Arc::new(gateway),
            helper,
        },
        DriverSettings::from(&config),
    );

    PluginServer::new(config.socket_path(), driver)
        .serve(shutdown_signal())
        .await?;

    Ok(())
}
