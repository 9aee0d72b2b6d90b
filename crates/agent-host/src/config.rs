use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use url::Url;
use utils::version;

use crate::library::DEFAULT_LIBRARY_PATH;
use crate::session::BackupRequest;
use crate::session::RestoreRequest;
use crate::session::DEFAULT_BACKUP_DATA;
use crate::session::DEFAULT_BACKUP_PATH;
use crate::telemetry::TelemetryConfig;
use crate::telemetry::DEFAULT_OTLP_ENDPOINT;
use crate::telemetry::DEFAULT_SERVICE_NAME;

#[derive(Parser, Debug)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Defaults to `backup` with the built-in payload
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Back up a payload through the agent
    Backup(BackupArgs),
    /// Restore a backup through the agent
    Restore(RestoreArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    #[arg(
        long,
        global = true,
        env = "AGENT_LIBRARY_PATH",
        value_hint = clap::ValueHint::FilePath,
        default_value = DEFAULT_LIBRARY_PATH,
        help = "Path of the native agent library, relative to the working directory"
    )]
    pub library: PathBuf,

    #[arg(
        long,
        global = true,
        env = "OTEL_SERVICE_NAME",
        default_value = DEFAULT_SERVICE_NAME,
        value_parser = parse_service_name,
        help = "service.name reported to the telemetry backend"
    )]
    pub service_name: String,

    #[arg(
        long,
        global = true,
        env = "OTEL_EXPORTER_OTLP_ENDPOINT",
        default_value = DEFAULT_OTLP_ENDPOINT,
        value_parser = parse_endpoint,
        help = "OTLP/gRPC collector endpoint, e.g. http://localhost:4317"
    )]
    pub otlp_endpoint: String,

    #[arg(
        long,
        global = true,
        env = "AGENT_METRICS_EXPORT_INTERVAL",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between metric exports"
    )]
    pub export_interval_secs: u64,

    #[arg(
        long,
        global = true,
        env = "AGENT_ENABLE_TELEMETRY",
        help = "Enable metrics export",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enable_telemetry: bool,

    #[arg(
        long,
        global = true,
        env = "AGENT_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file"
    )]
    pub log_file: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.service_name.clone(),
            endpoint: self.otlp_endpoint.clone(),
            export_interval: Duration::from_secs(self.export_interval_secs),
            enabled: self.enable_telemetry,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BackupArgs {
    #[arg(
        long,
        default_value = DEFAULT_BACKUP_DATA,
        conflicts_with = "data_file",
        help = "Payload to back up"
    )]
    pub data: String,

    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        help = "Read the payload from a file instead of --data"
    )]
    pub data_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_BACKUP_PATH, help = "Where the agent stores the backup")]
    pub path: PathBuf,
}

impl Default for BackupArgs {
    fn default() -> Self {
        Self {
            data: DEFAULT_BACKUP_DATA.to_string(),
            data_file: None,
            path: PathBuf::from(DEFAULT_BACKUP_PATH),
        }
    }
}

impl BackupArgs {
    /// Resolves the payload, reading `--data-file` when given.
    pub fn into_request(self) -> std::io::Result<BackupRequest> {
        let data = match &self.data_file {
            Some(file) => std::fs::read(file)?,
            None => self.data.into_bytes(),
        };
        Ok(BackupRequest {
            data,
            path: self.path,
        })
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RestoreArgs {
    #[arg(long, help = "Backup to restore")]
    pub path: PathBuf,

    #[arg(long, help = "Destination of the restored payload")]
    pub dest: PathBuf,
}

impl From<RestoreArgs> for RestoreRequest {
    fn from(args: RestoreArgs) -> Self {
        Self {
            path: args.path,
            dest: args.dest,
        }
    }
}

fn parse_endpoint(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid endpoint `{raw}`: {e}"))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(raw.to_string()),
        "http" | "https" => Err(format!("endpoint `{raw}` has no host")),
        scheme => Err(format!(
            "endpoint `{raw}` must use http or https, not `{scheme}`"
        )),
    }
}

fn parse_service_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("service name must not be empty".to_string());
    }
    Ok(name.to_string())
}
