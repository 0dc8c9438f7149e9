//! Command-line options.
//!
//! Precedence: CLI argument, then the YAML file given with `--config`, then the
//! built-in defaults.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use volley_common::{Config, ConfigError, LogFormat, Settings};

#[derive(Parser, Debug, Default)]
#[command(name = "volley")]
#[command(version)]
#[command(about = "Pipelined TCP load generator", long_about = None)]
pub struct CliArgs {
    /// Path to a YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target hostname [default: 127.0.0.1]
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Target port [default: 4063]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Request path for the POST line [default: /openrtb]
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// JSON file used as the request body [default: request.json]
    #[arg(short, long)]
    pub request: Option<PathBuf>,

    /// Seconds to wait for a reply to each request [default: 5]
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// Seconds allowed for each connect attempt [default: 5]
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Number of connections to open [default: 2]
    #[arg(short, long)]
    pub connections: Option<usize>,

    /// Worker threads driving all connections [default: 2]
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Print per-connection diagnostics (true/false) [default: true]
    #[arg(short, long, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub logging: Option<bool>,

    /// Delay between waves, in milliseconds [default: 100]
    #[arg(short, long)]
    pub delay: Option<u64>,

    /// Requests sent on each connection [default: 5]
    #[arg(short, long)]
    pub volume: Option<u64>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output format (text or json) [default: text]
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Serve Prometheus metrics on this port for the duration of the run
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

impl CliArgs {
    /// Loads the optional config file and applies CLI overrides on top of it.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let mut config = match self.config.as_deref() {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        Settings::from_config(config)
    }

    fn apply(self, config: &mut Config) {
        let target = &mut config.target;
        if let Some(host) = self.host {
            target.host = host;
        }
        if let Some(port) = self.port {
            target.port = port;
        }
        if let Some(endpoint) = self.endpoint {
            target.endpoint = endpoint;
        }
        if let Some(request) = self.request {
            target.request_file = request;
        }

        let load = &mut config.load;
        if let Some(timeout) = self.timeout {
            load.response_timeout_secs = timeout;
        }
        if let Some(timeout) = self.connect_timeout {
            load.connect_timeout_secs = timeout;
        }
        if let Some(connections) = self.connections {
            load.connections = connections;
        }
        if let Some(threads) = self.threads {
            load.threads = threads;
        }
        if let Some(delay) = self.delay {
            load.delay_ms = delay;
        }
        if let Some(volume) = self.volume {
            load.waves = volume;
        }

        let logging = &mut config.logging;
        if let Some(enabled) = self.logging {
            logging.enabled = enabled;
        }
        if let Some(level) = self.log_level {
            logging.level = level;
        }
        if let Some(format) = self.log_format {
            logging.format = format;
        }

        if let Some(port) = self.metrics_port {
            config.metrics.enabled = true;
            config.metrics.port = port;
        }
    }
}
