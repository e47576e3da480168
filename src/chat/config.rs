//! Configuration for the client.
//!
//! Two layers: [`CliArgs`] are the optional command-line overrides parsed via
//! `arrrg`, and [`Config`] is the record persisted between runs at
//! `~/.revolt-cli-config.json`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::{Deserialize, Serialize};

use crate::client::{DEFAULT_API_URL, DEFAULT_AUTUMN_URL, DEFAULT_WS_URL};
use crate::error::{Error, Result};

/// File name of the persisted config inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".revolt-cli-config.json";

/// Default number of history messages fetched when joining a channel.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Largest history page the API serves.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Command-line arguments for revolt-cli.  All are optional.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Path of the persisted config file.
    #[arrrg(optional, "Config file (default: ~/.revolt-cli-config.json)", "PATH")]
    pub config: Option<String>,

    /// REST endpoint.
    #[arrrg(optional, "REST API base URL", "URL")]
    pub api_url: Option<String>,

    /// Event connection endpoint.
    #[arrrg(optional, "WebSocket event URL", "URL")]
    pub ws_url: Option<String>,

    /// File server endpoint.
    #[arrrg(optional, "File server base URL", "URL")]
    pub autumn_url: Option<String>,

    /// Per-request REST timeout.
    #[arrrg(optional, "REST request timeout in seconds (default: none)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Write diagnostics to a file instead of stderr.
    #[arrrg(optional, "Append diagnostics to this file", "PATH")]
    pub log_file: Option<String>,
}

/// Resolved process options.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config_path: PathBuf,
    pub api_url: String,
    pub ws_url: String,
    pub autumn_url: String,
    pub timeout: Option<Duration>,
    pub use_color: bool,
    pub log_file: Option<PathBuf>,
}

impl From<CliArgs> for CliOptions {
    fn from(args: CliArgs) -> Self {
        CliOptions {
            config_path: args
                .config
                .map(PathBuf::from)
                .unwrap_or_else(default_config_path),
            api_url: args.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            ws_url: args.ws_url.unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
            autumn_url: args
                .autumn_url
                .unwrap_or_else(|| DEFAULT_AUTUMN_URL.to_string()),
            timeout: args.timeout.map(Duration::from_secs),
            use_color: !args.no_color,
            log_file: args.log_file.map(PathBuf::from),
        }
    }
}

/// `~/.revolt-cli-config.json`, or the working directory when there is no home.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

/// The persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Session token from the last login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Server picked last time; the default at the server prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_server_id: Option<String>,

    /// Channel picked last time; the default at the channel prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_channel_id: Option<String>,

    /// Whether output is colored.
    #[serde(default = "default_color")]
    pub color: bool,

    /// Messages fetched when joining a channel.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_color() -> bool {
    true
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            last_server_id: None,
            last_channel_id: None,
            color: default_color(),
            history_limit: default_history_limit(),
        }
    }
}

/// Reads and writes [`Config`] at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record.  A missing or malformed file yields the defaults.
    pub fn load(&self) -> Config {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!(path = %self.path.display(), "no config loaded: {err}");
                return Config::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "ignoring malformed config: {err}");
                Config::default()
            }
        }
    }

    /// Writes the record, replacing the file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, text)
            .map_err(|err| Error::io(format!("failed to write {}", self.path.display()), err))
    }

    /// Removes the saved token, keeping everything else.
    pub fn clear_token(&self) -> Result<()> {
        let mut config = self.load();
        config.token = None;
        self.save(&config)
    }
}
