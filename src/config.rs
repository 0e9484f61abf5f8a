//! Configuration management for cdp-pilot
//!
//! The core components receive their inputs explicitly (`LaunchOptions`,
//! discovery base URL); `Config` is a convenience layer for binaries and
//! tests that want to assemble those inputs from the environment or a file.

use crate::supervisor::LaunchOptions;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Browser and endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote debugging host
    pub remote_host: String,

    /// Remote debugging port
    pub remote_port: u16,

    /// Chrome executable path
    pub chrome_binary: String,

    /// Dedicated Chrome profile directory
    pub user_data_dir: PathBuf,

    /// Run Chrome headless
    pub headless: bool,

    /// Shell-style extra argument string appended to the launch command
    pub extra_args: String,

    /// Seconds to wait for the debugging endpoint after launch
    pub startup_timeout_secs: u64,

    /// Whether the supervisor may spawn Chrome itself
    pub manage_process: bool,

    /// Whether a supervisor-launched Chrome is shut down on scope exit
    pub auto_close: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_host: "127.0.0.1".to_string(),
            remote_port: 9222,
            chrome_binary: default_chrome_binary().to_string(),
            user_data_dir: PathBuf::from("chrome-profile"),
            headless: true,
            extra_args: String::new(),
            startup_timeout_secs: 40,
            manage_process: true,
            auto_close: true,
        }
    }
}

fn default_chrome_binary() -> &'static str {
    if cfg!(target_os = "windows") {
        "C:/Program Files/Google/Chrome/Application/chrome.exe"
    } else if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
    } else {
        "google-chrome"
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(host) = env::var("PILOT_REMOTE_HOST") {
            config.remote_host = host;
        }

        if let Ok(port) = env::var("PILOT_REMOTE_PORT") {
            config.remote_port = port
                .parse()
                .map_err(|_| Error::configuration("Invalid PILOT_REMOTE_PORT"))?;
        }

        if let Ok(binary) = env::var("PILOT_CHROME_BINARY") {
            config.chrome_binary = binary;
        }

        if let Ok(dir) = env::var("PILOT_USER_DATA_DIR") {
            config.user_data_dir = PathBuf::from(dir);
        }

        if let Ok(headless) = env::var("PILOT_HEADLESS") {
            config.headless = parse_bool(&headless)
                .ok_or_else(|| Error::configuration("Invalid PILOT_HEADLESS"))?;
        }

        if let Ok(extra) = env::var("PILOT_EXTRA_ARGS") {
            config.extra_args = extra;
        }

        if let Ok(timeout) = env::var("PILOT_STARTUP_TIMEOUT") {
            config.startup_timeout_secs = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid PILOT_STARTUP_TIMEOUT"))?;
        }

        if let Ok(manage) = env::var("PILOT_MANAGE_PROCESS") {
            config.manage_process = parse_bool(&manage)
                .ok_or_else(|| Error::configuration("Invalid PILOT_MANAGE_PROCESS"))?;
        }

        if let Ok(auto_close) = env::var("PILOT_AUTO_CLOSE") {
            config.auto_close = parse_bool(&auto_close)
                .ok_or_else(|| Error::configuration("Invalid PILOT_AUTO_CLOSE"))?;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// HTTP base URL of the discovery endpoints
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.remote_host, self.remote_port)
    }

    /// Assemble explicit launch options for the supervisor
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            binary: self.chrome_binary.clone(),
            user_data_dir: self.user_data_dir.clone(),
            host: self.remote_host.clone(),
            port: self.remote_port,
            headless: self.headless,
            extra_args: self.extra_args.clone(),
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
            manage_process: self.manage_process,
            auto_close: self.auto_close,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
