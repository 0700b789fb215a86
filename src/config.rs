//! Configuration module for hello-dispatch.
//!
//! Listener settings come from a Java-style properties document. The
//! packaged `app.properties` is compiled into the binary and used unless a
//! different file is named on the command line.

use clap::Parser;
use java_properties::PropertiesError;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Properties shipped with the binary.
const PACKAGED_PROPERTIES: &str = include_str!("../resources/app.properties");

/// Command-line arguments for the listener
#[derive(Parser, Debug)]
#[command(name = "hello-dispatch")]
#[command(author = "hello-dispatch authors")]
#[command(version = "0.1.0")]
#[command(about = "A thread-pool TCP listener with a fixed greeting", long_about = None)]
pub struct CliArgs {
    /// Path to a properties file (defaults to the packaged app.properties)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Key/value store parsed from a properties document.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    properties: HashMap<String, String>,
}

impl AppConfig {
    /// Load the properties file at `path`, or the packaged defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let file =
                    File::open(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
                Self::from_reader(file)
            }
            None => Self::parse(PACKAGED_PROPERTIES),
        }
    }

    /// Read a whole properties document from `reader`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let properties = java_properties::read(reader).map_err(ConfigError::Parse)?;
        Ok(Self { properties })
    }

    /// Parse a properties document held in memory.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        Self::from_reader(input.as_bytes())
    }

    /// Raw string value of `key`.
    pub fn property(&self, key: &str) -> Result<&str, ConfigError> {
        self.properties
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// Value of `key` parsed as a base-10 32-bit integer.
    pub fn property_int(&self, key: &str) -> Result<i32, ConfigError> {
        self.property(key)?
            .parse()
            .map_err(|_| ConfigError::NotInteger(key.to_string()))
    }
}

/// Settings for the acceptor and the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// TCP port to listen on
    pub port: u16,
    /// OS accept backlog and hand-off queue capacity
    pub backlog: usize,
    /// Number of worker threads
    pub threads: usize,
}

impl ListenerConfig {
    /// Read `port`, `backlog` and `threads` from `app`.
    pub fn from_app_config(app: &AppConfig) -> Result<Self, ConfigError> {
        let port = app.property_int("port")?;
        let port = u16::try_from(port).map_err(|_| ConfigError::OutOfRange {
            key: "port".to_string(),
            value: port,
        })?;

        Ok(ListenerConfig {
            port,
            backlog: positive(app, "backlog")?,
            threads: positive(app, "threads")?,
        })
    }
}

fn positive(app: &AppConfig, key: &str) -> Result<usize, ConfigError> {
    let value = app.property_int(key)?;
    match usize::try_from(value) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::OutOfRange {
            key: key.to_string(),
            value,
        }),
    }
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listener: ListenerConfig,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and the selected properties file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();
        let app = AppConfig::load(cli.config.as_deref())?;

        Ok(Config {
            listener: ListenerConfig::from_app_config(&app)?,
            log_level: cli.log_level,
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    Parse(PropertiesError),
    Missing(String),
    NotInteger(String),
    OutOfRange { key: String, value: i32 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::Parse(e) => write!(f, "Failed to parse properties: {e}"),
            ConfigError::Missing(key) => write!(f, "Property {key} doesn't exist"),
            ConfigError::NotInteger(key) => write!(f, "Property {key} is not an integer"),
            ConfigError::OutOfRange { key, value } => {
                write!(f, "Property {key} has unusable value {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
