//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "hireboard";
const ENV_PREFIX: &str = "HIREBOARD";
const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Command-line arguments for the Hireboard binary.
#[derive(Debug, Parser)]
#[command(name = "hireboard", version, about = "Hireboard API server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "HIREBOARD_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    /// Socket address to listen on.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Postgres connection string; omit to run on in-memory stores.
    #[arg(long, env = "HIREBOARD_DATABASE_URL", value_name = "URL")]
    pub database_url: Option<String>,

    /// Log level directive (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Disable the edge cache entirely.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_cache: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration value: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            database: DatabaseSettings::default(),
            logging: LoggingSettings::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen: SocketAddr,
    pub graceful_shutdown_secs: u64,
}

impl ServerSettings {
    pub fn graceful_shutdown(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            // Parsing a literal socket address; cannot fail.
            listen: DEFAULT_LISTEN.parse().unwrap_or_else(|_| {
                SocketAddr::from(([127, 0, 0, 1], 3000))
            }),
            graceful_shutdown_secs: DEFAULT_GRACEFUL_SHUTDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// When absent, the process serves from in-memory stores.
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

impl DatabaseSettings {
    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    #[serde(deserialize_with = "de_level_filter")]
    pub level: LevelFilter,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
        }
    }
}

fn de_level_filter<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    LevelFilter::from_str(&raw).map_err(serde::de::Error::custom)
}

impl Settings {
    /// Layered load: bundled defaults file, optional local file, optional
    /// explicit file, `HIREBOARD_*` environment, then CLI overrides.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
            .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

        if let Some(path) = &args.config_file {
            builder = builder.add_source(File::from(path.as_path()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if let Some(listen) = args.listen {
            settings.server.listen = listen;
        }
        if let Some(url) = &args.database_url {
            settings.database.url = Some(url.clone());
        }
        if let Some(level) = &args.log_level {
            settings.logging.level =
                LevelFilter::from_str(level).map_err(|err| ConfigError::Invalid {
                    message: format!("log level `{level}`: {err}"),
                })?;
        }
        if args.no_cache {
            settings.cache.enabled = false;
        }

        Ok(settings)
    }
}
