//! Configuration for rate_service_rust
//!
//! Built once at startup from the process environment (after dotenv
//! loading) and passed by reference to every component.

use anyhow::{anyhow, Result};
use garantex_rust_core::clients::exchange::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use garantex_rust_core::db::DbPoolConfig;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub exchange: ExchangeConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub grpc_port: u16,
    pub metrics_port: u16,
    /// Upper bound on the handling time of a single RPC
    pub request_timeout: Duration,
    /// How long running servers get to drain after a shutdown signal
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub run_migrations: bool,
    pub pool: DbPoolConfig,
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbPoolConfig::default();

        let config = Self {
            server: ServerConfig {
                grpc_port: parse_or(&lookup, "SERVER_GRPC_PORT", 50051)?,
                metrics_port: parse_or(&lookup, "SERVER_METRICS_PORT", 9090)?,
                request_timeout: secs_or(&lookup, "SERVER_TIMEOUT_SECS", 30)?,
                shutdown_grace: secs_or(&lookup, "SERVER_SHUTDOWN_GRACE_SECS", 30)?,
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
                host: string_or(&lookup, "DATABASE_HOST", "localhost"),
                port: parse_or(&lookup, "DATABASE_PORT", 5432)?,
                user: string_or(&lookup, "DATABASE_USER", "postgres"),
                password: string_or(&lookup, "DATABASE_PASSWORD", "password"),
                dbname: string_or(&lookup, "DATABASE_DBNAME", "garantex_test"),
                sslmode: string_or(&lookup, "DATABASE_SSLMODE", "disable"),
                run_migrations: bool_or(&lookup, "DATABASE_RUN_MIGRATIONS", true)?,
                pool: DbPoolConfig {
                    max_connections: parse_or(
                        &lookup,
                        "DB_POOL_MAX_CONNECTIONS",
                        defaults.max_connections,
                    )?,
                    min_connections: parse_or(
                        &lookup,
                        "DB_POOL_MIN_CONNECTIONS",
                        defaults.min_connections,
                    )?,
                    max_lifetime: secs_or(
                        &lookup,
                        "DB_POOL_MAX_LIFETIME_SECS",
                        defaults.max_lifetime.as_secs(),
                    )?,
                    idle_timeout: secs_or(
                        &lookup,
                        "DB_POOL_IDLE_TIMEOUT_SECS",
                        defaults.idle_timeout.as_secs(),
                    )?,
                    acquire_timeout: secs_or(
                        &lookup,
                        "DB_POOL_ACQUIRE_TIMEOUT_SECS",
                        defaults.acquire_timeout.as_secs(),
                    )?,
                },
            },
            exchange: ExchangeConfig {
                base_url: string_or(&lookup, "EXCHANGE_BASE_URL", DEFAULT_BASE_URL),
                timeout: secs_or(&lookup, "EXCHANGE_TIMEOUT_SECS", DEFAULT_TIMEOUT.as_secs())?,
            },
            log: LogConfig {
                level: string_or(&lookup, "LOG_LEVEL", "info"),
                format: match string_or(&lookup, "LOG_FORMAT", "text").to_lowercase().as_str() {
                    "text" => LogFormat::Text,
                    "json" => LogFormat::Json,
                    other => return Err(anyhow!("LOG_FORMAT must be text or json, got {}", other)),
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.grpc_port == 0 {
            return Err(anyhow!("SERVER_GRPC_PORT must be > 0"));
        }
        if self.server.metrics_port == 0 {
            return Err(anyhow!("SERVER_METRICS_PORT must be > 0"));
        }
        if self.server.grpc_port == self.server.metrics_port {
            return Err(anyhow!("SERVER_GRPC_PORT and SERVER_METRICS_PORT must differ"));
        }
        if self.exchange.base_url.trim().is_empty() {
            return Err(anyhow!("EXCHANGE_BASE_URL must not be empty"));
        }
        if self.exchange.timeout.is_zero() {
            return Err(anyhow!("EXCHANGE_TIMEOUT_SECS must be > 0"));
        }
        if self.database.pool.min_connections > self.database.pool.max_connections {
            return Err(anyhow!(
                "DB_POOL_MIN_CONNECTIONS must be <= DB_POOL_MAX_CONNECTIONS"
            ));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Connection options for the pool
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| anyhow!("DATABASE_URL is not a valid connection URL: {}", e));
        }

        let ssl_mode = PgSslMode::from_str(&self.sslmode)
            .map_err(|_| anyhow!("DATABASE_SSLMODE {:?} is not a valid sslmode", self.sslmode))?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
            .ssl_mode(ssl_mode))
    }

    /// Human-readable target for logs (never includes the password)
    pub fn describe(&self) -> String {
        match &self.url {
            Some(_) => "DATABASE_URL".to_string(),
            None => format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname),
        }
    }
}

fn string_or<F>(lookup: &F, var_name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var_name).unwrap_or_else(|| default.to_string())
}

/// Parse variable with default fallback
fn parse_or<F, T>(lookup: &F, var_name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var_name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} must be a valid {}", var_name, std::any::type_name::<T>())),
        None => Ok(default),
    }
}

/// Parse variable as a number of seconds with default fallback
fn secs_or<F>(lookup: &F, var_name: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, var_name, default).map(Duration::from_secs)
}

fn bool_or<F>(lookup: &F, var_name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        Some(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(anyhow!("{} must be a boolean", var_name)),
        },
        None => Ok(default),
    }
}
