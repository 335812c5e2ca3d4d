use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::rate_limiter::{
    LimiterOptions, DEFAULT_MAX_BYTES_PER_IP, DEFAULT_MAX_CONNECTION_PER_IP,
    DEFAULT_MAX_REQUEST_PER_SECOND,
};
use crate::application::use_cases::DEFAULT_MAX_FILE_SIZE_BYTES;
use crate::domain::value_objects::HashAlgorithm;

/// Which storage backend serves objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    Memory,
    Filesystem,
    /// Filesystem plus redis metadata index
    Indexed,
}

impl StorageBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackendKind::Memory => "memory",
            StorageBackendKind::Filesystem => "filesystem",
            StorageBackendKind::Indexed => "indexed",
        }
    }
}

impl FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackendKind::Memory),
            "filesystem" | "fs" => Ok(StorageBackendKind::Filesystem),
            "indexed" | "redis" => Ok(StorageBackendKind::Indexed),
            other => Err(format!(
                "unknown storage backend '{}' (expected memory, filesystem or indexed)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub backend: StorageBackendKind,
    pub storage_root: PathBuf,
    pub redis_host: Option<String>,
    pub redis_password: Option<String>,
    pub redis_db: i64,
    pub hash_algorithm: HashAlgorithm,
    pub durable_writes: bool,
    pub strict_download_accounting: bool,
    pub max_file_size_bytes: u64,
    pub max_connection_per_ip: usize,
    pub max_request_per_second: u64,
    pub max_bytes_per_ip: u64,
    pub limiter_prune_interval_secs: u64,
    pub limiter_idle_secs: u64,
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|s| s.trim().parse().ok())
}

/// Zero means "use the default"
fn or_default<T: PartialEq + Default>(value: Option<T>, default: T) -> T {
    match value {
        Some(v) if v != T::default() => v,
        _ => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let redis_host = lookup("REDIS_HOST").filter(|s| !s.is_empty());
        let backend = parsed(&lookup, "STORAGE_BACKEND").unwrap_or(if redis_host.is_some() {
            StorageBackendKind::Indexed
        } else {
            StorageBackendKind::Filesystem
        });

        Self {
            listen_addr: lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            backend,
            storage_root: lookup("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./store")),
            redis_host,
            redis_password: lookup("REDIS_PASSWORD").filter(|s| !s.is_empty()),
            redis_db: parsed(&lookup, "REDIS_DB").unwrap_or(0),
            hash_algorithm: parsed(&lookup, "HASH_ALGORITHM").unwrap_or_default(),
            durable_writes: parsed(&lookup, "DURABLE_WRITES").unwrap_or(true),
            strict_download_accounting: parsed(&lookup, "STRICT_DOWNLOAD_ACCOUNTING")
                .unwrap_or(false),
            max_file_size_bytes: or_default(
                parsed(&lookup, "MAX_FILE_SIZE_BYTES"),
                DEFAULT_MAX_FILE_SIZE_BYTES,
            ),
            max_connection_per_ip: or_default(
                parsed(&lookup, "MAX_CONNECTION_PER_IP"),
                DEFAULT_MAX_CONNECTION_PER_IP,
            ),
            max_request_per_second: or_default(
                parsed(&lookup, "MAX_REQUEST_PER_SECOND"),
                DEFAULT_MAX_REQUEST_PER_SECOND,
            ),
            max_bytes_per_ip: or_default(
                parsed(&lookup, "MAX_BYTES_PER_IP"),
                DEFAULT_MAX_BYTES_PER_IP,
            ),
            limiter_prune_interval_secs: or_default(
                parsed(&lookup, "LIMITER_PRUNE_INTERVAL_SECS"),
                300,
            ),
            limiter_idle_secs: or_default(parsed(&lookup, "LIMITER_IDLE_SECS"), 600),
        }
    }

    /// Apply command-line flags on top of the environment
    pub fn with_overrides(mut self, cli: CliOverrides) -> Self {
        if let Some(path) = cli.path {
            self.storage_root = path;
        }
        if let Some(host) = cli.redis {
            self.redis_host = Some(host);
            if cli.backend.is_none() {
                self.backend = StorageBackendKind::Indexed;
            }
        }
        if let Some(password) = cli.redis_password {
            self.redis_password = Some(password);
        }
        if let Some(db) = cli.redis_db {
            self.redis_db = db;
        }
        if let Some(listen) = cli.listen {
            self.listen_addr = listen;
        }
        if let Some(backend) = cli.backend {
            self.backend = backend;
        }
        self
    }

    pub fn limiter_options(&self) -> LimiterOptions {
        LimiterOptions {
            max_connection_per_ip: self.max_connection_per_ip,
            max_request_per_second: self.max_request_per_second,
            max_bytes_per_ip: self.max_bytes_per_ip,
            window: Duration::from_secs(1),
        }
        .normalized()
    }

    /// Connection URL for the metadata index, if a host is configured
    pub fn redis_url(&self) -> Option<String> {
        let host = self.redis_host.as_deref()?;
        if host.contains("://") {
            return Some(host.to_string());
        }

        let auth = self
            .redis_password
            .as_deref()
            .map(|p| format!(":{}@", p))
            .unwrap_or_default();
        Some(format!("redis://{}{}/{}", auth, host, self.redis_db))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "LISTEN_ADDR '{}' is not a valid socket address",
                self.listen_addr
            ));
        }

        if self.backend != StorageBackendKind::Memory && self.storage_root.as_os_str().is_empty()
        {
            return Err("STORAGE_ROOT cannot be empty".to_string());
        }

        if self.backend == StorageBackendKind::Indexed && self.redis_host.is_none() {
            return Err("the indexed backend requires REDIS_HOST (or --redis)".to_string());
        }

        if !self.hash_algorithm.is_key_algorithm() {
            return Err(format!(
                "HASH_ALGORITHM '{}' can only be used for integrity checks",
                self.hash_algorithm
            ));
        }

        if self.redis_db < 0 {
            return Err("REDIS_DB cannot be negative".to_string());
        }

        Ok(())
    }
}

/// Command-line flags; each one overrides its environment variable
#[derive(Debug, Default, Parser)]
#[command(name = "content_vault", version, about = "Content-addressable object store")]
pub struct CliOverrides {
    /// Storage root directory (STORAGE_ROOT)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Redis host:port; selects the indexed backend (REDIS_HOST)
    #[arg(long)]
    pub redis: Option<String>,

    /// Redis password (REDIS_PASSWORD)
    #[arg(long = "redis-password")]
    pub redis_password: Option<String>,

    /// Redis database number (REDIS_DB)
    #[arg(long = "redis-db")]
    pub redis_db: Option<i64>,

    /// Listen address (LISTEN_ADDR)
    #[arg(long)]
    pub listen: Option<String>,

    /// memory, filesystem or indexed (STORAGE_BACKEND)
    #[arg(long)]
    pub backend: Option<StorageBackendKind>,
}
