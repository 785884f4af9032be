//! Runtime configuration: environment variables first, then command-line flags.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_PAGE_SIZE: u32 = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: String, value: String },
    #[error("missing value after flag {0}")]
    MissingValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub http_port: u16,
    /// Folder holding the article and account snapshots; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub session_ttl: Duration,
    pub page_size: u32,
    pub search_debounce: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            data_dir: None,
            session_ttl: Duration::from_secs(60 * 60),
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: Duration::from_millis(300),
        }
    }
}

impl Config {
    /// Load from `BLOGGY_*` environment variables, then apply flags from `args`.
    pub fn load(args: &[String]) -> Result<Self, ConfigError> {
        let mut cfg = Self::from_lookup(|k| env::var(k).ok())?;
        cfg.apply_args(args)?;
        info!(
            target: "bloggy::config",
            "config: bind={} port={} data_dir={:?} session_ttl_secs={} page_size={} debounce_ms={}",
            cfg.bind, cfg.http_port, cfg.data_dir, cfg.session_ttl.as_secs(), cfg.page_size, cfg.search_debounce.as_millis()
        );
        Ok(cfg)
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = lookup("BLOGGY_BIND") { cfg.bind = v; }
        if let Some(v) = lookup("BLOGGY_HTTP_PORT") { cfg.http_port = parse_num("BLOGGY_HTTP_PORT", &v)?; }
        if let Some(v) = lookup("BLOGGY_DATA_DIR") {
            if !v.trim().is_empty() { cfg.data_dir = Some(PathBuf::from(v)); }
        }
        if let Some(v) = lookup("BLOGGY_SESSION_TTL_SECS") {
            cfg.session_ttl = Duration::from_secs(parse_num("BLOGGY_SESSION_TTL_SECS", &v)?);
        }
        if let Some(v) = lookup("BLOGGY_PAGE_SIZE") {
            cfg.page_size = parse_num("BLOGGY_PAGE_SIZE", &v)?;
            if cfg.page_size == 0 {
                return Err(ConfigError::Invalid { name: "BLOGGY_PAGE_SIZE".into(), value: v });
            }
        }
        if let Some(v) = lookup("BLOGGY_SEARCH_DEBOUNCE_MS") {
            cfg.search_debounce = Duration::from_millis(parse_num("BLOGGY_SEARCH_DEBOUNCE_MS", &v)?);
        }
        Ok(cfg)
    }

    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--port" | "--bind" | "--data" | "--session-ttl" => {
                    let Some(value) = args.get(i + 1) else { return Err(ConfigError::MissingValue(flag.to_string())); };
                    match flag {
                        "--port" => self.http_port = parse_num(flag, value)?,
                        "--bind" => self.bind = value.clone(),
                        "--data" => self.data_dir = Some(PathBuf::from(value)),
                        _ => self.session_ttl = Duration::from_secs(parse_num(flag, value)?),
                    }
                    i += 2;
                }
                _ => i += 1,
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String { format!("{}:{}", self.bind, self.http_port) }
}

fn parse_num<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid { name: name.to_string(), value: value.to_string() })
}

/// Return true when `flag` is present in `args`.
pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Value following `flag`, if any.
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(|s| s.as_str())
}
