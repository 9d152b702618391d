use std::path::Path;

use super::schema::ServerConfig;

pub const CONFIG_ENV: &str = "RISKWATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/riskwatch.yml";

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Validation(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_yaml::Error> for LoadError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e)
    }
}

/// Reads the file named by `RISKWATCH_CONFIG` (or the default path), falling
/// back to built-in defaults when that file does not exist, then applies
/// `DATABASE_URL`.
pub fn load() -> Result<ServerConfig, LoadError> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let database_url = std::env::var("DATABASE_URL").ok();
    load_with(Path::new(&path), database_url)
}

pub fn load_with(path: &Path, database_url: Option<String>) -> Result<ServerConfig, LoadError> {
    let mut cfg = match std::fs::read_to_string(path) {
        Ok(contents) => parse(&contents)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ServerConfig::default(),
        Err(e) => return Err(e.into()),
    };
    if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
        cfg.database.url = Some(url);
    }
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_from_file(path: &Path) -> Result<ServerConfig, LoadError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(yaml: &str) -> Result<ServerConfig, LoadError> {
    let cfg = parse(yaml)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn parse(yaml: &str) -> Result<ServerConfig, LoadError> {
    if yaml.trim().is_empty() {
        return Ok(ServerConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

fn validate(cfg: &ServerConfig) -> Result<(), LoadError> {
    for (name, quota) in cfg.rate_limit.quotas() {
        if quota.capacity == 0 {
            return Err(LoadError::Validation(format!(
                "rate_limit.{name}.capacity must be > 0"
            )));
        }
        if !(quota.refill_per_minute.is_finite() && quota.refill_per_minute > 0.0) {
            return Err(LoadError::Validation(format!(
                "rate_limit.{name}.refill_per_minute must be > 0"
            )));
        }
    }
    if cfg.rate_limit.max_entries == 0 {
        return Err(LoadError::Validation("rate_limit.max_entries must be > 0".into()));
    }
    if cfg.rate_limit.eviction_interval_seconds == 0 {
        return Err(LoadError::Validation(
            "rate_limit.eviction_interval_seconds must be > 0".into(),
        ));
    }
    if cfg.dispatch.worker_pool_size == 0 {
        return Err(LoadError::Validation(
            "dispatch.worker_pool_size must be > 0".into(),
        ));
    }
    if cfg.dispatch.send_timeout_ms == 0 {
        return Err(LoadError::Validation("dispatch.send_timeout_ms must be > 0".into()));
    }
    if cfg.dispatch.retry_batch_size == 0 {
        return Err(LoadError::Validation("dispatch.retry_batch_size must be > 0".into()));
    }
    if cfg.dispatch.stale_pending_seconds.saturating_mul(1_000) <= cfg.dispatch.send_timeout_ms {
        return Err(LoadError::Validation(
            "dispatch.stale_pending_seconds must exceed dispatch.send_timeout_ms".into(),
        ));
    }
    let s = &cfg.scheduler;
    if s.retry_interval_seconds == 0 || s.escalation_interval_seconds == 0 || s.health_interval_seconds == 0 {
        return Err(LoadError::Validation(
            "scheduler intervals must be > 0".into(),
        ));
    }
    if s.cleanup_hour > 23 || s.cleanup_minute > 59 {
        return Err(LoadError::Validation(
            "scheduler.cleanup_hour/cleanup_minute out of range".into(),
        ));
    }
    if !(0.0..1.0).contains(&s.jitter) {
        return Err(LoadError::Validation("scheduler.jitter must be in [0, 1)".into()));
    }
    if cfg.database.max_connections == 0 {
        return Err(LoadError::Validation("database.max_connections must be > 0".into()));
    }
    Ok(())
}
