use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use riskwatch_workers::dispatch::DispatchConfig;
use riskwatch_workers::notifier::SmtpSettings;
use riskwatch_workers::scheduler::SchedulerSettings;

use crate::ratelimit::{AdmissionPolicy, Quota};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpConfig {
    #[serde(default = "default_addr")]
    pub addr: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Without a URL the server keeps everything in memory.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClassQuotas {
    #[serde(default = "default_class_quota")]
    pub default: Quota,
    #[serde(default = "default_auth_quota")]
    pub auth: Quota,
    #[serde(default = "default_ml_quota")]
    pub ml_inference: Quota,
    #[serde(default = "default_report_quota")]
    pub report_generation: Quota,
}

impl Default for ClassQuotas {
    fn default() -> Self {
        Self {
            default: default_class_quota(),
            auth: default_auth_quota(),
            ml_inference: default_ml_quota(),
            report_generation: default_report_quota(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "default_ip_quota")]
    pub ip: Quota,
    #[serde(default = "default_user_quota")]
    pub user: Quota,
    #[serde(default)]
    pub classes: ClassQuotas,
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_seconds: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_seconds: u64,
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ip: default_ip_quota(),
            user: default_user_quota(),
            classes: ClassQuotas::default(),
            idle_ttl_seconds: default_idle_ttl(),
            max_entries: default_max_entries(),
            eviction_interval_seconds: default_eviction_interval(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            ip: self.ip,
            user: self.user,
            default: self.classes.default,
            auth: self.classes.auth,
            ml_inference: self.classes.ml_inference,
            report_generation: self.classes.report_generation,
            idle_ttl: Duration::from_secs(self.idle_ttl_seconds),
            max_entries: self.max_entries,
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_seconds)
    }

    pub(crate) fn quotas(&self) -> [(&'static str, &Quota); 6] {
        [
            ("ip", &self.ip),
            ("user", &self.user),
            ("default", &self.classes.default),
            ("auth", &self.classes.auth),
            ("ml_inference", &self.classes.ml_inference),
            ("report_generation", &self.classes.report_generation),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DispatchSection {
    #[serde(default = "default_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_backoff_ceiling")]
    pub backoff_ceiling_seconds: u64,
    #[serde(default = "default_retry_batch")]
    pub retry_batch_size: usize,
    /// PENDING attempts untouched for this long are treated as interrupted.
    #[serde(default = "default_stale_pending")]
    pub stale_pending_seconds: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            worker_pool_size: default_pool_size(),
            send_timeout_ms: default_send_timeout(),
            backoff_ceiling_seconds: default_backoff_ceiling(),
            retry_batch_size: default_retry_batch(),
            stale_pending_seconds: default_stale_pending(),
        }
    }
}

impl DispatchSection {
    pub fn engine_config(&self) -> DispatchConfig {
        DispatchConfig {
            worker_pool_size: self.worker_pool_size,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            backoff_ceiling: Duration::from_secs(self.backoff_ceiling_seconds),
            retry_batch_size: self.retry_batch_size,
            stale_pending_after: Duration::from_secs(self.stale_pending_seconds),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SchedulerSection {
    #[serde(default = "default_retry_interval")]
    pub retry_interval_seconds: u64,
    #[serde(default = "default_escalation_interval")]
    pub escalation_interval_seconds: u64,
    #[serde(default = "default_health_interval")]
    pub health_interval_seconds: u64,
    #[serde(default = "default_cleanup_hour")]
    pub cleanup_hour: u32,
    #[serde(default)]
    pub cleanup_minute: u32,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            retry_interval_seconds: default_retry_interval(),
            escalation_interval_seconds: default_escalation_interval(),
            health_interval_seconds: default_health_interval(),
            cleanup_hour: default_cleanup_hour(),
            cleanup_minute: 0,
            retention_days: default_retention_days(),
            jitter: default_jitter(),
        }
    }
}

impl SchedulerSection {
    pub fn settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            retry_interval: Duration::from_secs(self.retry_interval_seconds),
            escalation_interval: Duration::from_secs(self.escalation_interval_seconds),
            health_interval: Duration::from_secs(self.health_interval_seconds),
            cleanup_hour: self.cleanup_hour,
            cleanup_minute: self.cleanup_minute,
            retention: Duration::from_secs(self.retention_days * 86_400),
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChannelsConfig {
    pub smtp: Option<SmtpConfig>,
    pub sms: Option<SmsConfig>,
    pub chat: Option<ChatConfig>,
    pub push: Option<PushConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    #[serde(default = "yes")]
    pub starttls: bool,
}

impl SmtpConfig {
    pub fn settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            from: self.from.clone(),
            starttls: self.starttls,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SmsConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatConfig {
    pub webhook_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PushConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_ip_quota() -> Quota {
    Quota::new(300, 30.0)
}

fn default_user_quota() -> Quota {
    Quota::new(200, 20.0)
}

fn default_class_quota() -> Quota {
    Quota::new(100, 10.0)
}

fn default_auth_quota() -> Quota {
    Quota::new(5, 1.0)
}

fn default_ml_quota() -> Quota {
    Quota::new(20, 20.0 / 60.0)
}

fn default_report_quota() -> Quota {
    Quota::new(5, 5.0 / 60.0)
}

fn default_idle_ttl() -> u64 {
    600
}

fn default_max_entries() -> usize {
    100_000
}

fn default_eviction_interval() -> u64 {
    60
}

fn default_pool_size() -> usize {
    16
}

fn default_send_timeout() -> u64 {
    10_000
}

fn default_backoff_ceiling() -> u64 {
    3_600
}

fn default_retry_batch() -> usize {
    100
}

fn default_stale_pending() -> u64 {
    600
}

fn default_retry_interval() -> u64 {
    60
}

fn default_escalation_interval() -> u64 {
    300
}

fn default_health_interval() -> u64 {
    900
}

fn default_cleanup_hour() -> u32 {
    2
}

fn default_retention_days() -> u64 {
    30
}

fn default_jitter() -> f64 {
    0.1
}

fn default_smtp_port() -> u16 {
    587
}

fn yes() -> bool {
    true
}
