mod loader;
mod schema;

pub use loader::{load, load_from_file, load_from_str, load_with, LoadError, CONFIG_ENV, DEFAULT_CONFIG_PATH};
pub use schema::{
    ChannelsConfig, ChatConfig, ClassQuotas, DatabaseConfig, DispatchSection, HttpConfig,
    LogConfig, LogFormat, PushConfig, RateLimitConfig, SchedulerSection, ServerConfig,
    SmsConfig, SmtpConfig,
};
