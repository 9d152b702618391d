use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use crate::dispatch::DispatchError;

use super::jitter::apply_jitter;

#[derive(Debug)]
pub enum JobError {
    Dispatch(DispatchError),
    Other(String),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for JobError {}

impl From<DispatchError> for JobError {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<(), JobError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    Every { interval: Duration, jitter: f64 },
    /// Once a day at the given UTC wall-clock time.
    DailyAt { hour: u32, minute: u32 },
}

impl Schedule {
    pub fn every(interval: Duration) -> Self {
        Self::Every {
            interval,
            jitter: 0.0,
        }
    }

    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Self::Every { interval, jitter } => apply_jitter(interval, jitter),
            Self::DailyAt { hour, minute } => until_daily(now, hour, minute),
        }
    }
}

fn until_daily(now: DateTime<Utc>, hour: u32, minute: u32) -> Duration {
    let one_day = Duration::from_secs(86_400);
    let Some(today) = now.date_naive().and_hms_opt(hour, minute, 0) else {
        return one_day;
    };
    let mut next = today.and_utc();
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or(one_day)
}
