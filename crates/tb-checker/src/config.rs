//! Checker configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CheckerError;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::tablebase::DEFAULT_TABLEBASE_URL;
use crate::verifier::VerifyOptions;

#[derive(Clone, Debug)]
pub struct CheckerConfig {
    /// Filtered puzzle CSV (output of the filter step)
    pub puzzle_path: PathBuf,

    /// Checkpoint file, appended to as puzzles complete
    pub checked_path: PathBuf,

    /// Tablebase base URL, without the `/standard` suffix
    pub tablebase_url: String,

    /// Request budget shared by all workers
    pub requests_per_sec: f64,

    pub max_attempts: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Concurrent verification tasks
    pub workers: usize,

    /// Enable the solver-ply, goal and alternative-move checks
    pub strict: bool,
}

impl CheckerConfig {
    /// Load configuration from the process environment, after a local `.env`
    /// file if one exists.
    pub fn from_env() -> Result<Self, CheckerError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CheckerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_attempts: u32 = parse_or(&lookup, "TB_MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(CheckerError::Config("TB_MAX_ATTEMPTS must be at least 1".into()));
        }

        let workers: usize = parse_or(&lookup, "CHECK_WORKERS", num_cpus::get())?;
        if workers == 0 {
            return Err(CheckerError::Config("CHECK_WORKERS must be at least 1".into()));
        }

        Ok(Self {
            puzzle_path: text("PUZZLE_PATH")
                .unwrap_or_else(|| "puzzle.csv".to_string())
                .into(),
            checked_path: text("PUZZLE_CHECKED_PATH")
                .unwrap_or_else(|| "puzzle_checked.txt".to_string())
                .into(),
            tablebase_url: text("TABLEBASE_URL")
                .unwrap_or_else(|| DEFAULT_TABLEBASE_URL.to_string()),
            requests_per_sec: parse_or(&lookup, "TB_REQUESTS_PER_SEC", 2.0)?,
            max_attempts,
            retry_base: Duration::from_millis(parse_or(&lookup, "TB_RETRY_BASE_MS", 500)?),
            retry_max: Duration::from_millis(parse_or(&lookup, "TB_RETRY_MAX_MS", 60_000)?),
            request_timeout: Duration::from_secs(parse_or(&lookup, "TB_TIMEOUT_SECS", 30)?),
            workers,
            strict: text("STRICT_CHECK").is_some(),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.retry_base,
            max_delay: self.retry_max,
        }
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::per_second(self.requests_per_sec)
    }

    pub fn verify_options(&self) -> VerifyOptions {
        if self.strict {
            VerifyOptions::strict()
        } else {
            VerifyOptions::default()
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, CheckerError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| CheckerError::Config(format!("{key} has an invalid value '{v}'"))),
        _ => Ok(default),
    }
}
