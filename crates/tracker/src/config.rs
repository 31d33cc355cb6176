use std::time::Duration;

/// Default watchdog period.
const DEFAULT_WATCHDOG_SECS: u64 = 10;

/// Default per-request HTTP timeout.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default path segment of the status endpoint.
const DEFAULT_POLL_PATH: &str = "commands";

/// Tracker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the job-launching service.
    pub api_url: String,
    /// Status endpoint segment: `GET {api_url}/{poll_path}/{id}`.
    pub poll_path: String,
    /// Push socket URL. `None` leaves the watchdog as the only driver.
    pub push_url: Option<String>,
    /// Period between watchdog sweeps.
    pub watchdog_period: Duration,
    /// Timeout applied to every launch and poll request.
    pub request_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".into(),
            poll_path: DEFAULT_POLL_PATH.into(),
            push_url: None,
            watchdog_period: Duration::from_secs(DEFAULT_WATCHDOG_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl TrackerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                         | Default    |
    /// |---------------------------------|------------|
    /// | `CMDWATCH_API_URL`              | (required) |
    /// | `CMDWATCH_POLL_PATH`            | `commands` |
    /// | `CMDWATCH_PUSH_URL`             | unset      |
    /// | `CMDWATCH_WATCHDOG_SECS`        | `10`       |
    /// | `CMDWATCH_REQUEST_TIMEOUT_SECS` | `30`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("CMDWATCH_API_URL").ok_or(ConfigError::Missing("CMDWATCH_API_URL"))?;

        let poll_path = non_empty("CMDWATCH_POLL_PATH").unwrap_or_else(|| DEFAULT_POLL_PATH.into());

        let push_url = non_empty("CMDWATCH_PUSH_URL");

        let watchdog_secs = parse_secs(
            "CMDWATCH_WATCHDOG_SECS",
            non_empty("CMDWATCH_WATCHDOG_SECS"),
            DEFAULT_WATCHDOG_SECS,
        )?;

        let request_timeout_secs = parse_secs(
            "CMDWATCH_REQUEST_TIMEOUT_SECS",
            non_empty("CMDWATCH_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        Ok(Self {
            api_url,
            poll_path,
            push_url,
            watchdog_period: Duration::from_secs(watchdog_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

/// Parse a positive number of seconds, falling back to `default` when unset.
fn parse_secs(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("{e}"),
    })?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(secs)
}
