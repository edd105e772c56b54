use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the backend API, without the `/api/...` suffix.
    pub api_url: String,
    pub user_id: Option<i64>,
    pub token: Option<String>,
    /// Interval between data refreshes. Set via NOTIFY_POLL_SECS. Default: 30.
    pub poll_interval: Duration,
    /// Interval of the re-render tick for relative-time labels.
    /// Set via NOTIFY_CLOCK_SECS. Default: 10.
    pub clock_interval: Duration,
    /// Number of records shown by the dropdown surface. Default: 10.
    pub dropdown_limit: usize,
    pub request_timeout: Duration,
    /// Refresh once after a failed optimistic mutation. Default: true.
    pub reconcile_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".into(),
            user_id: None,
            token: None,
            poll_interval: Duration::from_secs(30),
            clock_interval: Duration::from_secs(10),
            dropdown_limit: 10,
            request_timeout: Duration::from_secs(15),
            reconcile_on_failure: true,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary key lookup. `load()` passes the process env.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let secs = |key: &str, default: Duration| -> anyhow::Result<Duration> {
        match lookup(key) {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds, got '{}'", key, raw))?;
                if secs == 0 {
                    anyhow::bail!("{} must be greater than zero", key);
                }
                Ok(Duration::from_secs(secs))
            }
            None => Ok(default),
        }
    };

    let user_id = match lookup("NOTIFY_USER_ID") {
        Some(raw) if !raw.trim().is_empty() => Some(
            raw.trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("NOTIFY_USER_ID must be an integer, got '{}'", raw))?,
        ),
        _ => None,
    };

    let dropdown_limit = lookup("NOTIFY_DROPDOWN_LIMIT")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(defaults.dropdown_limit);

    let reconcile_on_failure = lookup("NOTIFY_RECONCILE_ON_FAILURE")
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
        .unwrap_or(defaults.reconcile_on_failure);

    Ok(Config {
        api_url: lookup("NOTIFY_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_url),
        user_id,
        token: lookup("NOTIFY_TOKEN").filter(|t| !t.is_empty()),
        poll_interval: secs("NOTIFY_POLL_SECS", defaults.poll_interval)?,
        clock_interval: secs("NOTIFY_CLOCK_SECS", defaults.clock_interval)?,
        dropdown_limit,
        request_timeout: secs("NOTIFY_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
        reconcile_on_failure,
    })
}
