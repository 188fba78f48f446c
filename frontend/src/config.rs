use std::{env, time::Duration};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL including the `/api` prefix, without a trailing slash.
    pub api_base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: normalize_base_url(&api_base_url.into()),
            ..Self::default()
        }
    }

    /// Reads `API_BASE_URL` and `API_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let api_base_url = env::var("API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| normalize_base_url(&value))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let timeout = env::var("API_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self {
            api_base_url,
            timeout,
        }
    }
}

fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}
