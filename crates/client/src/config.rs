use std::time::Duration;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Platform API client configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the platform API, without a trailing slash.
    pub base_url: String,
    /// Bearer token sent with every request, if set.
    pub token: Option<String>,
    /// Per-request timeout. A timed-out call fails like any other remote error.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `ADMIN_API_URL`        | `http://localhost:3000` |
    /// | `ADMIN_API_TOKEN`      | unset                   |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("ADMIN_API_URL")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "ADMIN_API_URL",
                value: base_url,
                expected: "an http:// or https:// URL",
            });
        }

        let token = lookup("ADMIN_API_TOKEN").filter(|t| !t.trim().is_empty());

        let timeout_raw = lookup("REQUEST_TIMEOUT_SECS").unwrap_or_else(|| "30".into());
        let request_timeout_secs: u64 = match timeout_raw.parse() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                return Err(ConfigError::Invalid {
                    var: "REQUEST_TIMEOUT_SECS",
                    value: timeout_raw,
                    expected: "a positive number of seconds",
                })
            }
        };

        Ok(Self {
            base_url,
            token,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}
