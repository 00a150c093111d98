use peduli_client::{ClientConfig, ConfigError};
use peduli_core::orchestrator::DEFAULT_BATCH_CONCURRENCY;

/// Operator binary configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub client: ClientConfig,
    /// Upper bound on in-flight requests during a batch action.
    pub batch_concurrency: usize,
}

impl AdminConfig {
    /// Load configuration from the process environment.
    ///
    /// Reads the [`ClientConfig`] variables plus:
    ///
    /// | Env Var             | Default |
    /// |---------------------|---------|
    /// | `BATCH_CONCURRENCY` | `4`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let client = ClientConfig::from_lookup(&lookup)?;

        let batch_concurrency = match lookup("BATCH_CONCURRENCY") {
            None => DEFAULT_BATCH_CONCURRENCY,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "BATCH_CONCURRENCY",
                        value: raw,
                        expected: "a positive integer",
                    })
                }
            },
        };

        Ok(Self {
            client,
            batch_concurrency,
        })
    }
}
