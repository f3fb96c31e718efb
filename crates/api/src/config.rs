use windowgate_core::deployment_window::Horizon;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development, except
/// the JWT secret which must always be provided.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests after a shutdown signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration.
    pub jwt: JwtConfig,
    /// Evaluation horizon defaults.
    pub deployment_window: DeploymentWindowConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            deployment_window: DeploymentWindowConfig::from_env(),
        }
    }
}

/// Default look-ahead for state queries that do not pass `days`.
pub const DEFAULT_FETCH_DAYS: i64 = 90;

/// How far ahead inactive profiles stay visible in state responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentWindowConfig {
    pub fetch_days_blackout: i64,
    pub fetch_days_maintenance: i64,
}

impl Default for DeploymentWindowConfig {
    fn default() -> Self {
        Self {
            fetch_days_blackout: DEFAULT_FETCH_DAYS,
            fetch_days_maintenance: DEFAULT_FETCH_DAYS,
        }
    }
}

impl DeploymentWindowConfig {
    /// Load the horizon from environment variables.
    ///
    /// | Env Var                                    | Default                          |
    /// |--------------------------------------------|----------------------------------|
    /// | `DEPLOYMENT_WINDOW_FETCH_DAYS`             | `90`                             |
    /// | `DEPLOYMENT_WINDOW_FETCH_DAYS_BLACKOUT`    | `DEPLOYMENT_WINDOW_FETCH_DAYS`   |
    /// | `DEPLOYMENT_WINDOW_FETCH_DAYS_MAINTENANCE` | `DEPLOYMENT_WINDOW_FETCH_DAYS`   |
    ///
    /// A value of `0` or less disables the horizon for that type.
    pub fn from_env() -> Self {
        let days = |name: &str, default: i64| -> i64 {
            std::env::var(name)
                .ok()
                .map(|v| {
                    v.trim()
                        .parse()
                        .unwrap_or_else(|_| panic!("{name} must be a valid i64"))
                })
                .unwrap_or(default)
        };

        let fetch_days = days("DEPLOYMENT_WINDOW_FETCH_DAYS", DEFAULT_FETCH_DAYS);
        Self {
            fetch_days_blackout: days("DEPLOYMENT_WINDOW_FETCH_DAYS_BLACKOUT", fetch_days),
            fetch_days_maintenance: days("DEPLOYMENT_WINDOW_FETCH_DAYS_MAINTENANCE", fetch_days),
        }
    }

    /// The horizon for a request: `days` applies to both types when given,
    /// otherwise the configured per-type limits apply.
    pub fn horizon(&self, days: Option<i64>) -> Horizon {
        match days {
            Some(days) => Horizon::days(days),
            None => Horizon::per_type(self.fetch_days_blackout, self.fetch_days_maintenance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_days_override_configured_limits() {
        let config = DeploymentWindowConfig {
            fetch_days_blackout: 30,
            fetch_days_maintenance: 10,
        };
        assert_eq!(config.horizon(Some(7)), Horizon::days(7));
        assert_eq!(config.horizon(None), Horizon::per_type(30, 10));
    }

    #[test]
    fn zero_days_disables_the_horizon() {
        let config = DeploymentWindowConfig::default();
        assert_eq!(config.horizon(Some(0)), Horizon::unbounded());
    }
}
