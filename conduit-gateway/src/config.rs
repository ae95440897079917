//! Gateway and transport configuration.

use std::time::Duration;

/// Environment variable holding the base URL.
pub const ENV_BASE_URL: &str = "CONDUIT_BASE_URL";
/// Environment variable holding the default timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "CONDUIT_TIMEOUT_MS";
/// Environment variable holding the user agent.
pub const ENV_USER_AGENT: &str = "CONDUIT_USER_AGENT";

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL that request paths are appended to.
    pub base_url: Option<String>,
    /// Default per-attempt timeout.
    pub timeout: Duration,
    /// Headers sent with every request.
    pub default_headers: Vec<(String, String)>,
    /// Settings for the default reqwest transport.
    pub transport: TransportConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            default_headers: vec![(
                "Accept".to_string(),
                "application/json, text/plain, */*".to_string(),
            )],
            transport: TransportConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Load configuration from `CONDUIT_*` environment variables.
    ///
    /// - `CONDUIT_BASE_URL` - base URL
    /// - `CONDUIT_TIMEOUT_MS` - default timeout in milliseconds
    /// - `CONDUIT_USER_AGENT` - user agent of the default transport
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = Some(base_url.trim().to_string());
        }

        match lookup(ENV_TIMEOUT_MS).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(millis)) => config.timeout = Duration::from_millis(millis),
            Some(Err(e)) => {
                tracing::warn!(variable = ENV_TIMEOUT_MS, error = %e, "Ignoring invalid timeout");
            }
            None => {}
        }

        if let Some(user_agent) = lookup(ENV_USER_AGENT).filter(|v| !v.is_empty()) {
            config.transport.user_agent = user_agent;
        }

        config
    }
}

/// Builder for gateway configuration.
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Set the base URL for all requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the default per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Add a default header for all requests.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.config
            .default_headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.config.default_headers.push((name, value.into()));
        self
    }

    /// Set the transport configuration.
    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.config.transport = transport;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

/// Settings for [`ReqwestTransport`](crate::ReqwestTransport).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Enable brotli compression.
    pub brotli: bool,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            user_agent: format!("conduit-gateway/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
            follow_redirects: true,
            max_redirects: 10,
        }
    }
}

impl TransportConfig {
    /// Create a new configuration builder.
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }
}

/// Builder for transport configuration.
#[derive(Debug, Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the connection pool idle timeout.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip compression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli compression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_builder() {
        let config = GatewayConfig::builder()
            .base_url("https://api.example.com")
            .timeout(Duration::from_secs(5))
            .default_header("accept", "application/json")
            .default_header("X-Client", "dashboard")
            .build();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.default_headers,
            vec![
                ("accept".to_string(), "application/json".to_string()),
                ("X-Client".to_string(), "dashboard".to_string()),
            ]
        );
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_BASE_URL, " https://insights.example.com/api "),
            (ENV_TIMEOUT_MS, "1500"),
            (ENV_USER_AGENT, "dashboard/2.0"),
        ]
        .into_iter()
        .collect();

        let config = GatewayConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.base_url.as_deref(),
            Some("https://insights.example.com/api")
        );
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.transport.user_agent, "dashboard/2.0");
    }

    #[test]
    fn test_from_lookup_keeps_defaults_on_bad_values() {
        let config = GatewayConfig::from_lookup(|key| match key {
            ENV_TIMEOUT_MS => Some("soon".to_string()),
            _ => None,
        });

        assert_eq!(config.base_url, None);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_transport_builder() {
        let config = TransportConfig::builder()
            .connect_timeout(Duration::from_secs(2))
            .gzip(false)
            .follow_redirects(false)
            .build();

        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(!config.gzip);
        assert!(config.brotli);
        assert!(!config.follow_redirects);
    }
}
