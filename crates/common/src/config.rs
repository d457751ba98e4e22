use serde::{Deserialize, Serialize};

use crate::model::ProviderId;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Listener for operational routes (rate limit stats and reset). Keep it
    /// off the public network.
    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,
    #[serde(default = "default_body_limit")]
    pub request_body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            admin_listen: default_admin_listen(),
            request_body_limit: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_route_limits")]
    pub routes: Vec<RouteRateLimitConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            routes: default_route_limits(),
        }
    }
}

/// Sliding-window limit applied to every request whose path starts with
/// `path_prefix`. `name` doubles as the key namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRateLimitConfig {
    pub name: String,
    pub path_prefix: String,
    pub window_secs: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default = "default_idempotency_ttl")]
    pub ttl_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_idempotency_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Always dispatch to this backend. `None` or the primary backend means
    /// "primary with fallback".
    #[serde(default, rename = "override")]
    pub override_provider: Option<ProviderId>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_groq")]
    pub groq: ProviderEndpointConfig,
    #[serde(default = "default_zai")]
    pub zai: ProviderEndpointConfig,
    #[serde(default = "default_ollama")]
    pub ollama: ProviderEndpointConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            override_provider: None,
            timeout_secs: default_provider_timeout(),
            groq: default_groq(),
            zai: default_zai(),
            ollama: default_ollama(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpointConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl ProviderEndpointConfig {
    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

// Default value helpers
fn default_listen() -> String {
    "0.0.0.0:3001".to_string()
}
fn default_admin_listen() -> String {
    "127.0.0.1:3002".to_string()
}
fn default_true() -> bool {
    true
}
fn default_body_limit() -> usize {
    8 * 1024 * 1024 // documents up to 2M chars of UTF-8 plus envelope
}
fn default_route_limits() -> Vec<RouteRateLimitConfig> {
    vec![
        RouteRateLimitConfig {
            name: "ia".to_string(),
            path_prefix: "/api/ia".to_string(),
            window_secs: 5 * 60,
            max: 5,
        },
        RouteRateLimitConfig {
            name: "api".to_string(),
            path_prefix: "/api".to_string(),
            window_secs: 60,
            max: 30,
        },
    ]
}
fn default_idempotency_ttl() -> u64 {
    60 * 60
}
fn default_provider_timeout() -> u64 {
    90
}
fn default_groq() -> ProviderEndpointConfig {
    ProviderEndpointConfig {
        base_url: "https://api.groq.com/openai/v1".to_string(),
        model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
        api_key: None,
    }
}
fn default_zai() -> ProviderEndpointConfig {
    ProviderEndpointConfig {
        base_url: "https://api.z.ai/api/paas/v4".to_string(),
        model: "glm-4.7".to_string(),
        api_key: None,
    }
}
fn default_ollama() -> ProviderEndpointConfig {
    ProviderEndpointConfig {
        base_url: "http://localhost:11434".to_string(),
        model: "llama3.1".to_string(),
        api_key: None,
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, apply environment overrides and
    /// validate the result.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults plus environment overrides, for running without a
    /// config file.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve secrets and the provider override from the environment.
    ///
    /// The lookup is injected so callers (and tests) decide where values come
    /// from. Values already present in the file win over absent variables;
    /// present variables win over the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(provider) = non_empty("AI_PROVIDER") {
            let id: ProviderId = provider
                .parse()
                .map_err(|e| anyhow::anyhow!("AI_PROVIDER: {}", e))?;
            self.providers.override_provider = Some(id);
        }
        if let Some(key) = non_empty("GROQ_API_KEY") {
            self.providers.groq.api_key = Some(key);
        }
        if let Some(key) = non_empty("ZAI_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.providers.zai.api_key = Some(key);
        }
        if let Some(url) = non_empty("ZAI_BASE_URL") {
            self.providers.zai.base_url = url;
        }
        if let Some(model) = non_empty("ZAI_MODEL") {
            self.providers.zai.model = model;
        }
        if let Some(url) = non_empty("OLLAMA_BASE_URL") {
            self.providers.ollama.base_url = url;
        }
        if let Some(model) = non_empty("OLLAMA_MODEL") {
            self.providers.ollama.model = model;
        }
        Ok(())
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.trim().is_empty() {
            anyhow::bail!("server.listen must not be empty");
        }
        if self.server.admin_listen.trim().is_empty() {
            anyhow::bail!("server.admin_listen must not be empty");
        }
        if self.server.admin_listen == self.server.listen {
            anyhow::bail!("server.admin_listen must differ from server.listen");
        }

        for route in &self.rate_limit.routes {
            if !route.path_prefix.starts_with('/') {
                anyhow::bail!(
                    "rate limit route '{}' has path_prefix '{}' not starting with '/'",
                    route.name,
                    route.path_prefix
                );
            }
            if route.window_secs == 0 || route.max == 0 {
                anyhow::bail!(
                    "rate limit route '{}' needs non-zero window_secs and max",
                    route.name
                );
            }
        }

        let mut names: Vec<&str> = self.rate_limit.routes.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            anyhow::bail!("duplicate rate limit route name '{}'", dup[0]);
        }

        if self.idempotency.ttl_secs == 0 {
            anyhow::bail!("idempotency.ttl_secs must be greater than zero");
        }
        if self.providers.timeout_secs == 0 {
            anyhow::bail!("providers.timeout_secs must be greater than zero");
        }

        Ok(())
    }
}
