use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use conduit_model::Pricing;
use conduit_model::lifecycle::{Credential, TokenRefresher};

const DEFAULT_NAME: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";
const DEFAULT_MAX_TOKENS: u32 = 16384;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_MODELS: &[(&str, &str)] = &[
    ("claude-sonnet-4-5-20250929", "Claude Sonnet 4.5"),
    ("claude-haiku-4-5-20251001", "Claude Haiku 4.5"),
];

/// How requests are authenticated.
#[derive(Clone)]
pub(crate) enum Credentials {
    ApiKey(String),
    OAuth {
        credential: Credential,
        refresher: Option<Arc<dyn TokenRefresher>>,
    },
}

/// Builder for [`AnthropicConfig`].
#[derive(Clone)]
pub struct AnthropicConfigBuilder {
    credentials: Credentials,
    name: Option<String>,
    base_url: Option<String>,
    token_url: Option<String>,
    models: Vec<(String, String)>,
    max_tokens: Option<u32>,
    connect_timeout: Option<Duration>,
    pricing: Option<Arc<dyn Pricing>>,
}

impl AnthropicConfigBuilder {
    /// Creates a builder authenticating with an API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self::new(Credentials::ApiKey(api_key.into()))
    }

    /// Creates a builder authenticating with an OAuth credential, which is
    /// refreshed shortly before it expires.
    #[inline]
    pub fn with_oauth(credential: Credential) -> Self {
        Self::new(Credentials::OAuth {
            credential,
            refresher: None,
        })
    }

    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            name: None,
            base_url: None,
            token_url: None,
            models: vec![],
            max_tokens: None,
            connect_timeout: None,
            pricing: None,
        }
    }

    /// Sets the provider name.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the OAuth token endpoint.
    #[inline]
    pub fn with_token_url<S: Into<String>>(mut self, token_url: S) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    /// Replaces the HTTP token refresher. Has no effect for API keys.
    #[inline]
    pub fn with_token_refresher(
        mut self,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        if let Credentials::OAuth { refresher: slot, .. } = &mut self.credentials
        {
            *slot = Some(refresher);
        }
        self
    }

    /// Adds a model to the static list.
    #[inline]
    pub fn with_model<ID: Into<String>, N: Into<String>>(
        mut self,
        id: ID,
        name: N,
    ) -> Self {
        self.models.push((id.into(), name.into()));
        self
    }

    /// Sets the `max_tokens` sent with every request.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the connect timeout of the HTTP client.
    #[inline]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the price table used to fill in the usage cost.
    #[inline]
    pub fn with_pricing(mut self, pricing: Arc<dyn Pricing>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> AnthropicConfig {
        let models = if self.models.is_empty() {
            DEFAULT_MODELS
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect()
        } else {
            self.models
        };
        AnthropicConfig {
            credentials: self.credentials,
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            base_url: self
                .base_url
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token_url: self
                .token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            models,
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            connect_timeout: self
                .connect_timeout
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            pricing: self.pricing,
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credentials::OAuth { credential, .. } => {
                f.debug_tuple("OAuth").field(credential).finish()
            }
        }
    }
}

impl Debug for AnthropicConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfigBuilder")
            .field("credentials", &self.credentials)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

/// Configuration for the Anthropic provider.
#[derive(Clone)]
pub struct AnthropicConfig {
    pub(crate) credentials: Credentials,
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) token_url: String,
    pub(crate) models: Vec<(String, String)>,
    pub(crate) max_tokens: u32,
    pub(crate) connect_timeout: Duration,
    pub(crate) pricing: Option<Arc<dyn Pricing>>,
}

impl Debug for AnthropicConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("credentials", &self.credentials)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("models", &self.models)
            .field("max_tokens", &self.max_tokens)
            .field("connect_timeout", &self.connect_timeout)
            .field("pricing", &self.pricing.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn test_redacted_debug() {
        let config = AnthropicConfigBuilder::with_api_key("sk-ant-api-secret")
            .build();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-ant-api-secret"));
        assert_eq!(config.max_tokens, 16384);
        assert_eq!(config.models.len(), 2);

        let config = AnthropicConfigBuilder::with_oauth(Credential {
            access_token: "sk-ant-oat-secret".to_owned(),
            refresh_token: "sk-ant-ort-secret".to_owned(),
            expires_at: SystemTime::now(),
        })
        .build();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
    }
}
