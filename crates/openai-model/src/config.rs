use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use conduit_model::Pricing;

const DEFAULT_NAME: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_MODELS: &[(&str, &str)] = &[
    ("gpt-4o", "GPT-4o"),
    ("gpt-4o-mini", "GPT-4o Mini"),
    ("gpt-4.1", "GPT-4.1"),
    ("gpt-4.1-mini", "GPT-4.1 Mini"),
    ("gpt-5", "GPT-5"),
    ("gpt-5-mini", "GPT-5 Mini"),
    ("gpt-5.2", "GPT-5.2"),
];

/// Builder for [`OpenAIConfig`].
#[derive(Clone)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    name: Option<String>,
    base_url: Option<String>,
    models: Vec<(String, String)>,
    connect_timeout: Option<Duration>,
    pricing: Option<Arc<dyn Pricing>>,
    list_models: bool,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            name: None,
            base_url: None,
            models: vec![],
            connect_timeout: None,
            pricing: None,
            list_models: false,
        }
    }

    /// Sets the provider name, e.g. `openrouter` for an OpenAI-compatible
    /// gateway.
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

    /// Adds a model to the static list. When no model is added, a curated
    /// list of OpenAI models is used.
    #[inline]
    pub fn with_model<ID: Into<String>, N: Into<String>>(
        mut self,
        id: ID,
        name: N,
    ) -> Self {
        self.models.push((id.into(), name.into()));
        self
    }

    /// Lists models from the backend's `/models` endpoint instead of the
    /// static list, as gateways like OpenRouter serve a changing catalog.
    #[inline]
    pub fn with_model_listing(mut self) -> Self {
        self.list_models = true;
        self
    }

    /// Sets the connect timeout of the HTTP client.
    #[inline]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the price table used to fill in [`Usage::cost`].
    ///
    /// [`Usage::cost`]: conduit_model::Usage::cost
    #[inline]
    pub fn with_pricing(mut self, pricing: Arc<dyn Pricing>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OpenAIConfig {
        let models = if self.models.is_empty() {
            DEFAULT_MODELS
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect()
        } else {
            self.models
        };
        OpenAIConfig {
            api_key: self.api_key,
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            base_url: self
                .base_url
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            models,
            connect_timeout: self
                .connect_timeout
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            pricing: self.pricing,
            list_models: self.list_models,
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("connect_timeout", &self.connect_timeout)
            .field("pricing", &self.pricing.is_some())
            .field("list_models", &self.list_models)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) models: Vec<(String, String)>,
    pub(crate) connect_timeout: Duration,
    pub(crate) pricing: Option<Arc<dyn Pricing>>,
    pub(crate) list_models: bool,
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("connect_timeout", &self.connect_timeout)
            .field("pricing", &self.pricing.is_some())
            .field("list_models", &self.list_models)
            .finish()
    }
}
