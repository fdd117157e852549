use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

const DEFAULT_NAME: &str = "ollama";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_MODELS: &[(&str, &str)] = &[
    ("glm-4.7-flash", "GLM-4.7 Flash"),
    ("ministral-3:8b", "Ministral 3 8B"),
    ("devstral-small-2", "Devstral Small 2"),
    ("llama3.2:1b", "Llama 3.2 1B"),
    ("qwen3:1.7b", "Qwen 3 1.7B"),
    ("qwen3:0.6b", "Qwen 3 0.6B"),
    ("qwen2.5:0.5b", "Qwen 2.5 0.5B"),
];

/// Builder for [`OllamaConfig`].
#[derive(Clone, Default)]
pub struct OllamaConfigBuilder {
    name: Option<String>,
    base_url: Option<String>,
    models: Vec<(String, String)>,
    connect_timeout: Option<Duration>,
}

impl OllamaConfigBuilder {
    /// Creates a builder for a local Ollama server.
    #[inline]
    pub fn new() -> Self {
        Self::default()
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

    /// Adds a model to the static list, which is used when the server
    /// cannot be asked.
    #[inline]
    pub fn with_model<ID: Into<String>, N: Into<String>>(
        mut self,
        id: ID,
        name: N,
    ) -> Self {
        self.models.push((id.into(), name.into()));
        self
    }

    /// Sets the connect timeout of the HTTP client.
    #[inline]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OllamaConfig {
        let models = if self.models.is_empty() {
            DEFAULT_MODELS
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect()
        } else {
            self.models
        };
        OllamaConfig {
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            base_url: self
                .base_url
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            models,
            connect_timeout: self
                .connect_timeout
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        }
    }
}

impl Debug for OllamaConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaConfigBuilder")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Configuration for the Ollama provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OllamaConfig {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) models: Vec<(String, String)>,
    pub(crate) connect_timeout: Duration,
}
