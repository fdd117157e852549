use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CallContext, Error, EventStream, StreamOptions};

/// A model offered by a provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    /// The identifier sent to the backend.
    pub id: String,
    /// A human readable name.
    pub name: String,
    /// The name of the provider serving this model.
    pub provider: String,
}

impl Model {
    /// Creates a model entry.
    pub fn new<ID, N, P>(id: ID, name: N, provider: P) -> Self
    where
        ID: Into<String>,
        N: Into<String>,
        P: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            provider: provider.into(),
        }
    }
}

/// A model backend behind a uniform streaming interface.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The unique name of this provider, used as the `provider` part of
    /// qualified model references.
    fn name(&self) -> &str;

    /// The statically configured models.
    fn models(&self) -> Vec<Model>;

    /// Starts a streaming call.
    ///
    /// Errors that happen before the first event (validation, transport,
    /// cancellation) are returned directly. Once the stream is returned,
    /// failures arrive as a single terminal `StreamEvent::Error`.
    async fn create_stream(
        &self,
        ctx: CallContext,
        options: StreamOptions,
    ) -> Result<EventStream, Error>;

    /// Returns the live model listing capability, if the provider has one.
    fn as_model_fetcher(&self) -> Option<&dyn ModelFetcher> {
        None
    }
}

/// Lists models by asking the backend.
#[async_trait]
pub trait ModelFetcher: Send + Sync {
    /// Fetches the current model list.
    async fn fetch_models(&self, ctx: &CallContext) -> Result<Vec<Model>, Error>;
}
