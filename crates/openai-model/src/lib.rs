//! A model provider for OpenAI-compatible APIs.
//!
//! Any backend speaking the chat-completions streaming protocol can be
//! reached by setting a custom name and base URL, e.g. OpenRouter.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::sync::Arc;

use async_trait::async_trait;
use conduit_model::lifecycle::LazyClient;
use conduit_model::{
    CallContext, Error, EventStream, Model, ModelFetcher, Provider,
    StreamOptions,
};
use conduit_transport::{
    Chunks, Sse, check_content_type, check_status, transport_error,
};
use reqwest::{Client, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};

/// OpenAI-compatible model provider.
#[derive(Debug)]
pub struct OpenAIProvider {
    client: LazyClient<Client>,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    ///
    /// The HTTP client is built on first use.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: LazyClient::new(),
            config: Arc::new(config),
        }
    }

    async fn client(&self) -> Result<Arc<Client>, Error> {
        let connect_timeout = self.config.connect_timeout;
        self.client
            .get_or_init(|| async move {
                debug!("building http client");
                Client::builder()
                    .connect_timeout(connect_timeout)
                    .build()
                    .map_err(transport_error)
            })
            .await
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn models(&self) -> Vec<Model> {
        self.config
            .models
            .iter()
            .map(|(id, name)| Model::new(id, name, &self.config.name))
            .collect()
    }

    async fn create_stream(
        &self,
        ctx: CallContext,
        options: StreamOptions,
    ) -> Result<EventStream, Error> {
        options.validate()?;
        let openai_req = proto::create_request(&options);
        let client = self.client().await?;

        debug!(
            "sending request to {} with {} messages",
            self.config.name,
            options.messages.len()
        );
        let resp_fut = client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "text/event-stream")
            .json(&openai_req)
            .send();
        let resp = ctx.run(resp_fut).await?.map_err(transport_error)?;
        let resp = ctx.run(check_status(resp)).await??;
        check_content_type(&resp, mime::TEXT_EVENT_STREAM.essence_str())?;

        // Here we got a successful response.
        let sse = Sse::new(Chunks::from_response(resp));
        Ok(response::spawn(
            ctx,
            sse,
            options.model,
            self.config.pricing.clone(),
        ))
    }

    fn as_model_fetcher(&self) -> Option<&dyn ModelFetcher> {
        if self.config.list_models {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl ModelFetcher for OpenAIProvider {
    async fn fetch_models(&self, ctx: &CallContext) -> Result<Vec<Model>, Error> {
        let client = self.client().await?;
        let req = client
            .get(format!("{}/models", self.config.base_url))
            .bearer_auth(&self.config.api_key);
        let resp = ctx.run(req.send()).await?.map_err(transport_error)?;
        let resp = ctx.run(check_status(resp)).await??;
        let list: proto::ModelList = ctx
            .run(resp.json())
            .await?
            .map_err(|err| Error::protocol(format!("malformed model list: {err}")))?;
        debug!("{} listed {} models", self.config.name, list.data.len());
        Ok(list
            .data
            .into_iter()
            .map(|entry| {
                let name = entry.name.unwrap_or_else(|| entry.id.clone());
                Model::new(entry.id, name, &self.config.name)
            })
            .collect())
    }
}
