//! A model provider for a local [Ollama](https://ollama.com) server.
//!
//! Responses are streamed as newline-delimited JSON. The installed models
//! can be listed through [`ModelFetcher`].

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_model::lifecycle::LazyClient;
use conduit_model::{
    CallContext, Error, EventStream, Model, ModelFetcher, Provider,
    StreamOptions,
};
use conduit_transport::{
    Chunks, Ndjson, check_content_type, check_status, transport_error,
};
use reqwest::Client;

pub use config::{OllamaConfig, OllamaConfigBuilder};

const NDJSON: &str = "application/x-ndjson";

/// Ollama model provider.
#[derive(Debug)]
pub struct OllamaProvider {
    client: LazyClient<Client>,
    config: Arc<OllamaConfig>,
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider` with the given configuration.
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: LazyClient::new(),
            config: Arc::new(config),
        }
    }

    /// Pulls every model in `models` that is not installed yet, one at a
    /// time. Fails on the first pull the server reports as failed.
    pub async fn download(
        &self,
        ctx: &CallContext,
        models: &[Model],
    ) -> Result<(), Error> {
        let installed: HashSet<String> = self
            .fetch_models(ctx)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        for model in models {
            if installed.contains(&model.id) {
                debug!("model {} is already installed", model.id);
                continue;
            }
            self.pull(ctx, &model.id).await?;
        }
        Ok(())
    }

    async fn pull(&self, ctx: &CallContext, id: &str) -> Result<(), Error> {
        let client = self.client().await?;
        let req = client
            .post(format!("{}/api/pull", self.config.base_url))
            .json(&serde_json::json!({ "name": id }));
        info!("pulling model {id}");
        let resp = ctx.run(req.send()).await?.map_err(transport_error)?;
        let resp = ctx.run(check_status(resp)).await??;

        let mut lines = Ndjson::new(Chunks::from_response(resp));
        while let Some(line) = ctx.run(lines.next_line()).await?? {
            let Ok(progress) = serde_json::from_str::<proto::PullStatus>(&line)
            else {
                trace!("skipping unreadable pull line: {line}");
                continue;
            };
            if let Some(err) = progress.error {
                return Err(Error::transport(format!("pull of {id} failed: {err}")));
            }
            if progress.status.contains("success") {
                info!("pulled model {id}");
                return Ok(());
            }
            if progress.status.to_lowercase().contains("error") {
                return Err(Error::transport(format!(
                    "pull of {id} failed: {}",
                    progress.status
                )));
            }
            trace!("pull {id}: {}", progress.status);
        }
        Ok(())
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

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(OllamaConfigBuilder::new().build())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
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
        let body = proto::create_request(&options);
        let client = self.client().await?;

        let req = client
            .post(format!("{}/api/chat", self.config.base_url))
            .json(&body);
        debug!(
            "sending request to {} with {} messages",
            self.config.name,
            options.messages.len()
        );
        let resp = ctx.run(req.send()).await?.map_err(transport_error)?;
        let resp = ctx.run(check_status(resp)).await??;
        check_content_type(&resp, NDJSON)?;

        let lines = Ndjson::new(Chunks::from_response(resp));
        Ok(response::spawn(ctx, lines, options.model))
    }

    fn as_model_fetcher(&self) -> Option<&dyn ModelFetcher> {
        Some(self)
    }
}

#[async_trait]
impl ModelFetcher for OllamaProvider {
    async fn fetch_models(&self, ctx: &CallContext) -> Result<Vec<Model>, Error> {
        let client = self.client().await?;
        let req = client.get(format!("{}/api/tags", self.config.base_url));
        let resp = ctx.run(req.send()).await?.map_err(transport_error)?;
        let resp = ctx.run(check_status(resp)).await??;
        let tags: proto::TagsResponse = ctx
            .run(resp.json())
            .await?
            .map_err(|err| Error::protocol(format!("malformed model list: {err}")))?;
        Ok(tags
            .models
            .into_iter()
            .map(|tag| Model::new(&tag.name, &tag.name, &self.config.name))
            .collect())
    }
}
