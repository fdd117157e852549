//! A model provider for the Anthropic messages API.
//!
//! Requests authenticate either with an API key or with an OAuth credential.
//! OAuth access tokens are refreshed shortly before they expire, and
//! concurrent requests share a single refresh.

#[macro_use]
extern crate tracing;

mod auth;
mod config;
mod proto;
mod response;

use std::sync::Arc;

use async_trait::async_trait;
use conduit_model::lifecycle::{Credential, LazyClient};
use conduit_model::{
    CallContext, Error, EventStream, Model, Provider, StreamOptions,
};
use conduit_transport::{
    Chunks, Sse, check_content_type, check_status, transport_error,
};
use reqwest::{Client, header};

pub use auth::HttpTokenRefresher;
use auth::Auth;
pub use config::{AnthropicConfig, AnthropicConfigBuilder};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic model provider.
#[derive(Debug)]
pub struct AnthropicProvider {
    client: LazyClient<Client>,
    auth: Auth,
    config: Arc<AnthropicConfig>,
}

impl AnthropicProvider {
    /// Creates a new `AnthropicProvider` with the given configuration.
    pub fn new(config: AnthropicConfig) -> Self {
        let auth = Auth::new(config.credentials.clone(), &config.token_url);
        Self {
            client: LazyClient::new(),
            auth,
            config: Arc::new(config),
        }
    }

    /// Returns the current OAuth credential, which changes after every
    /// refresh. Returns `None` for API key authentication.
    pub async fn credential(&self) -> Option<Credential> {
        match &self.auth {
            Auth::ApiKey(_) => None,
            Auth::OAuth(guard) => Some(guard.credential().await),
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
impl Provider for AnthropicProvider {
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
        let body = proto::create_request(&options, self.config.max_tokens);
        let client = self.client().await?;

        let req = client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header(header::ACCEPT, "text/event-stream")
            .json(&body);
        let req = self.auth.apply(&ctx, req).await?;

        debug!(
            "sending request to {} with {} messages",
            self.config.name,
            options.messages.len()
        );
        let resp = ctx.run(req.send()).await?.map_err(transport_error)?;
        let resp = ctx.run(check_status(resp)).await??;
        check_content_type(&resp, mime::TEXT_EVENT_STREAM.essence_str())?;

        let sse = Sse::new(Chunks::from_response(resp));
        Ok(response::spawn(
            ctx,
            sse,
            options.model,
            self.config.pricing.clone(),
        ))
    }
}
