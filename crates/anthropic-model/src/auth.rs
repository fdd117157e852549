use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_model::lifecycle::{
    LazyClient, RefreshedToken, TokenGuard, TokenRefresher,
};
use conduit_model::{CallContext, Error};
use conduit_transport::{check_status, transport_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Credentials;

/// OAuth tokens need this beta flag on every request.
pub const OAUTH_BETA: &str = "oauth-2025-04-20";

/// The resolved request authentication.
#[derive(Debug)]
pub enum Auth {
    ApiKey(String),
    OAuth(Arc<TokenGuard>),
}

impl Auth {
    pub fn new(credentials: Credentials, token_url: &str) -> Self {
        match credentials {
            Credentials::ApiKey(key) => Auth::ApiKey(key),
            Credentials::OAuth {
                credential,
                refresher,
            } => {
                let refresher = refresher.unwrap_or_else(|| {
                    Arc::new(HttpTokenRefresher::new(token_url))
                });
                Auth::OAuth(Arc::new(TokenGuard::new(credential, refresher)))
            }
        }
    }

    /// Adds the authentication headers to `req`.
    pub async fn apply(
        &self,
        ctx: &CallContext,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, Error> {
        Ok(match self {
            Auth::ApiKey(key) => req.header("x-api-key", key),
            Auth::OAuth(guard) => {
                let token = guard.access_token(ctx).await?;
                req.bearer_auth(token).header("anthropic-beta", OAUTH_BETA)
            }
        })
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
}

/// Exchanges refresh tokens at an OAuth token endpoint.
#[derive(Debug)]
pub struct HttpTokenRefresher {
    client: LazyClient<Client>,
    token_url: String,
}

impl HttpTokenRefresher {
    /// Creates a refresher posting to `token_url`.
    pub fn new<S: Into<String>>(token_url: S) -> Self {
        Self {
            client: LazyClient::new(),
            token_url: token_url.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, Error> {
        let client = self
            .client
            .get_or_init(|| async {
                Client::builder().build().map_err(transport_error)
            })
            .await?;
        debug!("posting refresh grant to {}", self.token_url);
        let resp = client
            .post(&self.token_url)
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token,
            })
            .send()
            .await
            .map_err(transport_error)?;
        let resp = check_status(resp).await?;
        let body: RefreshResponse = resp.json().await.map_err(|err| {
            Error::transport(format!("malformed token response: {err}"))
        })?;
        Ok(RefreshedToken {
            access_token: body.access_token,
            refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
            expires_in: Duration::from_secs(body.expires_in),
        })
    }
}
