//! Lazily built clients and guarded credential refresh.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};

use crate::{CallContext, Error};

/// Refresh a credential this long before it expires.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(5 * 60);

/// A client that is constructed on first use.
///
/// Concurrent first callers wait for a single construction. The outcome,
/// failures included, is shared by every later call.
pub struct LazyClient<T> {
    cell: OnceCell<Result<Arc<T>, Error>>,
}

impl<T> LazyClient<T> {
    /// Creates an unconstructed client.
    #[inline]
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the client, constructing it with `init` if needed.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<T>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.cell
            .get_or_init(|| async { init().await.map(Arc::new) })
            .await
            .clone()
    }

    /// Returns `true` once construction has completed.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T> Default for LazyClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for LazyClient<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClient")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// An OAuth credential pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// The bearer token.
    pub access_token: String,
    /// The token used to obtain a new access token.
    pub refresh_token: String,
    /// When `access_token` stops being valid.
    pub expires_at: SystemTime,
}

impl Credential {
    /// Returns `true` if the access token expires within `skew` from now.
    #[inline]
    pub fn expires_within(&self, skew: Duration) -> bool {
        SystemTime::now() + skew >= self.expires_at
    }

    fn apply(&mut self, token: RefreshedToken) {
        self.access_token = token.access_token;
        if let Some(refresh_token) = token.refresh_token {
            self.refresh_token = refresh_token;
        }
        self.expires_at = SystemTime::now() + token.expires_in;
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The answer of a token endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshedToken {
    /// The new bearer token.
    pub access_token: String,
    /// A rotated refresh token, if the endpoint issued one.
    pub refresh_token: Option<String>,
    /// Lifetime of the new access token.
    pub expires_in: Duration,
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Performs the exchange.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, Error>;
}

/// Serializes credential refresh for a provider.
///
/// The credential is read and replaced while holding one lock, so callers
/// racing on an expiring token trigger a single refresh and all observe
/// its result.
pub struct TokenGuard {
    credential: Mutex<Credential>,
    refresher: Arc<dyn TokenRefresher>,
    skew: Duration,
}

impl TokenGuard {
    /// Creates a guard refreshing [`DEFAULT_REFRESH_SKEW`] before expiry.
    pub fn new(credential: Credential, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            credential: Mutex::new(credential),
            refresher,
            skew: DEFAULT_REFRESH_SKEW,
        }
    }

    /// Sets how long before expiry the token is refreshed.
    #[inline]
    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    /// Returns a valid access token, refreshing it first if it is about to
    /// expire.
    pub async fn access_token(&self, ctx: &CallContext) -> Result<String, Error> {
        let mut credential = ctx.run(self.credential.lock()).await?;
        if credential.expires_within(self.skew) {
            if credential.refresh_token.is_empty() {
                return Err(Error::transport(
                    "access token expired and no refresh token is available",
                ));
            }
            debug!("refreshing access token");
            let token = ctx
                .run(self.refresher.refresh(&credential.refresh_token))
                .await??;
            credential.apply(token);
            info!("access token refreshed");
        }
        Ok(credential.access_token.clone())
    }

    /// Returns a snapshot of the current credential, e.g. for persisting a
    /// rotated refresh token.
    pub async fn credential(&self) -> Credential {
        self.credential.lock().await.clone()
    }
}

impl Debug for TokenGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGuard")
            .field("skew", &self.skew)
            .finish_non_exhaustive()
    }
}
