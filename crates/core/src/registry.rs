use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use conduit_model::{
    CallContext, Error, EventStream, Model, Provider, StreamOptions,
};

/// Providers by name, resolving `provider/model` references.
///
/// Build it once, then share it behind an `Arc`; every read is `&self`.
#[derive(Default)]
pub struct Registry {
    providers: HashMap<String, Arc<dyn Provider>>,
    models: Vec<Model>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under its name.
    ///
    /// Registering a name twice replaces the earlier provider and its
    /// models.
    pub fn register<P: Provider + 'static>(&mut self, provider: P) {
        self.register_arc(Arc::new(provider));
    }

    /// Registers a shared provider. See [`register`](Self::register).
    pub fn register_arc(&mut self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_owned();
        if self.providers.contains_key(&name) {
            warn!("replacing provider `{name}`");
            self.models.retain(|model| model.provider != name);
        }
        self.models.extend(provider.models().into_iter().map(|model| Model {
            id: format!("{name}/{}", model.id),
            name: model.name,
            provider: name.clone(),
        }));
        debug!("registered provider `{name}`");
        self.providers.insert(name, provider);
    }

    /// Returns the provider registered as `name`.
    pub fn provider(&self, name: &str) -> Result<Arc<dyn Provider>, Error> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("provider `{name}`")))
    }

    /// Splits `reference` on its first `/` into a provider and a bare
    /// model id.
    pub fn resolve_model<'r>(
        &self,
        reference: &'r str,
    ) -> Result<(Arc<dyn Provider>, &'r str), Error> {
        let Some((provider, model)) = reference.split_once('/') else {
            return Err(Error::bad_request(format!(
                "invalid model reference `{reference}`, expected provider/model"
            )));
        };
        Ok((self.provider(provider)?, model))
    }

    /// Returns the models of every provider, with `provider/` prefixed ids.
    #[inline]
    pub fn all_models(&self) -> &[Model] {
        &self.models
    }

    /// Lists the models of one provider, asking the backend when it can
    /// list them and falling back to the static list otherwise.
    pub async fn fetch_models(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> Result<Vec<Model>, Error> {
        let provider = self.provider(name)?;
        match provider.as_model_fetcher() {
            Some(fetcher) => fetcher.fetch_models(ctx).await,
            None => Ok(provider.models()),
        }
    }

    /// Resolves `options.model` and starts a stream on its provider, which
    /// sees the bare model id.
    pub async fn create_stream(
        &self,
        ctx: CallContext,
        mut options: StreamOptions,
    ) -> Result<EventStream, Error> {
        options.validate()?;
        let (provider, model) = self.resolve_model(&options.model)?;
        options.model = model.to_owned();
        provider.create_stream(ctx, options).await
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("models", &self.models)
            .finish()
    }
}
