//! Request orchestration
//!
//! [`Fetch`] drives one logical data source: it builds requests from its
//! resolved [`Config`], consults the cache, talks to the [`Transport`], retries
//! and times out attempts, and publishes `loading`, `data` and `error` for a
//! binding layer to observe.
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use fetchkit_http::{
    AbortController, HttpClient, HttpError, Method, RawResponse, RequestOptions, Transport,
};
use serde_json::Value;
use tokio::sync::watch;
use tracing::instrument;

use crate::cache::{Cache, Clock, MemoryCache, PersistentCache, SystemClock};
use crate::config::{Config, InterceptedResponse, ResponseContext, RetryContext, RetryOn};
use crate::data::{try_get_data, Data};
use crate::error::Error;
use crate::request::{build_request, BodyArg, BuildRequest, RouteOrBody};
use crate::storage::Storage;
use crate::view::ResponseView;

mod state;
mod suspense;

pub use self::state::Lifecycle;
use self::state::FetchState;
pub use self::suspense::{SuspenseStatus, Suspended};

/// Where the engine runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    /// Interactive runtime; requests are performed
    #[default]
    Interactive,
    /// Server side rendering; requests are skipped and persistent storage is never touched
    Server,
}

/// Result of one attempt
enum Step {
    Done(Option<Data>),
    Retry(RetryContext),
}

#[derive(Debug)]
struct Inner {
    config: ArcSwap<Config>,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn Cache>,
    environment: Environment,
    state: FetchState,
}

/// Data fetching engine
///
/// Cheap to clone; clones share configuration, state and cache.
#[derive(Debug, Clone)]
pub struct Fetch {
    inner: Arc<Inner>,
}

/// Builder for creating a new [`Fetch`]
#[derive(Debug)]
pub struct FetchBuilder {
    config: Arc<Config>,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn Cache>>,
    storage: Option<Arc<dyn Storage>>,
    clock: Option<Arc<dyn Clock>>,
    environment: Environment,
}

impl FetchBuilder {
    /// Create a new FetchBuilder
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        Self {
            config: config.into(),
            transport: None,
            cache: None,
            storage: None,
            clock: None,
            environment: Environment::default(),
        }
    }

    /// Set the transport, defaults to a reqwest [`HttpClient`]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing cache instead of creating one
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Storage backing the cache when `persist` is on
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Clock used by a cache created by the builder
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the runtime environment
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Build the engine
    pub fn build(self) -> Fetch {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let cache: Arc<dyn Cache> = match (self.cache, self.storage) {
            (Some(cache), _) => cache,
            (None, Some(storage))
                if config.persist && self.environment == Environment::Interactive =>
            {
                Arc::new(PersistentCache::with_clock(storage, config.cache_life, clock))
            }
            (None, _) => {
                if config.persist {
                    tracing::warn!("Persistent storage unavailable, caching in memory");
                }
                Arc::new(MemoryCache::with_clock(config.cache_life, clock))
            }
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpClient::new()));

        let state = FetchState::new(
            config.loading,
            config.data.clone(),
            config.dependencies.clone(),
        );

        Fetch {
            inner: Arc::new(Inner {
                config: ArcSwap::new(config),
                transport,
                cache,
                environment: self.environment,
                state,
            }),
        }
    }
}

/// Resolves after `timeout`, never when it is zero
async fn expire(timeout: Duration) {
    if timeout.is_zero() {
        std::future::pending::<()>().await
    } else {
        tokio::time::sleep(timeout).await
    }
}

impl Fetch {
    /// Engine with the default transport and an in memory cache
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        FetchBuilder::new(config).build()
    }

    /// Create a new FetchBuilder
    pub fn builder(config: impl Into<Arc<Config>>) -> FetchBuilder {
        FetchBuilder::new(config)
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        self.inner.config.load_full()
    }

    /// Whether a request is in flight
    pub fn loading(&self) -> bool {
        self.inner.state.loading()
    }

    /// Latest data
    pub fn data(&self) -> Option<Data> {
        self.inner.state.data()
    }

    /// Error of the latest request
    pub fn error(&self) -> Option<Error> {
        self.inner.state.error()
    }

    /// Whether another page may be loaded
    pub fn has_more(&self) -> bool {
        self.inner.state.has_more()
    }

    /// Zero based attempt of the latest request
    pub fn attempt(&self) -> u32 {
        self.inner.state.attempt()
    }

    /// Lifecycle of the owning component
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lifecycle()
    }

    /// Cache used by this engine
    pub fn cache(&self) -> Arc<dyn Cache> {
        Arc::clone(&self.inner.cache)
    }

    /// Live view of the latest response
    ///
    /// Every call returns a handle on the same holder.
    pub fn response(&self) -> ResponseView {
        ResponseView::new(self.inner.state.holder())
    }

    /// Revision counter bumped on every observable change
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.state.subscribe()
    }

    /// Abort the in-flight request, if any
    pub fn abort(&self) {
        if let Some(controller) = self.inner.state.controller() {
            tracing::debug!("Aborting in-flight request");
            controller.abort();
        }
    }

    /// Mark the owner as mounted and run the automatic fetch
    ///
    /// The automatic fetch only happens when the configuration carries a
    /// dependency list.
    pub async fn mount(&self) -> Result<Option<Data>, Error> {
        self.inner.state.mount();
        let config = self.config();
        if config.dependencies.is_some() {
            self.request(config.method, None, None).await
        } else {
            Ok(self.data())
        }
    }

    /// Tear down: abort the in-flight request and freeze the state
    pub fn unmount(&self) {
        self.inner.state.unmount();
        self.abort();
    }

    /// Replace the dependency list, fetching again when it changed
    pub async fn set_dependencies(&self, dependencies: Vec<Value>) -> Result<Option<Data>, Error> {
        let config = self.config();
        if config.dependencies.is_none() || !self.inner.state.replace_dependencies(dependencies) {
            return Ok(self.data());
        }

        if self.lifecycle() != Lifecycle::Mounted {
            return Ok(self.data());
        }

        self.request(config.method, None, None).await
    }

    /// Swap in a newly resolved configuration
    ///
    /// Fetches again when the new dependency list differs from the current one.
    /// The cache chosen at build time is kept.
    pub async fn reconfigure(&self, config: Arc<Config>) -> Result<Option<Data>, Error> {
        let previous = self.inner.config.swap(Arc::clone(&config));
        if Arc::ptr_eq(&previous, &config) {
            return Ok(self.data());
        }

        match config.dependencies.clone() {
            Some(dependencies) => self.set_dependencies(dependencies).await,
            None => Ok(self.data()),
        }
    }

    /// Send a GraphQL query
    pub async fn query(&self, query: &str, variables: Option<Value>) -> Result<Option<Data>, Error> {
        self.graphql("query", query, variables).await
    }

    /// Send a GraphQL mutation
    pub async fn mutate(
        &self,
        mutation: &str,
        variables: Option<Value>,
    ) -> Result<Option<Data>, Error> {
        self.graphql("mutation", mutation, variables).await
    }

    async fn graphql(
        &self,
        kind: &str,
        document: &str,
        variables: Option<Value>,
    ) -> Result<Option<Data>, Error> {
        if !self.config().graphql {
            tracing::debug!("Sending a GraphQL {} outside a GraphQL provider", kind);
        }

        let mut body = serde_json::Map::new();
        body.insert("query".to_string(), Value::String(document.to_string()));
        if let Some(variables) = variables {
            body.insert("variables".to_string(), variables);
        }

        self.request(Method::Post, Some(RouteOrBody::Body(Value::Object(body))), None)
            .await
    }

    /// Perform a request, retrying per the configuration
    ///
    /// Configuration and interceptor contract errors are returned as `Err`.
    /// Network, status, timeout and extraction failures land in
    /// [`error`](Fetch::error) and the call resolves to the latest data.
    #[instrument(skip(self, route_or_body, body))]
    pub async fn request(
        &self,
        method: Method,
        route_or_body: Option<RouteOrBody>,
        body: Option<BodyArg>,
    ) -> Result<Option<Data>, Error> {
        if self.inner.environment == Environment::Server {
            tracing::debug!("Skipping request outside an interactive environment");
            return Ok(self.data());
        }

        let config = self.config();
        let mut attempt = 0;

        loop {
            self.inner.state.set_attempt(attempt);

            let step = self
                .run_attempt(&config, method, route_or_body.as_ref(), body.as_ref(), attempt)
                .await?;

            match step {
                Step::Done(data) => return Ok(data),
                Step::Retry(context) => {
                    let delay = config.retry_delay.delay_for(&context);
                    tracing::debug!(
                        "Retrying {} after attempt {} in {}ms",
                        method,
                        attempt,
                        delay.as_millis()
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    if self.lifecycle() == Lifecycle::Unmounted {
                        return Ok(self.data());
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        config: &Config,
        method: Method,
        route_or_body: Option<&RouteOrBody>,
        body_arg: Option<&BodyArg>,
        attempt: u32,
    ) -> Result<Step, Error> {
        let state = &self.inner.state;

        let controller = AbortController::new();
        if let Some(on_abort) = config.on_abort.clone() {
            controller.on_abort(move || on_abort());
        }
        let controller_id = state.install_controller(controller.clone());

        let built = build_request(BuildRequest {
            url: &config.url,
            path: &config.path,
            method,
            headers: &config.headers,
            body: config.body.as_ref(),
            signal: controller.signal(),
            cache_policy: config.cache_policy,
            cache: self.inner.cache.as_ref(),
            interceptor: config.interceptors.request.as_ref(),
            route_or_body,
            body_arg,
        })
        .await;

        let built = match built {
            Ok(built) => built,
            Err(err) => {
                state.release_controller(controller_id);
                return Err(err);
            }
        };

        if !config.suspense {
            state.set_loading(true);
        }
        state.set_error(None);

        if let Some(cached) = built.cache.response.clone() {
            tracing::debug!("Cache hit for {}", built.url);
            return match self.publish(config, cached, &built.options, false).await {
                Ok(data) => {
                    self.finish(config, controller_id, None);
                    Ok(Step::Done(Some(data)))
                }
                Err(err @ Error::ContractViolation(_)) => {
                    self.finish(config, controller_id, None);
                    Err(err)
                }
                Err(err) => {
                    state.set_error(Some(err));
                    self.finish(config, controller_id, None);
                    Ok(Step::Done(self.data()))
                }
            };
        }

        if config.per_page > 0 && !state.has_more() && state.error().is_none() {
            tracing::debug!("No more pages to load");
            self.finish(config, controller_id, None);
            return Ok(Step::Done(self.data()));
        }

        let signal = controller.signal();
        let mut timed_out = false;
        let result = tokio::select! {
            biased;
            _ = signal.aborted() => Err(HttpError::Aborted),
            _ = expire(config.timeout) => {
                timed_out = true;
                Err(HttpError::Aborted)
            }
            result = self.inner.transport.fetch(&built.url, &built.options) => result,
        };

        if timed_out {
            tracing::warn!(
                "Request to {} timed out after {}ms",
                built.url,
                config.timeout.as_millis()
            );
            state.set_timed_out(true);
            if let Some(on_timeout) = &config.on_timeout {
                on_timeout();
            }
            controller.abort();
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                return Ok(self.fail(config, controller_id, attempt, Error::from(err), timed_out));
            }
        };

        if response.ok() && config.cache_policy.writes_cache() {
            if let Err(err) = self
                .inner
                .cache
                .set(&built.response_id, response.clone())
                .await
            {
                tracing::warn!("Could not cache response for {}: {}", built.url, err);
            }
        }

        let data = match self
            .publish(config, response.clone(), &built.options, true)
            .await
        {
            Ok(data) => data,
            Err(err @ Error::ContractViolation(_)) => {
                self.finish(config, controller_id, Some(&response));
                return Err(err);
            }
            Err(err) => return Ok(self.fail(config, controller_id, attempt, err, false)),
        };

        let context = RetryContext {
            attempt,
            error: None,
            response: Some(response.clone()),
        };
        if self.should_retry_response(config, &context) {
            self.settle(controller_id);
            return Ok(Step::Retry(context));
        }

        self.finish(config, controller_id, Some(&response));
        Ok(Step::Done(Some(data)))
    }

    /// Extract, merge, intercept and publish the data of `response`
    async fn publish(
        &self,
        config: &Config,
        response: RawResponse,
        request: &RequestOptions,
        merge: bool,
    ) -> Result<Data, Error> {
        let state = &self.inner.state;
        state.set_response(response.clone());

        let extracted = try_get_data(&response, config.data.as_ref(), &config.response_type)?;
        let page_len = extracted.item_count();
        let extracted = if merge {
            config.merge_data(state.data().as_ref(), extracted)
        } else {
            extracted
        };

        let (response, data) = match &config.interceptors.response {
            Some(interceptor) => {
                let intercepted = interceptor(ResponseContext {
                    response: InterceptedResponse {
                        response,
                        data: Some(extracted),
                    },
                    request: request.clone(),
                })
                .await?;

                let data = intercepted.data.ok_or_else(|| {
                    Error::ContractViolation(
                        "the response interceptor must return a response with data".to_string(),
                    )
                })?;
                (intercepted.response, data)
            }
            None => (response, extracted),
        };

        state.set_response(response);
        state.set_data(data.clone());

        if merge && config.per_page > 0 {
            if let Some(len) = page_len {
                if len == 0 || len % config.per_page != 0 {
                    state.set_has_more(false);
                }
            }
        }

        Ok(data)
    }

    /// Classify a failed attempt
    fn fail(
        &self,
        config: &Config,
        controller_id: u64,
        attempt: u32,
        error: Error,
        timed_out: bool,
    ) -> Step {
        let state = &self.inner.state;

        if error.is_aborted() && !timed_out {
            tracing::debug!("Request aborted");
            self.finish(config, controller_id, None);
            return Step::Done(self.data());
        }

        let error = if timed_out { Error::Timeout } else { error };
        let context = RetryContext {
            attempt,
            error: Some(error.clone()),
            response: None,
        };

        if self.should_retry_error(config, &context) {
            self.settle(controller_id);
            return Step::Retry(context);
        }

        tracing::debug!("Request failed: {}", error);
        state.set_error(Some(error));
        self.finish(config, controller_id, None);
        Step::Done(self.data())
    }

    fn should_retry_response(&self, config: &Config, context: &RetryContext) -> bool {
        if context.attempt >= config.retries {
            return false;
        }

        match &config.retry_on {
            // An empty set leaves every failed response to the retry budget
            RetryOn::Statuses(statuses) if statuses.is_empty() => context
                .response
                .as_ref()
                .is_some_and(|response| !response.ok()),
            RetryOn::Statuses(statuses) => context
                .response
                .as_ref()
                .is_some_and(|response| statuses.contains(&response.status())),
            RetryOn::When(predicate) => predicate(context),
        }
    }

    fn should_retry_error(&self, config: &Config, context: &RetryContext) -> bool {
        if context.attempt >= config.retries {
            return false;
        }

        match &config.retry_on {
            RetryOn::Statuses(_) => true,
            RetryOn::When(predicate) => predicate(context),
        }
    }

    /// Per attempt cleanup
    fn settle(&self, controller_id: u64) {
        self.inner.state.set_timed_out(false);
        self.inner.state.release_controller(controller_id);
    }

    /// End of a request
    fn finish(&self, config: &Config, controller_id: u64, response: Option<&RawResponse>) {
        let state = &self.inner.state;
        self.settle(controller_id);

        if let Some(response) = response.filter(|response| !response.ok()) {
            if state.error().is_none() {
                state.set_error(Some(Error::Status {
                    status: response.status(),
                    status_text: response.status_text().to_string(),
                }));
            }
        }

        if !config.suspense {
            state.set_loading(false);
        }

        if state.lifecycle() == Lifecycle::Unmounted {
            return;
        }

        if let (Some(error), Some(on_error)) = (state.error(), &config.on_error) {
            on_error(&error);
        }
    }
}
