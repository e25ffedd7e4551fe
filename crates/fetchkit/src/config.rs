//! Configuration resolution
//!
//! A call site hands over up to three positional arguments ([`CallArgs`]): a URL,
//! an [`Options`] object and a dependency list. [`resolve`] normalizes their
//! shape and layers them over the provider level [`ProviderContext`] and the
//! built-in defaults into one immutable [`Config`]. Precedence is always
//! call site, then provider, then default; headers merge key by key.
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use fetchkit_http::{Headers, Method, RawResponse, RequestOptions};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{Data, ResponseType};
use crate::error::Error;

/// Default cache lifetime for persisted responses
pub const PERSIST_CACHE_LIFE: Duration = Duration::from_secs(24 * 3600);

/// Default pause between retry attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Shared user supplied function
///
/// Two callbacks are equal only when they are the same allocation, which keeps
/// configuration comparison cheap and stable across resolutions.
pub struct Callback<F: ?Sized>(Arc<F>);

impl<F: ?Sized> Callback<F> {
    /// Wrap an already shared function
    pub fn from_arc(f: Arc<F>) -> Self {
        Self(f)
    }
}

impl<F: ?Sized> Clone for Callback<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F: ?Sized> PartialEq for Callback<F> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl<F: ?Sized> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

impl<F: ?Sized> Deref for Callback<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.0
    }
}

/// State handed to retry predicates and delay functions
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Zero based attempt that just failed
    pub attempt: u32,
    /// Error raised by the attempt, if any
    pub error: Option<Error>,
    /// Response returned by the attempt, if any
    pub response: Option<RawResponse>,
}

/// Retry predicate
pub type RetryPredicate = dyn Fn(&RetryContext) -> bool + Send + Sync;

/// Retry delay function
pub type RetryDelayFn = dyn Fn(&RetryContext) -> Duration + Send + Sync;

/// When a failed attempt is retried
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOn {
    /// Retry responses whose status is listed
    Statuses(Vec<u16>),
    /// Retry whenever the predicate holds
    When(Callback<RetryPredicate>),
}

impl Default for RetryOn {
    fn default() -> Self {
        RetryOn::Statuses(Vec::new())
    }
}

impl RetryOn {
    /// Retry when `predicate` returns true
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&RetryContext) -> bool + Send + Sync + 'static,
    {
        RetryOn::When(Callback(Arc::new(predicate)))
    }
}

impl From<Vec<u16>> for RetryOn {
    fn from(statuses: Vec<u16>) -> Self {
        RetryOn::Statuses(statuses)
    }
}

/// Pause between retry attempts
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDelay {
    /// Same pause before every retry
    Fixed(Duration),
    /// Pause computed from the failed attempt
    Computed(Callback<RetryDelayFn>),
}

impl Default for RetryDelay {
    fn default() -> Self {
        RetryDelay::Fixed(DEFAULT_RETRY_DELAY)
    }
}

impl RetryDelay {
    /// Pause computed by `delay`
    pub fn computed<F>(delay: F) -> Self
    where
        F: Fn(&RetryContext) -> Duration + Send + Sync + 'static,
    {
        RetryDelay::Computed(Callback(Arc::new(delay)))
    }

    /// Pause before retrying after `context`
    pub fn delay_for(&self, context: &RetryContext) -> Duration {
        match self {
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::Computed(delay) => delay(context),
        }
    }
}

impl From<Duration> for RetryDelay {
    fn from(delay: Duration) -> Self {
        RetryDelay::Fixed(delay)
    }
}

/// Cache policy
///
/// Only `cache-first` and `no-cache` have distinct behavior; the remaining
/// policies are accepted and behave like `no-cache`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Serve from cache when a live entry exists, otherwise fetch and store
    #[default]
    CacheFirst,
    /// Serve from cache, then refresh from the network
    CacheAndNetwork,
    /// Always fetch, store the result
    NetworkOnly,
    /// Only serve from cache
    CacheOnly,
    /// Never read or write the cache
    NoCache,
    /// Serve from cache when fresh, refresh otherwise
    ExactCacheAndNetwork,
}

impl CachePolicy {
    /// Whether lookups consult the cache
    pub fn reads_cache(&self) -> bool {
        matches!(self, CachePolicy::CacheFirst)
    }

    /// Whether successful responses are written to the cache
    pub fn writes_cache(&self) -> bool {
        matches!(self, CachePolicy::CacheFirst)
    }

    /// Policy name
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::CacheFirst => "cache-first",
            CachePolicy::CacheAndNetwork => "cache-and-network",
            CachePolicy::NetworkOnly => "network-only",
            CachePolicy::CacheOnly => "cache-only",
            CachePolicy::NoCache => "no-cache",
            CachePolicy::ExactCacheAndNetwork => "exact-cache-and-network",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cache-first" => Ok(CachePolicy::CacheFirst),
            "cache-and-network" => Ok(CachePolicy::CacheAndNetwork),
            "network-only" => Ok(CachePolicy::NetworkOnly),
            "cache-only" => Ok(CachePolicy::CacheOnly),
            "no-cache" => Ok(CachePolicy::NoCache),
            "exact-cache-and-network" => Ok(CachePolicy::ExactCacheAndNetwork),
            other => Err(Error::Configuration(format!(
                "unknown cache policy `{other}`"
            ))),
        }
    }
}

/// Values visible to a request interceptor
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Options about to be sent
    pub options: RequestOptions,
    /// Fully joined URL
    pub url: String,
    /// Configured path
    pub path: String,
    /// Route appended for this call
    pub route: String,
}

/// Response and data as seen by a response interceptor
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    /// Response returned by the transport
    pub response: RawResponse,
    /// Extracted data; must still be present once the interceptor returns
    pub data: Option<Data>,
}

/// Values visible to a response interceptor
#[derive(Debug, Clone)]
pub struct ResponseContext {
    /// Response and extracted data
    pub response: InterceptedResponse,
    /// Options the request was sent with
    pub request: RequestOptions,
}

/// Request interceptor
pub type RequestInterceptorFn =
    dyn Fn(RequestContext) -> BoxFuture<'static, Result<RequestOptions, Error>> + Send + Sync;

/// Response interceptor
pub type ResponseInterceptorFn = dyn Fn(ResponseContext) -> BoxFuture<'static, Result<InterceptedResponse, Error>>
    + Send
    + Sync;

/// Request and response interceptors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interceptors {
    /// Rewrites options before the request is sent
    pub request: Option<Callback<RequestInterceptorFn>>,
    /// Rewrites the response and data before they are published
    pub response: Option<Callback<ResponseInterceptorFn>>,
}

impl Interceptors {
    /// Set the request interceptor
    pub fn on_request<F>(mut self, interceptor: F) -> Self
    where
        F: Fn(RequestContext) -> BoxFuture<'static, Result<RequestOptions, Error>>
            + Send
            + Sync
            + 'static,
    {
        self.request = Some(Callback(Arc::new(interceptor)));
        self
    }

    /// Set the response interceptor
    pub fn on_response<F>(mut self, interceptor: F) -> Self
    where
        F: Fn(ResponseContext) -> BoxFuture<'static, Result<InterceptedResponse, Error>>
            + Send
            + Sync
            + 'static,
    {
        self.response = Some(Callback(Arc::new(interceptor)));
        self
    }

    fn or(self, fallback: &Interceptors) -> Self {
        Self {
            request: self.request.or_else(|| fallback.request.clone()),
            response: self.response.or_else(|| fallback.response.clone()),
        }
    }
}

/// Lifecycle hook without arguments
pub type HookFn = dyn Fn() + Send + Sync;
/// Error hook
pub type ErrorHookFn = dyn Fn(&Error) + Send + Sync;
/// Merges previously held data with newly extracted data
pub type NewDataFn = dyn Fn(Option<&Data>, Data) -> Data + Send + Sync;

/// Per-call or provider level options
///
/// Every field is optional; unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Base URL
    pub url: Option<String>,
    /// Path appended to the base URL
    pub path: Option<String>,
    /// Method used by automatic fetches
    pub method: Option<Method>,
    /// Headers, merged key by key with lower layers
    pub headers: Option<Headers>,
    /// Default request body
    pub body: Option<Value>,
    /// Cache policy
    pub cache_policy: Option<CachePolicy>,
    /// Cache entry lifetime, zero means forever
    pub cache_life: Option<Duration>,
    /// Retry budget
    pub retries: Option<u32>,
    /// Pause between retries
    pub retry_delay: Option<RetryDelay>,
    /// Retry condition
    pub retry_on: Option<RetryOn>,
    /// Per attempt time budget, zero means none
    pub timeout: Option<Duration>,
    /// Keep cached responses in persistent storage
    pub persist: Option<bool>,
    /// Body decoding strategies, tried in order
    pub response_type: Option<Vec<ResponseType>>,
    /// Interceptors
    pub interceptors: Interceptors,
    /// Called whenever the in-flight request is aborted
    pub on_abort: Option<Callback<HookFn>>,
    /// Called after a request that ended with an error
    pub on_error: Option<Callback<ErrorHookFn>>,
    /// Called when an attempt exceeds its time budget
    pub on_timeout: Option<Callback<HookFn>>,
    /// Merge function for newly extracted data
    pub on_new_data: Option<Callback<NewDataFn>>,
    /// Never expose a loading state; results are awaited through suspension
    pub suspense: Option<bool>,
    /// Page size for pagination
    pub per_page: Option<usize>,
    /// Default data, used before the first response and for empty bodies
    pub data: Option<Data>,
    /// Initial loading flag
    pub loading: Option<bool>,
}

impl Options {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set one header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name, value);
        self
    }

    /// Set the headers
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set the default body
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the cache policy
    pub fn cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = Some(cache_policy);
        self
    }

    /// Set the cache lifetime
    pub fn cache_life(mut self, cache_life: Duration) -> Self {
        self.cache_life = Some(cache_life);
        self
    }

    /// Set the retry budget
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set the retry delay
    pub fn retry_delay(mut self, retry_delay: impl Into<RetryDelay>) -> Self {
        self.retry_delay = Some(retry_delay.into());
        self
    }

    /// Set the retry condition
    pub fn retry_on(mut self, retry_on: impl Into<RetryOn>) -> Self {
        self.retry_on = Some(retry_on.into());
        self
    }

    /// Set the per attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable persistence
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }

    /// Set the body decoding strategies
    pub fn response_type(mut self, response_type: Vec<ResponseType>) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Set the interceptors
    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Set the abort hook
    pub fn on_abort<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_abort = Some(Callback(Arc::new(hook)));
        self
    }

    /// Set the error hook
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Callback(Arc::new(hook)));
        self
    }

    /// Set the timeout hook
    pub fn on_timeout<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_timeout = Some(Callback(Arc::new(hook)));
        self
    }

    /// Set the data merge function
    pub fn on_new_data<F>(mut self, merge: F) -> Self
    where
        F: Fn(Option<&Data>, Data) -> Data + Send + Sync + 'static,
    {
        self.on_new_data = Some(Callback(Arc::new(merge)));
        self
    }

    /// Enable or disable suspense mode
    pub fn suspense(mut self, suspense: bool) -> Self {
        self.suspense = Some(suspense);
        self
    }

    /// Set the page size
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Set the default data
    pub fn data(mut self, data: impl Into<Data>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the initial loading flag
    pub fn loading(mut self, loading: bool) -> Self {
        self.loading = Some(loading);
        self
    }
}

/// Provider level values shared by every call site beneath it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderContext {
    /// Global base URL
    pub url: Option<String>,
    /// Global options
    pub options: Options,
    /// Whether the provider speaks GraphQL
    pub graphql: bool,
}

impl ProviderContext {
    /// Context with a global URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Set the global options
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Mark the provider as GraphQL
    pub fn with_graphql(mut self, graphql: bool) -> Self {
        self.graphql = graphql;
        self
    }
}

/// One positional call site argument
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    /// URL string
    Url(String),
    /// Options object
    Options(Options),
    /// Dependency list
    Dependencies(Vec<Value>),
}

/// Positional call site arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs(Vec<CallArg>);

impl CallArgs {
    /// No arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a URL argument
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.0.push(CallArg::Url(url.into()));
        self
    }

    /// Append an options argument
    pub fn options(mut self, options: Options) -> Self {
        self.0.push(CallArg::Options(options));
        self
    }

    /// Append a dependency list argument
    pub fn dependencies(mut self, dependencies: Vec<Value>) -> Self {
        self.0.push(CallArg::Dependencies(dependencies));
        self
    }

    /// Append any argument
    pub fn push(mut self, arg: CallArg) -> Self {
        self.0.push(arg);
        self
    }

    /// The arguments in call order
    pub fn as_slice(&self) -> &[CallArg] {
        &self.0
    }
}

impl From<&str> for CallArgs {
    fn from(url: &str) -> Self {
        CallArgs::new().url(url)
    }
}

impl From<Options> for CallArgs {
    fn from(options: Options) -> Self {
        CallArgs::new().options(options)
    }
}

impl From<Vec<CallArg>> for CallArgs {
    fn from(args: Vec<CallArg>) -> Self {
        Self(args)
    }
}

#[derive(Debug, Default)]
struct CallShape {
    url: Option<String>,
    options: Options,
    dependencies: Option<Vec<Value>>,
}

fn shape(args: &CallArgs) -> Result<CallShape, Error> {
    let build = |url: Option<&String>, options: Option<&Options>, deps: Option<&Vec<Value>>| {
        CallShape {
            url: url.cloned(),
            options: options.cloned().unwrap_or_default(),
            dependencies: deps.cloned(),
        }
    };

    match args.as_slice() {
        [] => Ok(CallShape::default()),
        [CallArg::Url(url)] => Ok(build(Some(url), None, None)),
        [CallArg::Url(url), CallArg::Options(options)] => Ok(build(Some(url), Some(options), None)),
        [CallArg::Url(url), CallArg::Dependencies(deps)] => Ok(build(Some(url), None, Some(deps))),
        [CallArg::Url(url), CallArg::Options(options), CallArg::Dependencies(deps)] => {
            Ok(build(Some(url), Some(options), Some(deps)))
        }
        [CallArg::Options(options)] => Ok(build(None, Some(options), None)),
        [CallArg::Options(options), CallArg::Dependencies(deps)] => {
            Ok(build(None, Some(options), Some(deps)))
        }
        [CallArg::Options(_), CallArg::Options(_), ..] => Err(Error::InvalidArguments(
            "when the first argument is an options object the second argument must be a dependency list"
                .to_string(),
        )),
        [CallArg::Options(_), CallArg::Url(_), ..] => Err(Error::InvalidArguments(
            "a URL must come before the options object".to_string(),
        )),
        [CallArg::Dependencies(_), ..] => Err(Error::InvalidArguments(
            "the dependency list must be the last argument".to_string(),
        )),
        _ => Err(Error::InvalidArguments(format!(
            "unsupported argument shape ({} arguments)",
            args.as_slice().len()
        ))),
    }
}

/// Fully resolved, immutable configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL, never empty
    pub url: String,
    /// Path appended to the base URL
    pub path: String,
    /// Method used by automatic fetches
    pub method: Method,
    /// Merged headers
    pub headers: Headers,
    /// Default request body
    pub body: Option<Value>,
    /// Cache policy
    pub cache_policy: CachePolicy,
    /// Cache entry lifetime, zero means forever
    pub cache_life: Duration,
    /// Retry budget
    pub retries: u32,
    /// Pause between retries
    pub retry_delay: RetryDelay,
    /// Retry condition
    pub retry_on: RetryOn,
    /// Per attempt time budget, zero means none
    pub timeout: Duration,
    /// Keep cached responses in persistent storage
    pub persist: bool,
    /// Body decoding strategies
    pub response_type: Vec<ResponseType>,
    /// Interceptors
    pub interceptors: Interceptors,
    /// Abort hook
    pub on_abort: Option<Callback<HookFn>>,
    /// Error hook
    pub on_error: Option<Callback<ErrorHookFn>>,
    /// Timeout hook
    pub on_timeout: Option<Callback<HookFn>>,
    /// Data merge function; replaces the old data when unset
    pub on_new_data: Option<Callback<NewDataFn>>,
    /// Suspense mode
    pub suspense: bool,
    /// Page size, zero disables pagination
    pub per_page: usize,
    /// Default data
    pub data: Option<Data>,
    /// Initial loading flag
    pub loading: bool,
    /// Dependency list; automatic fetching is enabled when present
    pub dependencies: Option<Vec<Value>>,
    /// Whether the provider speaks GraphQL
    pub graphql: bool,
}

impl Config {
    /// Merge previously held data with `new_data`
    pub fn merge_data(&self, current: Option<&Data>, new_data: Data) -> Data {
        match &self.on_new_data {
            Some(merge) => merge(current, new_data),
            None => new_data,
        }
    }
}

/// Resolve call site arguments against the provider context
pub fn resolve(context: &ProviderContext, args: &CallArgs) -> Result<Config, Error> {
    let call = shape(args)?;
    let provider = &context.options;
    let options = &call.options;

    let url = call
        .url
        .clone()
        .or_else(|| options.url.clone())
        .or_else(|| context.url.clone())
        .or_else(|| provider.url.clone())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            Error::Configuration("The url is required unless a global url is set".to_string())
        })?;

    let cache_policy = options
        .cache_policy
        .or(provider.cache_policy)
        .unwrap_or_default();
    let persist = options.persist.or(provider.persist).unwrap_or(false);

    if persist && cache_policy == CachePolicy::NoCache {
        return Err(Error::Configuration(
            "persist cannot be used with cache policy no-cache".to_string(),
        ));
    }

    let cache_life = options
        .cache_life
        .or(provider.cache_life)
        .unwrap_or(if persist {
            PERSIST_CACHE_LIFE
        } else {
            Duration::ZERO
        });

    let mut headers = provider.headers.clone().unwrap_or_default();
    if let Some(call_headers) = &options.headers {
        headers.merge(call_headers);
    }

    let suspense = options.suspense.or(provider.suspense).unwrap_or(false);
    let dependencies = call.dependencies;
    let loading = options
        .loading
        .or(provider.loading)
        .unwrap_or(dependencies.is_some() && !suspense);

    Ok(Config {
        url,
        path: options
            .path
            .clone()
            .or_else(|| provider.path.clone())
            .unwrap_or_default(),
        method: options.method.or(provider.method).unwrap_or_default(),
        headers,
        body: options.body.clone().or_else(|| provider.body.clone()),
        cache_policy,
        cache_life,
        retries: options.retries.or(provider.retries).unwrap_or(0),
        retry_delay: options
            .retry_delay
            .clone()
            .or_else(|| provider.retry_delay.clone())
            .unwrap_or_default(),
        retry_on: options
            .retry_on
            .clone()
            .or_else(|| provider.retry_on.clone())
            .unwrap_or_default(),
        timeout: options
            .timeout
            .or(provider.timeout)
            .unwrap_or(Duration::ZERO),
        persist,
        response_type: options
            .response_type
            .clone()
            .or_else(|| provider.response_type.clone())
            .unwrap_or_else(|| ResponseType::DEFAULT.to_vec()),
        interceptors: options.interceptors.clone().or(&provider.interceptors),
        on_abort: options
            .on_abort
            .clone()
            .or_else(|| provider.on_abort.clone()),
        on_error: options
            .on_error
            .clone()
            .or_else(|| provider.on_error.clone()),
        on_timeout: options
            .on_timeout
            .clone()
            .or_else(|| provider.on_timeout.clone()),
        on_new_data: options
            .on_new_data
            .clone()
            .or_else(|| provider.on_new_data.clone()),
        suspense,
        per_page: options.per_page.or(provider.per_page).unwrap_or(0),
        data: options.data.clone().or_else(|| provider.data.clone()),
        loading,
        dependencies,
        graphql: context.graphql,
    })
}

/// Memoizing [`resolve`]
///
/// Returns the previously resolved `Arc<Config>` as long as the inputs are
/// unchanged, so consumers can detect configuration changes by pointer.
#[derive(Debug, Default)]
pub struct Resolver {
    last: Option<(ProviderContext, CallArgs, Arc<Config>)>,
}

impl Resolver {
    /// Empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve, reusing the last result when the inputs are equal
    pub fn resolve(
        &mut self,
        context: &ProviderContext,
        args: &CallArgs,
    ) -> Result<Arc<Config>, Error> {
        if let Some((last_context, last_args, config)) = &self.last {
            if last_context == context && last_args == args {
                return Ok(Arc::clone(config));
            }
        }

        let config = Arc::new(resolve(context, args)?);
        self.last = Some((context.clone(), args.clone(), Arc::clone(&config)));
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context() -> ProviderContext {
        ProviderContext::new("https://example.com")
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&context(), &CallArgs::new()).expect("config");

        assert_eq!(config.url, "https://example.com");
        assert_eq!(config.path, "");
        assert_eq!(config.method, Method::Get);
        assert_eq!(config.cache_policy, CachePolicy::CacheFirst);
        assert_eq!(config.cache_life, Duration::ZERO);
        assert_eq!(config.retries, 0);
        assert_eq!(config.retry_delay, RetryDelay::Fixed(DEFAULT_RETRY_DELAY));
        assert_eq!(config.retry_on, RetryOn::Statuses(Vec::new()));
        assert_eq!(config.timeout, Duration::ZERO);
        assert_eq!(config.response_type, ResponseType::DEFAULT.to_vec());
        assert_eq!(config.per_page, 0);
        assert!(!config.persist);
        assert!(!config.suspense);
        assert!(!config.loading);
        assert!(config.dependencies.is_none());
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_argument_shapes() {
        let options = Options::new().retries(2);
        let deps = vec![json!(1)];

        let accepted = [
            CallArgs::new().url("https://a.test"),
            CallArgs::new().url("https://a.test").options(options.clone()),
            CallArgs::new().url("https://a.test").dependencies(deps.clone()),
            CallArgs::new()
                .url("https://a.test")
                .options(options.clone())
                .dependencies(deps.clone()),
            CallArgs::new().options(options.clone()),
            CallArgs::new()
                .options(options.clone())
                .dependencies(deps.clone()),
        ];
        for args in accepted {
            assert!(resolve(&context(), &args).is_ok(), "{args:?}");
        }

        let rejected = [
            CallArgs::new()
                .options(options.clone())
                .options(options.clone()),
            CallArgs::new().options(options.clone()).url("https://a.test"),
            CallArgs::new().dependencies(deps.clone()).url("https://a.test"),
            CallArgs::new().url("https://a.test").url("https://b.test"),
        ];
        for args in rejected {
            assert!(
                matches!(resolve(&context(), &args), Err(Error::InvalidArguments(_))),
                "{args:?}"
            );
        }
    }

    #[test]
    fn test_url_is_required() {
        let result = resolve(&ProviderContext::default(), &CallArgs::new());
        assert!(matches!(result, Err(Error::Configuration(_))));

        let result = resolve(&ProviderContext::default(), &CallArgs::from(""));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_url_precedence() {
        let ctx = context();

        let config = resolve(&ctx, &CallArgs::from("https://call.test")).expect("config");
        assert_eq!(config.url, "https://call.test");

        let config = resolve(&ctx, &CallArgs::from(Options::new().url("https://opts.test")))
            .expect("config");
        assert_eq!(config.url, "https://opts.test");

        let ctx = ProviderContext::default().with_options(Options::new().url("https://p.test"));
        let config = resolve(&ctx, &CallArgs::new()).expect("config");
        assert_eq!(config.url, "https://p.test");
    }

    #[test]
    fn test_call_site_beats_provider() {
        let ctx = context().with_options(
            Options::new()
                .retries(5)
                .timeout(Duration::from_secs(1))
                .path("/provider"),
        );
        let args = CallArgs::from(Options::new().retries(1));

        let config = resolve(&ctx, &args).expect("config");
        assert_eq!(config.retries, 1);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.path, "/provider");
    }

    #[test]
    fn test_headers_merge_key_by_key() {
        let ctx = context().with_options(
            Options::new()
                .header("Authorization", "Bearer provider")
                .header("X-Provider", "1"),
        );
        let args = CallArgs::from(Options::new().header("authorization", "Bearer call"));

        let config = resolve(&ctx, &args).expect("config");
        assert_eq!(config.headers.get("Authorization"), Some("Bearer call"));
        assert_eq!(config.headers.get("X-Provider"), Some("1"));
        assert_eq!(config.headers.len(), 2);
    }

    #[test]
    fn test_persist_rules() {
        let args = CallArgs::from(Options::new().persist(true));
        let config = resolve(&context(), &args).expect("config");
        assert_eq!(config.cache_life, PERSIST_CACHE_LIFE);

        let args = CallArgs::from(
            Options::new()
                .persist(true)
                .cache_life(Duration::from_secs(60)),
        );
        let config = resolve(&context(), &args).expect("config");
        assert_eq!(config.cache_life, Duration::from_secs(60));

        let args = CallArgs::from(
            Options::new()
                .persist(true)
                .cache_policy(CachePolicy::NoCache),
        );
        assert!(matches!(
            resolve(&context(), &args),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_initial_loading() {
        let args = CallArgs::new()
            .options(Options::new())
            .dependencies(vec![]);
        assert!(resolve(&context(), &args).expect("config").loading);

        let args = CallArgs::new().dependencies(vec![]);
        assert!(matches!(
            resolve(&context(), &args),
            Err(Error::InvalidArguments(_))
        ));

        let args = CallArgs::new()
            .options(Options::new().suspense(true))
            .dependencies(vec![]);
        assert!(!resolve(&context(), &args).expect("config").loading);

        let args = CallArgs::from(Options::new().loading(true));
        assert!(resolve(&context(), &args).expect("config").loading);
    }

    #[test]
    fn test_graphql_flag_comes_from_context() {
        let config = resolve(&context().with_graphql(true), &CallArgs::new()).expect("config");
        assert!(config.graphql);
    }

    #[test]
    fn test_new_data_defaults_to_replace() {
        let config = resolve(&context(), &CallArgs::new()).expect("config");
        let merged = config.merge_data(Some(&Data::from("old")), Data::from("new"));
        assert_eq!(merged, Data::from("new"));

        let args = CallArgs::from(Options::new().on_new_data(|current, new| {
            match (current.and_then(Data::as_json), new.as_json()) {
                (Some(Value::Array(old)), Some(Value::Array(add))) => {
                    Data::Json(Value::Array(old.iter().chain(add).cloned().collect()))
                }
                _ => new,
            }
        }));
        let config = resolve(&context(), &args).expect("config");
        let merged = config.merge_data(Some(&Data::Json(json!([1]))), Data::Json(json!([2])));
        assert_eq!(merged, Data::Json(json!([1, 2])));
    }

    #[test]
    fn test_resolver_is_stable() {
        let ctx = context();
        let hook = Options::new().on_error(|_| {});
        let args = CallArgs::new()
            .options(hook.clone())
            .dependencies(vec![json!("a")]);

        let mut resolver = Resolver::new();
        let first = resolver.resolve(&ctx, &args).expect("config");
        let second = resolver.resolve(&ctx, &args.clone()).expect("config");
        assert!(Arc::ptr_eq(&first, &second));

        let changed = CallArgs::new()
            .options(hook)
            .dependencies(vec![json!("b")]);
        let third = resolver.resolve(&ctx, &changed).expect("config");
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(third.dependencies, Some(vec![json!("b")]));
    }

    #[test]
    fn test_callbacks_compare_by_identity() {
        let a = Options::new().on_error(|_| {});
        let b = Options::new().on_error(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_policy_names() {
        assert_eq!(
            "no-cache".parse::<CachePolicy>().expect("policy"),
            CachePolicy::NoCache
        );
        assert_eq!(CachePolicy::CacheAndNetwork.to_string(), "cache-and-network");
        assert!("sometimes".parse::<CachePolicy>().is_err());
        assert!(CachePolicy::CacheFirst.reads_cache());
        assert!(!CachePolicy::NetworkOnly.reads_cache());
        assert!(!CachePolicy::NetworkOnly.writes_cache());
    }
}
