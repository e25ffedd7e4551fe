//! Request building
//!
//! Turns the resolved configuration and the per-call arguments into the URL,
//! transport options and cache fingerprint of one request, and checks the
//! cache for a live response under that fingerprint.

use fetchkit_http::{
    AbortSignal, Body, FormData, Headers, Method, RawResponse, RequestOptions, UrlSearchParams,
    CONTENT_TYPE,
};
use serde_json::Value;

use crate::cache::{Cache, CacheLookup};
use crate::config::{Callback, CachePolicy, RequestContext, RequestInterceptorFn};
use crate::error::Error;

/// First per-call argument
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOrBody {
    /// Route appended to the URL
    Route(String),
    /// Query parameters appended to the URL
    Params(UrlSearchParams),
    /// JSON body; only objects and arrays count as a body
    Body(Value),
}

impl From<&str> for RouteOrBody {
    fn from(route: &str) -> Self {
        RouteOrBody::Route(route.to_string())
    }
}

impl From<String> for RouteOrBody {
    fn from(route: String) -> Self {
        RouteOrBody::Route(route)
    }
}

impl From<UrlSearchParams> for RouteOrBody {
    fn from(params: UrlSearchParams) -> Self {
        RouteOrBody::Params(params)
    }
}

impl From<Value> for RouteOrBody {
    fn from(body: Value) -> Self {
        RouteOrBody::Body(body)
    }
}

/// Second per-call argument
#[derive(Debug, Clone, PartialEq)]
pub enum BodyArg {
    /// Multipart form, sent as-is
    Form(FormData),
    /// URL-encoded parameters, sent as-is
    Params(UrlSearchParams),
    /// JSON body; only objects and arrays count as a body
    Json(Value),
}

impl From<FormData> for BodyArg {
    fn from(form: FormData) -> Self {
        BodyArg::Form(form)
    }
}

impl From<UrlSearchParams> for BodyArg {
    fn from(params: UrlSearchParams) -> Self {
        BodyArg::Params(params)
    }
}

impl From<Value> for BodyArg {
    fn from(body: Value) -> Self {
        BodyArg::Json(body)
    }
}

/// Inputs of [`build_request`]
#[derive(Debug)]
pub struct BuildRequest<'a> {
    /// Base URL
    pub url: &'a str,
    /// Configured path
    pub path: &'a str,
    /// HTTP method
    pub method: Method,
    /// Configured headers
    pub headers: &'a Headers,
    /// Configured default body
    pub body: Option<&'a Value>,
    /// Signal of the controller guarding this request
    pub signal: AbortSignal,
    /// Cache policy
    pub cache_policy: CachePolicy,
    /// Cache consulted for a live response
    pub cache: &'a dyn Cache,
    /// Request interceptor
    pub interceptor: Option<&'a Callback<RequestInterceptorFn>>,
    /// First per-call argument
    pub route_or_body: Option<&'a RouteOrBody>,
    /// Second per-call argument
    pub body_arg: Option<&'a BodyArg>,
}

/// Cache state for a built request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheInfo {
    /// A live response exists
    pub is_cached: bool,
    /// An entry existed but had expired and was evicted
    pub is_expired: bool,
    /// The live response
    pub response: Option<RawResponse>,
}

/// Output of [`build_request`]
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    /// Fully joined URL
    pub url: String,
    /// Options handed to the transport
    pub options: RequestOptions,
    /// Cache fingerprint
    pub response_id: String,
    /// Cache state under `response_id`
    pub cache: CacheInfo,
}

fn is_body(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Join two URL pieces, collapsing a doubled slash at the seam
pub fn join_url(left: &str, right: &str) -> String {
    match (left.strip_suffix('/'), right.starts_with('/')) {
        (Some(trimmed), true) => format!("{trimmed}{right}"),
        _ => format!("{left}{right}"),
    }
}

/// Cache key of a request
pub fn fingerprint(url: &str, method: Method, body: Option<&Body>) -> String {
    match body {
        Some(body) => format!("{url}:{method}:{body}"),
        None => format!("{url}:{method}:"),
    }
}

fn route_of(route_or_body: Option<&RouteOrBody>) -> String {
    match route_or_body {
        Some(RouteOrBody::Route(route)) => route.clone(),
        Some(RouteOrBody::Params(params)) => format!("?{params}"),
        Some(RouteOrBody::Body(_)) | None => String::new(),
    }
}

fn body_of(request: &BuildRequest<'_>) -> Option<Body> {
    if let Some(RouteOrBody::Body(value)) = request.route_or_body {
        if is_body(value) {
            return Some(Body::Text(value.to_string()));
        }
    }

    match request.body_arg {
        Some(BodyArg::Form(form)) => return Some(Body::Form(form.clone())),
        Some(BodyArg::Params(params)) => return Some(Body::Params(params.clone())),
        Some(BodyArg::Json(value)) if is_body(value) => {
            return Some(Body::Text(value.to_string()))
        }
        _ => {}
    }

    request.body.map(|value| Body::Text(value.to_string()))
}

fn headers_for(method: Method, configured: &Headers, body: Option<&Body>) -> Option<Headers> {
    let mut headers = configured.clone();

    if body.is_some_and(Body::is_form_like) {
        headers.remove(CONTENT_TYPE);
    } else {
        let content_type = headers.get(CONTENT_TYPE).map(str::to_string);
        if content_type.is_some() || method.sends_json_body() {
            headers.insert(
                CONTENT_TYPE,
                content_type.unwrap_or_else(|| "application/json".to_string()),
            );
        }
    }

    (!headers.is_empty()).then_some(headers)
}

/// Build the URL, options and fingerprint of a request
pub async fn build_request(request: BuildRequest<'_>) -> Result<BuiltRequest, Error> {
    let first_is_body = matches!(request.route_or_body, Some(RouteOrBody::Body(value)) if is_body(value));
    let second_is_body = matches!(request.body_arg, Some(BodyArg::Json(value)) if is_body(value));

    if request.method == Method::Get && (first_is_body || request.body_arg.is_some()) {
        return Err(Error::InvalidArguments(
            "GET requests may only take a route or query params as their first argument"
                .to_string(),
        ));
    }

    if first_is_body && second_is_body {
        return Err(Error::InvalidArguments(
            "a body may be passed as the first or the second argument, not both".to_string(),
        ));
    }

    let route = route_of(request.route_or_body);
    let url = join_url(&join_url(request.url, request.path), &route);

    let body = body_of(&request);
    let headers = headers_for(request.method, request.headers, body.as_ref());

    let mut options = RequestOptions {
        method: request.method,
        headers,
        body,
        signal: Some(request.signal.clone()),
    };

    if let Some(interceptor) = request.interceptor {
        options = interceptor(RequestContext {
            options,
            url: url.clone(),
            path: request.path.to_string(),
            route,
        })
        .await?;
    }

    let response_id = fingerprint(&url, options.method, options.body.as_ref());

    let cache = if request.cache_policy.reads_cache() {
        match request.cache.lookup(&response_id).await? {
            CacheLookup::Hit(response) => CacheInfo {
                is_cached: true,
                is_expired: false,
                response: Some(response),
            },
            CacheLookup::Expired => CacheInfo {
                is_expired: true,
                ..Default::default()
            },
            CacheLookup::Miss => CacheInfo::default(),
        }
    } else {
        CacheInfo::default()
    };

    tracing::trace!(
        "Built {} {} (cached: {}, expired: {})",
        options.method,
        url,
        cache.is_cached,
        cache.is_expired
    );

    Ok(BuiltRequest {
        url,
        options,
        response_id,
        cache,
    })
}
