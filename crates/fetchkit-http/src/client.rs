//! reqwest-backed [`Transport`]

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use crate::error::HttpError;
use crate::request::{Body, Headers, RequestOptions};
use crate::response::{RawResponse, Response};
use crate::transport::Transport;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Network [`Transport`] over a shared reqwest connection pool
///
/// Clones share the pool. Headers configured on the builder are sent with
/// every request unless the request sets the same header itself.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    inner: reqwest::Client,
    default_headers: Headers,
}

impl HttpClient {
    /// Client with reqwest's defaults and no extra headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Start configuring a client
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Wrap an already configured reqwest client
    pub fn from_reqwest(client: reqwest::Client) -> Self {
        Self {
            inner: client,
            default_headers: Headers::new(),
        }
    }

    fn outgoing(&self, url: &str, options: &RequestOptions) -> reqwest::RequestBuilder {
        let mut headers = self.default_headers.clone();
        if let Some(own) = &options.headers {
            headers.merge(own);
        }

        let request = headers
            .iter()
            .fold(self.inner.request(options.method.into(), url), |req, (k, v)| {
                req.header(k, v)
            });

        let Some(body) = &options.body else {
            return request;
        };

        match body {
            Body::Text(text) => request.body(text.clone()),
            Body::Params(params) => request
                .header(reqwest::header::CONTENT_TYPE, FORM_URLENCODED)
                .body(params.to_string()),
            Body::Form(form) => request.multipart(form.to_multipart()),
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Response<RawResponse> {
        tracing::trace!(method = %options.method, url, "Sending request");

        let pending = self.outgoing(url, options).send();
        let exchange = async {
            let response = pending.await?;
            RawResponse::from_reqwest(response, url).await
        };

        let Some(signal) = &options.signal else {
            return exchange.await;
        };

        tokio::select! {
            biased;
            _ = signal.aborted() => {
                tracing::debug!(url, "Request aborted");
                Err(HttpError::Aborted)
            }
            result = exchange => result,
        }
    }
}

/// Where requests are routed through a proxy
#[derive(Debug)]
enum ProxyRoute {
    /// Every request
    All(Url),
    /// Only requests whose host matches the pattern
    Hosts { proxy: Url, hosts: Regex },
}

impl ProxyRoute {
    fn into_reqwest(self) -> Response<reqwest::Proxy> {
        match self {
            Self::All(proxy) => {
                reqwest::Proxy::all(proxy.as_str()).map_err(|e| HttpError::Proxy(e.to_string()))
            }
            Self::Hosts { proxy, hosts } => Ok(reqwest::Proxy::custom(move |target| {
                let host = target.host_str()?;
                hosts.is_match(host).then(|| proxy.clone())
            })),
        }
    }
}

/// Builder for [`HttpClient`]
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    accept_invalid_certs: bool,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    default_headers: Headers,
    proxy: Option<ProxyRoute>,
}

impl HttpClientBuilder {
    /// Skip TLS certificate verification
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Bound the time spent establishing a connection
    ///
    /// This is independent of the engine's per attempt timeout, which covers
    /// the whole exchange.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// `User-Agent` sent with every request
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Header sent with every request that does not set it itself
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Route all requests through `proxy`
    pub fn proxy(mut self, proxy: Url) -> Self {
        self.proxy = Some(ProxyRoute::All(proxy));
        self
    }

    /// Route requests through `proxy` when their host matches `pattern`
    pub fn proxy_with_matcher(mut self, proxy: Url, pattern: &str) -> Response<Self> {
        let hosts = Regex::new(pattern)
            .map_err(|e| HttpError::Proxy(format!("Invalid proxy pattern: {e}")))?;
        self.proxy = Some(ProxyRoute::Hosts { proxy, hosts });
        Ok(self)
    }

    /// Build the client
    pub fn build(self) -> Response<HttpClient> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(self.accept_invalid_certs);

        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        if let Some(route) = self.proxy {
            builder = builder.proxy(route.into_reqwest()?);
        }

        Ok(HttpClient {
            inner: builder.build()?,
            default_headers: self.default_headers,
        })
    }
}
