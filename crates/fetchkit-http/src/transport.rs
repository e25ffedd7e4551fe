//! Network transport trait

use std::sync::Arc;

use async_trait::async_trait;

use crate::request::RequestOptions;
use crate::response::{RawResponse, Response};

/// Performs a single HTTP exchange
///
/// Implementations must resolve to `Ok` for every completed exchange, whatever
/// its status code, and must return [`HttpError::Aborted`] promptly once
/// `options.signal` fires, without waiting for the underlying I/O.
///
/// [`HttpError::Aborted`]: crate::HttpError::Aborted
#[async_trait]
pub trait Transport: std::fmt::Debug + Send + Sync {
    /// Send the request described by `options` to `url`
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Response<RawResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Response<RawResponse> {
        (**self).fetch(url, options).await
    }
}
