//! Live response view

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use fetchkit_http::{Headers, HttpError, RawResponse};
use serde_json::Value;

use crate::data::Data;

/// Latest response and data of an engine
#[derive(Debug, Default)]
pub(crate) struct ResponseHolder {
    response: ArcSwapOption<RawResponse>,
    data: ArcSwapOption<Data>,
}

impl ResponseHolder {
    pub(crate) fn response(&self) -> Option<Arc<RawResponse>> {
        self.response.load_full()
    }

    pub(crate) fn set_response(&self, response: RawResponse) {
        self.response.store(Some(Arc::new(response)));
    }

    pub(crate) fn data(&self) -> Option<Data> {
        self.data.load_full().map(|data| (*data).clone())
    }

    pub(crate) fn set_data(&self, data: Option<Data>) {
        self.data.store(data.map(Arc::new));
    }
}

/// Read access to a response
///
/// Every accessor returns `None` until a response exists.
pub trait ResponseLike {
    /// Status code
    fn status(&self) -> Option<u16>;
    /// Whether the status is 2xx
    fn ok(&self) -> Option<bool>;
    /// Status text
    fn status_text(&self) -> Option<String>;
    /// Response headers
    fn headers(&self) -> Option<Headers>;
    /// Final URL
    fn url(&self) -> Option<String>;
    /// Whether the request was redirected
    fn redirected(&self) -> Option<bool>;
    /// Raw body
    fn body(&self) -> Option<Bytes>;
    /// Whether the body was consumed; buffered bodies never are
    fn body_used(&self) -> Option<bool>;
    /// Body parsed as JSON
    fn json(&self) -> Option<Result<Value, HttpError>>;
    /// Body decoded as UTF-8
    fn text(&self) -> Option<Result<String, HttpError>>;
    /// Body as bytes
    fn blob(&self) -> Option<Bytes>;
    /// Body as bytes
    fn array_buffer(&self) -> Option<Bytes>;
    /// Independent copy of the response
    fn clone_response(&self) -> Option<RawResponse>;
}

/// Stable handle on the latest response and data of an engine
///
/// The handle never changes identity; every read reflects the most recent
/// response at the time of the read.
#[derive(Debug, Clone)]
pub struct ResponseView {
    holder: Arc<ResponseHolder>,
}

impl ResponseView {
    pub(crate) fn new(holder: Arc<ResponseHolder>) -> Self {
        Self { holder }
    }

    /// Latest data
    pub fn data(&self) -> Option<Data> {
        self.holder.data()
    }

    /// Whether both handles view the same engine
    pub fn same_as(&self, other: &ResponseView) -> bool {
        Arc::ptr_eq(&self.holder, &other.holder)
    }

    fn with<T>(&self, read: impl FnOnce(&RawResponse) -> T) -> Option<T> {
        self.holder.response().map(|response| read(&response))
    }
}

impl ResponseLike for ResponseView {
    fn status(&self) -> Option<u16> {
        self.with(RawResponse::status)
    }

    fn ok(&self) -> Option<bool> {
        self.with(RawResponse::ok)
    }

    fn status_text(&self) -> Option<String> {
        self.with(|response| response.status_text().to_string())
    }

    fn headers(&self) -> Option<Headers> {
        self.with(|response| response.headers().clone())
    }

    fn url(&self) -> Option<String> {
        self.with(|response| response.url().to_string())
    }

    fn redirected(&self) -> Option<bool> {
        self.with(RawResponse::redirected)
    }

    fn body(&self) -> Option<Bytes> {
        self.with(|response| response.body().clone())
    }

    fn body_used(&self) -> Option<bool> {
        self.with(|_| false)
    }

    fn json(&self) -> Option<Result<Value, HttpError>> {
        self.with(RawResponse::json::<Value>)
    }

    fn text(&self) -> Option<Result<String, HttpError>> {
        self.with(RawResponse::text)
    }

    fn blob(&self) -> Option<Bytes> {
        self.with(RawResponse::bytes)
    }

    fn array_buffer(&self) -> Option<Bytes> {
        self.with(RawResponse::bytes)
    }

    fn clone_response(&self) -> Option<RawResponse> {
        self.with(RawResponse::clone)
    }
}

impl ResponseLike for RawResponse {
    fn status(&self) -> Option<u16> {
        Some(RawResponse::status(self))
    }

    fn ok(&self) -> Option<bool> {
        Some(RawResponse::ok(self))
    }

    fn status_text(&self) -> Option<String> {
        Some(RawResponse::status_text(self).to_string())
    }

    fn headers(&self) -> Option<Headers> {
        Some(RawResponse::headers(self).clone())
    }

    fn url(&self) -> Option<String> {
        Some(RawResponse::url(self).to_string())
    }

    fn redirected(&self) -> Option<bool> {
        Some(RawResponse::redirected(self))
    }

    fn body(&self) -> Option<Bytes> {
        Some(RawResponse::body(self).clone())
    }

    fn body_used(&self) -> Option<bool> {
        Some(false)
    }

    fn json(&self) -> Option<Result<Value, HttpError>> {
        Some(RawResponse::json::<Value>(self))
    }

    fn text(&self) -> Option<Result<String, HttpError>> {
        Some(RawResponse::text(self))
    }

    fn blob(&self) -> Option<Bytes> {
        Some(RawResponse::bytes(self))
    }

    fn array_buffer(&self) -> Option<Bytes> {
        Some(RawResponse::bytes(self))
    }

    fn clone_response(&self) -> Option<RawResponse> {
        Some(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_view() {
        let view = ResponseView::new(Arc::new(ResponseHolder::default()));

        assert_eq!(view.status(), None);
        assert_eq!(view.ok(), None);
        assert_eq!(view.body_used(), None);
        assert!(view.json().is_none());
        assert!(view.clone_response().is_none());
        assert_eq!(view.data(), None);
    }

    #[test]
    fn test_view_tracks_latest_response() {
        let holder = Arc::new(ResponseHolder::default());
        let view = ResponseView::new(holder.clone());
        let copy = view.clone();

        holder.set_response(RawResponse::new(200, r#"{"a":1}"#).with_url("https://a.test"));
        holder.set_data(Some(Data::Json(json!({"a": 1}))));

        assert_eq!(view.status(), Some(200));
        assert_eq!(view.ok(), Some(true));
        assert_eq!(view.body_used(), Some(false));
        assert_eq!(view.url(), Some("https://a.test".to_string()));
        assert_eq!(
            view.json().expect("response present").expect("json"),
            json!({"a": 1})
        );
        assert_eq!(view.data(), Some(Data::Json(json!({"a": 1}))));

        holder.set_response(RawResponse::new(404, "gone"));
        assert_eq!(copy.status(), Some(404));
        assert_eq!(copy.ok(), Some(false));
        assert_eq!(copy.status_text(), Some("Not Found".to_string()));
        assert_eq!(
            copy.text().expect("response present").expect("text"),
            "gone"
        );
        assert!(view.same_as(&copy));
    }
}
