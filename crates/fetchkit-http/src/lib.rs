//! HTTP transport for fetchkit
//!
//! This crate provides the network collaborator used by the fetchkit engine: the
//! [`Transport`] trait, a reqwest-backed [`HttpClient`] implementing it, the
//! request value types ([`Method`], [`Headers`], [`Body`], [`RequestOptions`]),
//! a fully buffered [`RawResponse`], and the [`AbortController`] cancellation handle.
//!
//! # Example
//!
//! ```no_run
//! use fetchkit_http::{AbortController, HttpClient, Method, RequestOptions, Transport};
//!
//! async fn example() -> Result<(), fetchkit_http::HttpError> {
//!     let client = HttpClient::new();
//!     let controller = AbortController::new();
//!     let options = RequestOptions::new(Method::Get).with_signal(controller.signal());
//!
//!     let response = client.fetch("https://api.example.com/data", &options).await?;
//!     println!("{} {}", response.status(), response.text()?);
//!     Ok(())
//! }
//! ```

mod abort;
mod client;
mod error;
mod form;
mod request;
mod response;
mod transport;

pub use abort::{AbortController, AbortSignal};
pub use client::{HttpClient, HttpClientBuilder};
pub use error::HttpError;
pub use form::{FormData, UrlSearchParams};
pub use request::{Body, Headers, Method, RequestOptions, CONTENT_TYPE};
pub use response::{RawResponse, Response};
pub use transport::Transport;
