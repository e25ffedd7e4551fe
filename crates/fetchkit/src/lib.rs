//! Declarative data fetching engine
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod request;
#[cfg(feature = "settings")]
pub mod settings;
pub mod storage;
pub mod view;

#[doc(hidden)]
pub use fetchkit_http::{
    AbortController, AbortSignal, Body, FormData, Headers, HttpClient, HttpError, Method,
    RawResponse, RequestOptions, Transport, UrlSearchParams,
};

#[doc(hidden)]
pub use self::cache::{Cache, MemoryCache, PersistentCache};
#[doc(hidden)]
pub use self::config::{resolve, CachePolicy, CallArgs, Config, Options, ProviderContext};
#[doc(hidden)]
pub use self::data::{Data, ResponseType};
#[doc(hidden)]
pub use self::error::Error;
#[doc(hidden)]
pub use self::fetch::{Environment, Fetch, FetchBuilder};
#[doc(hidden)]
pub use self::request::{BodyArg, RouteOrBody};
#[cfg(feature = "settings")]
#[doc(hidden)]
pub use self::settings::Settings;
#[doc(hidden)]
pub use self::storage::{MemoryStorage, Storage};
#[doc(hidden)]
pub use self::view::{ResponseLike, ResponseView};
