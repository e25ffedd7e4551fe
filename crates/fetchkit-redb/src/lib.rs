//! Redb storage backend for fetchkit

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod error;
mod storage;

pub use storage::RedbStorage;
