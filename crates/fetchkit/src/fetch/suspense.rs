//! Suspense handles

use std::fmt;
use std::sync::Arc;

use fetchkit_http::Method;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::RwLock;

use super::Fetch;
use crate::data::Data;
use crate::error::Error;
use crate::request::{BodyArg, RouteOrBody};

type SharedResult = Shared<BoxFuture<'static, Result<Option<Data>, Error>>>;

/// Progress of a suspended request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspenseStatus {
    /// Still running
    Pending,
    /// Resolved with data
    Success,
    /// Resolved with an error
    Error,
}

/// Handle on a request started by [`Fetch::suspend`]
///
/// Clones share the same underlying request; every reader observes the same
/// outcome.
#[derive(Clone)]
pub struct Suspended {
    result: SharedResult,
    status: Arc<RwLock<SuspenseStatus>>,
}

impl fmt::Debug for Suspended {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspended")
            .field("status", &self.status())
            .finish()
    }
}

impl Suspended {
    /// Current progress
    pub fn status(&self) -> SuspenseStatus {
        *self.status.read()
    }

    /// Wait for the outcome
    ///
    /// A request that recorded an error in the engine's error slot resolves
    /// to that error.
    pub async fn read(&self) -> Result<Option<Data>, Error> {
        self.result.clone().await
    }
}

impl Fetch {
    /// Start a request whose outcome is read through a [`Suspended`] handle
    ///
    /// The request starts immediately on the current Tokio runtime and runs
    /// to completion whether or not the handle is read.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn suspend(
        &self,
        method: Method,
        route_or_body: Option<RouteOrBody>,
        body: Option<BodyArg>,
    ) -> Suspended {
        let status = Arc::new(RwLock::new(SuspenseStatus::Pending));
        let fetch = self.clone();
        let tracked = Arc::clone(&status);

        let result: SharedResult = async move {
            let result = match fetch.request(method, route_or_body, body).await {
                Ok(data) => match fetch.error() {
                    Some(err) => Err(err),
                    None => Ok(data),
                },
                Err(err) => Err(err),
            };

            *tracked.write() = match result {
                Ok(_) => SuspenseStatus::Success,
                Err(_) => SuspenseStatus::Error,
            };
            result
        }
        .boxed()
        .shared();

        tokio::spawn(result.clone().map(|_| ()));

        Suspended { result, status }
    }
}
