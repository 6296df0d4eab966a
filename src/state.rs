use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::store::KubeStore;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state handed to every HTTP handler.
pub struct AppState<C = KubeStore, R = KubeStore> {
    pub(crate) generator: Arc<Generator<C, R>>,
    pub(crate) default_namespace: String,
    pub(crate) shutdown: CancellationToken,
}

impl<C, R> Clone for AppState<C, R> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            default_namespace: self.default_namespace.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<C, R> AppState<C, R> {
    pub fn new(
        generator: Generator<C, R>,
        default_namespace: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            generator: Arc::new(generator),
            default_namespace: default_namespace.into(),
            shutdown,
        }
    }
}

/// Per call context passed down to the stores: the namespace to look in and
/// the token that cancels any outstanding store call.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub(crate) namespace: String,
    pub(crate) cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(namespace: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            namespace: namespace.into(),
            cancellation,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Same cancellation, different namespace.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            cancellation: self.cancellation.clone(),
        }
    }

    /// Runs a store call until it completes or the request is cancelled.
    pub async fn run<F, T, E>(&self, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        tokio::select! {
            _ = self.cancellation.cancelled() => Err(Error::Cancelled),
            result = call => result.map_err(|e| Error::Store(e.into())),
        }
    }
}
