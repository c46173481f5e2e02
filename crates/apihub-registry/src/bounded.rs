//! Concurrency-bounding adapter over any registry backend.
//!
//! [`Bounded`] owns a semaphore capping in-flight operations (default 10)
//! and retries retryable transport errors with exponential backoff. Every
//! engine in the workspace talks to the registry through this wrapper, so
//! fan-out is bounded no matter how many tasks call concurrently.
//! Cancellation is cooperative: dropping a caller's future releases its
//! permit and abandons the in-flight call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::{RegistryError, RegistryResult};
use crate::names::ResourceName;
use crate::provider::{RegistryProvider, RegistryWriter};
use crate::resources::{Api, ApiDeployment, ApiSpec, ApiVersion, Artifact, Resource, RevisionInfo};

/// Default cap on concurrent registry operations.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Retry budget for retryable transport errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// A registry backend wrapped with a concurrency cap and retry budget.
pub struct Bounded<P> {
    inner: P,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl<P> Bounded<P> {
    /// Wrap `inner` with the default in-flight cap.
    pub fn new(inner: P) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_IN_FLIGHT)
    }

    /// Wrap `inner`, allowing at most `max_in_flight` concurrent calls.
    pub fn with_limit(inner: P, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    async fn run<T, Fut>(
        &self,
        operation: &'static str,
        mut call: impl FnMut() -> Fut,
    ) -> RegistryResult<T>
    where
        Fut: Future<Output = RegistryResult<T>>,
    {
        let _permit =
            self.permits
                .acquire()
                .await
                .map_err(|_| RegistryError::Transport {
                    message: "registry adapter is shut down".to_string(),
                    retryable: false,
                })?;
        let mut delay = self.retry.base_delay;
        let mut attempt = 1u32;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < self.retry.attempts => {
                    warn!(operation, attempt, error = %e, "retrying registry call");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<P: RegistryProvider> RegistryProvider for Bounded<P> {
    async fn list(
        &self,
        pattern: &ResourceName,
        filter: &str,
        with_payload: bool,
    ) -> RegistryResult<Vec<Resource>> {
        self.run("list", || self.inner.list(pattern, filter, with_payload))
            .await
    }

    async fn get(&self, name: &ResourceName, with_payload: bool) -> RegistryResult<Resource> {
        self.run("get", || self.inner.get(name, with_payload)).await
    }

    async fn resolve_revision(&self, name: &ResourceName) -> RegistryResult<RevisionInfo> {
        self.run("resolve_revision", || self.inner.resolve_revision(name))
            .await
    }
}

#[async_trait]
impl<P: RegistryWriter> RegistryWriter for Bounded<P> {
    async fn update_api(&self, api: Api) -> RegistryResult<Api> {
        self.run("update_api", || self.inner.update_api(api.clone()))
            .await
    }

    async fn update_version(&self, version: ApiVersion) -> RegistryResult<ApiVersion> {
        self.run("update_version", || {
            self.inner.update_version(version.clone())
        })
        .await
    }

    async fn update_spec(&self, spec: ApiSpec) -> RegistryResult<ApiSpec> {
        self.run("update_spec", || self.inner.update_spec(spec.clone()))
            .await
    }

    async fn update_deployment(
        &self,
        deployment: ApiDeployment,
    ) -> RegistryResult<ApiDeployment> {
        self.run("update_deployment", || {
            self.inner.update_deployment(deployment.clone())
        })
        .await
    }

    async fn put_artifact(&self, artifact: Artifact) -> RegistryResult<Artifact> {
        self.run("put_artifact", || {
            self.inner.put_artifact(artifact.clone())
        })
        .await
    }
}
