//! Provider trait definitions for the registry.
//!
//! These traits are the only seam between the engines and the remote
//! registry service:
//! - `RegistryProvider`: read operations (list, get, revision lookup)
//! - `RegistryWriter`: idempotent upserts used by the applier and scoring
//!
//! All traits are async and backend-agnostic. The in-memory backend in
//! [`crate::memory`] satisfies both for tests and for snapshot-file use;
//! a gRPC-backed adapter lives outside this workspace.

use async_trait::async_trait;

use crate::error::RegistryResult;
use crate::names::ResourceName;
use crate::resources::{Api, ApiDeployment, ApiSpec, ApiVersion, Artifact, Resource, RevisionInfo};

/// Read access to the registry.
///
/// Guarantees:
/// - `list` pages to completion and returns resources sorted by full name,
///   so identical registry states produce identical listings.
/// - `get` distinguishes absence (`RegistryError::NotFound`) from failure.
/// - Implementations are safe to call from multiple tasks.
#[async_trait]
pub trait RegistryProvider: Send + Sync {
    /// Enumerate resources matching `pattern`, where `-` identifiers are
    /// wildcards. `filter` is a server-side filter expression; empty means
    /// no filtering. Payload bytes are only populated when `with_payload`
    /// is set.
    async fn list(
        &self,
        pattern: &ResourceName,
        filter: &str,
        with_payload: bool,
    ) -> RegistryResult<Vec<Resource>>;

    /// Fetch a single resource by concrete name.
    async fn get(&self, name: &ResourceName, with_payload: bool) -> RegistryResult<Resource>;

    /// Resolve the current revision of a spec or deployment.
    async fn resolve_revision(&self, name: &ResourceName) -> RegistryResult<RevisionInfo>;
}

/// Write access to the registry. Every operation is an allow-missing
/// upsert: applying the same document twice converges to the same state.
#[async_trait]
pub trait RegistryWriter: Send + Sync {
    async fn update_api(&self, api: Api) -> RegistryResult<Api>;

    async fn update_version(&self, version: ApiVersion) -> RegistryResult<ApiVersion>;

    async fn update_spec(&self, spec: ApiSpec) -> RegistryResult<ApiSpec>;

    async fn update_deployment(&self, deployment: ApiDeployment)
        -> RegistryResult<ApiDeployment>;

    /// Store an artifact. Idempotent under name: a re-put with identical
    /// contents only refreshes the update time.
    async fn put_artifact(&self, artifact: Artifact) -> RegistryResult<Artifact>;
}
