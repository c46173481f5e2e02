//! In-memory registry backend.
//!
//! Backed by a `Mutex<BTreeMap<name, Resource>>` so listings come out
//! name-sorted for free. Satisfies both provider traits; used by the test
//! suites and, through its snapshot form, by the CLI as a local registry.
//!
//! Semantics mirrored from the remote service:
//! - writing a resource materializes any missing ancestors;
//! - spec and deployment revision ids are content-derived (first 8 hex
//!   chars of the SHA-256 of the payload), and only the current revision
//!   is retained;
//! - writer operations stamp `update_time` with the current wall clock,
//!   while [`MemoryRegistry::seed`] preserves the caller's timestamps.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::names::ResourceName;
use crate::provider::{RegistryProvider, RegistryWriter};
use crate::resources::{
    Api, ApiDeployment, ApiSpec, ApiVersion, Artifact, Project, Resource, RevisionInfo, StringMap,
};

/// Serializable image of the registry contents.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// In-memory registry backend.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: Mutex<BTreeMap<String, Resource>>,
}

/// Content-derived revision id: first 8 hex chars of SHA-256.
pub fn revision_id_for(contents: &[u8]) -> String {
    let digest = Sha256::digest(contents);
    hex::encode(&digest[..4])
}

fn key_for(name: &ResourceName) -> String {
    name.without_revision().to_string()
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource preserving its own `update_time`, materializing
    /// any missing ancestors with the same timestamp. Spec and deployment
    /// revision ids are filled in from the payload when empty.
    pub fn seed(&self, mut resource: Resource) -> RegistryResult<()> {
        if let Resource::Spec(spec) = &mut resource {
            if spec.revision_id.is_empty() {
                spec.revision_id = revision_id_for(spec.contents.as_deref().unwrap_or_default());
            }
        }
        if let Resource::Deployment(deployment) = &mut resource {
            if deployment.revision_id.is_empty() {
                deployment.revision_id =
                    revision_id_for(deployment.api_spec_revision.as_bytes());
            }
        }
        let name = resource.name();
        let at = resource.update_time();
        let mut state = self.state.lock().unwrap();
        Self::ensure_ancestors(&mut state, &name, at);
        state.insert(key_for(&name), resource);
        Ok(())
    }

    /// Build a registry from a snapshot image.
    pub fn from_snapshot(snapshot: Snapshot) -> RegistryResult<Self> {
        let registry = Self::new();
        for resource in snapshot.resources {
            registry.seed(resource)?;
        }
        Ok(registry)
    }

    /// Capture the current contents as a snapshot image, name-sorted.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().unwrap();
        Snapshot {
            resources: state.values().cloned().collect(),
        }
    }

    /// Load a snapshot file; YAML for `.yaml`/`.yml`, JSON otherwise.
    pub fn load_file(path: &Path) -> RegistryResult<Self> {
        let raw = std::fs::read(path)?;
        let snapshot = if is_yaml(path) {
            serde_yaml::from_slice(&raw).map_err(|e| RegistryError::Snapshot(e.to_string()))?
        } else {
            serde_json::from_slice(&raw).map_err(|e| RegistryError::Snapshot(e.to_string()))?
        };
        Self::from_snapshot(snapshot)
    }

    /// Write the current contents to a snapshot file.
    pub fn save_file(&self, path: &Path) -> RegistryResult<()> {
        let snapshot = self.snapshot();
        let raw = if is_yaml(path) {
            serde_yaml::to_string(&snapshot)
                .map_err(|e| RegistryError::Snapshot(e.to_string()))?
                .into_bytes()
        } else {
            serde_json::to_vec_pretty(&snapshot)
                .map_err(|e| RegistryError::Snapshot(e.to_string()))?
        };
        std::fs::write(path, raw)?;
        Ok(())
    }

    fn ensure_ancestors(
        state: &mut BTreeMap<String, Resource>,
        name: &ResourceName,
        at: DateTime<Utc>,
    ) {
        let mut chain = Vec::new();
        let mut cursor = name.parent();
        while let Some(ancestor) = cursor {
            cursor = ancestor.parent();
            chain.push(ancestor);
        }
        for ancestor in chain.into_iter().rev() {
            let key = key_for(&ancestor);
            state
                .entry(key)
                .or_insert_with(|| Self::blank(&ancestor, at));
        }
    }

    fn blank(name: &ResourceName, at: DateTime<Utc>) -> Resource {
        match name {
            ResourceName::Project(p) => Resource::Project(Project {
                name: p.clone(),
                display_name: String::new(),
                description: String::new(),
                update_time: at,
            }),
            ResourceName::Api(a) => Resource::Api(Api {
                name: a.clone(),
                display_name: String::new(),
                description: String::new(),
                availability: String::new(),
                recommended_version: String::new(),
                recommended_deployment: String::new(),
                labels: StringMap::new(),
                annotations: StringMap::new(),
                update_time: at,
            }),
            ResourceName::Version(v) => Resource::Version(ApiVersion {
                name: v.clone(),
                display_name: String::new(),
                description: String::new(),
                state: String::new(),
                labels: StringMap::new(),
                annotations: StringMap::new(),
                update_time: at,
            }),
            ResourceName::Spec(s) => Resource::Spec(ApiSpec {
                name: s.without_revision(),
                filename: String::new(),
                description: String::new(),
                mime_type: String::new(),
                contents: None,
                revision_id: revision_id_for(&[]),
                labels: StringMap::new(),
                annotations: StringMap::new(),
                update_time: at,
            }),
            ResourceName::Deployment(d) => Resource::Deployment(ApiDeployment {
                name: d.without_revision(),
                display_name: String::new(),
                description: String::new(),
                endpoint_uri: String::new(),
                api_spec_revision: String::new(),
                revision_id: revision_id_for(&[]),
                labels: StringMap::new(),
                annotations: StringMap::new(),
                update_time: at,
            }),
            // Artifacts are never ancestors.
            ResourceName::Artifact(a) => Resource::Artifact(Artifact {
                name: a.clone(),
                mime_type: String::new(),
                contents: None,
                labels: StringMap::new(),
                annotations: StringMap::new(),
                update_time: at,
            }),
        }
    }

    fn current_revision(resource: &Resource) -> Option<&str> {
        match resource {
            Resource::Spec(s) => Some(&s.revision_id),
            Resource::Deployment(d) => Some(&d.revision_id),
            _ => None,
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Evaluate the filter forms the tooling itself emits. Anything else
/// matches everything, with a debug log.
fn filter_matches(filter: &str, resource: &Resource) -> bool {
    let filter = filter.trim();
    if filter.is_empty() {
        return true;
    }
    if let Some(rest) = filter.strip_prefix("mime_type") {
        let rest = rest.trim_start();
        if let Some(value) = rest.strip_prefix("==").and_then(unquote) {
            return resource.mime_type() == Some(value);
        }
        if let Some(needle) = rest
            .strip_prefix(".contains(")
            .and_then(|r| r.strip_suffix(')'))
            .and_then(unquote)
        {
            return resource
                .mime_type()
                .is_some_and(|m| m.contains(needle));
        }
    }
    debug!(filter, "unsupported filter expression, matching all resources");
    true
}

fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
}

#[async_trait]
impl RegistryProvider for MemoryRegistry {
    async fn list(
        &self,
        pattern: &ResourceName,
        filter: &str,
        with_payload: bool,
    ) -> RegistryResult<Vec<Resource>> {
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        for resource in state.values() {
            if !resource.name().matches_pattern(pattern) {
                continue;
            }
            if !filter_matches(filter, resource) {
                continue;
            }
            out.push(if with_payload {
                resource.clone()
            } else {
                resource.without_payload()
            });
        }
        Ok(out)
    }

    async fn get(&self, name: &ResourceName, with_payload: bool) -> RegistryResult<Resource> {
        let state = self.state.lock().unwrap();
        let resource = state
            .get(&key_for(name))
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;
        if let Some(requested) = name.revision() {
            // The pin names a revision of the spec or deployment on the
            // chain; only the current revision is retained.
            let owner = name
                .spec()
                .map(|s| ResourceName::Spec(s.without_revision()))
                .or_else(|| {
                    name.deployment()
                        .map(|d| ResourceName::Deployment(d.without_revision()))
                });
            let current = owner
                .and_then(|o| state.get(&key_for(&o)))
                .and_then(Self::current_revision);
            if current != Some(requested) {
                return Err(RegistryError::NotFound {
                    name: name.to_string(),
                });
            }
        }
        Ok(if with_payload {
            resource.clone()
        } else {
            resource.without_payload()
        })
    }

    async fn resolve_revision(&self, name: &ResourceName) -> RegistryResult<RevisionInfo> {
        let state = self.state.lock().unwrap();
        let resource = state
            .get(&key_for(name))
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })?;
        match resource {
            Resource::Spec(s) => Ok(RevisionInfo {
                revision_id: s.revision_id.clone(),
                update_time: s.update_time,
            }),
            Resource::Deployment(d) => Ok(RevisionInfo {
                revision_id: d.revision_id.clone(),
                update_time: d.update_time,
            }),
            other => Err(RegistryError::NotFound {
                name: format!("{} has no revisions", other.name()),
            }),
        }
    }
}

#[async_trait]
impl RegistryWriter for MemoryRegistry {
    async fn update_api(&self, mut api: Api) -> RegistryResult<Api> {
        api.update_time = Utc::now();
        let name = ResourceName::Api(api.name.clone());
        let mut state = self.state.lock().unwrap();
        Self::ensure_ancestors(&mut state, &name, api.update_time);
        state.insert(key_for(&name), Resource::Api(api.clone()));
        Ok(api)
    }

    async fn update_version(&self, mut version: ApiVersion) -> RegistryResult<ApiVersion> {
        version.update_time = Utc::now();
        let name = ResourceName::Version(version.name.clone());
        let mut state = self.state.lock().unwrap();
        Self::ensure_ancestors(&mut state, &name, version.update_time);
        state.insert(key_for(&name), Resource::Version(version.clone()));
        Ok(version)
    }

    async fn update_spec(&self, mut spec: ApiSpec) -> RegistryResult<ApiSpec> {
        spec.name = spec.name.without_revision();
        spec.update_time = Utc::now();
        let name = ResourceName::Spec(spec.name.clone());
        let mut state = self.state.lock().unwrap();
        if spec.contents.is_none() {
            // Metadata-only update keeps the stored payload.
            if let Some(Resource::Spec(existing)) = state.get(&key_for(&name)) {
                spec.contents = existing.contents.clone();
            }
        }
        spec.revision_id = revision_id_for(spec.contents.as_deref().unwrap_or_default());
        Self::ensure_ancestors(&mut state, &name, spec.update_time);
        state.insert(key_for(&name), Resource::Spec(spec.clone()));
        Ok(spec)
    }

    async fn update_deployment(
        &self,
        mut deployment: ApiDeployment,
    ) -> RegistryResult<ApiDeployment> {
        deployment.name = deployment.name.without_revision();
        deployment.update_time = Utc::now();
        deployment.revision_id = revision_id_for(deployment.api_spec_revision.as_bytes());
        let name = ResourceName::Deployment(deployment.name.clone());
        let mut state = self.state.lock().unwrap();
        Self::ensure_ancestors(&mut state, &name, deployment.update_time);
        state.insert(key_for(&name), Resource::Deployment(deployment.clone()));
        Ok(deployment)
    }

    async fn put_artifact(&self, mut artifact: Artifact) -> RegistryResult<Artifact> {
        artifact.update_time = Utc::now();
        let name = ResourceName::Artifact(artifact.name.clone());
        let mut state = self.state.lock().unwrap();
        Self::ensure_ancestors(&mut state, &name, artifact.update_time);
        state.insert(key_for(&name), Resource::Artifact(artifact.clone()));
        Ok(artifact)
    }
}
