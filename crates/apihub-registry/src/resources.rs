//! Registry resource records.
//!
//! Every resource carries its typed name, an update time, and label and
//! annotation maps (`BTreeMap` keeps serialized output ordered). Specs and
//! deployments additionally expose the current revision id; for those two
//! kinds `update_time` is the update time of that revision, which is what
//! freshness comparisons use.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::names::{
    ApiName, ArtifactName, DeploymentName, ProjectName, ResourceName, SpecName, VersionName,
};

/// Label and annotation maps.
pub type StringMap = BTreeMap<String, String>;

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: ProjectName,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Api {
    pub name: ApiName,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub availability: String,
    /// Absolute version name, or empty when unset.
    #[serde(default)]
    pub recommended_version: String,
    /// Absolute deployment name, or empty when unset.
    #[serde(default)]
    pub recommended_deployment: String,
    #[serde(default)]
    pub labels: StringMap,
    #[serde(default)]
    pub annotations: StringMap,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiVersion {
    pub name: VersionName,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub labels: StringMap,
    #[serde(default)]
    pub annotations: StringMap,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub name: SpecName,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, with = "b64")]
    pub contents: Option<Vec<u8>>,
    /// Current revision id, content-derived.
    #[serde(default)]
    pub revision_id: String,
    #[serde(default)]
    pub labels: StringMap,
    #[serde(default)]
    pub annotations: StringMap,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDeployment {
    pub name: DeploymentName,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoint_uri: String,
    /// The spec revision this deployment serves, or empty.
    #[serde(default)]
    pub api_spec_revision: String,
    /// Current revision id, content-derived.
    #[serde(default)]
    pub revision_id: String,
    #[serde(default)]
    pub labels: StringMap,
    #[serde(default)]
    pub annotations: StringMap,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: ArtifactName,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, with = "b64")]
    pub contents: Option<Vec<u8>>,
    #[serde(default)]
    pub labels: StringMap,
    #[serde(default)]
    pub annotations: StringMap,
    pub update_time: DateTime<Utc>,
}

/// Revision id and update time of a spec or deployment, as returned by
/// [`crate::provider::RegistryProvider::resolve_revision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionInfo {
    pub revision_id: String,
    pub update_time: DateTime<Utc>,
}

/// Any registry resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    Project(Project),
    Api(Api),
    Version(ApiVersion),
    Spec(ApiSpec),
    Deployment(ApiDeployment),
    Artifact(Artifact),
}

impl Resource {
    pub fn name(&self) -> ResourceName {
        match self {
            Resource::Project(p) => ResourceName::Project(p.name.clone()),
            Resource::Api(a) => ResourceName::Api(a.name.clone()),
            Resource::Version(v) => ResourceName::Version(v.name.clone()),
            Resource::Spec(s) => ResourceName::Spec(s.name.clone()),
            Resource::Deployment(d) => ResourceName::Deployment(d.name.clone()),
            Resource::Artifact(a) => ResourceName::Artifact(a.name.clone()),
        }
    }

    pub fn update_time(&self) -> DateTime<Utc> {
        match self {
            Resource::Project(p) => p.update_time,
            Resource::Api(a) => a.update_time,
            Resource::Version(v) => v.update_time,
            Resource::Spec(s) => s.update_time,
            Resource::Deployment(d) => d.update_time,
            Resource::Artifact(a) => a.update_time,
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Resource::Spec(s) => Some(&s.mime_type),
            Resource::Artifact(a) => Some(&a.mime_type),
            _ => None,
        }
    }

    pub fn as_api(&self) -> Option<&Api> {
        match self {
            Resource::Api(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&ApiVersion> {
        match self {
            Resource::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_spec(&self) -> Option<&ApiSpec> {
        match self {
            Resource::Spec(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_deployment(&self) -> Option<&ApiDeployment> {
        match self {
            Resource::Deployment(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            Resource::Artifact(a) => Some(a),
            _ => None,
        }
    }

    /// A copy with payload bytes removed, for `with_payload = false` reads.
    pub fn without_payload(&self) -> Resource {
        match self {
            Resource::Spec(s) => Resource::Spec(ApiSpec {
                contents: None,
                ..s.clone()
            }),
            Resource::Artifact(a) => Resource::Artifact(Artifact {
                contents: None,
                ..a.clone()
            }),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, contents: &[u8]) -> Artifact {
        Artifact {
            name: name.parse().unwrap(),
            mime_type: "application/json".to_string(),
            contents: Some(contents.to_vec()),
            labels: StringMap::new(),
            annotations: StringMap::new(),
            update_time: Utc::now(),
        }
    }

    #[test]
    fn contents_survive_json_roundtrip_as_base64() {
        let a = artifact(
            "projects/p/locations/global/artifacts/blob",
            &[0, 159, 146, 150],
        );
        let json = serde_json::to_string(&Resource::Artifact(a.clone())).unwrap();
        assert!(json.contains("AJ+Slg=="));
        let back: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_artifact().unwrap().contents, a.contents);
    }

    #[test]
    fn without_payload_strips_contents_only() {
        let a = artifact("projects/p/locations/global/artifacts/blob", b"payload");
        let stripped = Resource::Artifact(a.clone()).without_payload();
        assert_eq!(stripped.as_artifact().unwrap().contents, None);
        assert_eq!(stripped.name(), Resource::Artifact(a).name());
    }
}
