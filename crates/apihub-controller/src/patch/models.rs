//! Declarative document models.
//!
//! YAML documents with `apiVersion`, `kind`, `metadata`, and a
//! kind-specific `data` payload. Children embedded in a nested export omit
//! `apiVersion`, `kind`, and `metadata.parent`: they are implied by
//! position and reconstructed from the enclosing context on apply.

use serde::{Deserialize, Serialize};

use apihub_registry::StringMap;

/// `apiVersion` of every document this tooling reads or writes.
pub const REGISTRY_V1: &str = "apigeeregistry/v1";

pub const API_KIND: &str = "API";
pub const VERSION_KIND: &str = "Version";
pub const SPEC_KIND: &str = "Spec";
pub const DEPLOYMENT_KIND: &str = "Deployment";
/// The generic, untyped artifact kind. Never exported.
pub const ARTIFACT_GENERIC_KIND: &str = "Artifact";

/// Mime type under which a typed artifact's YAML payload is stored.
pub fn mime_type_for_kind(kind: &str) -> String {
    format!("application/yaml;type={kind}")
}

/// Inverse of [`mime_type_for_kind`]; `None` for untyped mime types.
pub fn kind_for_mime_type(mime_type: &str) -> Option<&str> {
    mime_type
        .split_once(";type=")
        .map(|(_, kind)| kind)
        .filter(|kind| !kind.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(
        default,
        rename = "apiVersion",
        skip_serializing_if = "String::is_empty"
    )]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[serde(default, skip_serializing_if = "StringMap::is_empty")]
    pub labels: StringMap,
    #[serde(default, skip_serializing_if = "StringMap::is_empty")]
    pub annotations: StringMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiDoc {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub data: ApiData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiData {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub availability: String,
    /// Version id when the version lives under this API, else a full name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub recommended_version: String,
    /// Deployment id when it lives under this API, else a full name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub recommended_deployment: String,
    #[serde(rename = "versions", skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<VersionDoc>,
    #[serde(rename = "deployments", skip_serializing_if = "Vec::is_empty")]
    pub deployments: Vec<DeploymentDoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionDoc {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub data: VersionData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionData {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(rename = "specs", skip_serializing_if = "Vec::is_empty")]
    pub specs: Vec<SpecDoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecDoc {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub data: SpecData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecData {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDoc {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub data: DeploymentData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentData {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub endpoint_uri: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_spec_revision: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactDoc>,
}

/// A typed artifact: its kind names the payload schema, and `data` carries
/// the decoded YAML payload verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDoc {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub data: serde_yaml::Value,
}

impl Default for ArtifactDoc {
    fn default() -> Self {
        Self {
            header: Header::default(),
            data: serde_yaml::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_kind_mapping_roundtrips() {
        let mime = mime_type_for_kind("ScoreDefinition");
        assert_eq!(mime, "application/yaml;type=ScoreDefinition");
        assert_eq!(kind_for_mime_type(&mime), Some("ScoreDefinition"));
        assert_eq!(kind_for_mime_type("application/json"), None);
        assert_eq!(kind_for_mime_type("application/yaml;type="), None);
    }

    #[test]
    fn empty_header_fields_are_omitted() {
        let doc = VersionDoc {
            header: Header {
                api_version: String::new(),
                kind: String::new(),
                metadata: Metadata {
                    name: "1.0.0".to_string(),
                    ..Metadata::default()
                },
            },
            data: VersionData::default(),
        };
        let yaml = serde_yaml::to_string(&doc).unwrap();
        assert!(!yaml.contains("apiVersion"));
        assert!(!yaml.contains("kind"));
        assert!(!yaml.contains("parent"));
        assert!(yaml.contains("name: 1.0.0"));
    }

    #[test]
    fn document_parses_with_children() {
        let raw = r#"
apiVersion: apigeeregistry/v1
kind: API
metadata:
  name: petstore
  labels:
    team: pets
data:
  displayName: Petstore
  recommendedVersion: 1.0.0
  versions:
    - metadata:
        name: 1.0.0
      data:
        state: production
        specs:
          - metadata:
              name: openapi.yaml
            data:
              mimeType: application/x.openapi
  artifacts:
    - kind: ScoreDefinition
      metadata:
        name: lint-quality
      data:
        id: lint-quality
"#;
        let doc: ApiDoc = serde_yaml::from_str(raw).unwrap();
        assert_eq!(doc.header.kind, API_KIND);
        assert_eq!(doc.data.versions.len(), 1);
        assert_eq!(doc.data.versions[0].data.specs.len(), 1);
        assert_eq!(doc.data.artifacts[0].header.kind, "ScoreDefinition");
    }
}
