//! Manifest documents.
//!
//! A manifest declares the artifacts a project should contain: each
//! generated resource pairs a target artifact pattern with the dependency
//! patterns it is derived from and the command that recomputes it.
//! Structural validation happens here; entry-level validation that needs
//! the project context lives with the planner so that one malformed entry
//! never aborts the rest of the plan.

use serde::{Deserialize, Serialize};

use crate::error::{ControllerError, ControllerResult};

/// A manifest of generated resources for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    #[serde(default)]
    pub generated_resources: Vec<GeneratedResource>,
}

/// One desired artifact: its pattern, dependencies, and the command that
/// (re)computes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResource {
    /// Target artifact pattern, relative to the project. May contain `-`
    /// wildcards but no `$resource` references, and must end in a literal
    /// artifact id.
    pub pattern: String,
    /// Server-side filter applied while enumerating target parents.
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Command template; `$resource.<entity>` placeholders are substituted
    /// with the reference resource truncated to that entity.
    pub action: String,
    /// When set, the command's side effects are not the artifact itself;
    /// the runner records a receipt artifact after a successful run and
    /// freshness is tracked against that receipt.
    #[serde(default)]
    pub receipt: bool,
    /// Re-run the action when the target is older than this many seconds,
    /// even if every dependency is older still.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<u64>,
}

/// A dependency pattern of a generated resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub pattern: String,
    #[serde(default)]
    pub filter: String,
}

impl Manifest {
    /// Parse a manifest document from YAML and run structural validation.
    pub fn from_yaml(raw: &str) -> ControllerResult<Self> {
        let manifest: Manifest =
            serde_yaml::from_str(raw).map_err(|e| ControllerError::Document(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Whole-document checks. Per-entry pattern validation is deferred to
    /// planning time.
    pub fn validate(&self) -> ControllerResult<()> {
        if self.id.trim().is_empty() {
            return Err(ControllerError::Validation(
                "manifest id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let raw = r#"
id: demo-manifest
generated_resources:
  - pattern: apis/-/versions/-/specs/-/artifacts/lint-gnostic
    dependencies:
      - pattern: $resource.spec
        filter: mime_type.contains('openapi')
    action: registry compute lint $resource.spec --linter gnostic
  - pattern: artifacts/search-index
    receipt: true
    refresh: 3600
    dependencies:
      - pattern: apis/-/versions/-/specs/-
    action: registry compute search-index
"#;
        let manifest = Manifest::from_yaml(raw).unwrap();
        assert_eq!(manifest.id, "demo-manifest");
        assert_eq!(manifest.generated_resources.len(), 2);
        assert!(!manifest.generated_resources[0].receipt);
        assert!(manifest.generated_resources[1].receipt);
        assert_eq!(manifest.generated_resources[1].refresh, Some(3600));
        assert_eq!(
            manifest.generated_resources[0].dependencies[0].filter,
            "mime_type.contains('openapi')"
        );
    }

    #[test]
    fn rejects_empty_id() {
        let raw = "id: ''\ngenerated_resources: []\n";
        assert!(Manifest::from_yaml(raw).is_err());
    }

    #[test]
    fn rejects_unparseable_yaml() {
        assert!(Manifest::from_yaml(": not yaml").is_err());
    }
}
