//! Hierarchical registry resource names.
//!
//! Names follow the fixed hierarchy
//! `projects/{p}/locations/global/apis/{a}/versions/{v}/specs/{s}`, with
//! `deployments/{d}` hanging off the API in parallel to `versions`, an
//! optional `@{revision}` suffix on specs and deployments, and
//! `artifacts/{x}` attachable under any level (an artifact directly under
//! `locations/global` is project-scoped). Parsing and rendering are exact
//! inverses for well-formed strings, and a name uniquely determines its
//! parent chain.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const MAX_IDENT_LEN: usize = 80;

/// Errors produced while parsing or validating resource names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("malformed resource name {name:?}: {reason}")]
    Malformed { name: String, reason: String },

    #[error("invalid identifier {value:?} in {segment} segment")]
    InvalidIdentifier { segment: &'static str, value: String },

    #[error("expected a {expected} name, got {got:?}")]
    WrongKind { expected: &'static str, got: String },
}

/// Result type for name operations.
pub type NameResult<T> = std::result::Result<T, NameError>;

fn is_ident_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_' | '~' | '%')
}

fn validate_id(segment: &'static str, value: &str) -> NameResult<()> {
    // A lone `-` is the list wildcard and never a concrete identifier.
    if value.is_empty()
        || value.len() > MAX_IDENT_LEN
        || value == "-"
        || !value.chars().all(is_ident_char)
    {
        return Err(NameError::InvalidIdentifier {
            segment,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_id(segment: &'static str, value: &str, allow_wildcard: bool) -> NameResult<String> {
    if allow_wildcard && value == "-" {
        return Ok(value.to_string());
    }
    validate_id(segment, value)?;
    Ok(value.to_string())
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// The kind of a resource, i.e. the deepest non-empty name component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Project,
    Api,
    Version,
    Spec,
    Deployment,
    Artifact,
}

impl Entity {
    /// Depth within the hierarchy. Specs and deployments are siblings.
    pub fn depth(self) -> u8 {
        match self {
            Entity::Project => 0,
            Entity::Api => 1,
            Entity::Version => 2,
            Entity::Spec | Entity::Deployment => 3,
            Entity::Artifact => 4,
        }
    }

    /// Parse the lowercase entity word used in `$resource.<entity>` references.
    pub fn parse(word: &str) -> Option<Entity> {
        match word {
            "project" => Some(Entity::Project),
            "api" => Some(Entity::Api),
            "version" => Some(Entity::Version),
            "spec" => Some(Entity::Spec),
            "deployment" => Some(Entity::Deployment),
            "artifact" => Some(Entity::Artifact),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Entity::Project => "project",
            Entity::Api => "api",
            Entity::Version => "version",
            Entity::Spec => "spec",
            Entity::Deployment => "deployment",
            Entity::Artifact => "artifact",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Name types
// ---------------------------------------------------------------------------

macro_rules! impl_name_traits {
    ($name:ident, $kind:expr, $variant:ident) => {
        impl FromStr for $name {
            type Err = NameError;

            fn from_str(s: &str) -> NameResult<Self> {
                match ResourceName::parse(s)? {
                    ResourceName::$variant(n) => Ok(n),
                    other => Err(NameError::WrongKind {
                        expected: $kind,
                        got: other.to_string(),
                    }),
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// A project, rendered with its implicit global location:
/// `projects/{p}/locations/global`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectName {
    project_id: String,
}

impl ProjectName {
    pub fn new(project_id: impl Into<String>) -> NameResult<Self> {
        let project_id = project_id.into();
        validate_id("projects", &project_id)?;
        Ok(Self { project_id })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn api(&self, api_id: impl Into<String>) -> NameResult<ApiName> {
        let api_id = api_id.into();
        validate_id("apis", &api_id)?;
        Ok(ApiName {
            project: self.clone(),
            api_id,
        })
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/locations/global", self.project_id)
    }
}

impl_name_traits!(ProjectName, "project", Project);

/// An API under a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiName {
    project: ProjectName,
    api_id: String,
}

impl ApiName {
    pub fn project(&self) -> &ProjectName {
        &self.project
    }

    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    pub fn version(&self, version_id: impl Into<String>) -> NameResult<VersionName> {
        let version_id = version_id.into();
        validate_id("versions", &version_id)?;
        Ok(VersionName {
            api: self.clone(),
            version_id,
        })
    }

    pub fn deployment(&self, deployment_id: impl Into<String>) -> NameResult<DeploymentName> {
        let deployment_id = deployment_id.into();
        validate_id("deployments", &deployment_id)?;
        Ok(DeploymentName {
            api: self.clone(),
            deployment_id,
            revision: None,
        })
    }
}

impl fmt::Display for ApiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/apis/{}", self.project, self.api_id)
    }
}

impl_name_traits!(ApiName, "api", Api);

/// A version under an API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionName {
    api: ApiName,
    version_id: String,
}

impl VersionName {
    pub fn project(&self) -> &ProjectName {
        self.api.project()
    }

    pub fn api(&self) -> &ApiName {
        &self.api
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn spec(&self, spec_id: impl Into<String>) -> NameResult<SpecName> {
        let spec_id = spec_id.into();
        validate_id("specs", &spec_id)?;
        Ok(SpecName {
            version: self.clone(),
            spec_id,
            revision: None,
        })
    }
}

impl fmt::Display for VersionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/versions/{}", self.api, self.version_id)
    }
}

impl_name_traits!(VersionName, "version", Version);

/// A spec under a version, optionally pinned to a revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecName {
    version: VersionName,
    spec_id: String,
    revision: Option<String>,
}

impl SpecName {
    pub fn project(&self) -> &ProjectName {
        self.version.project()
    }

    pub fn api(&self) -> &ApiName {
        self.version.api()
    }

    pub fn version(&self) -> &VersionName {
        &self.version
    }

    pub fn spec_id(&self) -> &str {
        &self.spec_id
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// The same spec pinned to `revision`.
    pub fn with_revision(&self, revision: impl Into<String>) -> SpecName {
        SpecName {
            version: self.version.clone(),
            spec_id: self.spec_id.clone(),
            revision: Some(revision.into()),
        }
    }

    /// The same spec without a revision pin.
    pub fn without_revision(&self) -> SpecName {
        SpecName {
            version: self.version.clone(),
            spec_id: self.spec_id.clone(),
            revision: None,
        }
    }
}

impl fmt::Display for SpecName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/specs/{}", self.version, self.spec_id)?;
        if let Some(rev) = &self.revision {
            write!(f, "@{rev}")?;
        }
        Ok(())
    }
}

impl_name_traits!(SpecName, "spec", Spec);

/// A deployment under an API, optionally pinned to a revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentName {
    api: ApiName,
    deployment_id: String,
    revision: Option<String>,
}

impl DeploymentName {
    pub fn project(&self) -> &ProjectName {
        self.api.project()
    }

    pub fn api(&self) -> &ApiName {
        &self.api
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn with_revision(&self, revision: impl Into<String>) -> DeploymentName {
        DeploymentName {
            api: self.api.clone(),
            deployment_id: self.deployment_id.clone(),
            revision: Some(revision.into()),
        }
    }

    pub fn without_revision(&self) -> DeploymentName {
        DeploymentName {
            api: self.api.clone(),
            deployment_id: self.deployment_id.clone(),
            revision: None,
        }
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/deployments/{}", self.api, self.deployment_id)?;
        if let Some(rev) = &self.revision {
            write!(f, "@{rev}")?;
        }
        Ok(())
    }
}

impl_name_traits!(DeploymentName, "deployment", Deployment);

/// The resource an artifact hangs under. Artifacts never parent artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactParent {
    Project(ProjectName),
    Api(ApiName),
    Version(VersionName),
    Spec(SpecName),
    Deployment(DeploymentName),
}

impl ArtifactParent {
    fn to_name(&self) -> ResourceName {
        match self {
            ArtifactParent::Project(p) => ResourceName::Project(p.clone()),
            ArtifactParent::Api(a) => ResourceName::Api(a.clone()),
            ArtifactParent::Version(v) => ResourceName::Version(v.clone()),
            ArtifactParent::Spec(s) => ResourceName::Spec(s.clone()),
            ArtifactParent::Deployment(d) => ResourceName::Deployment(d.clone()),
        }
    }
}

impl fmt::Display for ArtifactParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactParent::Project(p) => p.fmt(f),
            ArtifactParent::Api(a) => a.fmt(f),
            ArtifactParent::Version(v) => v.fmt(f),
            ArtifactParent::Spec(s) => s.fmt(f),
            ArtifactParent::Deployment(d) => d.fmt(f),
        }
    }
}

/// An artifact attached to any non-artifact level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    parent: ArtifactParent,
    artifact_id: String,
}

impl ArtifactName {
    pub fn new(parent: ArtifactParent, artifact_id: impl Into<String>) -> NameResult<Self> {
        let artifact_id = artifact_id.into();
        validate_id("artifacts", &artifact_id)?;
        Ok(Self {
            parent,
            artifact_id,
        })
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn parent(&self) -> &ArtifactParent {
        &self.parent
    }

    /// The parent as a plain resource name.
    pub fn parent_name(&self) -> ResourceName {
        self.parent.to_name()
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/artifacts/{}", self.parent, self.artifact_id)
    }
}

impl_name_traits!(ArtifactName, "artifact", Artifact);

// ---------------------------------------------------------------------------
// ResourceName
// ---------------------------------------------------------------------------

/// Any resource name in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceName {
    Project(ProjectName),
    Api(ApiName),
    Version(VersionName),
    Spec(SpecName),
    Deployment(DeploymentName),
    Artifact(ArtifactName),
}

impl ResourceName {
    /// Parse a concrete resource name. Wildcard (`-`) identifiers are
    /// rejected; use [`ResourceName::parse_pattern`] for list patterns.
    pub fn parse(name: &str) -> NameResult<Self> {
        Self::parse_inner(name, false)
    }

    /// Parse a list pattern: the same grammar, but a lone `-` is accepted
    /// as a wildcard identifier at any level.
    pub fn parse_pattern(name: &str) -> NameResult<Self> {
        Self::parse_inner(name, true)
    }

    fn parse_inner(name: &str, allow_wildcard: bool) -> NameResult<Self> {
        let malformed = |reason: &str| NameError::Malformed {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = name.split('/').collect();
        if parts.len() < 4 || parts[0] != "projects" || parts[2] != "locations" {
            return Err(malformed("expected projects/{id}/locations/global"));
        }
        if parts[3] != "global" {
            return Err(malformed("only the global location is supported"));
        }
        let project = ProjectName {
            project_id: check_id("projects", parts[1], allow_wildcard)?,
        };

        let rest = &parts[4..];
        if rest.is_empty() {
            return Ok(ResourceName::Project(project));
        }

        let pair = |rest: &[&str]| -> NameResult<()> {
            if rest.len() < 2 {
                Err(malformed("missing identifier after collection"))
            } else {
                Ok(())
            }
        };

        let artifact = |parent: ArtifactParent, rest: &[&str]| -> NameResult<ResourceName> {
            pair(rest)?;
            if rest.len() > 2 {
                return Err(malformed("artifacts cannot have children"));
            }
            Ok(ResourceName::Artifact(ArtifactName {
                parent,
                artifact_id: check_id("artifacts", rest[1], allow_wildcard)?,
            }))
        };

        match rest[0] {
            "artifacts" => artifact(ArtifactParent::Project(project), rest),
            "apis" => {
                pair(rest)?;
                let api = ApiName {
                    project,
                    api_id: check_id("apis", rest[1], allow_wildcard)?,
                };
                let rest = &rest[2..];
                if rest.is_empty() {
                    return Ok(ResourceName::Api(api));
                }
                match rest[0] {
                    "artifacts" => artifact(ArtifactParent::Api(api), rest),
                    "versions" => {
                        pair(rest)?;
                        let version = VersionName {
                            api,
                            version_id: check_id("versions", rest[1], allow_wildcard)?,
                        };
                        let rest = &rest[2..];
                        if rest.is_empty() {
                            return Ok(ResourceName::Version(version));
                        }
                        match rest[0] {
                            "artifacts" => artifact(ArtifactParent::Version(version), rest),
                            "specs" => {
                                pair(rest)?;
                                let (spec_id, revision) =
                                    split_revision("specs", rest[1], allow_wildcard)?;
                                let spec = SpecName {
                                    version,
                                    spec_id,
                                    revision,
                                };
                                let rest = &rest[2..];
                                if rest.is_empty() {
                                    return Ok(ResourceName::Spec(spec));
                                }
                                if rest[0] == "artifacts" {
                                    return artifact(ArtifactParent::Spec(spec), rest);
                                }
                                Err(malformed("unexpected collection under spec"))
                            }
                            _ => Err(malformed("unexpected collection under version")),
                        }
                    }
                    "deployments" => {
                        pair(rest)?;
                        let (deployment_id, revision) =
                            split_revision("deployments", rest[1], allow_wildcard)?;
                        let deployment = DeploymentName {
                            api,
                            deployment_id,
                            revision,
                        };
                        let rest = &rest[2..];
                        if rest.is_empty() {
                            return Ok(ResourceName::Deployment(deployment));
                        }
                        if rest[0] == "artifacts" {
                            return artifact(ArtifactParent::Deployment(deployment), rest);
                        }
                        Err(malformed("unexpected collection under deployment"))
                    }
                    _ => Err(malformed("unexpected collection under api")),
                }
            }
            _ => Err(malformed("unexpected collection under project")),
        }
    }

    /// The deepest non-empty component kind of this name.
    pub fn entity(&self) -> Entity {
        match self {
            ResourceName::Project(_) => Entity::Project,
            ResourceName::Api(_) => Entity::Api,
            ResourceName::Version(_) => Entity::Version,
            ResourceName::Spec(_) => Entity::Spec,
            ResourceName::Deployment(_) => Entity::Deployment,
            ResourceName::Artifact(_) => Entity::Artifact,
        }
    }

    /// The project at the root of this name's chain.
    pub fn project(&self) -> ProjectName {
        match self {
            ResourceName::Project(p) => p.clone(),
            ResourceName::Api(a) => a.project().clone(),
            ResourceName::Version(v) => v.project().clone(),
            ResourceName::Spec(s) => s.project().clone(),
            ResourceName::Deployment(d) => d.project().clone(),
            ResourceName::Artifact(a) => a.parent_name().project(),
        }
    }

    /// The API on this name's chain, if any.
    pub fn api(&self) -> Option<ApiName> {
        match self {
            ResourceName::Project(_) => None,
            ResourceName::Api(a) => Some(a.clone()),
            ResourceName::Version(v) => Some(v.api().clone()),
            ResourceName::Spec(s) => Some(s.api().clone()),
            ResourceName::Deployment(d) => Some(d.api().clone()),
            ResourceName::Artifact(a) => a.parent_name().api(),
        }
    }

    /// The version on this name's chain, if any.
    pub fn version(&self) -> Option<VersionName> {
        match self {
            ResourceName::Version(v) => Some(v.clone()),
            ResourceName::Spec(s) => Some(s.version().clone()),
            ResourceName::Artifact(a) => a.parent_name().version(),
            _ => None,
        }
    }

    /// The spec on this name's chain, if any.
    pub fn spec(&self) -> Option<SpecName> {
        match self {
            ResourceName::Spec(s) => Some(s.clone()),
            ResourceName::Artifact(a) => a.parent_name().spec(),
            _ => None,
        }
    }

    /// The deployment on this name's chain, if any.
    pub fn deployment(&self) -> Option<DeploymentName> {
        match self {
            ResourceName::Deployment(d) => Some(d.clone()),
            ResourceName::Artifact(a) => a.parent_name().deployment(),
            _ => None,
        }
    }

    /// Truncate this name to the requested entity along its parent chain.
    /// Returns `None` when the entity is not on the chain.
    pub fn truncate(&self, entity: Entity) -> Option<ResourceName> {
        match entity {
            Entity::Project => Some(ResourceName::Project(self.project())),
            Entity::Api => self.api().map(ResourceName::Api),
            Entity::Version => self.version().map(ResourceName::Version),
            Entity::Spec => self.spec().map(ResourceName::Spec),
            Entity::Deployment => self.deployment().map(ResourceName::Deployment),
            Entity::Artifact => match self {
                ResourceName::Artifact(_) => Some(self.clone()),
                _ => None,
            },
        }
    }

    /// The immediate parent, or `None` for projects.
    pub fn parent(&self) -> Option<ResourceName> {
        match self {
            ResourceName::Project(_) => None,
            ResourceName::Api(a) => Some(ResourceName::Project(a.project().clone())),
            ResourceName::Version(v) => Some(ResourceName::Api(v.api().clone())),
            ResourceName::Spec(s) => Some(ResourceName::Version(s.version().clone())),
            ResourceName::Deployment(d) => Some(ResourceName::Api(d.api().clone())),
            ResourceName::Artifact(a) => Some(a.parent_name()),
        }
    }

    /// Construct a child artifact name under this resource.
    pub fn artifact(&self, artifact_id: impl Into<String>) -> NameResult<ArtifactName> {
        let parent = match self {
            ResourceName::Project(p) => ArtifactParent::Project(p.clone()),
            ResourceName::Api(a) => ArtifactParent::Api(a.clone()),
            ResourceName::Version(v) => ArtifactParent::Version(v.clone()),
            ResourceName::Spec(s) => ArtifactParent::Spec(s.clone()),
            ResourceName::Deployment(d) => ArtifactParent::Deployment(d.clone()),
            ResourceName::Artifact(_) => {
                return Err(NameError::WrongKind {
                    expected: "non-artifact parent",
                    got: self.to_string(),
                })
            }
        };
        ArtifactName::new(parent, artifact_id)
    }

    /// The revision pin on this name's spec or deployment, if any.
    pub fn revision(&self) -> Option<&str> {
        match self {
            ResourceName::Spec(s) => s.revision(),
            ResourceName::Deployment(d) => d.revision(),
            ResourceName::Artifact(a) => match a.parent() {
                ArtifactParent::Spec(s) => s.revision(),
                ArtifactParent::Deployment(d) => d.revision(),
                _ => None,
            },
            _ => None,
        }
    }

    /// The same name with any revision pin removed. Revisions are
    /// orthogonal to identity, so this is the canonical form.
    pub fn without_revision(&self) -> ResourceName {
        match self {
            ResourceName::Spec(s) => ResourceName::Spec(s.without_revision()),
            ResourceName::Deployment(d) => ResourceName::Deployment(d.without_revision()),
            ResourceName::Artifact(a) => {
                let parent = match a.parent() {
                    ArtifactParent::Spec(s) => ArtifactParent::Spec(s.without_revision()),
                    ArtifactParent::Deployment(d) => {
                        ArtifactParent::Deployment(d.without_revision())
                    }
                    other => other.clone(),
                };
                ResourceName::Artifact(ArtifactName {
                    parent,
                    artifact_id: a.artifact_id.clone(),
                })
            }
            other => other.clone(),
        }
    }

    /// `true` when no identifier is the `-` wildcard.
    pub fn is_concrete(&self) -> bool {
        self.ids().iter().all(|(_, id)| *id != "-")
    }

    /// Whether this concrete name matches `pattern`, where `-` identifiers
    /// match anything. Revision pins on either side are ignored.
    pub fn matches_pattern(&self, pattern: &ResourceName) -> bool {
        let own = self.ids();
        let pat = pattern.ids();
        own.len() == pat.len()
            && own
                .iter()
                .zip(pat.iter())
                .all(|((oc, oi), (pc, pi))| oc == pc && (*pi == "-" || oi == pi))
    }

    /// Collection/identifier pairs from the root down, revisions stripped.
    fn ids(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        self.push_ids(&mut out);
        out
    }

    fn push_ids<'a>(&'a self, out: &mut Vec<(&'static str, &'a str)>) {
        match self {
            ResourceName::Project(p) => out.push(("projects", p.project_id())),
            ResourceName::Api(a) => {
                out.push(("projects", a.project().project_id()));
                out.push(("apis", a.api_id()));
            }
            ResourceName::Version(v) => {
                ResourceName::push_api_ids(v.api(), out);
                out.push(("versions", v.version_id()));
            }
            ResourceName::Spec(s) => {
                ResourceName::push_api_ids(s.api(), out);
                out.push(("versions", s.version().version_id()));
                out.push(("specs", s.spec_id()));
            }
            ResourceName::Deployment(d) => {
                ResourceName::push_api_ids(d.api(), out);
                out.push(("deployments", d.deployment_id()));
            }
            ResourceName::Artifact(a) => {
                a.parent.to_owned_ids(out);
                out.push(("artifacts", a.artifact_id()));
            }
        }
    }

    fn push_api_ids<'a>(api: &'a ApiName, out: &mut Vec<(&'static str, &'a str)>) {
        out.push(("projects", api.project().project_id()));
        out.push(("apis", api.api_id()));
    }
}

impl ArtifactParent {
    fn to_owned_ids<'a>(&'a self, out: &mut Vec<(&'static str, &'a str)>) {
        match self {
            ArtifactParent::Project(p) => out.push(("projects", p.project_id())),
            ArtifactParent::Api(a) => ResourceName::push_api_ids(a, out),
            ArtifactParent::Version(v) => {
                ResourceName::push_api_ids(v.api(), out);
                out.push(("versions", v.version_id()));
            }
            ArtifactParent::Spec(s) => {
                ResourceName::push_api_ids(s.api(), out);
                out.push(("versions", s.version().version_id()));
                out.push(("specs", s.spec_id()));
            }
            ArtifactParent::Deployment(d) => {
                ResourceName::push_api_ids(d.api(), out);
                out.push(("deployments", d.deployment_id()));
            }
        }
    }
}

fn split_revision(
    segment: &'static str,
    token: &str,
    allow_wildcard: bool,
) -> NameResult<(String, Option<String>)> {
    match token.split_once('@') {
        Some((id, revision)) => {
            let id = check_id(segment, id, allow_wildcard)?;
            validate_id("revision", revision)?;
            Ok((id, Some(revision.to_string())))
        }
        None => Ok((check_id(segment, token, allow_wildcard)?, None)),
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceName::Project(p) => p.fmt(f),
            ResourceName::Api(a) => a.fmt(f),
            ResourceName::Version(v) => v.fmt(f),
            ResourceName::Spec(s) => s.fmt(f),
            ResourceName::Deployment(d) => d.fmt(f),
            ResourceName::Artifact(a) => a.fmt(f),
        }
    }
}

impl FromStr for ResourceName {
    type Err = NameError;

    fn from_str(s: &str) -> NameResult<Self> {
        ResourceName::parse(s)
    }
}

impl serde::Serialize for ResourceName {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ResourceName {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<ProjectName> for ResourceName {
    fn from(n: ProjectName) -> Self {
        ResourceName::Project(n)
    }
}

impl From<ApiName> for ResourceName {
    fn from(n: ApiName) -> Self {
        ResourceName::Api(n)
    }
}

impl From<VersionName> for ResourceName {
    fn from(n: VersionName) -> Self {
        ResourceName::Version(n)
    }
}

impl From<SpecName> for ResourceName {
    fn from(n: SpecName) -> Self {
        ResourceName::Spec(n)
    }
}

impl From<DeploymentName> for ResourceName {
    fn from(n: DeploymentName) -> Self {
        ResourceName::Deployment(n)
    }
}

impl From<ArtifactName> for ResourceName {
    fn from(n: ArtifactName) -> Self {
        ResourceName::Artifact(n)
    }
}
