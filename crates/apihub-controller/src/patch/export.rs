//! Export registry subtrees as declarative documents.
//!
//! Absolute recommended-version/deployment names are rewritten to relative
//! ids when they live under the exported API, so the document can be
//! applied to an arbitrary project. Nested exports enumerate child
//! versions (with their specs), deployments, and typed artifacts; unknown
//! artifact kinds are logged and skipped.

use tracing::warn;

use apihub_registry::{
    Api, ApiDeployment, ApiName, ApiSpec, ApiVersion, Artifact, RegistryProvider, Resource,
    ResourceName,
};

use crate::error::{ControllerError, ControllerResult};
use crate::patch::models::{
    kind_for_mime_type, ApiData, ApiDoc, ArtifactDoc, DeploymentData, DeploymentDoc, Header,
    Metadata, SpecData, SpecDoc, VersionData, VersionDoc, API_KIND, ARTIFACT_GENERIC_KIND,
    DEPLOYMENT_KIND, REGISTRY_V1, SPEC_KIND, VERSION_KIND,
};

/// Export one API as a YAML document. With `nested`, child versions,
/// deployments, and typed artifacts are embedded.
pub async fn export_api(
    provider: &dyn RegistryProvider,
    api: &Api,
    nested: bool,
) -> ControllerResult<String> {
    let doc = api_doc(provider, api, nested).await?;
    serde_yaml::to_string(&doc).map_err(|e| ControllerError::Document(e.to_string()))
}

async fn api_doc(
    provider: &dyn RegistryProvider,
    api: &Api,
    nested: bool,
) -> ControllerResult<ApiDoc> {
    let api_name = &api.name;
    let mut versions = Vec::new();
    let mut deployments = Vec::new();
    let mut artifacts = Vec::new();
    if nested {
        for resource in list(provider, &format!("{api_name}/versions/-")).await? {
            let Resource::Version(version) = resource else {
                continue;
            };
            let mut child = version_doc(provider, &version, true).await?;
            prune_implied(&mut child.header);
            versions.push(child);
        }
        for resource in list(provider, &format!("{api_name}/deployments/-")).await? {
            let Resource::Deployment(deployment) = resource else {
                continue;
            };
            let mut child = deployment_doc(provider, &deployment, true).await?;
            prune_implied(&mut child.header);
            deployments.push(child);
        }
        artifacts = child_artifact_docs(provider, &ResourceName::Api(api_name.clone())).await?;
    }
    Ok(ApiDoc {
        header: Header {
            api_version: REGISTRY_V1.to_string(),
            kind: API_KIND.to_string(),
            metadata: Metadata {
                name: api_name.api_id().to_string(),
                parent: String::new(),
                labels: api.labels.clone(),
                annotations: api.annotations.clone(),
            },
        },
        data: ApiData {
            display_name: api.display_name.clone(),
            description: api.description.clone(),
            availability: api.availability.clone(),
            recommended_version: relative_version_name(api_name, &api.recommended_version)?,
            recommended_deployment: relative_deployment_name(
                api_name,
                &api.recommended_deployment,
            )?,
            versions,
            deployments,
            artifacts,
        },
    })
}

async fn version_doc(
    provider: &dyn RegistryProvider,
    version: &ApiVersion,
    nested: bool,
) -> ControllerResult<VersionDoc> {
    let mut specs = Vec::new();
    let mut artifacts = Vec::new();
    if nested {
        for resource in list(provider, &format!("{}/specs/-", version.name)).await? {
            let Resource::Spec(spec) = resource else {
                continue;
            };
            let mut child = spec_doc(provider, &spec, true).await?;
            prune_implied(&mut child.header);
            specs.push(child);
        }
        artifacts =
            child_artifact_docs(provider, &ResourceName::Version(version.name.clone())).await?;
    }
    Ok(VersionDoc {
        header: Header {
            api_version: REGISTRY_V1.to_string(),
            kind: VERSION_KIND.to_string(),
            metadata: Metadata {
                name: version.name.version_id().to_string(),
                parent: version.name.api().to_string(),
                labels: version.labels.clone(),
                annotations: version.annotations.clone(),
            },
        },
        data: VersionData {
            display_name: version.display_name.clone(),
            description: version.description.clone(),
            state: version.state.clone(),
            specs,
            artifacts,
        },
    })
}

async fn spec_doc(
    provider: &dyn RegistryProvider,
    spec: &ApiSpec,
    nested: bool,
) -> ControllerResult<SpecDoc> {
    let artifacts = if nested {
        child_artifact_docs(provider, &ResourceName::Spec(spec.name.clone())).await?
    } else {
        Vec::new()
    };
    Ok(SpecDoc {
        header: Header {
            api_version: REGISTRY_V1.to_string(),
            kind: SPEC_KIND.to_string(),
            metadata: Metadata {
                name: spec.name.spec_id().to_string(),
                parent: spec.name.version().to_string(),
                labels: spec.labels.clone(),
                annotations: spec.annotations.clone(),
            },
        },
        data: SpecData {
            filename: spec.filename.clone(),
            description: spec.description.clone(),
            mime_type: spec.mime_type.clone(),
            artifacts,
        },
    })
}

async fn deployment_doc(
    provider: &dyn RegistryProvider,
    deployment: &ApiDeployment,
    nested: bool,
) -> ControllerResult<DeploymentDoc> {
    let artifacts = if nested {
        child_artifact_docs(provider, &ResourceName::Deployment(deployment.name.clone())).await?
    } else {
        Vec::new()
    };
    Ok(DeploymentDoc {
        header: Header {
            api_version: REGISTRY_V1.to_string(),
            kind: DEPLOYMENT_KIND.to_string(),
            metadata: Metadata {
                name: deployment.name.deployment_id().to_string(),
                parent: deployment.name.api().to_string(),
                labels: deployment.labels.clone(),
                annotations: deployment.annotations.clone(),
            },
        },
        data: DeploymentData {
            display_name: deployment.display_name.clone(),
            description: deployment.description.clone(),
            endpoint_uri: deployment.endpoint_uri.clone(),
            api_spec_revision: deployment.api_spec_revision.clone(),
            artifacts,
        },
    })
}

/// Collect the typed artifacts directly under `parent`. Untyped artifacts
/// and undecodable payloads are skipped with a warning.
async fn child_artifact_docs(
    provider: &dyn RegistryProvider,
    parent: &ResourceName,
) -> ControllerResult<Vec<ArtifactDoc>> {
    let mut docs = Vec::new();
    for resource in list(provider, &format!("{parent}/artifacts/-")).await? {
        let Resource::Artifact(artifact) = resource else {
            continue;
        };
        match artifact_doc(&artifact) {
            Ok(mut doc) => {
                doc.header.api_version.clear();
                doc.header.metadata.parent.clear();
                docs.push(doc);
            }
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "skipping artifact");
            }
        }
    }
    Ok(docs)
}

fn artifact_doc(artifact: &Artifact) -> ControllerResult<ArtifactDoc> {
    let kind =
        kind_for_mime_type(&artifact.mime_type).ok_or_else(|| ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: format!("untyped mime type {:?}", artifact.mime_type),
        })?;
    if kind == ARTIFACT_GENERIC_KIND {
        return Err(ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: "generic artifacts are not exported".to_string(),
        });
    }
    let contents = artifact
        .contents
        .as_deref()
        .ok_or_else(|| ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: "artifact has no payload".to_string(),
        })?;
    let data: serde_yaml::Value =
        serde_yaml::from_slice(contents).map_err(|e| ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(ArtifactDoc {
        header: Header {
            api_version: REGISTRY_V1.to_string(),
            kind: kind.to_string(),
            metadata: Metadata {
                name: artifact.name.artifact_id().to_string(),
                parent: artifact.name.parent_name().to_string(),
                labels: artifact.labels.clone(),
                annotations: artifact.annotations.clone(),
            },
        },
        data,
    })
}

fn prune_implied(header: &mut Header) {
    header.api_version.clear();
    header.kind.clear();
    header.metadata.parent.clear();
}

async fn list(
    provider: &dyn RegistryProvider,
    pattern: &str,
) -> ControllerResult<Vec<Resource>> {
    crate::patterns::expand(provider, pattern, "", true).await
}

/// The version id alone when `version` lives under `api`, else the full
/// name unchanged.
fn relative_version_name(api: &ApiName, version: &str) -> ControllerResult<String> {
    if version.is_empty() {
        return Ok(String::new());
    }
    let name: apihub_registry::VersionName = version.parse()?;
    if name.api() == api {
        Ok(name.version_id().to_string())
    } else {
        Ok(version.to_string())
    }
}

fn relative_deployment_name(api: &ApiName, deployment: &str) -> ControllerResult<String> {
    if deployment.is_empty() {
        return Ok(String::new());
    }
    let name: apihub_registry::DeploymentName = deployment.parse()?;
    if name.api() == api {
        Ok(name.deployment_id().to_string())
    } else {
        Ok(deployment.to_string())
    }
}
