//! Apply declarative documents to the registry.
//!
//! Every write is an allow-missing upsert, applied parent before child so
//! the registry never sees an orphan. Unlike the planner, the applier
//! aborts on the first error: continuing after a failed parent write would
//! scatter partial subtrees.

use chrono::Utc;
use tracing::warn;

use apihub_registry::{
    Api, ApiDeployment, ApiName, ApiSpec, ApiVersion, Artifact, ProjectName, RegistryWriter,
    ResourceName, VersionName,
};

use crate::error::{ControllerError, ControllerResult};
use crate::patch::models::{
    mime_type_for_kind, ApiDoc, ArtifactDoc, DeploymentDoc, SpecDoc, VersionDoc,
};

/// Parse an API document and upsert it (and any embedded children) under
/// `parent`.
pub async fn apply_api_patch_bytes<W: RegistryWriter>(
    registry: &W,
    bytes: &[u8],
    parent: &ProjectName,
) -> ControllerResult<()> {
    let doc: ApiDoc =
        serde_yaml::from_slice(bytes).map_err(|e| ControllerError::Document(e.to_string()))?;
    apply_api(registry, &doc, parent).await
}

async fn apply_api<W: RegistryWriter>(
    registry: &W,
    doc: &ApiDoc,
    parent: &ProjectName,
) -> ControllerResult<()> {
    if doc.header.metadata.name.is_empty() {
        return Err(ControllerError::Validation(
            "document metadata.name is required".to_string(),
        ));
    }
    let api_name = parent.api(doc.header.metadata.name.as_str())?;
    registry
        .update_api(Api {
            name: api_name.clone(),
            display_name: doc.data.display_name.clone(),
            description: doc.data.description.clone(),
            availability: doc.data.availability.clone(),
            recommended_version: optional_version_name(
                &api_name,
                &doc.data.recommended_version,
            ),
            recommended_deployment: optional_deployment_name(
                &api_name,
                &doc.data.recommended_deployment,
            ),
            labels: doc.header.metadata.labels.clone(),
            annotations: doc.header.metadata.annotations.clone(),
            update_time: Utc::now(),
        })
        .await?;
    for version in &doc.data.versions {
        apply_version(registry, version, &api_name).await?;
    }
    for deployment in &doc.data.deployments {
        apply_deployment(registry, deployment, &api_name).await?;
    }
    for artifact in &doc.data.artifacts {
        apply_artifact(registry, artifact, &ResourceName::Api(api_name.clone())).await?;
    }
    Ok(())
}

async fn apply_version<W: RegistryWriter>(
    registry: &W,
    doc: &VersionDoc,
    api: &ApiName,
) -> ControllerResult<()> {
    let name = api.version(doc.header.metadata.name.as_str())?;
    registry
        .update_version(ApiVersion {
            name: name.clone(),
            display_name: doc.data.display_name.clone(),
            description: doc.data.description.clone(),
            state: doc.data.state.clone(),
            labels: doc.header.metadata.labels.clone(),
            annotations: doc.header.metadata.annotations.clone(),
            update_time: Utc::now(),
        })
        .await?;
    for spec in &doc.data.specs {
        apply_spec(registry, spec, &name).await?;
    }
    for artifact in &doc.data.artifacts {
        apply_artifact(registry, artifact, &ResourceName::Version(name.clone())).await?;
    }
    Ok(())
}

async fn apply_spec<W: RegistryWriter>(
    registry: &W,
    doc: &SpecDoc,
    version: &VersionName,
) -> ControllerResult<()> {
    let name = version.spec(doc.header.metadata.name.as_str())?;
    registry
        .update_spec(ApiSpec {
            name: name.clone(),
            filename: doc.data.filename.clone(),
            description: doc.data.description.clone(),
            mime_type: doc.data.mime_type.clone(),
            // Payloads travel out of band; a metadata-only upsert keeps
            // whatever contents the registry already holds.
            contents: None,
            revision_id: String::new(),
            labels: doc.header.metadata.labels.clone(),
            annotations: doc.header.metadata.annotations.clone(),
            update_time: Utc::now(),
        })
        .await?;
    for artifact in &doc.data.artifacts {
        apply_artifact(registry, artifact, &ResourceName::Spec(name.clone())).await?;
    }
    Ok(())
}

async fn apply_deployment<W: RegistryWriter>(
    registry: &W,
    doc: &DeploymentDoc,
    api: &ApiName,
) -> ControllerResult<()> {
    let name = api.deployment(doc.header.metadata.name.as_str())?;
    registry
        .update_deployment(ApiDeployment {
            name: name.clone(),
            display_name: doc.data.display_name.clone(),
            description: doc.data.description.clone(),
            endpoint_uri: doc.data.endpoint_uri.clone(),
            api_spec_revision: doc.data.api_spec_revision.clone(),
            revision_id: String::new(),
            labels: doc.header.metadata.labels.clone(),
            annotations: doc.header.metadata.annotations.clone(),
            update_time: Utc::now(),
        })
        .await?;
    for artifact in &doc.data.artifacts {
        apply_artifact(registry, artifact, &ResourceName::Deployment(name.clone())).await?;
    }
    Ok(())
}

async fn apply_artifact<W: RegistryWriter>(
    registry: &W,
    doc: &ArtifactDoc,
    parent: &ResourceName,
) -> ControllerResult<()> {
    if doc.header.kind.is_empty() {
        return Err(ControllerError::Validation(format!(
            "artifact document {:?} requires a kind",
            doc.header.metadata.name
        )));
    }
    let name = parent.artifact(doc.header.metadata.name.as_str())?;
    let contents = serde_yaml::to_string(&doc.data)
        .map_err(|e| ControllerError::Document(e.to_string()))?
        .into_bytes();
    registry
        .put_artifact(Artifact {
            name,
            mime_type: mime_type_for_kind(&doc.header.kind),
            contents: Some(contents),
            labels: doc.header.metadata.labels.clone(),
            annotations: doc.header.metadata.annotations.clone(),
            update_time: Utc::now(),
        })
        .await?;
    Ok(())
}

/// Join a recommended-version id under the API. Callers sometimes pass a
/// full resource name instead of an id; the joined (malformed) name is
/// preserved for compatibility, with a warning.
fn optional_version_name(api: &ApiName, version_id: &str) -> String {
    if version_id.is_empty() {
        return String::new();
    }
    if version_id.contains('/') {
        warn!(
            value = version_id,
            "recommendedVersion looks like a full resource name, expected a version id"
        );
    }
    format!("{api}/versions/{version_id}")
}

/// See [`optional_version_name`].
fn optional_deployment_name(api: &ApiName, deployment_id: &str) -> String {
    if deployment_id.is_empty() {
        return String::new();
    }
    if deployment_id.contains('/') {
        warn!(
            value = deployment_id,
            "recommendedDeployment looks like a full resource name, expected a deployment id"
        );
    }
    format!("{api}/deployments/{deployment_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_names_join_ids_under_the_api() {
        let api: ApiName = "projects/p/locations/global/apis/petstore".parse().unwrap();
        assert_eq!(
            optional_version_name(&api, "1.0.0"),
            "projects/p/locations/global/apis/petstore/versions/1.0.0"
        );
        assert_eq!(optional_version_name(&api, ""), "");
        assert_eq!(
            optional_deployment_name(&api, "prod"),
            "projects/p/locations/global/apis/petstore/deployments/prod"
        );
        // Misuse with a full name is preserved, not rejected.
        let joined = optional_version_name(
            &api,
            "projects/p/locations/global/apis/petstore/versions/1.0.0",
        );
        assert!(joined.starts_with(
            "projects/p/locations/global/apis/petstore/versions/projects/"
        ));
    }
}
