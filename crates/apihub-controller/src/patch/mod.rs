//! Declarative patch: bidirectional mapping between registry subtrees and
//! YAML documents.
//!
//! Export builds a document whose names are relative to their position;
//! apply reconstructs the absolute names from the enclosing context and
//! upserts parent before child. Export then apply is the identity on the
//! fields the documents carry.

pub mod apply;
pub mod export;
pub mod models;

pub use apply::apply_api_patch_bytes;
pub use export::export_api;
pub use models::{
    kind_for_mime_type, mime_type_for_kind, ApiData, ApiDoc, ArtifactDoc, DeploymentData,
    DeploymentDoc, Header, Metadata, SpecData, SpecDoc, VersionData, VersionDoc, API_KIND,
    ARTIFACT_GENERIC_KIND, DEPLOYMENT_KIND, REGISTRY_V1, SPEC_KIND, VERSION_KIND,
};
