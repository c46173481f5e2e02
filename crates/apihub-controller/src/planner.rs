//! The action planner.
//!
//! [`Planner::plan`] walks a manifest and computes the minimal set of
//! commands that must run to bring the project's generated artifacts up to
//! date. Planning is read-only and deterministic: candidate targets come
//! from name-sorted listings, dependency expansion is cached per reference
//! resource, and the final action list is sorted by command string, so two
//! runs over an unchanged registry return byte-identical plans. A
//! malformed entry fails alone; the remaining entries keep planning.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use apihub_registry::{Entity, ProjectName, RegistryProvider, ResourceName};

use crate::error::{ControllerError, ControllerResult};
use crate::manifest::{Dependency, GeneratedResource, Manifest};
use crate::patterns::{
    expand, parse_reference, reference_entity, resolve_relative, substitute_command,
    substitute_reference, RESOURCE_REF_PREFIX,
};
use crate::staleness::StalenessOracle;

/// One command the runner must execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Fully substituted shell command.
    pub command: String,
    /// Fully qualified target artifact name, revision-qualified when the
    /// target sits under a spec or deployment.
    pub generated_resource: String,
    /// The runner must record a receipt artifact after a successful run.
    pub requires_receipt: bool,
}

/// A manifest entry that could not be planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub pattern: String,
    pub error: String,
}

/// The result of planning a manifest: actions to run, sorted by command,
/// plus the entries that failed validation or expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub actions: Vec<Action>,
    pub failures: Vec<EntryFailure>,
}

/// Plans actions for a manifest against a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct Planner {
    oracle: StalenessOracle,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_oracle(oracle: StalenessOracle) -> Self {
        Self { oracle }
    }

    /// Compute the actions needed to realize `manifest` in `project`.
    /// `max_actions` is a global soft cap: planning halts once reached and
    /// the plan never exceeds it.
    pub async fn plan(
        &self,
        provider: &dyn RegistryProvider,
        manifest: &Manifest,
        project: &ProjectName,
        max_actions: usize,
    ) -> PlanOutcome {
        let mut actions: Vec<Action> = Vec::new();
        let mut failures = Vec::new();
        for entry in &manifest.generated_resources {
            if actions.len() >= max_actions {
                debug!(max_actions, "action cap reached, halting planning");
                break;
            }
            let budget = max_actions - actions.len();
            match self.plan_entry(provider, entry, project, budget).await {
                Ok(mut batch) => actions.append(&mut batch),
                Err(e) => {
                    warn!(pattern = %entry.pattern, error = %e, "skipping generated resource");
                    failures.push(EntryFailure {
                        pattern: entry.pattern.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        actions.sort_by(|a, b| a.command.cmp(&b.command));
        PlanOutcome { actions, failures }
    }

    async fn plan_entry(
        &self,
        provider: &dyn RegistryProvider,
        entry: &GeneratedResource,
        project: &ProjectName,
        budget: usize,
    ) -> ControllerResult<Vec<Action>> {
        let target_pattern = validate_entry(entry, project)?;
        let artifact_id = target_pattern.artifact_id().to_string();
        let parent_pattern = target_pattern.parent_name();
        let entity = reference_entity(&entry.dependencies)?;
        let refresh = entry.refresh.map(|s| Duration::seconds(s as i64));

        let parents: Vec<ResourceName> =
            expand(provider, &parent_pattern.to_string(), &entry.filter, false)
                .await?
                .into_iter()
                .map(|r| r.name())
                .collect();

        // Dependency expansion is shared between candidates that bind the
        // same reference resource (e.g. several specs under one API when
        // the deepest reference entity is the API).
        let mut dependency_cache: HashMap<String, Option<Vec<DateTime<Utc>>>> = HashMap::new();
        let mut actions = Vec::new();

        for parent in parents {
            if actions.len() >= budget {
                debug!(pattern = %entry.pattern, "action cap reached inside entry");
                break;
            }
            let reference = match entity {
                None => ResourceName::Project(project.clone()),
                Some(e) => {
                    parent
                        .truncate(e)
                        .ok_or_else(|| ControllerError::UnboundReference {
                            pattern: entry.pattern.clone(),
                            reference: parent.to_string(),
                        })?
                }
            };

            let reference_key = reference.to_string();
            if !dependency_cache.contains_key(&reference_key) {
                let computed = self
                    .expand_dependencies(provider, &entry.dependencies, project, &reference)
                    .await?;
                dependency_cache.insert(reference_key.clone(), computed);
            }
            let dependency_times = dependency_cache.get(&reference_key).cloned().flatten();
            let Some(dependency_times) = dependency_times else {
                debug!(candidate = %parent, "dependency missing, skipping candidate");
                continue;
            };

            let target = ResourceName::Artifact(parent.artifact(artifact_id.as_str())?);
            let target_time = match provider.get(&target, false).await {
                Ok(resource) => Some(resource.update_time()),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            };
            if !self
                .oracle
                .should_regenerate(target_time, &dependency_times, refresh)
            {
                debug!(candidate = %target, "target is up-to-date");
                continue;
            }

            let mut command = substitute_command(&entry.action, &reference)?;
            let mut generated_resource = target.to_string();

            // Pin the target's spec or deployment to its current revision,
            // in the generated resource name and everywhere the command
            // mentions it.
            if let Some(spec) = target.spec() {
                let info = provider
                    .resolve_revision(&ResourceName::Spec(spec.clone()))
                    .await?;
                let plain = spec.to_string();
                let pinned = spec.with_revision(info.revision_id.as_str()).to_string();
                command = command.replace(&plain, &pinned);
                generated_resource = generated_resource.replace(&plain, &pinned);
            } else if let Some(deployment) = target.deployment() {
                let info = provider
                    .resolve_revision(&ResourceName::Deployment(deployment.clone()))
                    .await?;
                let plain = deployment.to_string();
                let pinned = deployment
                    .with_revision(info.revision_id.as_str())
                    .to_string();
                command = command.replace(&plain, &pinned);
                generated_resource = generated_resource.replace(&plain, &pinned);
            }

            actions.push(Action {
                command,
                generated_resource,
                requires_receipt: entry.receipt,
            });
        }
        Ok(actions)
    }

    /// Expand every dependency pattern with `reference` bound. Returns
    /// `None` when any pattern matches nothing: a candidate with missing
    /// dependencies is skipped, not an error.
    async fn expand_dependencies(
        &self,
        provider: &dyn RegistryProvider,
        dependencies: &[Dependency],
        project: &ProjectName,
        reference: &ResourceName,
    ) -> ControllerResult<Option<Vec<DateTime<Utc>>>> {
        let mut times = Vec::new();
        for dependency in dependencies {
            let resolved = if dependency.pattern.starts_with(RESOURCE_REF_PREFIX) {
                substitute_reference(&dependency.pattern, reference)?
            } else {
                resolve_relative(&dependency.pattern, project)
            };
            let resources = expand(provider, &resolved, &dependency.filter, false).await?;
            if resources.is_empty() {
                return Ok(None);
            }
            times.extend(resources.iter().map(|r| r.update_time()));
        }
        Ok(Some(times))
    }
}

/// Entry-level validation, run once per generated resource at plan time.
/// Returns the parsed target artifact pattern.
fn validate_entry(
    entry: &GeneratedResource,
    project: &ProjectName,
) -> ControllerResult<apihub_registry::ArtifactName> {
    if entry.action.trim().is_empty() {
        return Err(ControllerError::Validation(
            "action must not be empty".to_string(),
        ));
    }
    if entry.pattern.contains(RESOURCE_REF_PREFIX) {
        return Err(ControllerError::Validation(
            "target pattern must not contain $resource references".to_string(),
        ));
    }
    let resolved = resolve_relative(&entry.pattern, project);
    let name = ResourceName::parse_pattern(&resolved).map_err(|e| {
        ControllerError::Validation(format!("invalid target pattern {:?}: {e}", entry.pattern))
    })?;
    let ResourceName::Artifact(artifact) = name else {
        return Err(ControllerError::Validation(format!(
            "target pattern {:?} must name an artifact",
            entry.pattern
        )));
    };
    if artifact.artifact_id() == "-" {
        return Err(ControllerError::Validation(format!(
            "target pattern {:?} must end in a literal artifact id",
            entry.pattern
        )));
    }

    let entity = reference_entity(&entry.dependencies)?;
    if entity == Some(Entity::Artifact) {
        // The reference would be the not-yet-created target itself.
        return Err(ControllerError::Validation(
            "$resource.artifact cannot anchor a dependency".to_string(),
        ));
    }
    if let Some(e) = entity {
        if artifact.parent_name().truncate(e).is_none() {
            return Err(ControllerError::Validation(format!(
                "entity {e} is not on the target pattern's parent chain"
            )));
        }
    }
    for dependency in &entry.dependencies {
        if parse_reference(&dependency.pattern)?.is_some() {
            continue;
        }
        let resolved = resolve_relative(&dependency.pattern, project);
        ResourceName::parse_pattern(&resolved).map_err(|e| {
            ControllerError::Validation(format!(
                "invalid dependency pattern {:?}: {e}",
                dependency.pattern
            ))
        })?;
    }
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Dependency;

    fn entry(pattern: &str, deps: &[&str], action: &str) -> GeneratedResource {
        GeneratedResource {
            pattern: pattern.to_string(),
            filter: String::new(),
            dependencies: deps
                .iter()
                .map(|p| Dependency {
                    pattern: p.to_string(),
                    filter: String::new(),
                })
                .collect(),
            action: action.to_string(),
            receipt: false,
            refresh: None,
        }
    }

    fn project() -> ProjectName {
        ProjectName::new("demo").unwrap()
    }

    #[test]
    fn validate_accepts_wildcard_targets_with_literal_artifact_ids() {
        let e = entry(
            "apis/-/versions/-/specs/-/artifacts/lint",
            &["$resource.spec"],
            "registry compute lint $resource.spec",
        );
        assert!(validate_entry(&e, &project()).is_ok());
    }

    #[test]
    fn validate_rejects_wildcard_artifact_id() {
        let e = entry("apis/-/artifacts/-", &["$resource.api"], "cmd");
        assert!(validate_entry(&e, &project()).is_err());
    }

    #[test]
    fn validate_rejects_reference_in_target() {
        let e = entry("$resource.spec/artifacts/lint", &[], "cmd");
        assert!(validate_entry(&e, &project()).is_err());
    }

    #[test]
    fn validate_rejects_entity_off_the_parent_chain() {
        let e = entry(
            "apis/-/artifacts/vocabulary",
            &["$resource.spec"],
            "cmd $resource.spec",
        );
        assert!(validate_entry(&e, &project()).is_err());
    }

    #[test]
    fn validate_rejects_artifact_reference_entity() {
        let e = entry(
            "apis/-/versions/-/specs/-/artifacts/lint",
            &["$resource.artifact"],
            "cmd",
        );
        assert!(validate_entry(&e, &project()).is_err());
    }

    #[test]
    fn validate_rejects_empty_action() {
        let e = entry("apis/-/artifacts/vocabulary", &["$resource.api"], "  ");
        assert!(validate_entry(&e, &project()).is_err());
    }

    #[test]
    fn validate_rejects_non_artifact_target() {
        let e = entry("apis/-/versions/-/specs/-", &["$resource.spec"], "cmd");
        assert!(validate_entry(&e, &project()).is_err());
    }
}
