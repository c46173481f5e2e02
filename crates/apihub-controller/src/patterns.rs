//! Pattern resolution and `$resource` reference substitution.
//!
//! Patterns are slash-delimited `collection/identifier` sequences where an
//! identifier is a literal, the `-` wildcard, or (in dependency patterns
//! and command templates only) a `$resource.<entity>` reference. A
//! reference is resolved by truncating the bound reference resource's name
//! to the requested entity; wildcards are resolved by listing through the
//! provider. Listing results are sorted by full name so plans over the
//! same registry state come out byte-identical.

use apihub_registry::{Entity, ProjectName, RegistryProvider, Resource, ResourceName};

use crate::error::{ControllerError, ControllerResult};
use crate::manifest::Dependency;

/// Prefix of entity references in dependency patterns and commands.
pub const RESOURCE_REF_PREFIX: &str = "$resource.";

/// A parsed `$resource.<entity>` prefix and the pattern suffix after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePattern<'a> {
    pub entity: Entity,
    /// Remaining pattern after the reference, without a leading slash.
    pub suffix: &'a str,
}

/// Join a project-relative pattern under `projects/<p>/locations/global/`.
/// Absolute patterns and `$resource` references pass through unchanged.
pub fn resolve_relative(pattern: &str, project: &ProjectName) -> String {
    if pattern.starts_with("projects/") || pattern.starts_with(RESOURCE_REF_PREFIX) {
        return pattern.to_string();
    }
    if pattern.is_empty() {
        return project.to_string();
    }
    format!("{project}/{pattern}")
}

/// Parse a leading `$resource.<entity>` reference, if present.
pub fn parse_reference(pattern: &str) -> ControllerResult<Option<ReferencePattern<'_>>> {
    let Some(rest) = pattern.strip_prefix(RESOURCE_REF_PREFIX) else {
        return Ok(None);
    };
    let word_end = rest.find('/').unwrap_or(rest.len());
    let (word, suffix) = rest.split_at(word_end);
    let entity = Entity::parse(word)
        .filter(|e| *e != Entity::Project)
        .ok_or_else(|| ControllerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: format!("unknown entity reference {word:?}"),
        })?;
    Ok(Some(ReferencePattern {
        entity,
        suffix: suffix.trim_start_matches('/'),
    }))
}

/// The entity that binds a generated resource's reference resource: the
/// deepest entity named by any dependency reference, or `None` when no
/// dependency carries a reference (the project then acts as reference).
pub fn reference_entity(dependencies: &[Dependency]) -> ControllerResult<Option<Entity>> {
    let mut deepest: Option<Entity> = None;
    for dependency in dependencies {
        let Some(reference) = parse_reference(&dependency.pattern)? else {
            continue;
        };
        deepest = match deepest {
            None => Some(reference.entity),
            Some(current) if reference.entity.depth() > current.depth() => Some(reference.entity),
            Some(current) if reference.entity.depth() == current.depth()
                && reference.entity != current =>
            {
                return Err(ControllerError::Validation(format!(
                    "dependencies reference both {current} and {} at the same depth",
                    reference.entity
                )))
            }
            some => some,
        };
    }
    Ok(deepest)
}

/// Substitute a leading `$resource.<entity>` reference in `pattern` by
/// truncating `reference` to the requested entity. Patterns without a
/// reference pass through unchanged.
pub fn substitute_reference(
    pattern: &str,
    reference: &ResourceName,
) -> ControllerResult<String> {
    match parse_reference(pattern)? {
        None => Ok(pattern.to_string()),
        Some(parsed) => {
            let base = reference.truncate(parsed.entity).ok_or_else(|| {
                ControllerError::UnboundReference {
                    pattern: pattern.to_string(),
                    reference: reference.to_string(),
                }
            })?;
            if parsed.suffix.is_empty() {
                Ok(base.to_string())
            } else {
                Ok(format!("{base}/{}", parsed.suffix))
            }
        }
    }
}

/// Substitute every `$resource.<entity>` occurrence in a command template.
pub fn substitute_command(
    command: &str,
    reference: &ResourceName,
) -> ControllerResult<String> {
    let mut out = String::with_capacity(command.len());
    let mut rest = command;
    while let Some(idx) = rest.find(RESOURCE_REF_PREFIX) {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + RESOURCE_REF_PREFIX.len()..];
        let word_len = after
            .chars()
            .take_while(|c| c.is_ascii_lowercase())
            .count();
        let word = &after[..word_len];
        let entity = Entity::parse(word)
            .filter(|e| *e != Entity::Project)
            .ok_or_else(|| ControllerError::InvalidPattern {
                pattern: command.to_string(),
                reason: format!("unknown entity reference {word:?}"),
            })?;
        let base =
            reference
                .truncate(entity)
                .ok_or_else(|| ControllerError::UnboundReference {
                    pattern: command.to_string(),
                    reference: reference.to_string(),
                })?;
        out.push_str(&base.to_string());
        rest = &after[word_len..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Parse a pattern string into a (possibly wildcarded) resource name.
pub fn parse_pattern_name(pattern: &str) -> ControllerResult<ResourceName> {
    ResourceName::parse_pattern(pattern).map_err(|e| ControllerError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Expand a concrete-or-wildcard pattern against the registry. The
/// provider applies `filter` server-side; results come back name-sorted.
/// A concrete pattern naming an absent resource expands to the empty set.
pub async fn expand(
    provider: &dyn RegistryProvider,
    pattern: &str,
    filter: &str,
    with_payload: bool,
) -> ControllerResult<Vec<Resource>> {
    let name = parse_pattern_name(pattern)?;
    let mut resources = provider.list(&name, filter, with_payload).await?;
    resources.sort_by_key(|r| r.name().to_string());
    Ok(resources)
}
