//! The scoring engine.
//!
//! Evaluates a score definition against a bound resource and maintains the
//! `score-<definition-id>` artifact under it. Freshness follows the same
//! oracle as the planner: the score is recomputed when it is missing, when
//! the definition artifact is newer, or when any source artifact read by a
//! formula is newer. Formula results travel as explicit values; on any
//! error nothing is uploaded.

pub mod definition;
pub mod expression;

use chrono::{DateTime, Utc};
use serde_json::Map;
use tracing::debug;

use apihub_registry::{
    Artifact, ProjectName, RegistryProvider, RegistryWriter, Resource, ResourceName, StringMap,
};

use crate::error::{ControllerError, ControllerResult};
use crate::patch::mime_type_for_kind;
use crate::patterns::{resolve_relative, substitute_reference, RESOURCE_REF_PREFIX};
use crate::staleness::StalenessOracle;

pub use definition::{
    ArtifactSelector, BooleanThreshold, Formula, NumericThreshold, RollupFormula, Score,
    ScoreDefinition, ScoreFormula, ScoreType, ScoreValue, Severity, ThresholdRange,
};
pub use expression::Value;

/// Kind string of score artifacts.
pub const SCORE_KIND: &str = "Score";
/// Kind string of score definition artifacts.
pub const SCORE_DEFINITION_KIND: &str = "ScoreDefinition";

/// Artifact id of the score computed from `definition_id`.
pub fn score_artifact_id(definition_id: &str) -> String {
    format!("score-{definition_id}")
}

/// Result of applying a single score formula.
#[derive(Debug, Clone, PartialEq)]
struct FormulaResult {
    value: Value,
    needs_update: bool,
}

/// Evaluates score definitions against registry resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreEngine {
    oracle: StalenessOracle,
}

impl ScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_oracle(oracle: StalenessOracle) -> Self {
        Self { oracle }
    }

    /// Evaluate `definition_artifact` against `resource`. Returns the
    /// computed score, or `None` when the stored score is already up to
    /// date. With `dry_run` the score is rendered to stdout instead of
    /// being uploaded.
    pub async fn evaluate<R>(
        &self,
        registry: &R,
        definition_artifact: &Artifact,
        resource: &ResourceName,
        dry_run: bool,
    ) -> ControllerResult<Option<Score>>
    where
        R: RegistryProvider + RegistryWriter,
    {
        let definition = ScoreDefinition::from_artifact(definition_artifact)?;
        definition.validate()?;
        debug!(resource = %resource, definition = %definition.id, "calculating score");

        let score_name = resource.artifact(score_artifact_id(&definition.id))?;
        let score_resource_name = ResourceName::Artifact(score_name.clone());
        let score_time = match registry.get(&score_resource_name, false).await {
            Ok(resource) => Some(resource.update_time()),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                return Err(ControllerError::Fetch {
                    name: score_resource_name.to_string(),
                    source: e,
                })
            }
        };
        // Recompute when the score is missing or the definition changed.
        let take_action = self
            .oracle
            .is_stale(score_time, [definition_artifact.update_time]);

        let outcome = self
            .apply_formula(registry, &definition, resource, score_time, take_action)
            .await?;
        let Some(value) = outcome else {
            debug!(score = %score_resource_name, "score is already up-to-date");
            return Ok(None);
        };

        let score = build_score(&definition, value, &resource.project())?;
        if dry_run {
            let rendered = serde_yaml::to_string(&score)
                .map_err(|e| ControllerError::Document(e.to_string()))?;
            println!("{rendered}");
            return Ok(Some(score));
        }
        let contents = serde_yaml::to_string(&score)
            .map_err(|e| ControllerError::Document(e.to_string()))?
            .into_bytes();
        debug!(artifact = %score_name, "uploading score");
        registry
            .put_artifact(Artifact {
                name: score_name,
                mime_type: mime_type_for_kind(SCORE_KIND),
                contents: Some(contents),
                labels: StringMap::new(),
                annotations: StringMap::new(),
                update_time: Utc::now(),
            })
            .await?;
        Ok(Some(score))
    }

    async fn apply_formula<R>(
        &self,
        registry: &R,
        definition: &ScoreDefinition,
        resource: &ResourceName,
        score_time: Option<DateTime<Utc>>,
        take_action: bool,
    ) -> ControllerResult<Option<Value>>
    where
        R: RegistryProvider + RegistryWriter,
    {
        match &definition.formula {
            Formula::ScoreFormula(formula) => {
                let result = self
                    .apply_score_formula(registry, formula, resource, score_time, take_action)
                    .await?;
                Ok(result.needs_update.then_some(result.value))
            }
            Formula::RollupFormula(rollup) => {
                let mut needs_update = take_action;
                let mut variables = Map::new();
                for formula in &rollup.score_formulas {
                    let result = self
                        .apply_score_formula(registry, formula, resource, score_time, take_action)
                        .await?;
                    variables.insert(formula.reference_id.clone(), value_to_json(&result.value));
                    needs_update = needs_update || result.needs_update;
                }
                if !needs_update {
                    return Ok(None);
                }
                let value = expression::evaluate(&rollup.rollup_expression, &variables)?;
                Ok(Some(value))
            }
        }
    }

    /// Fetch the formula's artifact and evaluate its expression. The value
    /// is always computed so rollups have every reference id populated
    /// even when only one sibling formula made the score stale.
    async fn apply_score_formula<R>(
        &self,
        registry: &R,
        formula: &ScoreFormula,
        resource: &ResourceName,
        score_time: Option<DateTime<Utc>>,
        take_action: bool,
    ) -> ControllerResult<FormulaResult>
    where
        R: RegistryProvider + RegistryWriter,
    {
        let pattern = &formula.artifact.pattern;
        let resolved = if pattern.starts_with(RESOURCE_REF_PREFIX) {
            substitute_reference(pattern, resource)?
        } else {
            resolve_relative(pattern, &resource.project())
        };
        let name = ResourceName::parse(&resolved)?;
        if !matches!(name, ResourceName::Artifact(_)) {
            return Err(ControllerError::InvalidDefinition(format!(
                "score_formula.artifact.pattern {pattern:?} must name an artifact"
            )));
        }
        // Absence is a failed fetch here, unlike in the planner.
        let fetched =
            registry
                .get(&name, true)
                .await
                .map_err(|e| ControllerError::Fetch {
                    name: name.to_string(),
                    source: e,
                })?;
        let Resource::Artifact(artifact) = fetched else {
            return Err(ControllerError::InvalidDefinition(format!(
                "score_formula.artifact.pattern {pattern:?} must name an artifact"
            )));
        };

        let needs_update =
            take_action || self.oracle.is_stale(score_time, [artifact.update_time]);
        let variables = decode_artifact_map(&artifact)?;
        let value = expression::evaluate(&formula.score_expression, &variables)?;
        Ok(FormulaResult {
            value,
            needs_update,
        })
    }
}

/// List the score definition artifacts of a project, skipping artifacts
/// whose payload does not decode.
pub async fn fetch_score_definitions(
    provider: &dyn RegistryProvider,
    project: &ProjectName,
) -> ControllerResult<Vec<Artifact>> {
    let pattern = ResourceName::parse_pattern(&format!("{project}/artifacts/-"))?;
    let filter = format!(
        "mime_type == \"{}\"",
        mime_type_for_kind(SCORE_DEFINITION_KIND)
    );
    let mut definitions = Vec::new();
    for resource in provider.list(&pattern, &filter, true).await? {
        let Resource::Artifact(artifact) = resource else {
            continue;
        };
        match ScoreDefinition::from_artifact(&artifact) {
            Ok(_) => definitions.push(artifact),
            Err(e) => {
                debug!(artifact = %artifact.name, error = %e, "skipping undecodable score definition");
            }
        }
    }
    Ok(definitions)
}

/// Decode an artifact payload into a generic variable map by mime type.
fn decode_artifact_map(artifact: &Artifact) -> ControllerResult<Map<String, serde_json::Value>> {
    let contents = artifact
        .contents
        .as_deref()
        .ok_or_else(|| ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: "artifact has no payload".to_string(),
        })?;
    let decoded: serde_json::Value = if artifact.mime_type.contains("json") {
        serde_json::from_slice(contents).map_err(|e| ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: e.to_string(),
        })?
    } else if artifact.mime_type.contains("yaml") {
        let value: serde_yaml::Value =
            serde_yaml::from_slice(contents).map_err(|e| ControllerError::Payload {
                name: artifact.name.to_string(),
                reason: e.to_string(),
            })?;
        serde_json::to_value(value).map_err(|e| ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: e.to_string(),
        })?
    } else {
        return Err(ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: format!("unsupported mime type {:?}", artifact.mime_type),
        });
    };
    match decoded {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(ControllerError::Payload {
            name: artifact.name.to_string(),
            reason: "payload is not a mapping".to_string(),
        }),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::from(*b),
        Value::Str(s) => serde_json::Value::from(s.clone()),
    }
}

/// Coerce the formula result into the definition's value type and assign
/// severity from the thresholds.
fn build_score(
    definition: &ScoreDefinition,
    value: Value,
    project: &ProjectName,
) -> ControllerResult<Score> {
    let (score_value, severity) = match &definition.value_type {
        ScoreType::Integer {
            min_value,
            max_value,
            thresholds,
        } => {
            let v = match value {
                Value::Int(i) => i as i32,
                Value::Float(f) => f as i32,
                other => {
                    return Err(ControllerError::InvalidDefinition(format!(
                        "integer definition expects a numeric result, got {}",
                        other.kind()
                    )))
                }
            };
            let severity = if v < *min_value || v > *max_value {
                Severity::Alert
            } else {
                thresholds
                    .iter()
                    .find(|t| v >= t.range.min && v <= t.range.max)
                    .map(|t| t.severity)
                    .unwrap_or_default()
            };
            (
                ScoreValue::IntegerValue {
                    value: v,
                    min_value: *min_value,
                    max_value: *max_value,
                },
                severity,
            )
        }
        ScoreType::Percent { thresholds } => {
            let v = match value {
                Value::Int(i) => i as f32,
                Value::Float(f) => f as f32,
                other => {
                    return Err(ControllerError::InvalidDefinition(format!(
                        "percent definition expects a numeric result, got {}",
                        other.kind()
                    )))
                }
            };
            let severity = if !(0.0..=100.0).contains(&v) {
                Severity::Alert
            } else {
                thresholds
                    .iter()
                    .find(|t| v >= t.range.min as f32 && v <= t.range.max as f32)
                    .map(|t| t.severity)
                    .unwrap_or_default()
            };
            (ScoreValue::PercentValue { value: v }, severity)
        }
        ScoreType::Boolean {
            display_true,
            display_false,
            thresholds,
        } => {
            let Value::Bool(b) = value else {
                return Err(ControllerError::InvalidDefinition(format!(
                    "boolean definition expects a boolean result, got {}",
                    value.kind()
                )));
            };
            let display_value = if b && !display_true.is_empty() {
                display_true.clone()
            } else if !b && !display_false.is_empty() {
                display_false.clone()
            } else {
                b.to_string()
            };
            // Unlike the numeric walks, every matching threshold is
            // applied in order, so with duplicate values the last one
            // wins.
            let mut severity = Severity::default();
            for threshold in thresholds {
                if threshold.value == b {
                    severity = threshold.severity;
                }
            }
            (
                ScoreValue::BooleanValue {
                    value: b,
                    display_value,
                },
                severity,
            )
        }
    };
    Ok(Score {
        id: score_artifact_id(&definition.id),
        kind: SCORE_KIND.to_string(),
        display_name: definition.display_name.clone(),
        description: definition.description.clone(),
        uri: definition.uri.clone(),
        uri_display_name: definition.uri_display_name.clone(),
        definition_name: format!("{project}/artifacts/{}", definition.id),
        severity,
        value: score_value,
    })
}
