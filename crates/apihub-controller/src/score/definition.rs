//! Score definitions and the Score artifact they produce.

use serde::{Deserialize, Serialize};

use apihub_registry::Artifact;

use crate::error::{ControllerError, ControllerResult};

/// Severity attached to a computed score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Unspecified,
    Ok,
    Warning,
    Alert,
}

/// Inclusive severity range for numeric score types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericThreshold {
    pub severity: Severity,
    pub range: ThresholdRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanThreshold {
    pub severity: Severity,
    pub value: bool,
}

/// The value type of a score definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    Integer {
        #[serde(default)]
        min_value: i32,
        #[serde(default)]
        max_value: i32,
        #[serde(default)]
        thresholds: Vec<NumericThreshold>,
    },
    Percent {
        #[serde(default)]
        thresholds: Vec<NumericThreshold>,
    },
    Boolean {
        #[serde(default)]
        display_true: String,
        #[serde(default)]
        display_false: String,
        #[serde(default)]
        thresholds: Vec<BooleanThreshold>,
    },
}

/// Selects the artifact a formula reads, relative to the scored resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSelector {
    pub pattern: String,
    #[serde(default)]
    pub filter: String,
}

/// A single formula: read one artifact, evaluate one expression over its
/// decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFormula {
    pub artifact: ArtifactSelector,
    pub score_expression: String,
    /// Key under which this formula's value appears in a rollup map.
    #[serde(default)]
    pub reference_id: String,
}

/// Combine several formulas through a rollup expression over the
/// `reference_id → value` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupFormula {
    pub score_formulas: Vec<ScoreFormula>,
    pub rollup_expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formula {
    ScoreFormula(ScoreFormula),
    RollupFormula(RollupFormula),
}

/// A score definition artifact's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDefinition {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub uri_display_name: String,
    #[serde(rename = "type")]
    pub value_type: ScoreType,
    pub formula: Formula,
}

impl ScoreDefinition {
    /// Decode a definition from its artifact payload (YAML or JSON,
    /// depending on the artifact's mime type).
    pub fn from_artifact(artifact: &Artifact) -> ControllerResult<Self> {
        let contents = artifact
            .contents
            .as_deref()
            .ok_or_else(|| ControllerError::Payload {
                name: artifact.name.to_string(),
                reason: "artifact has no payload".to_string(),
            })?;
        let definition: ScoreDefinition = if artifact.mime_type.contains("json") {
            serde_json::from_slice(contents).map_err(|e| ControllerError::Payload {
                name: artifact.name.to_string(),
                reason: e.to_string(),
            })?
        } else {
            serde_yaml::from_slice(contents).map_err(|e| ControllerError::Payload {
                name: artifact.name.to_string(),
                reason: e.to_string(),
            })?
        };
        Ok(definition)
    }

    pub fn validate(&self) -> ControllerResult<()> {
        if self.id.trim().is_empty() {
            return Err(ControllerError::InvalidDefinition(
                "id must not be empty".to_string(),
            ));
        }
        match &self.formula {
            Formula::ScoreFormula(f) => validate_formula(f, false),
            Formula::RollupFormula(rollup) => {
                if rollup.score_formulas.is_empty() {
                    return Err(ControllerError::InvalidDefinition(
                        "rollup_formula.score_formulas must not be empty".to_string(),
                    ));
                }
                if rollup.rollup_expression.trim().is_empty() {
                    return Err(ControllerError::InvalidDefinition(
                        "rollup_formula.rollup_expression must not be empty".to_string(),
                    ));
                }
                for formula in &rollup.score_formulas {
                    validate_formula(formula, true)?;
                }
                Ok(())
            }
        }
    }
}

fn validate_formula(formula: &ScoreFormula, in_rollup: bool) -> ControllerResult<()> {
    if formula.score_expression.trim().is_empty() {
        return Err(ControllerError::InvalidDefinition(
            "score_formula.score_expression must not be empty".to_string(),
        ));
    }
    if formula.artifact.pattern.trim().is_empty() {
        return Err(ControllerError::InvalidDefinition(
            "score_formula.artifact.pattern must not be empty".to_string(),
        ));
    }
    if in_rollup {
        if formula.reference_id.is_empty() {
            return Err(ControllerError::InvalidDefinition(format!(
                "missing reference_id for score formula over {:?}",
                formula.artifact.pattern
            )));
        }
        if formula.reference_id.contains('-') {
            return Err(ControllerError::InvalidDefinition(format!(
                "reference_id {:?} must not contain '-'",
                formula.reference_id
            )));
        }
    }
    Ok(())
}

/// The computed score, stored as an artifact under the scored resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub uri_display_name: String,
    /// Name of the definition artifact this score was computed from.
    pub definition_name: String,
    pub severity: Severity,
    pub value: ScoreValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreValue {
    IntegerValue {
        value: i32,
        min_value: i32,
        max_value: i32,
    },
    PercentValue {
        value: f32,
    },
    BooleanValue {
        value: bool,
        display_value: String,
    },
}
