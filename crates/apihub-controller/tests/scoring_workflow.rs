//! Scoring engine workflows against the in-memory registry.

use chrono::{DateTime, Utc};

use apihub_controller::patch::mime_type_for_kind;
use apihub_controller::score::{
    fetch_score_definitions, score_artifact_id, ScoreEngine, ScoreValue, Severity,
    SCORE_DEFINITION_KIND,
};
use apihub_registry::{
    Artifact, MemoryRegistry, ProjectName, RegistryProvider, RegistryWriter, Resource,
    ResourceName, StringMap,
};

const SPEC: &str =
    "projects/demo/locations/global/apis/petstore/versions/1.0.0/specs/openapi.yaml";

fn base_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn artifact(name: &str, mime_type: &str, contents: &str, at: DateTime<Utc>) -> Artifact {
    Artifact {
        name: name.parse().unwrap(),
        mime_type: mime_type.to_string(),
        contents: Some(contents.as_bytes().to_vec()),
        labels: StringMap::new(),
        annotations: StringMap::new(),
        update_time: at,
    }
}

fn definition_artifact(yaml: &str, at: DateTime<Utc>) -> Artifact {
    artifact(
        "projects/demo/locations/global/artifacts/lint-quality",
        &mime_type_for_kind(SCORE_DEFINITION_KIND),
        yaml,
        at,
    )
}

fn integer_definition_yaml() -> String {
    r#"
id: lint-quality
display_name: Lint quality
type:
  integer:
    min_value: 0
    max_value: 100
    thresholds:
      - severity: alert
        range: { min: 0, max: 59 }
      - severity: warning
        range: { min: 60, max: 79 }
      - severity: ok
        range: { min: 80, max: 100 }
formula:
  score_formula:
    artifact:
      pattern: $resource.spec/artifacts/lint
    score_expression: "100 - errors * 10"
"#
    .to_string()
}

async fn seeded_registry(lint_payload: &str) -> MemoryRegistry {
    let registry = MemoryRegistry::new();
    registry
        .seed(Resource::Artifact(artifact(
            &format!("{SPEC}/artifacts/lint"),
            "application/json",
            lint_payload,
            base_time(),
        )))
        .unwrap();
    registry
}

fn spec_name() -> ResourceName {
    ResourceName::parse(SPEC).unwrap()
}

#[tokio::test]
async fn score_is_computed_uploaded_and_kept_fresh() {
    let registry = seeded_registry(r#"{ "errors": 2 }"#).await;
    let definition = definition_artifact(&integer_definition_yaml(), base_time());
    registry
        .seed(Resource::Artifact(definition.clone()))
        .unwrap();
    let engine = ScoreEngine::new();

    // First evaluation: no score artifact yet.
    let score = engine
        .evaluate(&registry, &definition, &spec_name(), false)
        .await
        .unwrap()
        .expect("score should be computed");
    assert_eq!(
        score.value,
        ScoreValue::IntegerValue {
            value: 80,
            min_value: 0,
            max_value: 100
        }
    );
    assert_eq!(score.severity, Severity::Ok);
    assert_eq!(
        score.definition_name,
        "projects/demo/locations/global/artifacts/lint-quality"
    );

    // The uploaded artifact exists under the scored resource.
    let score_name = spec_name()
        .artifact(score_artifact_id("lint-quality"))
        .unwrap();
    let stored = registry
        .get(&ResourceName::Artifact(score_name), true)
        .await
        .unwrap();
    assert_eq!(
        stored.as_artifact().unwrap().mime_type,
        "application/yaml;type=Score"
    );

    // Second evaluation: everything is older than the score, nothing to do.
    let unchanged = engine
        .evaluate(&registry, &definition, &spec_name(), false)
        .await
        .unwrap();
    assert!(unchanged.is_none());

    // Rewriting the source artifact makes the score stale again.
    registry
        .put_artifact(artifact(
            &format!("{SPEC}/artifacts/lint"),
            "application/json",
            r#"{ "errors": 5 }"#,
            Utc::now(),
        ))
        .await
        .unwrap();
    let recomputed = engine
        .evaluate(&registry, &definition, &spec_name(), false)
        .await
        .unwrap()
        .expect("stale score should be recomputed");
    assert_eq!(
        recomputed.value,
        ScoreValue::IntegerValue {
            value: 50,
            min_value: 0,
            max_value: 100
        }
    );
    assert_eq!(recomputed.severity, Severity::Alert);
}

#[tokio::test]
async fn rollup_weights_reference_ids() {
    let registry = MemoryRegistry::new();
    registry
        .seed(Resource::Artifact(artifact(
            &format!("{SPEC}/artifacts/accuracy"),
            "application/json",
            r#"{ "value": 80 }"#,
            base_time(),
        )))
        .unwrap();
    registry
        .seed(Resource::Artifact(artifact(
            &format!("{SPEC}/artifacts/coverage"),
            "application/json",
            r#"{ "value": 60 }"#,
            base_time(),
        )))
        .unwrap();

    let definition = definition_artifact(
        r#"
id: quality-rollup
type:
  integer:
    min_value: 0
    max_value: 100
    thresholds:
      - severity: warning
        range: { min: 60, max: 79 }
      - severity: ok
        range: { min: 80, max: 100 }
formula:
  rollup_formula:
    score_formulas:
      - artifact:
          pattern: $resource.spec/artifacts/accuracy
        score_expression: value
        reference_id: a
      - artifact:
          pattern: $resource.spec/artifacts/coverage
        score_expression: value
        reference_id: b
    rollup_expression: "a*0.7 + b*0.3"
"#,
        base_time(),
    );

    let score = ScoreEngine::new()
        .evaluate(&registry, &definition, &spec_name(), false)
        .await
        .unwrap()
        .expect("rollup should be computed");
    // 80*0.7 + 60*0.3 = 74.0, truncated into the integer type.
    assert_eq!(
        score.value,
        ScoreValue::IntegerValue {
            value: 74,
            min_value: 0,
            max_value: 100
        }
    );
    assert_eq!(score.severity, Severity::Warning);
}

#[tokio::test]
async fn dry_run_renders_without_uploading() {
    let registry = seeded_registry(r#"{ "errors": 0 }"#).await;
    let definition = definition_artifact(&integer_definition_yaml(), base_time());

    let score = ScoreEngine::new()
        .evaluate(&registry, &definition, &spec_name(), true)
        .await
        .unwrap()
        .expect("dry run still computes the score");
    assert_eq!(score.severity, Severity::Ok);

    let score_name = spec_name()
        .artifact(score_artifact_id("lint-quality"))
        .unwrap();
    let missing = registry
        .get(&ResourceName::Artifact(score_name), false)
        .await;
    assert!(missing.unwrap_err().is_not_found());
}

#[tokio::test]
async fn missing_source_artifact_is_a_fetch_error() {
    let registry = MemoryRegistry::new();
    registry
        .seed(Resource::Spec(apihub_registry::ApiSpec {
            name: SPEC.parse().unwrap(),
            filename: String::new(),
            description: String::new(),
            mime_type: String::new(),
            contents: None,
            revision_id: String::new(),
            labels: StringMap::new(),
            annotations: StringMap::new(),
            update_time: base_time(),
        }))
        .unwrap();
    let definition = definition_artifact(&integer_definition_yaml(), base_time());

    let err = ScoreEngine::new()
        .evaluate(&registry, &definition, &spec_name(), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to fetch"));
}

#[tokio::test]
async fn invalid_definitions_are_rejected() {
    let registry = seeded_registry(r#"{ "errors": 0 }"#).await;
    // reference_id containing '-' inside a rollup.
    let definition = definition_artifact(
        r#"
id: broken
type:
  integer: {}
formula:
  rollup_formula:
    score_formulas:
      - artifact:
          pattern: $resource.spec/artifacts/lint
        score_expression: errors
        reference_id: lint-errors
    rollup_expression: lint_errors
"#,
        base_time(),
    );
    let err = ScoreEngine::new()
        .evaluate(&registry, &definition, &spec_name(), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("reference_id"));
}

#[tokio::test]
async fn definitions_are_discovered_by_mime_type() {
    let registry = MemoryRegistry::new();
    registry
        .seed(Resource::Artifact(definition_artifact(
            &integer_definition_yaml(),
            base_time(),
        )))
        .unwrap();
    // A project artifact with another mime type is ignored.
    registry
        .seed(Resource::Artifact(artifact(
            "projects/demo/locations/global/artifacts/styleguide",
            "application/json",
            "{}",
            base_time(),
        )))
        .unwrap();

    let project = ProjectName::new("demo").unwrap();
    let definitions = fetch_score_definitions(&registry, &project).await.unwrap();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].name.artifact_id(), "lint-quality");
}
