//! End-to-end planner scenarios against the in-memory registry.

use chrono::{DateTime, Duration, Utc};

use apihub_controller::manifest::{Dependency, GeneratedResource, Manifest};
use apihub_controller::planner::Planner;
use apihub_registry::{
    ApiSpec, Artifact, MemoryRegistry, ProjectName, RegistryProvider, Resource, ResourceName,
    StringMap,
};

const PROJECT: &str = "controller-test";
const OPENAPI_MIME: &str = "application/x.openapi+gzip;version=3.0.0";

fn base_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

fn project() -> ProjectName {
    ProjectName::new(PROJECT).unwrap()
}

fn spec(name: &str, at: DateTime<Utc>) -> Resource {
    Resource::Spec(ApiSpec {
        name: name.parse().unwrap(),
        filename: String::new(),
        description: String::new(),
        mime_type: OPENAPI_MIME.to_string(),
        contents: Some(name.as_bytes().to_vec()),
        revision_id: String::new(),
        labels: StringMap::new(),
        annotations: StringMap::new(),
        update_time: at,
    })
}

fn artifact(name: &str, at: DateTime<Utc>) -> Resource {
    Resource::Artifact(Artifact {
        name: name.parse().unwrap(),
        mime_type: "application/json".to_string(),
        contents: Some(b"{}".to_vec()),
        labels: StringMap::new(),
        annotations: StringMap::new(),
        update_time: at,
    })
}

fn manifest(entries: Vec<GeneratedResource>) -> Manifest {
    Manifest {
        id: PROJECT.to_string(),
        generated_resources: entries,
    }
}

fn entry(pattern: &str, dependencies: &[&str], action: &str) -> GeneratedResource {
    GeneratedResource {
        pattern: pattern.to_string(),
        filter: String::new(),
        dependencies: dependencies
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

fn petstore_spec_name(version: &str) -> String {
    format!(
        "projects/{PROJECT}/locations/global/apis/petstore/versions/{version}/specs/openapi.yaml"
    )
}

fn seeded_petstore(registry: &MemoryRegistry) {
    for (i, version) in ["1.0.0", "1.0.1", "1.1.0"].iter().enumerate() {
        registry
            .seed(spec(
                &petstore_spec_name(version),
                base_time() + Duration::seconds(i as i64),
            ))
            .unwrap();
    }
}

async fn pinned(registry: &MemoryRegistry, spec_name: &str) -> String {
    let name = ResourceName::parse(spec_name).unwrap();
    let info = registry.resolve_revision(&name).await.unwrap();
    format!("{spec_name}@{}", info.revision_id)
}

#[tokio::test]
async fn lint_actions_for_every_spec_with_revisions_pinned() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);

    let manifest = manifest(vec![entry(
        "apis/-/versions/-/specs/-/artifacts/lint-gnostic",
        &["$resource.spec"],
        "registry compute lint $resource.spec --linter gnostic",
    )]);
    let outcome = Planner::new()
        .plan(&registry, &manifest, &project(), 10)
        .await;

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.actions.len(), 3);
    for version in ["1.0.0", "1.0.1", "1.1.0"] {
        let spec_name = petstore_spec_name(version);
        let pinned = pinned(&registry, &spec_name).await;
        let action = outcome
            .actions
            .iter()
            .find(|a| a.command.contains(version))
            .unwrap();
        assert_eq!(
            action.command,
            format!("registry compute lint {pinned} --linter gnostic")
        );
        assert_eq!(
            action.generated_resource,
            format!("{pinned}/artifacts/lint-gnostic")
        );
        assert!(!action.requires_receipt);
        // The generated resource name parses as an artifact name.
        let parsed = ResourceName::parse(&action.generated_resource).unwrap();
        assert!(matches!(parsed, ResourceName::Artifact(_)));
    }
}

#[tokio::test]
async fn fresh_targets_are_not_replanned() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);
    // Two lint artifacts comfortably newer than their specs.
    for version in ["1.0.0", "1.0.1"] {
        registry
            .seed(artifact(
                &format!("{}/artifacts/lint-gnostic", petstore_spec_name(version)),
                base_time() + Duration::seconds(30),
            ))
            .unwrap();
    }

    let manifest = manifest(vec![entry(
        "apis/-/versions/-/specs/-/artifacts/lint-gnostic",
        &["$resource.spec"],
        "registry compute lint $resource.spec --linter gnostic",
    )]);
    let outcome = Planner::new()
        .plan(&registry, &manifest, &project(), 10)
        .await;

    assert_eq!(outcome.actions.len(), 1);
    assert!(outcome.actions[0].command.contains("1.1.0"));
}

#[tokio::test]
async fn aggregated_artifacts_one_action_per_api() {
    let registry = MemoryRegistry::new();
    for api in ["test-api-1", "test-api-2"] {
        for version in ["1.0.0", "1.0.1", "1.1.0"] {
            registry
                .seed(spec(
                    &format!(
                        "projects/{PROJECT}/locations/global/apis/{api}/versions/{version}/specs/openapi.yaml"
                    ),
                    base_time(),
                ))
                .unwrap();
        }
    }

    let manifest = manifest(vec![entry(
        "apis/-/artifacts/vocabulary",
        &["$resource.api/versions/-/specs/-"],
        "registry compute vocabulary $resource.api",
    )]);
    let outcome = Planner::new()
        .plan(&registry, &manifest, &project(), 10)
        .await;

    assert!(outcome.failures.is_empty());
    let commands: Vec<&str> = outcome.actions.iter().map(|a| a.command.as_str()).collect();
    assert_eq!(
        commands,
        vec![
            "registry compute vocabulary projects/controller-test/locations/global/apis/test-api-1",
            "registry compute vocabulary projects/controller-test/locations/global/apis/test-api-2",
        ]
    );
    assert_eq!(
        outcome.actions[0].generated_resource,
        "projects/controller-test/locations/global/apis/test-api-1/artifacts/vocabulary"
    );
}

#[tokio::test]
async fn candidates_with_missing_dependencies_are_skipped_silently() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);
    // Only 1.0.1 has both upstream artifacts.
    registry
        .seed(artifact(
            &format!("{}/artifacts/lint-gnostic", petstore_spec_name("1.0.0")),
            base_time(),
        ))
        .unwrap();
    for version in ["1.0.1"] {
        for id in ["lint-gnostic", "complexity"] {
            registry
                .seed(artifact(
                    &format!("{}/artifacts/{id}", petstore_spec_name(version)),
                    base_time(),
                ))
                .unwrap();
        }
    }
    registry
        .seed(artifact(
            &format!("{}/artifacts/complexity", petstore_spec_name("1.1.0")),
            base_time(),
        ))
        .unwrap();

    let manifest = manifest(vec![entry(
        "apis/-/versions/-/specs/-/artifacts/summary",
        &[
            "$resource.spec/artifacts/lint-gnostic",
            "$resource.spec/artifacts/complexity",
        ],
        "registry compute summary $resource.spec/artifacts/lint-gnostic $resource.spec/artifacts/complexity",
    )]);
    let outcome = Planner::new()
        .plan(&registry, &manifest, &project(), 10)
        .await;

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.actions.len(), 1);
    let spec_name = petstore_spec_name("1.0.1");
    let pinned = pinned(&registry, &spec_name).await;
    assert_eq!(
        outcome.actions[0].command,
        format!(
            "registry compute summary {pinned}/artifacts/lint-gnostic {pinned}/artifacts/complexity"
        )
    );
    assert_eq!(
        outcome.actions[0].generated_resource,
        format!("{pinned}/artifacts/summary")
    );
}

#[tokio::test]
async fn receipt_actions_track_a_project_level_receipt() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);

    let mut receipt_entry = entry(
        "artifacts/search-index",
        &["apis/-/versions/-/specs/-"],
        &format!(
            "registry compute search-index projects/{PROJECT}/locations/global/apis/-/versions/-/specs/-"
        ),
    );
    receipt_entry.receipt = true;
    let manifest = manifest(vec![receipt_entry]);
    let planner = Planner::new();

    // No receipt yet: one aggregate action.
    let outcome = planner.plan(&registry, &manifest, &project(), 10).await;
    assert_eq!(outcome.actions.len(), 1);
    assert!(outcome.actions[0].requires_receipt);
    assert_eq!(
        outcome.actions[0].generated_resource,
        format!("projects/{PROJECT}/locations/global/artifacts/search-index")
    );

    // Fresh receipt: nothing to do.
    registry
        .seed(artifact(
            &format!("projects/{PROJECT}/locations/global/artifacts/search-index"),
            base_time() + Duration::seconds(30),
        ))
        .unwrap();
    let outcome = planner.plan(&registry, &manifest, &project(), 10).await;
    assert!(outcome.actions.is_empty());

    // A spec newer than the receipt makes it stale again.
    registry
        .seed(spec(
            &petstore_spec_name("2.0.0"),
            base_time() + Duration::seconds(60),
        ))
        .unwrap();
    let outcome = planner.plan(&registry, &manifest, &project(), 10).await;
    assert_eq!(outcome.actions.len(), 1);
}

#[tokio::test]
async fn shared_project_dependencies_invalidate_every_target() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);
    // Conformance artifacts exist and are fresh.
    for version in ["1.0.0", "1.0.1", "1.1.0"] {
        registry
            .seed(artifact(
                &format!("{}/artifacts/conformance", petstore_spec_name(version)),
                base_time() + Duration::seconds(30),
            ))
            .unwrap();
    }
    let manifest = manifest(vec![entry(
        "apis/-/versions/-/specs/-/artifacts/conformance",
        &["$resource.spec", "artifacts/styleguide"],
        "registry compute conformance $resource.spec",
    )]);
    let planner = Planner::new();

    // The project-level styleguide is missing: dependencies unrealizable.
    let outcome = planner.plan(&registry, &manifest, &project(), 10).await;
    assert!(outcome.actions.is_empty());
    assert!(outcome.failures.is_empty());

    // An updated styleguide outdates all three targets at once.
    registry
        .seed(artifact(
            &format!("projects/{PROJECT}/locations/global/artifacts/styleguide"),
            base_time() + Duration::seconds(90),
        ))
        .unwrap();
    let outcome = planner.plan(&registry, &manifest, &project(), 10).await;
    assert_eq!(outcome.actions.len(), 3);
}

#[tokio::test]
async fn max_actions_is_a_hard_cap() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);

    let manifest = manifest(vec![entry(
        "apis/-/versions/-/specs/-/artifacts/vocabulary",
        &["$resource.spec"],
        "registry compute vocabulary $resource.spec",
    )]);
    let planner = Planner::new();

    let capped = planner.plan(&registry, &manifest, &project(), 2).await;
    assert_eq!(capped.actions.len(), 2);

    let roomy = planner.plan(&registry, &manifest, &project(), 4).await;
    assert_eq!(roomy.actions.len(), 3);

    let zero = planner.plan(&registry, &manifest, &project(), 0).await;
    assert!(zero.actions.is_empty());
}

#[tokio::test]
async fn plans_are_deterministic_and_sorted_by_command() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);

    let manifest = manifest(vec![entry(
        "apis/-/versions/-/specs/-/artifacts/lint-gnostic",
        &["$resource.spec"],
        "registry compute lint $resource.spec --linter gnostic",
    )]);
    let planner = Planner::new();

    let first = planner.plan(&registry, &manifest, &project(), 10).await;
    let second = planner.plan(&registry, &manifest, &project(), 10).await;
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    let mut sorted = first.actions.clone();
    sorted.sort_by(|a, b| a.command.cmp(&b.command));
    assert_eq!(first.actions, sorted);
}

#[tokio::test]
async fn malformed_entries_fail_alone() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);

    let manifest = manifest(vec![
        // Entity not on the target's parent chain.
        entry(
            "apis/-/artifacts/vocabulary",
            &["$resource.spec"],
            "registry compute vocabulary $resource.spec",
        ),
        entry(
            "apis/-/versions/-/specs/-/artifacts/lint-gnostic",
            &["$resource.spec"],
            "registry compute lint $resource.spec --linter gnostic",
        ),
    ]);
    let outcome = Planner::new()
        .plan(&registry, &manifest, &project(), 10)
        .await;

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].pattern, "apis/-/artifacts/vocabulary");
    assert_eq!(outcome.actions.len(), 3);
}

#[tokio::test]
async fn dependency_filters_narrow_expansion() {
    let registry = MemoryRegistry::new();
    seeded_petstore(&registry);
    // A spec with a non-openapi mime type.
    let mut other = spec(
        &format!("projects/{PROJECT}/locations/global/apis/petstore/versions/2.0.0/specs/openapi.proto"),
        base_time(),
    );
    if let Resource::Spec(s) = &mut other {
        s.mime_type = "application/x.protobuf+gzip".to_string();
    }
    registry.seed(other).unwrap();

    let mut e = entry(
        "apis/-/versions/-/specs/-/artifacts/lint-gnostic",
        &[],
        "registry compute lint $resource.spec --linter gnostic",
    );
    e.dependencies = vec![Dependency {
        pattern: "$resource.spec".to_string(),
        filter: "mime_type.contains('openapi')".to_string(),
    }];
    let outcome = Planner::new()
        .plan(&registry, &manifest(vec![e]), &project(), 10)
        .await;

    // The protobuf spec's dependency expansion is filtered to nothing.
    assert_eq!(outcome.actions.len(), 3);
    assert!(outcome
        .actions
        .iter()
        .all(|a| !a.command.contains("openapi.proto")));
}
