//! apihub - declarative controller CLI for an API registry.
//!
//! All commands run against a local registry snapshot file (JSON or YAML),
//! which stands in for the remote service behind the same provider traits.
//!
//! ## Commands
//!
//! - `resolve`: print the actions a manifest requires
//! - `score`: evaluate score definitions against matching resources
//! - `export`: export an API as a declarative YAML document
//! - `apply`: apply a declarative YAML document to the registry

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use apihub_controller::patterns::{expand, resolve_relative};
use apihub_controller::score::fetch_score_definitions;
use apihub_controller::{apply_api_patch_bytes, export_api, Manifest, Planner, ScoreEngine};
use apihub_registry::{
    Artifact, Bounded, MemoryRegistry, ProjectName, RegistryProvider, ResourceName,
    DEFAULT_MAX_IN_FLIGHT,
};

#[derive(Parser)]
#[command(name = "apihub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Declarative controller for an API registry", long_about = None)]
struct Cli {
    /// Registry snapshot file; created by the first mutating command
    #[arg(long, global = true, default_value = "registry.json")]
    registry: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the actions required to bring a manifest's generated
    /// resources up to date
    Resolve {
        /// Manifest file (YAML)
        manifest: PathBuf,

        /// Project id the manifest applies to
        #[arg(long)]
        project: String,

        /// Maximum concurrent registry operations
        #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
        jobs: usize,

        /// Stop planning once this many actions have been produced
        #[arg(long, default_value_t = 100)]
        max_actions: usize,
    },

    /// Evaluate score definitions against matching resources
    Score {
        /// Resource pattern to score, relative to the project
        #[arg(long)]
        pattern: String,

        /// Project id
        #[arg(long)]
        project: String,

        /// Definition artifact name; all project definitions when omitted
        #[arg(long)]
        definition: Option<String>,

        /// Render scores to stdout instead of uploading
        #[arg(long)]
        dry_run: bool,

        /// Maximum concurrent registry operations
        #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
        jobs: usize,
    },

    /// Export an API as a declarative YAML document
    Export {
        /// Full API resource name
        name: String,

        /// Embed child versions, specs, deployments, and artifacts
        #[arg(long)]
        nested: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply a declarative YAML document to the registry
    Apply {
        /// Document file
        #[arg(short = 'f', long)]
        file: PathBuf,

        /// Parent project, e.g. projects/demo/locations/global
        #[arg(long)]
        parent: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let registry = load_registry(&cli.registry)?;
    match cli.command {
        Commands::Resolve {
            manifest,
            project,
            jobs,
            max_actions,
        } => resolve(registry, &manifest, &project, jobs, max_actions).await,
        Commands::Score {
            pattern,
            project,
            definition,
            dry_run,
            jobs,
        } => {
            score(
                registry,
                &cli.registry,
                &pattern,
                &project,
                definition.as_deref(),
                dry_run,
                jobs,
            )
            .await
        }
        Commands::Export {
            name,
            nested,
            output,
        } => export(registry, &name, nested, output.as_deref()).await,
        Commands::Apply { file, parent } => {
            apply(registry, &cli.registry, &file, &parent).await
        }
    }
}

/// Install the process-wide tracing subscriber. By default only the
/// workspace crates log, at `info` (or `debug` with `--verbose`);
/// `RUST_LOG` replaces the whole filter when set. `--json` switches to
/// newline-delimited JSON log lines.
fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "apihub={level},apihub_controller={level},apihub_registry={level}"
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(verbose)).init();
    }
}

fn load_registry(path: &Path) -> Result<MemoryRegistry> {
    if path.exists() {
        MemoryRegistry::load_file(path)
            .with_context(|| format!("failed to load registry snapshot {}", path.display()))
    } else {
        Ok(MemoryRegistry::new())
    }
}

async fn resolve(
    registry: MemoryRegistry,
    manifest_path: &Path,
    project: &str,
    jobs: usize,
    max_actions: usize,
) -> Result<()> {
    let raw = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("failed to read manifest {}", manifest_path.display()))?;
    let manifest = Manifest::from_yaml(&raw)?;
    let project = ProjectName::new(project)?;
    let provider = Bounded::with_limit(registry, jobs);

    let outcome = Planner::new()
        .plan(&provider, &manifest, &project, max_actions)
        .await;
    for failure in &outcome.failures {
        warn!(pattern = %failure.pattern, error = %failure.error, "entry skipped");
    }
    info!(actions = outcome.actions.len(), "plan complete");
    print!("{}", serde_yaml::to_string(&outcome.actions)?);
    Ok(())
}

async fn score(
    registry: MemoryRegistry,
    snapshot_path: &Path,
    pattern: &str,
    project: &str,
    definition: Option<&str>,
    dry_run: bool,
    jobs: usize,
) -> Result<()> {
    let project = ProjectName::new(project)?;
    let provider = Arc::new(Bounded::with_limit(registry, jobs));

    let definitions: Vec<Artifact> = match definition {
        Some(name) => {
            let name = ResourceName::parse(&resolve_relative(name, &project))?;
            let resource = provider.get(&name, true).await?;
            vec![resource
                .as_artifact()
                .cloned()
                .ok_or_else(|| anyhow!("{name} is not an artifact"))?]
        }
        None => fetch_score_definitions(provider.as_ref(), &project).await?,
    };
    if definitions.is_empty() {
        bail!("no score definitions found in {project}");
    }

    let resolved = resolve_relative(pattern, &project);
    let resources: Vec<ResourceName> = expand(provider.as_ref(), &resolved, "", false)
        .await?
        .into_iter()
        .map(|r| r.name())
        .collect();
    if resources.is_empty() {
        bail!("no resources match {resolved}");
    }

    // One task per (resource, definition); the provider's semaphore keeps
    // the fan-out bounded at `jobs`.
    let engine = ScoreEngine::new();
    let mut tasks = Vec::new();
    for resource in &resources {
        for definition in &definitions {
            let provider = Arc::clone(&provider);
            let definition = definition.clone();
            let resource = resource.clone();
            tasks.push(tokio::spawn(async move {
                let result = engine
                    .evaluate(provider.as_ref(), &definition, &resource, dry_run)
                    .await;
                (resource, definition.name.clone(), result)
            }));
        }
    }

    let mut failed = 0usize;
    let mut computed = 0usize;
    for task in tasks {
        let (resource, definition, result) = task.await?;
        match result {
            Ok(Some(score)) => {
                computed += 1;
                info!(resource = %resource, score = %score.id, "score updated");
            }
            Ok(None) => info!(resource = %resource, "score already up-to-date"),
            Err(e) => {
                failed += 1;
                warn!(resource = %resource, definition = %definition, error = %e, "scoring failed");
            }
        }
    }

    if !dry_run && computed > 0 {
        provider.inner().save_file(snapshot_path)?;
    }
    if failed > 0 {
        bail!("{failed} score evaluations failed");
    }
    Ok(())
}

async fn export(
    registry: MemoryRegistry,
    name: &str,
    nested: bool,
    output: Option<&Path>,
) -> Result<()> {
    let name = ResourceName::parse(name)?;
    let resource = registry.get(&name, false).await?;
    let api = resource
        .as_api()
        .ok_or_else(|| anyhow!("{name} is not an API"))?;
    let yaml = export_api(&registry, api, nested).await?;
    match output {
        Some(path) => {
            std::fs::write(path, &yaml)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "exported {name}");
        }
        None => print!("{yaml}"),
    }
    Ok(())
}

async fn apply(
    registry: MemoryRegistry,
    snapshot_path: &Path,
    file: &Path,
    parent: &str,
) -> Result<()> {
    let parent: ProjectName = parent.parse()?;
    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    apply_api_patch_bytes(&registry, &bytes, &parent).await?;
    registry.save_file(snapshot_path)?;
    info!(path = %file.display(), "applied document");
    Ok(())
}
