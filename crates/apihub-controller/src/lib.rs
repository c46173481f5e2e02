//! apihub-controller
//!
//! The declarative controller for the API hub registry: a pattern engine
//! that expands wildcard and `$resource` reference patterns, an action
//! planner that turns a manifest into the minimal deterministic work list,
//! a staleness oracle shared by planning and scoring, a scoring engine,
//! and the declarative patch surface (YAML export/apply).

pub mod error;
pub mod manifest;
pub mod patch;
pub mod patterns;
pub mod planner;
pub mod score;
pub mod staleness;

pub use error::{ControllerError, ControllerResult};
pub use manifest::{Dependency, GeneratedResource, Manifest};
pub use patch::{apply_api_patch_bytes, export_api};
pub use planner::{Action, EntryFailure, PlanOutcome, Planner};
pub use score::{fetch_score_definitions, Score, ScoreDefinition, ScoreEngine};
pub use staleness::StalenessOracle;
