//! Freshness decisions for generated artifacts.
//!
//! One predicate serves both call sites: the planner comparing a candidate
//! target against its dependencies, and scoring comparing a score artifact
//! against its definition and source artifacts. The slack is applied on
//! the dependency side so a dependency written in the same second as the
//! target still counts as newer; recomputation is idempotent, so the safe
//! direction is to re-emit.

use chrono::{DateTime, Duration, Utc};

/// Decides whether a target artifact must be regenerated.
#[derive(Debug, Clone, Copy)]
pub struct StalenessOracle {
    slack: Duration,
}

impl Default for StalenessOracle {
    fn default() -> Self {
        Self {
            slack: Duration::seconds(1),
        }
    }
}

impl StalenessOracle {
    /// An oracle with a custom slack window.
    pub fn new(slack: Duration) -> Self {
        Self { slack }
    }

    pub fn slack(&self) -> Duration {
        self.slack
    }

    /// A missing target is always stale; otherwise the target is stale
    /// when any dependency's update time, widened by the slack, passes it.
    pub fn is_stale<I>(&self, target: Option<DateTime<Utc>>, dependencies: I) -> bool
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        match target {
            None => true,
            Some(t) => dependencies.into_iter().any(|d| d + self.slack > t),
        }
    }

    /// Staleness plus the optional refresh interval: a fresh target is
    /// still regenerated once it is older than `refresh`.
    pub fn should_regenerate(
        &self,
        target: Option<DateTime<Utc>>,
        dependencies: &[DateTime<Utc>],
        refresh: Option<Duration>,
    ) -> bool {
        if self.is_stale(target, dependencies.iter().copied()) {
            return true;
        }
        match (target, refresh) {
            (Some(t), Some(interval)) => Utc::now() - t > interval,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn missing_target_is_stale() {
        let oracle = StalenessOracle::default();
        assert!(oracle.is_stale(None, []));
        assert!(oracle.is_stale(None, [at(0)]));
    }

    #[test]
    fn newer_dependency_forces_action() {
        let oracle = StalenessOracle::default();
        assert!(oracle.is_stale(Some(at(10)), [at(5), at(20)]));
        assert!(!oracle.is_stale(Some(at(30)), [at(5), at(20)]));
    }

    #[test]
    fn slack_widens_the_dependency_side() {
        let oracle = StalenessOracle::default();
        // Same second: dependency + 1s > target, so still stale.
        assert!(oracle.is_stale(Some(at(10)), [at(10)]));
        // Strictly older than the slack window: fresh.
        assert!(!oracle.is_stale(Some(at(12)), [at(10)]));

        let wide = StalenessOracle::new(Duration::seconds(5));
        assert!(wide.is_stale(Some(at(12)), [at(10)]));
    }

    #[test]
    fn no_dependencies_means_fresh_once_present() {
        let oracle = StalenessOracle::default();
        assert!(!oracle.is_stale(Some(at(0)), []));
    }

    #[test]
    fn refresh_interval_reemits_old_targets() {
        let oracle = StalenessOracle::default();
        let old = Utc::now() - Duration::seconds(120);
        assert!(oracle.should_regenerate(Some(old), &[], Some(Duration::seconds(60))));
        assert!(!oracle.should_regenerate(Some(old), &[], Some(Duration::seconds(600))));
        assert!(!oracle.should_regenerate(Some(old), &[], None));
    }
}
