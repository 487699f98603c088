use crate::executor::task_result::RunResults;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Per-host counters for the whole run. Hosts that land in `failures` or
/// `dark` are excluded from every subsequent dispatch but stay in the
/// final summary.
#[derive(Debug, Default)]
pub struct AggregateStats {
    processed: IndexSet<String>,
    ok: IndexMap<String, u32>,
    changed: IndexMap<String, u32>,
    failures: IndexMap<String, u32>,
    dark: IndexMap<String, u32>,
    skipped: IndexMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostSummary {
    pub ok: u32,
    pub changed: u32,
    pub failures: u32,
    pub unreachable: u32,
    pub skipped: u32,
}

fn increment(counters: &mut IndexMap<String, u32>, host: &str) {
    *counters.entry(host.to_string()).or_insert(0) += 1;
}

fn count(counters: &IndexMap<String, u32>, host: &str) -> u32 {
    counters.get(host).copied().unwrap_or(0)
}

impl AggregateStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one dispatch's results into the counters. Setup-phase folds
    /// record failures and dark hosts but do not count ok/changed.
    pub fn compute(&mut self, results: &RunResults, setup: bool) {
        for (host, result) in &results.contacted {
            self.processed.insert(host.clone());

            if result.is_failure() {
                increment(&mut self.failures, host);
            } else if setup {
                // reachability only; the setup pass is not a task
            } else if result.skipped {
                increment(&mut self.skipped, host);
            } else {
                increment(&mut self.ok, host);
                if result.changed {
                    increment(&mut self.changed, host);
                }
            }
        }

        for host in results.dark.keys() {
            self.processed.insert(host.clone());
            increment(&mut self.dark, host);
        }
    }

    pub fn has_failed(&self, host: &str) -> bool {
        self.failures.contains_key(host)
    }

    pub fn is_dark(&self, host: &str) -> bool {
        self.dark.contains_key(host)
    }

    /// Whether the host must be left out of subsequent dispatches.
    pub fn is_excluded(&self, host: &str) -> bool {
        self.has_failed(host) || self.is_dark(host)
    }

    /// Every host that has ever appeared in a result, in first-seen order.
    pub fn processed_hosts(&self) -> Vec<String> {
        self.processed.iter().cloned().collect()
    }

    pub fn summarize(&self, host: &str) -> HostSummary {
        HostSummary {
            ok: count(&self.ok, host),
            changed: count(&self.changed, host),
            failures: count(&self.failures, host),
            unreachable: count(&self.dark, host),
            skipped: count(&self.skipped, host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::task_result::TaskResult;
    use serde_json::{json, Value};

    fn results(contacted: &[(&str, Value)], dark: &[&str]) -> RunResults {
        let mut results = RunResults::default();
        for (host, value) in contacted {
            results
                .contacted
                .insert(host.to_string(), TaskResult::from_value(value));
        }
        for host in dark {
            results
                .dark
                .insert(host.to_string(), TaskResult::dark("unreachable".to_string()));
        }
        results
    }

    #[test]
    fn ok_changed_and_failures_are_tallied() {
        let mut stats = AggregateStats::new();
        stats.compute(
            &results(
                &[
                    ("h1", json!({"changed": true})),
                    ("h2", json!({"failed": 1})),
                    ("h3", json!({})),
                ],
                &["h4"],
            ),
            false,
        );

        assert_eq!(stats.summarize("h1").ok, 1);
        assert_eq!(stats.summarize("h1").changed, 1);
        assert_eq!(stats.summarize("h2").failures, 1);
        assert_eq!(stats.summarize("h3").ok, 1);
        assert_eq!(stats.summarize("h4").unreachable, 1);
        assert_eq!(stats.processed_hosts().len(), 4);
    }

    #[test]
    fn setup_folds_do_not_count_ok() {
        let mut stats = AggregateStats::new();
        stats.compute(
            &results(&[("h1", json!({"changed": true})), ("h2", json!({"failed": 1}))], &[]),
            true,
        );

        assert_eq!(stats.summarize("h1"), HostSummary::default());
        assert_eq!(stats.summarize("h2").failures, 1);
        assert!(stats.is_excluded("h2"));
        assert!(!stats.is_excluded("h1"));
    }

    #[test]
    fn exclusion_covers_failed_and_dark() {
        let mut stats = AggregateStats::new();
        stats.compute(&results(&[("h1", json!({"failed": 1}))], &["h2"]), false);

        assert!(stats.has_failed("h1"));
        assert!(stats.is_dark("h2"));
        assert!(stats.is_excluded("h1"));
        assert!(stats.is_excluded("h2"));
        assert!(!stats.is_excluded("h3"));
    }

    #[test]
    fn counters_accumulate_across_folds() {
        let mut stats = AggregateStats::new();
        for _ in 0..3 {
            stats.compute(&results(&[("h1", json!({}))], &[]), false);
        }
        assert_eq!(stats.summarize("h1").ok, 3);
    }
}
