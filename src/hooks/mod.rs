//! Lifecycle hooks and run statistics.
//!
//! Controllers call the hook points at fixed places in the state machine;
//! hooks observe the step read-only and may append entries to the shared
//! [`Stats`] sink. They must not block and cannot mutate core state.

use crate::step::Step;

/// One recorded observation, keyed for later filtering and sorting.
#[derive(Debug, Clone, PartialEq)]
pub struct StatEntry {
    /// Start time of the slice the entry belongs to.
    pub time: f64,
    pub level: usize,
    pub iter: usize,
    pub kind: String,
    pub value: f64,
}

/// Append-only sink of [`StatEntry`] records.
#[derive(Debug, Default)]
pub struct Stats {
    entries: Vec<StatEntry>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, time: f64, level: usize, iter: usize, kind: &str, value: f64) {
        self.entries.push(StatEntry {
            time,
            level,
            iter,
            kind: kind.to_string(),
            value,
        });
    }

    pub fn entries(&self) -> &[StatEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries matching all given criteria, sorted by time, then iteration,
    /// then level.
    pub fn filter(
        &self,
        kind: Option<&str>,
        level: Option<usize>,
        iter: Option<usize>,
    ) -> Vec<&StatEntry> {
        let mut out: Vec<&StatEntry> = self
            .entries
            .iter()
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .filter(|e| level.is_none_or(|l| e.level == l))
            .filter(|e| iter.is_none_or(|i| e.iter == i))
            .collect();
        out.sort_by(|a, b| {
            a.time
                .partial_cmp(&b.time)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.iter.cmp(&b.iter))
                .then(a.level.cmp(&b.level))
        });
        out
    }
}

/// Observer of the controller lifecycle. All methods default to no-ops so
/// implementations override only the points they care about.
pub trait Hook<V> {
    fn pre_block(&mut self, _step: &Step<V>, _stats: &mut Stats) {}
    fn pre_step(&mut self, _step: &Step<V>, _level: usize, _stats: &mut Stats) {}
    fn pre_iteration(&mut self, _step: &Step<V>, _level: usize, _stats: &mut Stats) {}
    fn post_sweep(&mut self, _step: &Step<V>, _level: usize, _stats: &mut Stats) {}
    fn post_iteration(&mut self, _step: &Step<V>, _level: usize, _stats: &mut Stats) {}
    fn post_step(&mut self, _step: &Step<V>, _level: usize, _stats: &mut Stats) {}
}

/// Default hook: records residuals after every sweep and iteration plus the
/// final iteration count per step.
pub struct StatsHook;

impl<V> Hook<V> for StatsHook {
    fn post_sweep(&mut self, step: &Step<V>, level: usize, stats: &mut Stats) {
        if let Some(res) = step.levels[level].state.residual {
            stats.add(
                step.levels[level].state.time,
                level,
                step.status.iter,
                "residual_post_sweep",
                res,
            );
        }
    }

    fn post_iteration(&mut self, step: &Step<V>, level: usize, stats: &mut Stats) {
        if let Some(res) = step.levels[level].state.residual {
            stats.add(
                step.levels[level].state.time,
                level,
                step.status.iter,
                "residual_post_iteration",
                res,
            );
        }
    }

    fn post_step(&mut self, step: &Step<V>, level: usize, stats: &mut Stats) {
        let time = step.levels[level].state.time;
        stats.add(time, level, step.status.iter, "niter", step.status.iter as f64);
        if let Some(res) = step.levels[level].state.residual {
            stats.add(time, level, step.status.iter, "residual_final", res);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_selects_and_sorts() {
        let mut stats = Stats::new();
        stats.add(0.2, 0, 2, "residual_post_sweep", 1e-3);
        stats.add(0.1, 0, 1, "residual_post_sweep", 1e-2);
        stats.add(0.1, 1, 1, "residual_post_sweep", 5e-2);
        stats.add(0.1, 0, 1, "niter", 4.0);

        let res = stats.filter(Some("residual_post_sweep"), None, None);
        assert_eq!(res.len(), 3);
        assert_eq!(res[0].time, 0.1);
        assert_eq!(res[0].level, 0);
        assert_eq!(res[2].time, 0.2);

        let lvl1 = stats.filter(Some("residual_post_sweep"), Some(1), None);
        assert_eq!(lvl1.len(), 1);
        assert_eq!(lvl1[0].value, 5e-2);

        assert_eq!(stats.filter(Some("niter"), None, None).len(), 1);
    }
}
