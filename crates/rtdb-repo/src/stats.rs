use std::collections::BTreeMap;
use std::io::IsTerminal;

/// Cumulative counters for `statsIncrementCounter` / `stats` (`spec.md`
/// §4.H.9). The remote reporting side of this is out of scope — this is
/// just the local bookkeeping `stats()` reads from.
#[derive(Default, Debug, Clone)]
pub struct StatsCollector {
    cumulative: BTreeMap<String, i64>,
    last_shown: BTreeMap<String, i64>,
}

impl StatsCollector {
    /// Bump `metric` by one.
    pub fn increment(&mut self, metric: &str) {
        *self.cumulative.entry(metric.to_string()).or_insert(0) += 1;
    }

    /// The cumulative snapshot, or the delta since the last `showDelta`
    /// call if `show_delta` is true.
    fn snapshot(&mut self, show_delta: bool) -> BTreeMap<String, i64> {
        if !show_delta {
            return self.cumulative.clone();
        }
        let delta = self
            .cumulative
            .iter()
            .map(|(k, v)| (k.clone(), v - self.last_shown.get(k).copied().unwrap_or(0)))
            .collect();
        self.last_shown = self.cumulative.clone();
        delta
    }

    /// Print an aligned `name value` table to stdout — silent if nothing
    /// has been recorded, or stdout isn't a terminal (`spec.md` §4.H.9,
    /// "silent if no console present").
    pub fn print_stats(&mut self, show_delta: bool) {
        if !std::io::stdout().is_terminal() {
            return;
        }
        let snapshot = self.snapshot(show_delta);
        if snapshot.is_empty() {
            return;
        }
        let width = snapshot.keys().map(|k| k.len()).max().unwrap_or(0) + 2;
        for (name, value) in &snapshot {
            println!("{name:<width$}{value}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_snapshot_accumulates() {
        let mut s = StatsCollector::default();
        s.increment("listens");
        s.increment("listens");
        s.increment("writes");
        assert_eq!(s.snapshot(false).get("listens"), Some(&2));
        assert_eq!(s.snapshot(false).get("writes"), Some(&1));
    }

    #[test]
    fn delta_snapshot_only_shows_change_since_last_call() {
        let mut s = StatsCollector::default();
        s.increment("writes");
        assert_eq!(s.snapshot(true).get("writes"), Some(&1));
        s.increment("writes");
        assert_eq!(s.snapshot(true).get("writes"), Some(&1));
        assert_eq!(s.snapshot(true).get("writes"), Some(&0));
    }
}
