//! Per-capability and per-decision-category counters (spec §3.1), exposed
//! in Prometheus text format the way `controller/metrics.py`'s
//! `MetricsRegistry.to_prometheus()` does.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Router-local counters. A full process-wide metrics registry (replay
/// hit/miss, active-session gauge) is assembled by the HTTP thin view from
/// several such counter sets; this one tracks exactly what the router
/// decides.
#[derive(Default)]
pub struct RouterMetrics {
    calls_total: Mutex<BTreeMap<String, u64>>,
    decisions_total: Mutex<BTreeMap<String, u64>>,
}

impl RouterMetrics {
    /// A fresh, zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one dispatch attempt against `capability` that resolved to
    /// `decision_category` (e.g. `"allow"`, `"schema"`, `"perm"`, `"tool"`).
    pub fn record_decision(&self, capability: &str, decision_category: &str) {
        *self
            .calls_total
            .lock()
            .expect("metrics mutex poisoned")
            .entry(capability.to_string())
            .or_insert(0) += 1;
        *self
            .decisions_total
            .lock()
            .expect("metrics mutex poisoned")
            .entry(decision_category.to_string())
            .or_insert(0) += 1;
    }

    /// Render as Prometheus exposition text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();
        out.push_str("# HELP kernel_capability_calls_total Calls dispatched per capability.\n");
        out.push_str("# TYPE kernel_capability_calls_total counter\n");
        for (capability, count) in self.calls_total.lock().expect("metrics mutex poisoned").iter() {
            out.push_str(&format!(
                "kernel_capability_calls_total{{capability=\"{capability}\"}} {count}\n"
            ));
        }
        out.push_str("# HELP kernel_router_decisions_total Router decisions per category.\n");
        out.push_str("# TYPE kernel_router_decisions_total counter\n");
        for (category, count) in self.decisions_total.lock().expect("metrics mutex poisoned").iter() {
            out.push_str(&format!(
                "kernel_router_decisions_total{{category=\"{category}\"}} {count}\n"
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prometheus_text_includes_recorded_counters() {
        let metrics = RouterMetrics::new();
        metrics.record_decision("read_file", "allow");
        metrics.record_decision("read_file", "allow");
        metrics.record_decision("write_file", "perm");
        let text = metrics.to_prometheus();
        assert!(text.contains("kernel_capability_calls_total{capability=\"read_file\"} 2"));
        assert!(text.contains("kernel_router_decisions_total{category=\"perm\"} 1"));
    }
}
