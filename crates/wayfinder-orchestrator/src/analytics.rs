use crate::types::{AnalyticsRecord, RoutePerformance, RoutingAnalytics, PRIOR_SUCCESS_RATE};
use std::collections::VecDeque;
use uuid::Uuid;
use wayfinder_core::CapabilityTable;

/// Selection counters plus a bounded log of applied outcomes.
#[derive(Debug, Clone)]
pub struct AnalyticsLog {
    records: VecDeque<AnalyticsRecord>,
    capacity: usize,
    total_selections: u64,
    exploration_selections: u64,
    total_executions: u64,
}

impl AnalyticsLog {
    /// Create a log keeping the last `capacity` outcomes.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total_selections: 0,
            exploration_selections: 0,
            total_executions: 0,
        }
    }

    /// Count a selection, flagging exploratory picks.
    pub fn record_selection(&mut self, exploration: bool) {
        self.total_selections += 1;
        if exploration {
            self.exploration_selections += 1;
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn record_execution(&mut self, record: AnalyticsRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        self.total_executions += 1;
    }

    /// Whether an outcome for this selection is still in the log.
    pub fn contains(&self, selection_id: Uuid) -> bool {
        self.records.iter().any(|r| r.selection_id == selection_id)
    }

    /// Number of outcomes currently kept.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no outcome has been logged yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Share of selections that were exploratory.
    pub fn exploration_rate(&self) -> f64 {
        if self.total_selections == 0 {
            0.0
        } else {
            self.exploration_selections as f64 / self.total_selections as f64
        }
    }

    /// Build the dashboard summary for the given route table.
    pub fn summarize(&self, routes: &CapabilityTable<RoutePerformance>) -> RoutingAnalytics {
        RoutingAnalytics {
            routes: routes.clone(),
            exploration_rate: self.exploration_rate(),
            total_selections: self.total_selections,
            total_executions: self.total_executions,
            aggregate_utility: aggregate_utility(routes),
        }
    }
}

/// Sample-weighted mean success rate across capabilities.
fn aggregate_utility(routes: &CapabilityTable<RoutePerformance>) -> f64 {
    let (weighted, samples) = routes
        .iter()
        .fold((0.0, 0u64), |(weighted, samples), (_, perf)| {
            (
                weighted + perf.success_rate * perf.sample_count as f64,
                samples + perf.sample_count,
            )
        });
    if samples == 0 {
        PRIOR_SUCCESS_RATE
    } else {
        weighted / samples as f64
    }
}

impl RoutingAnalytics {
    /// Serialize for a dashboard, with per-capability rows.
    pub fn to_json(&self) -> serde_json::Value {
        let routes: Vec<serde_json::Value> = self
            .routes
            .iter()
            .map(|(capability, perf)| {
                serde_json::json!({
                    "capability": capability,
                    "success_rate": perf.success_rate,
                    "avg_tokens": perf.avg_tokens,
                    "avg_latency_ms": perf.avg_latency_ms,
                    "sample_count": perf.sample_count,
                    "last_updated": perf.last_updated,
                })
            })
            .collect();
        serde_json::json!({
            "routes": routes,
            "exploration_rate": self.exploration_rate,
            "total_selections": self.total_selections,
            "total_executions": self.total_executions,
            "aggregate_utility": self.aggregate_utility,
        })
    }
}
