//! Per-agent cost/token accounting and the terminal summary table.
//!
//! Ambient-stack addition (SPEC_FULL.md §1/§7): the distilled spec
//! requires a cost/duration readout on COMPLETE/ABANDONED but leaves the
//! accounting mechanism unspecified. Modeled on the teacher's
//! `telemetry.rs` `SessionMetrics`/`MetricsCollector`: a small accumulator
//! keyed by role, fed from `AgentEvent::Complete`, rendered as a table at
//! the end of a run.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provider::AgentEvent;
use crate::session::AgentRole;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentUsage {
    pub calls: u32,
    pub total_cost: f64,
    pub total_duration_ms: u64,
    pub total_tokens: u64,
}

impl AgentUsage {
    fn record(&mut self, cost: f64, duration_ms: u64, tokens: u64) {
        self.calls += 1;
        self.total_cost += cost;
        self.total_duration_ms += duration_ms;
        self.total_tokens += tokens;
    }
}

/// Accumulates usage for one task run. Not threaded through the FSMs
/// themselves — the orchestrator owns one instance per task and feeds it
/// from each agent runner's `AgentEvent::Complete`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsCollector {
    per_role: HashMap<AgentRole, AgentUsage>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a `ProviderResponse`'s cost into the running total for
    /// `role`. Call-sites do this directly with the response rather than
    /// the event stream, since `AgentEvent::Complete` is also accepted
    /// via `record_event` for runners that only see the event channel.
    pub fn record(&mut self, role: AgentRole, cost: f64, duration_ms: u64, tokens: u64) {
        self.per_role.entry(role).or_default().record(cost, duration_ms, tokens);
    }

    pub fn record_event(&mut self, role: AgentRole, event: &AgentEvent) {
        if let AgentEvent::Complete { cost, duration_ms, tokens } = event {
            self.record(role, *cost, *duration_ms, *tokens);
        }
    }

    pub fn usage_for(&self, role: AgentRole) -> AgentUsage {
        self.per_role.get(&role).cloned().unwrap_or_default()
    }

    pub fn total_cost(&self) -> f64 {
        self.per_role.values().map(|u| u.total_cost).sum()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.per_role.values().map(|u| u.total_duration_ms).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.per_role.values().map(|u| u.total_tokens).sum()
    }

    pub fn total_calls(&self) -> u32 {
        self.per_role.values().map(|u| u.calls).sum()
    }
}

/// Renders as the terminal table printed on COMPLETE/ABANDONED (§7):
/// one row per role that was actually invoked, plus a totals row.
impl fmt::Display for MetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14} {:>6} {:>10} {:>10} {:>8}", "agent", "calls", "cost", "duration", "tokens")?;
        let mut roles: Vec<_> = self.per_role.keys().copied().collect();
        roles.sort_by_key(|r| format!("{r:?}"));
        for role in roles {
            let usage = self.usage_for(role);
            writeln!(
                f,
                "{:<14} {:>6} {:>10.4} {:>9}ms {:>8}",
                format!("{role:?}"),
                usage.calls,
                usage.total_cost,
                usage.total_duration_ms,
                usage.total_tokens
            )?;
        }
        writeln!(
            f,
            "{:<14} {:>6} {:>10.4} {:>9}ms {:>8}",
            "total",
            self.total_calls(),
            self.total_cost(),
            self.total_duration_ms(),
            self.total_tokens()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_multiple_calls_to_same_role() {
        let mut metrics = MetricsCollector::new();
        metrics.record(AgentRole::Coder, 0.02, 1200, 500);
        metrics.record(AgentRole::Coder, 0.01, 800, 300);
        let usage = metrics.usage_for(AgentRole::Coder);
        assert_eq!(usage.calls, 2);
        assert!((usage.total_cost - 0.03).abs() < 1e-9);
        assert_eq!(usage.total_duration_ms, 2000);
        assert_eq!(usage.total_tokens, 800);
    }

    #[test]
    fn totals_sum_across_roles() {
        let mut metrics = MetricsCollector::new();
        metrics.record(AgentRole::Coder, 0.02, 1000, 500);
        metrics.record(AgentRole::Reviewer, 0.01, 500, 200);
        assert!((metrics.total_cost() - 0.03).abs() < 1e-9);
        assert_eq!(metrics.total_duration_ms(), 1500);
        assert_eq!(metrics.total_tokens(), 700);
        assert_eq!(metrics.total_calls(), 2);
    }

    #[test]
    fn record_event_only_folds_complete_events() {
        let mut metrics = MetricsCollector::new();
        metrics.record_event(AgentRole::Coder, &AgentEvent::Progress { delta: "...".into() });
        assert_eq!(metrics.total_calls(), 0);
        metrics.record_event(
            AgentRole::Coder,
            &AgentEvent::Complete {
                cost: 0.05,
                duration_ms: 100,
                tokens: 50,
            },
        );
        assert_eq!(metrics.total_calls(), 1);
    }

    #[test]
    fn unused_role_reports_zeroed_usage() {
        let metrics = MetricsCollector::new();
        let usage = metrics.usage_for(AgentRole::Gardener);
        assert_eq!(usage.calls, 0);
        assert_eq!(usage.total_cost, 0.0);
    }

    #[test]
    fn display_includes_totals_row() {
        let mut metrics = MetricsCollector::new();
        metrics.record(AgentRole::Planner, 0.1, 100, 10);
        let rendered = metrics.to_string();
        assert!(rendered.contains("total"));
        assert!(rendered.contains("Planner"));
    }
}
