// RpaDeck — Run and probe metrics.
//
// In-process counters for step and workflow dispatches and for the session
// monitor's probes. Exposes a simple report API.

use crate::workflow::StepType;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Which monitor loop a probe outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Health,
    Stream,
    Screenshot,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Health => "health",
            ProbeKind::Stream => "stream",
            ProbeKind::Screenshot => "screenshot",
        }
    }
}

/// Shared metrics collector; clones share the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<RwLock<MetricsInner>>,
    start_time: Instant,
}

#[derive(Default)]
struct MetricsInner {
    /// Single-step dispatches per step type.
    step_runs: HashMap<StepType, u64>,
    /// Failed single-step dispatches per step type.
    step_failures: HashMap<StepType, u64>,
    workflow_runs: u64,
    workflow_failures: u64,
    /// Steps sent as part of workflow runs.
    workflow_steps: u64,
    /// Cumulative time spent waiting on run requests.
    run_total_ms: u64,
    probe_ok: HashMap<ProbeKind, u64>,
    probe_failed: HashMap<ProbeKind, u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner::default())),
            start_time: Instant::now(),
        }
    }

    /// Record a single-step dispatch.
    pub async fn record_step_run(&self, kind: StepType, success: bool, duration: Duration) {
        let mut m = self.inner.write().await;
        *m.step_runs.entry(kind).or_insert(0) += 1;
        if !success {
            *m.step_failures.entry(kind).or_insert(0) += 1;
        }
        m.run_total_ms += duration.as_millis() as u64;
    }

    /// Record a whole-workflow dispatch.
    pub async fn record_workflow_run(&self, steps: usize, success: bool, duration: Duration) {
        let mut m = self.inner.write().await;
        m.workflow_runs += 1;
        m.workflow_steps += steps as u64;
        if !success {
            m.workflow_failures += 1;
        }
        m.run_total_ms += duration.as_millis() as u64;
    }

    pub async fn record_probe(&self, kind: ProbeKind, ok: bool) {
        let mut m = self.inner.write().await;
        let counter = if ok {
            &mut m.probe_ok
        } else {
            &mut m.probe_failed
        };
        *counter.entry(kind).or_insert(0) += 1;
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub async fn report(&self) -> MetricsReport {
        let m = self.inner.read().await;

        let step_runs: u64 = m.step_runs.values().sum();
        let step_failures: u64 = m.step_failures.values().sum();
        let total_runs = step_runs + m.workflow_runs;
        let avg_run_ms = if total_runs > 0 {
            m.run_total_ms / total_runs
        } else {
            0
        };

        let mut step_stats: Vec<StepStat> = m
            .step_runs
            .iter()
            .map(|(kind, &runs)| StepStat {
                kind: *kind,
                runs,
                failures: m.step_failures.get(kind).copied().unwrap_or(0),
            })
            .collect();
        step_stats.sort_by(|a, b| b.runs.cmp(&a.runs).then(a.kind.as_str().cmp(b.kind.as_str())));

        let probes = [ProbeKind::Health, ProbeKind::Stream, ProbeKind::Screenshot]
            .into_iter()
            .filter_map(|kind| {
                let ok = m.probe_ok.get(&kind).copied().unwrap_or(0);
                let failed = m.probe_failed.get(&kind).copied().unwrap_or(0);
                (ok + failed > 0).then_some(ProbeStat { kind, ok, failed })
            })
            .collect();

        MetricsReport {
            uptime_secs: self.uptime().as_secs(),
            step_runs,
            step_failures,
            workflow_runs: m.workflow_runs,
            workflow_failures: m.workflow_failures,
            workflow_steps: m.workflow_steps,
            avg_run_ms,
            step_stats,
            probes,
        }
    }

    /// Format report as a displayable string.
    pub async fn format_report(&self) -> String {
        let r = self.report().await;
        let mut out = String::new();

        let hours = r.uptime_secs / 3600;
        let mins = (r.uptime_secs % 3600) / 60;
        let secs = r.uptime_secs % 60;

        out.push_str(&format!(
            "═══ RpaDeck Metrics ═══\n\
             Uptime:        {:02}:{:02}:{:02}\n\
             Step Runs:     {} ({} failed)\n\
             Workflow Runs: {} ({} failed, {} steps)\n\
             Avg Latency:   {}ms\n",
            hours,
            mins,
            secs,
            r.step_runs,
            r.step_failures,
            r.workflow_runs,
            r.workflow_failures,
            r.workflow_steps,
            r.avg_run_ms,
        ));

        if !r.step_stats.is_empty() {
            out.push_str("\n─── Steps ───\n");
            for s in &r.step_stats {
                out.push_str(&format!(
                    "  {:<12} {:>4} runs  {:>3} failed\n",
                    s.kind.as_str(),
                    s.runs,
                    s.failures
                ));
            }
        }

        if !r.probes.is_empty() {
            out.push_str("\n─── Probes ───\n");
            for p in &r.probes {
                out.push_str(&format!(
                    "  {:<12} {:>5} ok  {:>5} failed\n",
                    p.kind.as_str(),
                    p.ok,
                    p.failed
                ));
            }
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub uptime_secs: u64,
    pub step_runs: u64,
    pub step_failures: u64,
    pub workflow_runs: u64,
    pub workflow_failures: u64,
    pub workflow_steps: u64,
    pub avg_run_ms: u64,
    pub step_stats: Vec<StepStat>,
    pub probes: Vec<ProbeStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepStat {
    pub kind: StepType,
    pub runs: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeStat {
    pub kind: ProbeKind,
    pub ok: u64,
    pub failed: u64,
}
