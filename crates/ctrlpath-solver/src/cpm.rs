//! C3: the critical path method engine.
//!
//! Runs a forward pass (earliest start/finish) and a backward pass (latest
//! start/finish) over the precedence graph, producing total float and the
//! critical path. Durations and offsets are dense integer minutes from an
//! arbitrary zero point; no calendar or working-hours model applies.

use std::collections::HashMap;

use ctrlpath_core::{DependencyKind, StepId, Template};

use crate::graph::PrecedenceGraph;

/// Forward/backward timing for a single step, before resource resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepTiming {
    pub early_start: u64,
    pub early_finish: u64,
    pub late_start: u64,
    pub late_finish: u64,
}

impl StepTiming {
    pub fn total_float(&self) -> u64 {
        self.late_start.saturating_sub(self.early_start)
    }

    pub fn is_critical(&self) -> bool {
        self.total_float() == 0
    }
}

/// The result of running CPM over a template's precedence graph.
#[derive(Debug)]
pub struct CpmResult {
    pub timings: HashMap<StepId, StepTiming>,
    pub makespan: u64,
    pub critical_path: Vec<StepId>,
}

/// Run the forward and backward passes.
pub fn compute(template: &Template, graph: &PrecedenceGraph) -> CpmResult {
    let duration = |id: &str| -> u64 {
        template
            .steps
            .iter()
            .find(|s| s.id == id)
            .map_or(0, |s| u64::from(s.duration_mins))
    };

    let mut early_start: HashMap<StepId, u64> = HashMap::new();
    let mut early_finish: HashMap<StepId, u64> = HashMap::new();

    for id in graph.topological_order() {
        let step = template.steps.iter().find(|s| &s.id == id).expect("step in graph");
        let mut es = 0u64;
        for dep in &step.dependencies {
            let pred_es = *early_start.get(&dep.predecessor_step_id).unwrap_or(&0);
            let pred_ef = *early_finish.get(&dep.predecessor_step_id).unwrap_or(&0);
            let succ_duration = duration(id);
            let candidate = successor_earliest_start(dep.kind, pred_es, pred_ef, succ_duration);
            es = es.max(candidate);
        }
        let ef = es + duration(id);
        early_start.insert(id.clone(), es);
        early_finish.insert(id.clone(), ef);
    }

    let makespan = early_finish.values().copied().max().unwrap_or(0);

    // Build a reverse adjacency of (successor, dependency) pairs per predecessor.
    let mut successor_deps: HashMap<StepId, Vec<(StepId, DependencyKind)>> = HashMap::new();
    for step in &template.steps {
        for dep in &step.dependencies {
            successor_deps
                .entry(dep.predecessor_step_id.clone())
                .or_default()
                .push((step.id.clone(), dep.kind));
        }
    }

    let mut late_start: HashMap<StepId, u64> = HashMap::new();
    let mut late_finish: HashMap<StepId, u64> = HashMap::new();

    for id in graph.reverse_topological_order() {
        let pred_duration = duration(&id);
        let succs = successor_deps.get(&id);
        let lf = match succs {
            None => makespan,
            Some(succs) if succs.is_empty() => makespan,
            Some(succs) => succs
                .iter()
                .map(|(succ_id, kind)| {
                    let succ_ls = *late_start.get(succ_id).unwrap_or(&makespan);
                    let succ_lf = *late_finish.get(succ_id).unwrap_or(&makespan);
                    predecessor_latest_finish(*kind, succ_ls, succ_lf, pred_duration)
                })
                .min()
                .unwrap_or(makespan),
        };
        let ls = lf.saturating_sub(pred_duration);
        late_finish.insert(id.clone(), lf);
        late_start.insert(id.clone(), ls);
    }

    let mut timings = HashMap::new();
    let mut critical_path = Vec::new();
    for id in graph.topological_order() {
        let timing = StepTiming {
            early_start: *early_start.get(id).unwrap_or(&0),
            early_finish: *early_finish.get(id).unwrap_or(&0),
            late_start: *late_start.get(id).unwrap_or(&0),
            late_finish: *late_finish.get(id).unwrap_or(&0),
        };
        if timing.is_critical() {
            critical_path.push(id.clone());
        }
        timings.insert(id.clone(), timing);
    }

    CpmResult {
        timings,
        makespan,
        critical_path,
    }
}

/// Earliest feasible start for a successor given one predecessor edge,
/// per the dependency-kind constraint table (spec §4.3).
fn successor_earliest_start(kind: DependencyKind, pred_es: u64, pred_ef: u64, succ_duration: u64) -> u64 {
    match kind {
        DependencyKind::FinishToStart => pred_ef,
        DependencyKind::StartToStart => pred_es,
        DependencyKind::FinishToFinish => pred_ef.saturating_sub(succ_duration),
        DependencyKind::StartToFinish => pred_es.saturating_sub(succ_duration),
    }
}

/// Latest feasible finish for a predecessor given one successor edge.
///
/// SF's bound, `LF_p ≤ LF_t − dur_t + dur_p` (spec §4.3), reduces to
/// `LS_t + dur_p` since `LF_t − dur_t == LS_t` by definition.
fn predecessor_latest_finish(kind: DependencyKind, succ_ls: u64, succ_lf: u64, pred_duration: u64) -> u64 {
    match kind {
        DependencyKind::FinishToStart => succ_ls,
        DependencyKind::StartToStart => succ_ls + pred_duration,
        DependencyKind::FinishToFinish => succ_lf,
        DependencyKind::StartToFinish => succ_ls + pred_duration,
    }
}
