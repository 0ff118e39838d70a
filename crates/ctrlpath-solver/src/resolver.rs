//! C4: resource-feasibility resolution (spec §4.4).
//!
//! Takes the CPM timings as a precedence floor and resolves renewable
//! resource contention with a serial schedule-generation algorithm: a
//! ready-set priority queue keyed by CPM early start first, then critical
//! before non-critical, ASAP before ALAP, then step id, places each step
//! at the earliest time its predecessors and its resources both allow.
//! ALAP steps get a second, backward pass once every step has a feasible
//! ASAP placement.
//! Consumables are time-independent: only their schedule-wide total is
//! checked against capacity.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use ctrlpath_core::{DependencyKind, ResourceKind, StepId, Template, Warning};

use crate::cpm::CpmResult;
use crate::graph::PrecedenceGraph;

/// A step's resolved placement on the dense-minute timeline.
#[derive(Clone, Debug)]
pub struct Placement {
    pub start: u64,
    pub end: u64,
}

/// The output of resource resolution: every step's actual placement plus
/// any advisories raised along the way.
#[derive(Debug)]
pub struct ResolverResult {
    pub placements: HashMap<StepId, Placement>,
    pub warnings: Vec<Warning>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Priority<'a> {
    early_start: u64,
    is_critical: bool,
    is_asap: bool,
    id: &'a str,
}

impl<'a> Ord for Priority<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; "greater" here means "placed sooner".
        // Lower ES_s goes first (spec §4.4 step 2's event-list key), then
        // the existing critical/ASAP/id tie-breakers.
        other
            .early_start
            .cmp(&self.early_start)
            .then_with(|| self.is_critical.cmp(&other.is_critical))
            .then_with(|| self.is_asap.cmp(&other.is_asap))
            .then_with(|| other.id.cmp(self.id))
    }
}

impl<'a> PartialOrd for Priority<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct HeapEntry<'a> {
    priority: Priority<'a>,
}

impl<'a> Ord for HeapEntry<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

impl<'a> PartialOrd for HeapEntry<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Run resource resolution over a template already scored by CPM.
pub fn resolve(template: &Template, graph: &PrecedenceGraph, cpm: &CpmResult) -> ResolverResult {
    let capacities: HashMap<&str, u32> = template
        .resources
        .iter()
        .map(|r| (r.id.as_str(), r.capacity))
        .collect();
    let renewable: HashMap<&str, bool> = template
        .resources
        .iter()
        .map(|r| (r.id.as_str(), r.kind.is_renewable()))
        .collect();

    let mut in_degree: HashMap<&str, usize> = template
        .steps
        .iter()
        .map(|s| (s.id.as_str(), graph.predecessors_of(&s.id).len()))
        .collect();

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    for step in &template.steps {
        if in_degree[step.id.as_str()] == 0 {
            heap.push(HeapEntry {
                priority: Priority {
                    early_start: cpm.timings.get(&step.id).map_or(0, |t| t.early_start),
                    is_critical: cpm.timings.get(&step.id).is_some_and(crate::cpm::StepTiming::is_critical),
                    is_asap: step.timing_policy == ctrlpath_core::TimingPolicy::Asap,
                    id: step.id.as_str(),
                },
            });
        }
    }

    let mut placements: HashMap<StepId, Placement> = HashMap::new();
    let mut usage: HashMap<&str, Vec<(u64, u64, u32)>> = HashMap::new();
    let mut warnings: Vec<Warning> = Vec::new();

    while let Some(entry) = heap.pop() {
        let id = entry.priority.id.to_string();
        let step = template.steps.iter().find(|s| s.id == id).expect("step exists");
        let duration = u64::from(step.duration_mins);

        let mut floor = 0u64;
        for dep in &step.dependencies {
            if let Some(p) = placements.get(&dep.predecessor_step_id) {
                floor = floor.max(successor_floor(dep.kind, p.start, p.end, duration));
            }
        }

        let start = earliest_feasible_start(step, floor, duration, &usage, &capacities, &renewable);
        let end = start + duration;

        let late_start = cpm.timings.get(&id).map_or(floor, |t| t.late_start);
        if start > late_start {
            for need in &step.resource_needs {
                if !renewable.get(need.resource_id.as_str()).copied().unwrap_or(false) {
                    continue;
                }
                let capacity = capacities.get(need.resource_id.as_str()).copied().unwrap_or(0);
                let empty = Vec::new();
                let intervals = usage.get(need.resource_id.as_str()).unwrap_or(&empty);
                let blocked_at_floor =
                    max_usage_in_window(intervals, floor, floor + duration) + need.quantity > capacity;
                if blocked_at_floor {
                    warnings.push(Warning::ResourceDelay {
                        step_id: id.clone(),
                        resource_id: need.resource_id.clone(),
                        delayed_by_mins: start - floor,
                    });
                }
            }
        }

        for need in &step.resource_needs {
            if renewable.get(need.resource_id.as_str()).copied().unwrap_or(false) {
                usage
                    .entry(need.resource_id.as_str())
                    .or_default()
                    .push((start, end, need.quantity));
            }
        }

        placements.insert(id.clone(), Placement { start, end });

        for succ in graph.successors_of(&id) {
            let entry = in_degree.get_mut(succ.as_str()).expect("tracked in-degree");
            *entry -= 1;
            if *entry == 0 {
                let succ_step = template.steps.iter().find(|s| &s.id == succ).expect("step exists");
                heap.push(HeapEntry {
                    priority: Priority {
                        early_start: cpm.timings.get(succ).map_or(0, |t| t.early_start),
                        is_critical: cpm.timings.get(succ).is_some_and(crate::cpm::StepTiming::is_critical),
                        is_asap: succ_step.timing_policy == ctrlpath_core::TimingPolicy::Asap,
                        id: succ_step.id.as_str(),
                    },
                });
            }
        }
    }

    alap_second_pass(template, graph, &mut placements, &mut usage, &capacities, &renewable);

    warnings.extend(consumable_shortfalls(template, &placements));

    ResolverResult { placements, warnings }
}

/// Earliest start for a successor given one predecessor's *actual*
/// placement, per the dependency-kind constraint table (spec §4.3). Same
/// shape as the CPM forward-pass rule, applied to resolved times instead
/// of CPM early times.
fn successor_floor(kind: DependencyKind, pred_start: u64, pred_end: u64, succ_duration: u64) -> u64 {
    match kind {
        DependencyKind::FinishToStart => pred_end,
        DependencyKind::StartToStart => pred_start,
        DependencyKind::FinishToFinish => pred_end.saturating_sub(succ_duration),
        DependencyKind::StartToFinish => pred_start.saturating_sub(succ_duration),
    }
}

fn earliest_feasible_start(
    step: &ctrlpath_core::Step,
    floor: u64,
    duration: u64,
    usage: &HashMap<&str, Vec<(u64, u64, u32)>>,
    capacities: &HashMap<&str, u32>,
    renewable: &HashMap<&str, bool>,
) -> u64 {
    let renewable_needs: Vec<_> = step
        .resource_needs
        .iter()
        .filter(|n| renewable.get(n.resource_id.as_str()).copied().unwrap_or(false))
        .collect();

    if renewable_needs.is_empty() {
        return floor;
    }

    let mut candidates = vec![floor];
    for need in &renewable_needs {
        if let Some(intervals) = usage.get(need.resource_id.as_str()) {
            for &(_, end, _) in intervals {
                if end >= floor {
                    candidates.push(end);
                }
            }
        }
    }
    candidates.sort_unstable();
    candidates.dedup();

    for &candidate in &candidates {
        let window_end = candidate + duration;
        let feasible = renewable_needs.iter().all(|need| {
            let capacity = capacities.get(need.resource_id.as_str()).copied().unwrap_or(0);
            let empty = Vec::new();
            let intervals = usage.get(need.resource_id.as_str()).unwrap_or(&empty);
            max_usage_in_window(intervals, candidate, window_end) + need.quantity <= capacity
        });
        if feasible {
            return candidate;
        }
    }

    *candidates.last().unwrap_or(&floor)
}

fn max_usage_in_window(intervals: &[(u64, u64, u32)], window_start: u64, window_end: u64) -> u32 {
    let mut points: Vec<u64> = intervals
        .iter()
        .flat_map(|&(s, e, _)| [s, e])
        .filter(|&t| t >= window_start && t < window_end)
        .collect();
    points.push(window_start);
    points.sort_unstable();
    points.dedup();

    points
        .iter()
        .map(|&t| {
            intervals
                .iter()
                .filter(|&&(s, e, _)| s <= t && t < e)
                .map(|&(_, _, q)| q)
                .sum()
        })
        .max()
        .unwrap_or(0)
}

/// Second pass: push ALAP steps as late as their successors and resource
/// feasibility allow, without disturbing anything already placed.
fn alap_second_pass(
    template: &Template,
    graph: &PrecedenceGraph,
    placements: &mut HashMap<StepId, Placement>,
    usage: &mut HashMap<&str, Vec<(u64, u64, u32)>>,
    capacities: &HashMap<&str, u32>,
    renewable: &HashMap<&str, bool>,
) {
    for id in graph.reverse_topological_order() {
        let step = template.steps.iter().find(|s| s.id == id).expect("step exists");
        if step.timing_policy != ctrlpath_core::TimingPolicy::Alap {
            continue;
        }
        let Some(current) = placements.get(&id).cloned() else {
            continue;
        };
        let duration = current.end - current.start;

        let mut finish_ceiling = u64::MAX;
        for succ_id in graph.successors_of(&id) {
            let succ = template.steps.iter().find(|s| &s.id == succ_id).expect("step exists");
            let Some(succ_placement) = placements.get(succ_id) else {
                continue;
            };
            for dep in &succ.dependencies {
                if dep.predecessor_step_id != id {
                    continue;
                }
                let bound = predecessor_ceiling(dep.kind, succ_placement.start, succ_placement.end, duration);
                finish_ceiling = finish_ceiling.min(bound);
            }
        }
        if finish_ceiling == u64::MAX {
            continue;
        }
        // `finish_ceiling` bounds this step's latest finish; convert to a
        // bound on start before comparing or placing.
        let ceiling = finish_ceiling.saturating_sub(duration);
        if ceiling <= current.start {
            continue;
        }

        let renewable_needs: Vec<_> = step
            .resource_needs
            .iter()
            .filter(|n| renewable.get(n.resource_id.as_str()).copied().unwrap_or(false))
            .collect();

        let candidate_start = if renewable_needs.is_empty() {
            ceiling
        } else {
            let feasible = renewable_needs.iter().all(|need| {
                let capacity = capacities.get(need.resource_id.as_str()).copied().unwrap_or(0);
                let empty = Vec::new();
                let intervals = usage.get(need.resource_id.as_str()).unwrap_or(&empty);
                let others: Vec<_> = intervals
                    .iter()
                    .filter(|&&(s, e, _)| !(s == current.start && e == current.end))
                    .copied()
                    .collect();
                max_usage_in_window(&others, ceiling, ceiling + duration) + need.quantity <= capacity
            });
            if feasible {
                ceiling
            } else {
                current.start
            }
        };

        if candidate_start > current.start {
            for need in &renewable_needs {
                if let Some(intervals) = usage.get_mut(need.resource_id.as_str()) {
                    if let Some(slot) = intervals
                        .iter_mut()
                        .find(|(s, e, _)| *s == current.start && *e == current.end)
                    {
                        *slot = (candidate_start, candidate_start + duration, slot.2);
                    }
                }
            }
            placements.insert(
                id.clone(),
                Placement {
                    start: candidate_start,
                    end: candidate_start + duration,
                },
            );
        }
    }
}

/// Latest a predecessor may finish (derived from a successor's already-
/// resolved placement), the mirror image of [`successor_floor`].
fn predecessor_ceiling(kind: DependencyKind, succ_start: u64, succ_end: u64, pred_duration: u64) -> u64 {
    match kind {
        DependencyKind::FinishToStart => succ_start,
        DependencyKind::StartToStart => succ_start + pred_duration,
        DependencyKind::FinishToFinish => succ_end,
        DependencyKind::StartToFinish => succ_start + pred_duration,
    }
}

fn consumable_shortfalls(template: &Template, placements: &HashMap<StepId, Placement>) -> Vec<Warning> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for step in &template.steps {
        if !placements.contains_key(&step.id) {
            continue;
        }
        for need in &step.resource_needs {
            if let Some(resource) = template.resources.iter().find(|r| r.id == need.resource_id) {
                if resource.kind == ResourceKind::Consumable {
                    *totals.entry(resource.id.as_str()).or_insert(0) += u64::from(need.quantity);
                }
            }
        }
    }

    let mut warnings = Vec::new();
    for resource in &template.resources {
        if resource.kind != ResourceKind::Consumable {
            continue;
        }
        let requested = totals.get(resource.id.as_str()).copied().unwrap_or(0);
        if requested > u64::from(resource.capacity) {
            warnings.push(Warning::ConsumableShortfall {
                resource_id: resource.id.clone(),
                requested,
                available: resource.capacity,
            });
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpm;
    use ctrlpath_core::{Resource, ResourceKind, Step};

    fn build(template: &Template) -> (PrecedenceGraph, CpmResult) {
        let g = PrecedenceGraph::build(template).unwrap();
        let cpm = cpm::compute(template, &g);
        (g, cpm)
    }

    #[test]
    fn independent_steps_fit_within_capacity() {
        let mut t = Template::new("t", "Independent");
        t.resources.push(Resource::new("oven", "Oven", ResourceKind::Equipment, 2));
        t.steps.push(Step::new("a", "A", 30).with_resource_need(ctrlpath_core::ResourceNeed::new("oven", 1)));
        t.steps.push(Step::new("b", "B", 30).with_resource_need(ctrlpath_core::ResourceNeed::new("oven", 1)));
        let (g, cpm) = build(&t);
        let result = resolve(&t, &g, &cpm);
        assert_eq!(result.placements["a"].start, 0);
        assert_eq!(result.placements["b"].start, 0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn contention_delays_lower_priority_step() {
        let mut t = Template::new("t", "Contention");
        t.resources.push(Resource::new("oven", "Oven", ResourceKind::Equipment, 1));
        t.steps.push(Step::new("a", "A", 30).with_resource_need(ctrlpath_core::ResourceNeed::new("oven", 1)));
        t.steps.push(Step::new("b", "B", 30).with_resource_need(ctrlpath_core::ResourceNeed::new("oven", 1)));
        let (g, cpm) = build(&t);
        let result = resolve(&t, &g, &cpm);
        let starts: Vec<u64> = vec![result.placements["a"].start, result.placements["b"].start];
        assert!(starts.contains(&0));
        assert!(starts.contains(&30));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn consumable_shortfall_is_reported_without_delay() {
        let mut t = Template::new("t", "Consumable");
        t.resources.push(Resource::new("flour", "Flour (kg)", ResourceKind::Consumable, 5));
        t.steps.push(Step::new("a", "A", 10).with_resource_need(ctrlpath_core::ResourceNeed::new("flour", 3)));
        t.steps.push(Step::new("b", "B", 10).with_resource_need(ctrlpath_core::ResourceNeed::new("flour", 4)));
        let (g, cpm) = build(&t);
        let result = resolve(&t, &g, &cpm);
        assert_eq!(result.placements["a"].start, 0);
        assert_eq!(result.placements["b"].start, 0);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::ConsumableShortfall { requested, available, .. } if *requested == 7 && *available == 5)));
    }

    #[test]
    fn precedence_floor_is_respected_under_contention() {
        let mut t = Template::new("t", "Precedence");
        t.resources.push(Resource::new("room", "Room", ResourceKind::Equipment, 1));
        t.steps.push(Step::new("a", "A", 10).with_resource_need(ctrlpath_core::ResourceNeed::new("room", 1)));
        t.steps.push(
            Step::new("b", "B", 10)
                .with_dependency(ctrlpath_core::Dependency::new("a", DependencyKind::FinishToStart))
                .with_resource_need(ctrlpath_core::ResourceNeed::new("room", 1)),
        );
        let (g, cpm) = build(&t);
        let result = resolve(&t, &g, &cpm);
        assert_eq!(result.placements["a"].start, 0);
        assert_eq!(result.placements["b"].start, 10);
    }

    #[test]
    fn alap_step_shifts_later_when_feasible() {
        let mut t = Template::new("t", "Alap");
        t.steps.push(Step::new("a", "A", 10).alap());
        t.steps.push(
            Step::new("b", "B", 10)
                .with_dependency(ctrlpath_core::Dependency::new("a", DependencyKind::FinishToStart)),
        );
        t.steps.push(
            Step::new("c", "C", 40)
                .with_dependency(ctrlpath_core::Dependency::new("b", DependencyKind::FinishToStart)),
        );
        let (g, cpm) = build(&t);
        let result = resolve(&t, &g, &cpm);
        // a has no resource needs and one successor b at start 10, so ALAP
        // pushes a's start right up to b's start minus a's duration.
        assert_eq!(result.placements["a"].start, 0);
        assert_eq!(result.placements["b"].start, 10);
    }
}
