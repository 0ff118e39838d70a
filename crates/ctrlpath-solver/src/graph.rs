//! C2: the precedence graph built from a validated template's steps.
//!
//! Builds adjacency lists keyed by step id and exposes a topological order
//! via Kahn's algorithm, detecting cycles along the way.

use std::collections::{HashMap, VecDeque};

use ctrlpath_core::{StepId, Template};

/// The precedence graph over a template's steps.
///
/// Edges point from predecessor to successor, matching the direction a
/// forward pass walks.
#[derive(Debug)]
pub struct PrecedenceGraph {
    order: Vec<StepId>,
    successors: HashMap<StepId, Vec<StepId>>,
    predecessors: HashMap<StepId, Vec<StepId>>,
}

impl PrecedenceGraph {
    /// Build the graph and compute a topological order.
    ///
    /// Returns the ids forming a cycle (closed walk, first id repeated at
    /// the end) if the template's dependencies are not acyclic.
    pub fn build(template: &Template) -> Result<Self, Vec<StepId>> {
        let mut successors: HashMap<StepId, Vec<StepId>> = HashMap::new();
        let mut predecessors: HashMap<StepId, Vec<StepId>> = HashMap::new();
        let mut in_degree: HashMap<StepId, usize> = HashMap::new();

        for step in &template.steps {
            successors.entry(step.id.clone()).or_default();
            predecessors.entry(step.id.clone()).or_default();
            in_degree.entry(step.id.clone()).or_insert(0);
        }

        for step in &template.steps {
            for dep in &step.dependencies {
                successors
                    .entry(dep.predecessor_step_id.clone())
                    .or_default()
                    .push(step.id.clone());
                predecessors
                    .entry(step.id.clone())
                    .or_default()
                    .push(dep.predecessor_step_id.clone());
                *in_degree.entry(step.id.clone()).or_insert(0) += 1;
            }
        }

        // Deterministic seed order: declaration order in the template.
        let mut queue: VecDeque<StepId> = VecDeque::new();
        for step in &template.steps {
            if in_degree.get(&step.id).copied().unwrap_or(0) == 0 {
                queue.push_back(step.id.clone());
            }
        }

        let mut order = Vec::with_capacity(template.steps.len());
        let mut remaining = in_degree.clone();
        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            if let Some(succs) = successors.get(&id) {
                for succ in succs {
                    let entry = remaining.get_mut(succ).expect("successor must be tracked");
                    *entry -= 1;
                    if *entry == 0 {
                        queue.push_back(succ.clone());
                    }
                }
            }
        }

        if order.len() != template.steps.len() {
            return Err(find_cycle(template, &order));
        }

        Ok(Self {
            order,
            successors,
            predecessors,
        })
    }

    /// Steps in a topological order (every predecessor appears before its
    /// successors).
    pub fn topological_order(&self) -> &[StepId] {
        &self.order
    }

    /// Steps in reverse topological order, used by the ALAP second pass
    /// and the backward CPM pass.
    pub fn reverse_topological_order(&self) -> Vec<StepId> {
        self.order.iter().rev().cloned().collect()
    }

    pub fn successors_of(&self, id: &str) -> &[StepId] {
        self.successors.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn predecessors_of(&self, id: &str) -> &[StepId] {
        self.predecessors.get(id).map_or(&[], Vec::as_slice)
    }
}

/// Walk the subgraph not covered by the partial topological order to
/// produce a concrete cycle for the error message.
fn find_cycle(template: &Template, partial_order: &[StepId]) -> Vec<StepId> {
    use std::collections::HashSet;

    let resolved: HashSet<&str> = partial_order.iter().map(String::as_str).collect();
    let mut remaining: Vec<&str> = template
        .steps
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| !resolved.contains(id))
        .collect();
    remaining.sort_unstable();

    let Some(&start) = remaining.first() else {
        return Vec::new();
    };

    let preds_of = |id: &str| -> Vec<&str> {
        template
            .steps
            .iter()
            .find(|s| s.id == id)
            .map(|s| {
                s.dependencies
                    .iter()
                    .map(|d| d.predecessor_step_id.as_str())
                    .filter(|p| !resolved.contains(p))
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        let preds = preds_of(current);
        let Some(&next) = preds.first() else {
            break;
        };
        if let Some(cycle_start) = path.iter().position(|&id| id == next) {
            let mut cycle: Vec<StepId> = path[cycle_start..].iter().map(|s| (*s).to_string()).collect();
            cycle.push(next.to_string());
            return cycle;
        }
        path.push(next);
        current = next;
    }

    path.iter().map(|s| (*s).to_string()).collect()
}
