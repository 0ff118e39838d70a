//! C6: pre-solve diagnostics (spec §6 `validate`).
//!
//! Runs C1 and C2 but stops short of C4/C5 — no resource resolution, no
//! anchoring — and reports advisories a caller can act on before
//! attempting a full solve.

use std::collections::{HashMap, HashSet};

use ctrlpath_core::{DependencyKind, Template, TemplateError, ValidationResult};

use crate::cpm;
use crate::graph::PrecedenceGraph;

const HIGH_UTILIZATION_THRESHOLD_PCT: u32 = 80;

/// Run schema/referential-integrity validation plus the advisory checks
/// available without resolving resource contention.
pub fn validate(template: &Template) -> ValidationResult {
    let mut result = ValidationResult::default();

    let validated = match template.validate() {
        Ok(v) => v,
        Err(errors) => {
            result.errors = errors.iter().map(TemplateError::to_string).collect();
            return result;
        }
    };
    let template = validated.template();

    let graph = match PrecedenceGraph::build(template) {
        Ok(g) => g,
        Err(cycle) => {
            result
                .errors
                .push(format!("precedence cycle detected: {cycle:?}"));
            return result;
        }
    };

    let cpm_result = cpm::compute(template, &graph);

    result.warnings.extend(
        unreferenced_resources(template)
            .into_iter()
            .map(|w| w.to_message()),
    );
    result.warnings.extend(
        unreferenced_tracks(template)
            .into_iter()
            .map(|w| w.to_message()),
    );
    result.warnings.extend(
        high_utilization_warnings(template, &cpm_result)
            .into_iter()
            .map(|w| w.to_message()),
    );
    result.warnings.extend(
        impossible_before_delay_warnings(template)
            .into_iter()
            .map(|w| w.to_message()),
    );

    result
}

fn unreferenced_resources(template: &Template) -> Vec<ctrlpath_core::Warning> {
    let referenced: HashSet<&str> = template
        .steps
        .iter()
        .flat_map(|s| s.resource_needs.iter().map(|n| n.resource_id.as_str()))
        .collect();

    template
        .resources
        .iter()
        .filter(|r| !referenced.contains(r.id.as_str()))
        .map(|r| ctrlpath_core::Warning::UnreferencedResource {
            resource_id: r.id.clone(),
        })
        .collect()
}

fn unreferenced_tracks(template: &Template) -> Vec<ctrlpath_core::Warning> {
    let referenced: HashSet<&str> = template
        .steps
        .iter()
        .filter_map(|s| s.track_id.as_deref())
        .collect();

    template
        .tracks
        .iter()
        .filter(|t| !referenced.contains(t.id.as_str()))
        .map(|t| ctrlpath_core::Warning::UnreferencedTrack {
            track_id: t.id.clone(),
        })
        .collect()
}

/// Peak concurrent demand on each renewable resource, computed
/// optimistically from CPM early-start/early-finish windows (ignoring
/// contention, since C4 has not run yet).
fn high_utilization_warnings(template: &Template, cpm_result: &cpm::CpmResult) -> Vec<ctrlpath_core::Warning> {
    let mut events: HashMap<&str, Vec<(u64, i64)>> = HashMap::new();

    for step in &template.steps {
        let Some(timing) = cpm_result.timings.get(&step.id) else {
            continue;
        };
        for need in &step.resource_needs {
            let Some(resource) = template.resources.iter().find(|r| r.id == need.resource_id) else {
                continue;
            };
            if !resource.kind.is_renewable() {
                continue;
            }
            let bucket = events.entry(resource.id.as_str()).or_default();
            bucket.push((timing.early_start, i64::from(need.quantity)));
            bucket.push((timing.early_finish, -i64::from(need.quantity)));
        }
    }

    let mut warnings = Vec::new();
    for resource in &template.resources {
        if !resource.kind.is_renewable() || resource.capacity == 0 {
            continue;
        }
        let Some(bucket) = events.get(resource.id.as_str()) else {
            continue;
        };
        let mut sorted = bucket.clone();
        sorted.sort_unstable_by_key(|(t, _)| *t);
        let mut running = 0i64;
        let mut peak = 0i64;
        for (_, delta) in sorted {
            running += delta;
            peak = peak.max(running);
        }
        let peak_pct = (peak.max(0) as u64 * 100) / u64::from(resource.capacity);
        if peak_pct >= u64::from(HIGH_UTILIZATION_THRESHOLD_PCT) {
            warnings.push(ctrlpath_core::Warning::HighUtilization {
                resource_id: resource.id.clone(),
                peak_utilization_pct: peak_pct.min(100) as u32,
            });
        }
    }
    warnings
}

/// Flag dependency edges whose constraint, taken literally, would require
/// a step to start or finish before the template's time-zero origin.
fn impossible_before_delay_warnings(template: &Template) -> Vec<ctrlpath_core::Warning> {
    let mut warnings = Vec::new();
    for step in &template.steps {
        for dep in &step.dependencies {
            let Some(pred) = template.steps.iter().find(|s| s.id == dep.predecessor_step_id) else {
                continue;
            };
            let succ_duration = i64::from(step.duration_mins);
            let unclamped = match dep.kind {
                DependencyKind::FinishToFinish | DependencyKind::StartToFinish => {
                    let pred_anchor = i64::from(pred.duration_mins);
                    pred_anchor - succ_duration
                }
                DependencyKind::FinishToStart | DependencyKind::StartToStart => 0,
            };
            if unclamped < 0 {
                warnings.push(ctrlpath_core::Warning::ImpossibleBeforeDelay {
                    step_id: step.id.clone(),
                    predecessor_step_id: pred.id.clone(),
                });
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlpath_core::{Dependency, Resource, ResourceKind, ResourceNeed, Step, Track};

    #[test]
    fn unreferenced_resource_is_flagged() {
        let mut t = Template::new("t", "Unused");
        t.resources.push(Resource::new("ladder", "Ladder", ResourceKind::Equipment, 1));
        t.steps.push(Step::new("a", "A", 10));
        let result = validate(&t);
        assert!(result.warnings.iter().any(|w| w.contains("ladder")));
    }

    #[test]
    fn unreferenced_track_is_flagged() {
        let mut t = Template::new("t", "Unused track");
        t.tracks.push(Track {
            id: "kitchen".into(),
            name: "Kitchen".into(),
        });
        t.steps.push(Step::new("a", "A", 10));
        let result = validate(&t);
        assert!(result.warnings.iter().any(|w| w.contains("kitchen")));
    }

    #[test]
    fn high_utilization_is_flagged_for_overcommitted_resource() {
        let mut t = Template::new("t", "Hot resource");
        t.resources.push(Resource::new("mixer", "Mixer", ResourceKind::Equipment, 1));
        t.steps.push(Step::new("a", "A", 10).with_resource_need(ResourceNeed::new("mixer", 1)));
        t.steps.push(Step::new("b", "B", 10).with_resource_need(ResourceNeed::new("mixer", 1)));
        let result = validate(&t);
        assert!(result.warnings.iter().any(|w| w.contains("mixer")));
    }

    #[test]
    fn validation_errors_short_circuit_before_warnings() {
        let mut t = Template::new("", "Invalid");
        t.steps.push(Step::new("a", "A", 10));
        let result = validate(&t);
        assert!(!result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn cycle_is_reported_as_an_error() {
        let mut t = Template::new("t", "Cycle");
        t.steps.push(
            Step::new("a", "A", 10).with_dependency(Dependency::new("b", DependencyKind::FinishToStart)),
        );
        t.steps.push(
            Step::new("b", "B", 10).with_dependency(Dependency::new("a", DependencyKind::FinishToStart)),
        );
        let result = validate(&t);
        assert!(result.errors.iter().any(|e| e.contains("cycle")));
    }

    #[test]
    fn valid_uncontended_template_has_no_warnings() {
        let mut t = Template::new("t", "Clean");
        t.steps.push(Step::new("a", "A", 10));
        t.steps.push(
            Step::new("b", "B", 10).with_dependency(Dependency::new("a", DependencyKind::FinishToStart)),
        );
        let result = validate(&t);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }
}
