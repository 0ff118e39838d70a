//! C5: wall-clock anchoring and final output assembly.
//!
//! A template's `timeConstraint` anchors the otherwise-relative minute
//! offsets produced by C3/C4 to actual calendar timestamps. Anchoring never
//! changes the relative shape of the schedule, only where minute zero maps
//! to on the clock.

use chrono::{Duration, NaiveDateTime};
use ctrlpath_core::{
    AssignedResource, ScheduleSummary, SolvedSchedule, SolvedStep, Template, Warning,
};

use crate::cpm::CpmResult;
use crate::resolver::ResolverResult;

/// Assemble the final [`SolvedSchedule`] from CPM timings and resolved
/// placements, anchoring to wall-clock time if the template requests it.
pub fn assemble(template: &Template, cpm: &CpmResult, resolved: &ResolverResult) -> SolvedSchedule {
    let total_duration_mins = resolved
        .placements
        .values()
        .map(|p| p.end)
        .max()
        .unwrap_or(0);

    let anchor_origin = anchor_origin(template, total_duration_mins);

    let mut solved_steps: Vec<SolvedStep> = template
        .steps
        .iter()
        .filter_map(|step| {
            let placement = resolved.placements.get(&step.id)?;
            let timing = cpm.timings.get(&step.id);
            let total_float = timing.map_or(0, crate::cpm::StepTiming::total_float);
            let is_critical = timing.is_some_and(crate::cpm::StepTiming::is_critical);

            let assigned_resources = step
                .resource_needs
                .iter()
                .map(|need| AssignedResource {
                    resource_id: need.resource_id.clone(),
                    quantity_used: need.quantity,
                })
                .collect();

            let (start_time, end_time) = match anchor_origin {
                Some(origin) => (
                    Some(origin + Duration::minutes(i64::try_from(placement.start).unwrap_or(i64::MAX))),
                    Some(origin + Duration::minutes(i64::try_from(placement.end).unwrap_or(i64::MAX))),
                ),
                None => (None, None),
            };

            Some(SolvedStep {
                step_id: step.id.clone(),
                start_offset_mins: placement.start,
                end_offset_mins: placement.end,
                total_float_mins: total_float,
                is_critical,
                assigned_resources,
                start_time,
                end_time,
            })
        })
        .collect();

    solved_steps.sort_by(|a, b| a.start_offset_mins.cmp(&b.start_offset_mins).then(a.step_id.cmp(&b.step_id)));

    let mut critical_path_step_ids = cpm.critical_path.clone();
    critical_path_step_ids.sort_by_key(|id| {
        cpm.timings
            .get(id)
            .map(|t| t.early_start)
            .unwrap_or(0)
    });

    let warnings: Vec<Warning> = resolved.warnings.clone();

    SolvedSchedule {
        template_id: template.id.clone(),
        solved_steps,
        summary: ScheduleSummary {
            total_duration_mins,
            critical_path_step_ids,
        },
        warnings,
    }
}

/// The wall-clock timestamp minute offset zero maps to, if the template
/// declares a `timeConstraint`.
///
/// - `startTime` anchors forward: minute zero is that timestamp.
/// - `endTime` anchors backward: the schedule's last minute lands exactly
///   on `endTime`, so minute zero is `endTime - makespan`.
fn anchor_origin(template: &Template, makespan_mins: u64) -> Option<NaiveDateTime> {
    let constraint = template.time_constraint.as_ref()?;
    if let Some(start) = constraint.start_time {
        return Some(start);
    }
    if let Some(end) = constraint.end_time {
        return Some(end - Duration::minutes(i64::try_from(makespan_mins).unwrap_or(0)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpm;
    use crate::graph::PrecedenceGraph;
    use crate::resolver;
    use chrono::NaiveDate;
    use ctrlpath_core::{Step, TimeConstraint};

    fn solved(template: &Template) -> SolvedSchedule {
        let g = PrecedenceGraph::build(template).unwrap();
        let cpm = cpm::compute(template, &g);
        let resolved = resolver::resolve(template, &g, &cpm);
        assemble(template, &cpm, &resolved)
    }

    #[test]
    fn no_time_constraint_leaves_timestamps_unset() {
        let mut t = Template::new("t", "Bare");
        t.steps.push(Step::new("a", "A", 30));
        let schedule = solved(&t);
        assert!(schedule.solved_steps[0].start_time.is_none());
        assert_eq!(schedule.summary.total_duration_mins, 30);
    }

    #[test]
    fn forward_anchor_starts_at_start_time() {
        let mut t = Template::new("t", "Forward");
        t.steps.push(Step::new("a", "A", 60));
        let start = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        t.time_constraint = Some(TimeConstraint {
            start_time: Some(start),
            end_time: None,
        });
        let schedule = solved(&t);
        assert_eq!(schedule.solved_steps[0].start_time, Some(start));
        assert_eq!(
            schedule.solved_steps[0].end_time,
            Some(start + Duration::minutes(60))
        );
    }

    #[test]
    fn backward_anchor_ends_exactly_at_end_time() {
        let mut t = Template::new("t", "Backward");
        t.steps.push(Step::new("a", "A", 45));
        let end = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap().and_hms_opt(17, 0, 0).unwrap();
        t.time_constraint = Some(TimeConstraint {
            start_time: None,
            end_time: Some(end),
        });
        let schedule = solved(&t);
        assert_eq!(schedule.solved_steps[0].end_time, Some(end));
        assert_eq!(
            schedule.solved_steps[0].start_time,
            Some(end - Duration::minutes(45))
        );
    }

    #[test]
    fn critical_path_is_ordered_by_early_start() {
        let mut t = Template::new("t", "Chain");
        t.steps.push(Step::new("a", "A", 10));
        t.steps.push(
            Step::new("b", "B", 10)
                .with_dependency(ctrlpath_core::Dependency::new("a", ctrlpath_core::DependencyKind::FinishToStart)),
        );
        let schedule = solved(&t);
        assert_eq!(schedule.summary.critical_path_step_ids, vec!["a".to_string(), "b".to_string()]);
    }
}
