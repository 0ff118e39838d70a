//! # ctrlpath-solver
//!
//! The constraint-based scheduling algorithms (C2–C6): the precedence
//! graph, the critical path method, resource-feasibility resolution, and
//! wall-clock anchoring. Everything here operates on a [`ctrlpath_core::Template`]
//! and produces the public result types from `ctrlpath-core` — this crate
//! owns no wire format and installs no logging subscriber, only emits
//! [`tracing`] events at each phase boundary.
//!
//! ## Example
//!
//! ```rust
//! use ctrlpath_core::{Template, Step, Dependency, DependencyKind};
//!
//! let mut template = Template::new("launch-day", "Launch Day");
//! template.steps.push(Step::new("prep", "Prep the venue", 15));
//! template.steps.push(
//!     Step::new("doors", "Open the doors", 90)
//!         .with_dependency(Dependency::new("prep", DependencyKind::FinishToStart)),
//! );
//!
//! let schedule = ctrlpath_solver::solve(&template, None).unwrap();
//! assert_eq!(schedule.summary.total_duration_mins, 105);
//! ```

pub mod anchor;
pub mod cpm;
pub mod graph;
pub mod resolver;
pub mod validator;

use std::collections::HashMap;

use ctrlpath_core::{InventoryError, SolveError, SolvedSchedule, Template, ValidationResult};

use graph::PrecedenceGraph;

/// Solve a template into a concrete timed schedule (spec §6 `solve`).
///
/// `inventory` optionally overrides declared resource capacities by name —
/// every key must match a declared resource's `name` (case-preserving) and
/// every value must be positive, or the whole call fails before any
/// scheduling runs.
#[tracing::instrument(skip(template, inventory), fields(template_id = %template.id))]
pub fn solve(
    template: &Template,
    inventory: Option<&HashMap<String, u32>>,
) -> Result<SolvedSchedule, SolveError> {
    let validated = {
        let _span = tracing::info_span!("validate").entered();
        template.validate().map_err(SolveError::InvalidTemplate)?
    };
    let mut effective = validated.into_template();

    if let Some(overrides) = inventory {
        apply_inventory(&mut effective, overrides).map_err(SolveError::InvalidInventory)?;
    }

    let graph = {
        let _span = tracing::info_span!("graph_build").entered();
        PrecedenceGraph::build(&effective).map_err(SolveError::Cycle)?
    };

    let cpm_result = {
        let _span = tracing::info_span!("cpm").entered();
        cpm::compute(&effective, &graph)
    };

    let resolved = {
        let _span = tracing::info_span!("resource_resolution").entered();
        resolver::resolve(&effective, &graph, &cpm_result)
    };

    let schedule = {
        let _span = tracing::info_span!("anchor").entered();
        anchor::assemble(&effective, &cpm_result, &resolved)
    };

    tracing::info!(
        makespan_mins = schedule.summary.total_duration_mins,
        warning_count = schedule.warnings.len(),
        "solve complete"
    );

    Ok(schedule)
}

/// Validate a template without resolving resources (spec §6 `validate`).
#[tracing::instrument(skip(template), fields(template_id = %template.id))]
pub fn validate(template: &Template) -> ValidationResult {
    validator::validate(template)
}

fn apply_inventory(template: &mut Template, overrides: &HashMap<String, u32>) -> Result<(), InventoryError> {
    for (name, value) in overrides {
        if *value == 0 {
            return Err(InventoryError::NonPositive {
                name: name.clone(),
                value: i64::from(*value),
            });
        }
        match template.resources.iter_mut().find(|r| &r.name == name) {
            Some(resource) => resource.capacity = *value,
            None => return Err(InventoryError::UnknownResource(name.clone())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlpath_core::{Dependency, DependencyKind, Resource, ResourceKind, ResourceNeed, Step};
    use pretty_assertions::assert_eq;

    fn party_template() -> Template {
        let mut t = Template::new("party", "Birthday Party");
        t.resources.push(Resource::new("oven", "Oven", ResourceKind::Equipment, 1));
        t.steps.push(Step::new("bake", "Bake the cake", 60).with_resource_need(ResourceNeed::new("oven", 1)));
        t.steps.push(
            Step::new("decorate", "Decorate the cake", 30)
                .with_dependency(Dependency::new("bake", DependencyKind::FinishToStart)),
        );
        t
    }

    #[test]
    fn solve_produces_expected_makespan() {
        let t = party_template();
        let schedule = solve(&t, None).unwrap();
        assert_eq!(schedule.summary.total_duration_mins, 90);
        assert_eq!(schedule.solved_steps.len(), 2);
    }

    #[test]
    fn solve_rejects_invalid_template() {
        let mut t = Template::new("", "Bad");
        t.steps.push(Step::new("a", "A", 0));
        let err = solve(&t, None).unwrap_err();
        assert!(matches!(err, SolveError::InvalidTemplate(_)));
    }

    #[test]
    fn solve_rejects_unknown_inventory_override() {
        let t = party_template();
        let mut overrides = HashMap::new();
        overrides.insert("ghost-resource".to_string(), 2);
        let err = solve(&t, Some(&overrides)).unwrap_err();
        assert!(matches!(err, SolveError::InvalidInventory(InventoryError::UnknownResource(_))));
    }

    #[test]
    fn inventory_override_is_matched_by_name_not_id() {
        let t = party_template();
        let mut overrides = HashMap::new();
        overrides.insert("oven".to_string(), 2);
        let err = solve(&t, Some(&overrides)).unwrap_err();
        assert!(matches!(err, SolveError::InvalidInventory(InventoryError::UnknownResource(_))));

        let mut overrides = HashMap::new();
        overrides.insert("Oven".to_string(), 2);
        assert!(solve(&t, Some(&overrides)).is_ok());
    }

    #[test]
    fn solve_rejects_nonpositive_inventory_override() {
        let t = party_template();
        let mut overrides = HashMap::new();
        overrides.insert("oven".to_string(), 0);
        let err = solve(&t, Some(&overrides)).unwrap_err();
        assert!(matches!(
            err,
            SolveError::InvalidInventory(InventoryError::NonPositive { .. })
        ));
    }

    #[test]
    fn inventory_override_relieves_contention() {
        let mut t = Template::new("t", "Two bakers");
        t.resources.push(Resource::new("oven", "Oven", ResourceKind::Equipment, 1));
        t.steps.push(Step::new("a", "A", 30).with_resource_need(ResourceNeed::new("oven", 1)));
        t.steps.push(Step::new("b", "B", 30).with_resource_need(ResourceNeed::new("oven", 1)));

        let without_override = solve(&t, None).unwrap();
        assert_eq!(without_override.summary.total_duration_mins, 60);

        let mut overrides = HashMap::new();
        overrides.insert("Oven".to_string(), 2);
        let with_override = solve(&t, Some(&overrides)).unwrap();
        assert_eq!(with_override.summary.total_duration_mins, 30);
    }

    #[test]
    fn solve_detects_cycles() {
        let mut t = Template::new("t", "Cycle");
        t.steps.push(
            Step::new("a", "A", 10).with_dependency(Dependency::new("b", DependencyKind::FinishToStart)),
        );
        t.steps.push(
            Step::new("b", "B", 10).with_dependency(Dependency::new("a", DependencyKind::FinishToStart)),
        );
        let err = solve(&t, None).unwrap_err();
        assert!(matches!(err, SolveError::Cycle(_)));
    }

    #[test]
    fn validate_reports_warnings_without_solving() {
        let mut t = Template::new("t", "Unused resource");
        t.resources.push(Resource::new("ladder", "Ladder", ResourceKind::Equipment, 1));
        t.steps.push(Step::new("a", "A", 10));
        let result = validate(&t);
        assert!(result.errors.is_empty());
        assert!(!result.warnings.is_empty());
    }
}
