//! # ctrlpath-core
//!
//! Template domain model, schema validation, and the public result/error
//! vocabulary for the ctrlpath scheduling core.
//!
//! This crate owns the data (`Template`, `Step`, `Resource`, …) and the
//! referential-integrity checks that must pass before any algorithm in
//! `ctrlpath-solver` runs. It does not schedule anything itself.
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
//! assert!(template.validate().is_ok());
//! ```

mod error;
mod result;
mod template;

pub use error::{InventoryError, SolveError, TemplateError};
pub use result::{
    AssignedResource, ScheduleSummary, SolvedSchedule, SolvedStep, ValidationResult, Warning,
};
pub use template::{
    Dependency, DependencyKind, Resource, ResourceKind, ResourceNeed, Step, StepId, Template,
    TimeConstraint, TimingPolicy, Track, ValidatedTemplate,
};
