//! Template domain model and schema/referential-integrity validation (C1).
//!
//! `Template::validate` is the sole gate into the rest of the pipeline: once
//! it returns a [`ValidatedTemplate`], C2–C5 never re-check the invariants
//! enumerated here (spec §9, "validate once up front").

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// Unique identifier for a step.
pub type StepId = String;
/// Unique identifier for a resource.
pub type ResourceId = String;
/// Unique identifier for a track.
pub type TrackId = String;

/// A declarative template of tasks, ready for validation and scheduling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time_constraint: Option<TimeConstraint>,
    #[serde(default)]
    pub default_num_people: Option<u32>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Template {
    /// Create an empty template with the given id and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            time_constraint: None,
            default_num_people: None,
            steps: Vec::new(),
            tracks: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Run C1: schema bounds, defaults, and referential integrity.
    ///
    /// Returns the validated template on success, or the full list of
    /// violations found (validation does not stop at the first error).
    pub fn validate(&self) -> Result<ValidatedTemplate, Vec<TemplateError>> {
        let mut errors = Vec::new();

        if self.id.is_empty() {
            errors.push(TemplateError::Schema {
                path: "/id".into(),
                message: "id must not be empty".into(),
            });
        }

        if let Some(tc) = &self.time_constraint {
            if tc.start_time.is_some() && tc.end_time.is_some() {
                errors.push(TemplateError::ConflictingTimeConstraint);
            }
        }

        if let Some(n) = self.default_num_people {
            if n == 0 {
                errors.push(TemplateError::Schema {
                    path: "/defaultNumPeople".into(),
                    message: "defaultNumPeople must be a positive integer".into(),
                });
            }
        }

        let mut seen_track_ids = HashSet::new();
        for (i, track) in self.tracks.iter().enumerate() {
            if track.id.is_empty() {
                errors.push(TemplateError::Schema {
                    path: format!("/tracks/{i}/id"),
                    message: "track id must not be empty".into(),
                });
            } else if !seen_track_ids.insert(track.id.as_str()) {
                errors.push(TemplateError::ReferentialIntegrity(format!(
                    "duplicate track id '{}'",
                    track.id
                )));
            }
        }

        let mut seen_resource_ids = HashSet::new();
        for (i, resource) in self.resources.iter().enumerate() {
            if resource.id.is_empty() {
                errors.push(TemplateError::Schema {
                    path: format!("/resources/{i}/id"),
                    message: "resource id must not be empty".into(),
                });
            } else if !seen_resource_ids.insert(resource.id.as_str()) {
                errors.push(TemplateError::ReferentialIntegrity(format!(
                    "duplicate resource id '{}'",
                    resource.id
                )));
            }
            if resource.capacity == 0 {
                errors.push(TemplateError::Schema {
                    path: format!("/resources/{i}/capacity"),
                    message: "capacity must be >= 1".into(),
                });
            }
        }

        let mut seen_step_ids = HashSet::new();
        for (i, step) in self.steps.iter().enumerate() {
            if step.id.is_empty() {
                errors.push(TemplateError::Schema {
                    path: format!("/steps/{i}/id"),
                    message: "step id must not be empty".into(),
                });
            } else if !seen_step_ids.insert(step.id.as_str()) {
                errors.push(TemplateError::ReferentialIntegrity(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }

            if step.duration_mins < 1 {
                errors.push(TemplateError::Schema {
                    path: format!("/steps/{i}/durationMins"),
                    message: "durationMins must be >= 1".into(),
                });
            }

            if let Some(track_id) = &step.track_id {
                if !self.tracks.iter().any(|t| &t.id == track_id) {
                    errors.push(TemplateError::ReferentialIntegrity(format!(
                        "step '{}' references unknown track '{}'",
                        step.id, track_id
                    )));
                }
            }

            for (j, dep) in step.dependencies.iter().enumerate() {
                if dep.predecessor_step_id == step.id {
                    errors.push(TemplateError::ReferentialIntegrity(format!(
                        "step '{}' depends on itself",
                        step.id
                    )));
                } else if !self.steps.iter().any(|s| s.id == dep.predecessor_step_id) {
                    errors.push(TemplateError::ReferentialIntegrity(format!(
                        "step '{}' dependency {} references unknown step '{}'",
                        step.id, j, dep.predecessor_step_id
                    )));
                }
            }

            for (j, need) in step.resource_needs.iter().enumerate() {
                if !self.resources.iter().any(|r| r.id == need.resource_id) {
                    errors.push(TemplateError::ReferentialIntegrity(format!(
                        "step '{}' resource need references unknown resource '{}'",
                        step.id, need.resource_id
                    )));
                }
                if need.quantity < 1 {
                    errors.push(TemplateError::Schema {
                        path: format!("/steps/{i}/resourceNeeds/{j}/quantity"),
                        message: "quantity must be >= 1".into(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(ValidatedTemplate(self.clone()))
        } else {
            Err(errors)
        }
    }
}

/// An optional wall-clock anchor for the template.
///
/// At most one of `start_time`/`end_time` may be set; [`Template::validate`]
/// rejects both being present.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeConstraint {
    #[serde(default)]
    pub start_time: Option<chrono::NaiveDateTime>,
    #[serde(default)]
    pub end_time: Option<chrono::NaiveDateTime>,
}

/// A schedulable unit of work.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub duration_mins: u32,
    #[serde(default)]
    pub track_id: Option<TrackId>,
    #[serde(default)]
    pub timing_policy: TimingPolicy,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub resource_needs: Vec<ResourceNeed>,
}

impl Step {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration_mins: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            duration_mins,
            track_id: None,
            timing_policy: TimingPolicy::default(),
            dependencies: Vec::new(),
            resource_needs: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dep: Dependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_resource_need(mut self, need: ResourceNeed) -> Self {
        self.resource_needs.push(need);
        self
    }

    pub fn alap(mut self) -> Self {
        self.timing_policy = TimingPolicy::Alap;
        self
    }
}

/// Timing policy for a step: schedule it as early, or as late, as
/// feasibility permits (spec §4.4 step 8).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingPolicy {
    #[default]
    Asap,
    Alap,
}

impl std::fmt::Display for TimingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimingPolicy::Asap => write!(f, "ASAP"),
            TimingPolicy::Alap => write!(f, "ALAP"),
        }
    }
}

/// A precedence edge referencing a predecessor step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub predecessor_step_id: StepId,
    #[serde(default)]
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn new(predecessor_step_id: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            predecessor_step_id: predecessor_step_id.into(),
            kind,
        }
    }
}

/// The four CPM precedence relations (spec §4.3). Wire spellings are the
/// literal variant names (`FinishToStart`, …); `FS`/`SS`/`FF`/`SF` are
/// shorthand used only in prose and in this crate's own doc comments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DependencyKind::FinishToStart => "FinishToStart",
            DependencyKind::StartToStart => "StartToStart",
            DependencyKind::FinishToFinish => "FinishToFinish",
            DependencyKind::StartToFinish => "StartToFinish",
        };
        write!(f, "{s}")
    }
}

/// A step's requirement for some quantity of a declared resource.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNeed {
    pub resource_id: ResourceId,
    pub quantity: u32,
    #[serde(default)]
    pub min_people: Option<u32>,
    #[serde(default)]
    pub max_people: Option<u32>,
}

impl ResourceNeed {
    pub fn new(resource_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            resource_id: resource_id.into(),
            quantity,
            min_people: None,
            max_people: None,
        }
    }
}

/// A purely presentational grouping tag; does not influence scheduling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
}

/// A finite-capacity resource the template's steps may draw on.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub kind: ResourceKind,
    pub capacity: u32,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

impl Resource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ResourceKind, capacity: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            capacity,
            roles: None,
        }
    }
}

/// Resource capacity semantics (spec §3):
/// - `Equipment`/`People` are renewable: capacity bounds concurrent usage.
/// - `Consumable` is a time-independent total budget over the whole schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Equipment,
    People,
    Consumable,
}

impl ResourceKind {
    /// `true` for resources whose capacity is an instantaneous concurrency
    /// limit rather than a lifetime total.
    pub fn is_renewable(self) -> bool {
        matches!(self, ResourceKind::Equipment | ResourceKind::People)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Equipment => "Equipment",
            ResourceKind::People => "People",
            ResourceKind::Consumable => "Consumable",
        };
        write!(f, "{s}")
    }
}

/// A template that has passed C1 validation.
///
/// Opaque outside this crate: the only way to obtain one is
/// [`Template::validate`], so C2–C5 can assume every invariant in spec §3
/// already holds.
#[derive(Clone, Debug)]
pub struct ValidatedTemplate(Template);

impl ValidatedTemplate {
    pub fn template(&self) -> &Template {
        &self.0
    }

    pub fn into_template(self) -> Template {
        self.0
    }
}
