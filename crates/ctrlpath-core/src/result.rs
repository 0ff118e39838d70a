//! Solved-output shapes and the advisory `Warning` vocabulary (spec §3, §7).
//!
//! A successful `solve` always produces a [`SolvedSchedule`]; nothing in
//! [`Warning`] can abort a solve, only [`crate::SolveError`] can.

use serde::{Deserialize, Serialize};

use crate::template::{ResourceId, StepId};

/// A quantity of a resource committed to a step for its duration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedResource {
    pub resource_id: ResourceId,
    pub quantity_used: u32,
}

/// One step's position in the solved schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedStep {
    pub step_id: StepId,
    pub start_offset_mins: u64,
    pub end_offset_mins: u64,
    pub total_float_mins: u64,
    pub is_critical: bool,
    #[serde(default)]
    pub assigned_resources: Vec<AssignedResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<chrono::NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<chrono::NaiveDateTime>,
}

/// Schedule-wide totals derived from the solved steps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub total_duration_mins: u64,
    pub critical_path_step_ids: Vec<StepId>,
}

/// The output of a successful `solve` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedSchedule {
    pub template_id: String,
    pub solved_steps: Vec<SolvedStep>,
    pub summary: ScheduleSummary,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

/// The output of a `validate` call: template-level diagnostics without
/// running the solver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Advisory conditions surfaced alongside a successful solve or a
/// stand-alone `validate` (spec §7). None of these prevent a solve from
/// completing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Warning {
    /// A step's renewable-resource need could not be satisfied at its
    /// earliest feasible time and was pushed later.
    ResourceDelay {
        step_id: StepId,
        resource_id: ResourceId,
        delayed_by_mins: u64,
    },

    /// A consumable resource's total demand across the schedule exceeds its
    /// declared capacity.
    ConsumableShortfall {
        resource_id: ResourceId,
        requested: u64,
        available: u32,
    },

    /// A renewable resource is committed above a high-utilization threshold
    /// for a meaningful share of the schedule's span.
    HighUtilization {
        resource_id: ResourceId,
        peak_utilization_pct: u32,
    },

    /// A resource is declared on the template but no step references it.
    UnreferencedResource { resource_id: ResourceId },

    /// A track is declared on the template but no step references it.
    UnreferencedTrack { track_id: String },

    /// A dependency's backward-pass constraint could not be satisfied
    /// without pushing a predecessor's late finish before its early finish.
    ImpossibleBeforeDelay {
        step_id: StepId,
        predecessor_step_id: StepId,
    },
}

impl Warning {
    /// Render the human-readable text described in spec §7's "Surface"
    /// column.
    pub fn to_message(&self) -> String {
        match self {
            Warning::ResourceDelay {
                step_id,
                resource_id,
                delayed_by_mins,
            } => format!(
                "step '{step_id}' delayed {delayed_by_mins} min waiting on resource '{resource_id}'"
            ),
            Warning::ConsumableShortfall {
                resource_id,
                requested,
                available,
            } => format!(
                "consumable '{resource_id}' requested {requested} but only {available} available"
            ),
            Warning::HighUtilization {
                resource_id,
                peak_utilization_pct,
            } => format!("resource '{resource_id}' peaks at {peak_utilization_pct}% utilization"),
            Warning::UnreferencedResource { resource_id } => {
                format!("resource '{resource_id}' is declared but never used by a step")
            }
            Warning::UnreferencedTrack { track_id } => {
                format!("track '{track_id}' is declared but never used by a step")
            }
            Warning::ImpossibleBeforeDelay {
                step_id,
                predecessor_step_id,
            } => format!(
                "step '{step_id}' cannot be satisfied without delaying predecessor '{predecessor_step_id}'"
            ),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_delay_message_names_step_and_resource() {
        let w = Warning::ResourceDelay {
            step_id: "bake".into(),
            resource_id: "oven".into(),
            delayed_by_mins: 30,
        };
        let msg = w.to_message();
        assert!(msg.contains("bake"));
        assert!(msg.contains("oven"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn warning_json_tag_is_kind() {
        let w = Warning::UnreferencedTrack {
            track_id: "front-of-house".into(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "unreferencedTrack");
        assert_eq!(json["trackId"], "front-of-house");
    }

    #[test]
    fn solved_schedule_round_trips_through_json() {
        let schedule = SolvedSchedule {
            template_id: "launch-day".into(),
            solved_steps: vec![SolvedStep {
                step_id: "prep".into(),
                start_offset_mins: 0,
                end_offset_mins: 15,
                total_float_mins: 0,
                is_critical: true,
                assigned_resources: vec![],
                start_time: None,
                end_time: None,
            }],
            summary: ScheduleSummary {
                total_duration_mins: 15,
                critical_path_step_ids: vec!["prep".into()],
            },
            warnings: vec![],
        };
        let json = serde_json::to_string(&schedule).unwrap();
        let back: SolvedSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schedule);
    }
}
