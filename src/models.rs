use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Coach-authored workout definition a session is instantiated from.
/// Imported from a TOML file; `id` is the server-side workout id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: i64,
    pub name: String,
    pub exercises_list: Vec<TemplateExercise>,
}

/// One exercise entry in a template. Targets are optional in the file;
/// session creation fills in the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    pub id: i64,
    pub exercise_name: String,
    pub sets: Option<i64>,
    pub min_reps: Option<u32>,
    pub max_reps: Option<u32>,
    pub rest_seconds: Option<u32>,
    pub observations: Option<String>,
}

/// One in-progress performance of a workout template.
/// `id` is minted locally at creation and never changes;
/// `remote_session_id` stays `None` until the server acknowledges the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: String,
    pub remote_session_id: Option<String>,
    pub name: String,
    pub start_time: DateTime<Local>,
    pub exercises: Vec<SessionExercise>,
    pub is_active: bool,
}

/// Exercise-specific data within a session.
/// Target values are copied from the template at creation and are immutable;
/// `rest_seconds` and `notes` are the user-editable parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExercise {
    pub id: String,
    pub name: String,
    pub target_sets: u32,
    pub target_min_reps: u32,
    pub target_max_reps: u32,
    pub rest_seconds: u32,
    pub sets: Vec<WorkoutSet>,
    pub notes: String,
    pub observations: Option<String>,
}

/// Individual set record. Weight/reps/rir stay raw user strings until submit
/// time; the `previous_*` fields are reference data from the last session of
/// the same workout and are only ever written by the previous-session merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub id: String,
    pub weight: String,
    pub reps: String,
    pub rir: String,
    pub completed: bool,
    pub previous_weight: Option<String>,
    pub previous_reps: Option<String>,
    pub previous_rir: Option<String>,
}

impl WorkoutSet {
    pub fn empty(id: String) -> Self {
        Self {
            id,
            weight: String::new(),
            reps: String::new(),
            rir: String::new(),
            completed: false,
            previous_weight: None,
            previous_reps: None,
            previous_rir: None,
        }
    }

    /// A set with no user input yet (used to find the "next" set to edit).
    pub fn is_blank(&self) -> bool {
        !self.completed && self.weight.is_empty() && self.reps.is_empty() && self.rir.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_from_toml() {
        let raw = r#"
            id = 42
            name = "Push Day"

            [[exercises_list]]
            id = 7
            exercise_name = "Bench Press"
            sets = 4
            min_reps = 6
            max_reps = 10

            [[exercises_list]]
            id = 9
            exercise_name = "Overhead Press"
        "#;

        let template: WorkoutTemplate = toml::from_str(raw).unwrap();
        assert_eq!(template.id, 42);
        assert_eq!(template.exercises_list.len(), 2);
        assert_eq!(template.exercises_list[0].sets, Some(4));
        assert_eq!(template.exercises_list[1].sets, None);
        assert_eq!(template.exercises_list[1].min_reps, None);
    }
}
