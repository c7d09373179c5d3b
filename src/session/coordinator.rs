use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::warn;
use uuid::Uuid;

use crate::api::{
    ApiError, FinishExercise, FinishSessionRequest, FinishSet, PreviousExercise, WorkoutApi,
};
use crate::models::{SessionExercise, WorkoutSession, WorkoutSet, WorkoutTemplate};
use crate::session::resume::{PendingResumeSlot, PendingWorkout};
use crate::store::KeyValueStore;

/// Rest applied when the template does not specify one.
pub const DEFAULT_REST_SECONDS: u32 = 120;
const DEFAULT_SETS: u32 = 3;
const DEFAULT_MIN_REPS: u32 = 8;
const DEFAULT_MAX_REPS: u32 = 12;

const WORKOUT_KEY_PREFIX: &str = "workout_";

/// Cache key for a workout's remote session id.
pub fn workout_key(workout_id: i64) -> String {
    format!("{WORKOUT_KEY_PREFIX}{workout_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("workout template has no exercises")]
    EmptyTemplate,
    #[error("no active session")]
    NoActiveSession,
    #[error("no exercise `{0}` in the current session")]
    UnknownExercise(String),
    #[error("no set `{0}` for this exercise")]
    UnknownSet(String),
    #[error("could not save the finished session: {0}")]
    Finish(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Active,
    Finished,
    Discarded,
}

#[derive(Debug, Clone, Copy)]
pub enum SetField {
    Weight,
    Reps,
    Rir,
}

/// Owns one workout session's lifecycle: build the local model from a
/// template, best-effort sync with the server, apply user mutations, and
/// tear the session down on finish/discard. The `{workout_id → remote id}`
/// cache entry is cleared before every new creation and on teardown.
pub struct WorkoutSessionCoordinator {
    api: Arc<dyn WorkoutApi>,
    store: Arc<dyn KeyValueStore>,
    phase: SessionPhase,
    session: Option<WorkoutSession>,
}

impl WorkoutSessionCoordinator {
    pub fn new(api: Arc<dyn WorkoutApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api,
            store,
            phase: SessionPhase::Uninitialized,
            session: None,
        }
    }

    /// Re-adopt a session that was persisted by a previous command.
    pub fn restore(
        api: Arc<dyn WorkoutApi>,
        store: Arc<dyn KeyValueStore>,
        session: WorkoutSession,
    ) -> Self {
        Self {
            api,
            store,
            phase: SessionPhase::Active,
            session: Some(session),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&WorkoutSession> {
        self.session.as_ref()
    }

    /// Build the local session model from template data. Fails without
    /// creating anything when the template has no exercises.
    pub fn initialize_session(&mut self, template: &WorkoutTemplate) -> Result<(), SessionError> {
        if template.exercises_list.is_empty() {
            return Err(SessionError::EmptyTemplate);
        }
        self.session = Some(build_session(template, Local::now()));
        self.phase = SessionPhase::Active;
        Ok(())
    }

    /// Best-effort server sync after initialization: create the remote
    /// session, then pull previous-session data. Either step failing leaves
    /// the local session intact in degraded mode.
    pub async fn sync_remote(&mut self, template: &WorkoutTemplate) {
        if self.create_remote_session(template.id).await {
            self.fetch_previous_session(template).await;
        }
    }

    /// Clear any cached remote id for this workout, then request a fresh one.
    /// Returns whether a remote session now exists.
    pub async fn create_remote_session(&mut self, workout_id: i64) -> bool {
        let key = workout_key(workout_id);
        if let Err(err) = self.store.remove(&key).await {
            warn!("could not clear cached session id `{key}`: {err}");
        }

        match self.api.create_session(workout_id).await {
            Ok(response) => match response.session_id {
                Some(remote_id) => {
                    if let Err(err) = self.store.set(&key, &remote_id).await {
                        warn!("could not cache session id `{key}`: {err}");
                    }
                    if let Some(session) = self.session.as_mut() {
                        session.remote_session_id = Some(remote_id);
                    }
                    true
                }
                None => {
                    warn!("create-session for workout {workout_id} returned no session id");
                    false
                }
            },
            Err(err) => {
                warn!("create-session failed for workout {workout_id}: {err}");
                false
            }
        }
    }

    /// Pull the previous session of this workout and merge it into the
    /// `previous_*` reference fields. Failures are logged and swallowed.
    pub async fn fetch_previous_session(&mut self, template: &WorkoutTemplate) {
        match self.api.previous_session(template.id).await {
            Ok(response) => {
                self.merge_previous_session_data(template, &response.previous_session_list);
            }
            Err(err) => {
                warn!("previous-session fetch failed for workout {}: {err}", template.id);
            }
        }
    }

    /// Copy historical weight/reps/rir into the matching sets' `previous_*`
    /// fields. Exercises are matched through the template's server id at the
    /// same position, sets by 1-based ordinal. Everything else is left
    /// untouched, so the merge is idempotent and can never clobber
    /// user-entered values.
    pub fn merge_previous_session_data(
        &mut self,
        template: &WorkoutTemplate,
        previous_list: &[PreviousExercise],
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        for (position, exercise) in session.exercises.iter_mut().enumerate() {
            let Some(template_exercise) = template.exercises_list.get(position) else {
                continue;
            };
            let Some(previous) = previous_list
                .iter()
                .find(|p| p.exercise_id == template_exercise.id)
            else {
                continue;
            };

            for (set_index, set) in exercise.sets.iter_mut().enumerate() {
                let Some(previous_set) = previous
                    .sets
                    .iter()
                    .find(|s| s.set_number as usize == set_index + 1)
                else {
                    continue;
                };
                set.previous_weight = previous_set.weight.map(display_number);
                set.previous_reps = previous_set.reps_done.map(|r| r.to_string());
                set.previous_rir = previous_set.reps_in_reserve.map(display_number);
            }
        }
    }

    /// Flip a set's completion flag; returns the new state. The caller is
    /// responsible for starting the rest countdown on the way to `true`.
    pub fn toggle_set_completion(
        &mut self,
        exercise_id: &str,
        set_id: &str,
    ) -> Result<bool, SessionError> {
        let set = self.set_mut(exercise_id, set_id)?;
        set.completed = !set.completed;
        Ok(set.completed)
    }

    /// Raw string write; parsing happens at submit time only.
    pub fn update_set_field(
        &mut self,
        exercise_id: &str,
        set_id: &str,
        field: SetField,
        value: &str,
    ) -> Result<(), SessionError> {
        let set = self.set_mut(exercise_id, set_id)?;
        match field {
            SetField::Weight => set.weight = value.to_string(),
            SetField::Reps => set.reps = value.to_string(),
            SetField::Rir => set.rir = value.to_string(),
        }
        Ok(())
    }

    /// Append a fresh empty set. Sets are never removed.
    pub fn append_set(&mut self, exercise_id: &str) -> Result<String, SessionError> {
        let exercise = self.exercise_mut(exercise_id)?;
        let set_id = Uuid::new_v4().to_string();
        exercise.sets.push(WorkoutSet::empty(set_id.clone()));
        Ok(set_id)
    }

    /// Overwrite an exercise's rest time. A countdown already running for a
    /// different exercise keeps its original duration.
    pub fn set_exercise_rest_time(
        &mut self,
        exercise_id: &str,
        total_seconds: u32,
    ) -> Result<(), SessionError> {
        self.exercise_mut(exercise_id)?.rest_seconds = total_seconds;
        Ok(())
    }

    pub fn set_exercise_notes(&mut self, exercise_id: &str, note: &str) -> Result<(), SessionError> {
        self.exercise_mut(exercise_id)?.notes = note.to_string();
        Ok(())
    }

    /// Submit the session to the server. On success the cached remote id is
    /// cleared and the session becomes terminal; on failure it stays Active
    /// so the user can re-attempt.
    pub async fn finish(
        &mut self,
        template: &WorkoutTemplate,
    ) -> Result<FinishSessionRequest, SessionError> {
        let session = self.session.as_ref().ok_or(SessionError::NoActiveSession)?;
        let payload = build_finish_payload(session, template);

        self.api.finish_session(&payload).await?;

        let key = workout_key(template.id);
        if let Err(err) = self.store.remove(&key).await {
            warn!("could not clear cached session id `{key}`: {err}");
        }
        if let Some(session) = self.session.as_mut() {
            session.is_active = false;
        }
        self.phase = SessionPhase::Finished;
        Ok(payload)
    }

    /// Abandon the session without writing progress to the server. Clears the
    /// cached remote id and empties the pending-resume slot.
    pub async fn discard(&mut self, template: &WorkoutTemplate, slot: &PendingResumeSlot) {
        let key = workout_key(template.id);
        if let Err(err) = self.store.remove(&key).await {
            warn!("could not clear cached session id `{key}`: {err}");
        }
        slot.discard().await;
        self.session = None;
        self.phase = SessionPhase::Discarded;
    }

    /// Hand the session over to the pending-resume slot. Only the template
    /// and the original start time survive; the session object itself is
    /// relinquished and rebuilt on resume.
    pub fn minimize(
        &mut self,
        template: &WorkoutTemplate,
    ) -> Result<PendingWorkout, SessionError> {
        let session = self.session.take().ok_or(SessionError::NoActiveSession)?;
        self.phase = SessionPhase::Uninitialized;
        Ok(PendingWorkout {
            template: template.clone(),
            start_time: session.start_time,
        })
    }

    /// Rebuild a minimized session from its snapshot, keeping the original
    /// start time so the elapsed display carries on.
    pub fn resume(&mut self, pending: &PendingWorkout) -> Result<(), SessionError> {
        if pending.template.exercises_list.is_empty() {
            return Err(SessionError::EmptyTemplate);
        }
        self.session = Some(build_session(&pending.template, pending.start_time));
        self.phase = SessionPhase::Active;
        Ok(())
    }

    /// External reset signal: drop all in-memory state and the workout's
    /// cached remote id.
    pub async fn reset(&mut self, workout_id: Option<i64>) {
        if let Some(id) = workout_id {
            let key = workout_key(id);
            if let Err(err) = self.store.remove(&key).await {
                warn!("could not clear cached session id `{key}`: {err}");
            }
        }
        self.session = None;
        self.phase = SessionPhase::Uninitialized;
    }

    fn exercise_mut(&mut self, exercise_id: &str) -> Result<&mut SessionExercise, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        session
            .exercises
            .iter_mut()
            .find(|e| e.id == exercise_id)
            .ok_or_else(|| SessionError::UnknownExercise(exercise_id.to_string()))
    }

    fn set_mut(&mut self, exercise_id: &str, set_id: &str) -> Result<&mut WorkoutSet, SessionError> {
        self.exercise_mut(exercise_id)?
            .sets
            .iter_mut()
            .find(|s| s.id == set_id)
            .ok_or_else(|| SessionError::UnknownSet(set_id.to_string()))
    }
}

/// Build the in-memory session model from template data. Every entity gets a
/// stable id at creation; all later lookups go through those ids.
pub fn build_session(template: &WorkoutTemplate, start_time: DateTime<Local>) -> WorkoutSession {
    let exercises = template
        .exercises_list
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let target_sets = entry
                .sets
                .filter(|&s| s > 0)
                .map(|s| s as u32)
                .unwrap_or(DEFAULT_SETS);
            let sets = (0..target_sets)
                .map(|set_index| {
                    WorkoutSet::empty(format!("e{}-s{}", index + 1, set_index + 1))
                })
                .collect();
            SessionExercise {
                id: format!("e{}", index + 1),
                name: entry.exercise_name.clone(),
                target_sets,
                target_min_reps: entry.min_reps.unwrap_or(DEFAULT_MIN_REPS),
                target_max_reps: entry.max_reps.unwrap_or(DEFAULT_MAX_REPS),
                rest_seconds: entry.rest_seconds.unwrap_or(DEFAULT_REST_SECONDS),
                sets,
                notes: String::new(),
                observations: entry.observations.clone(),
            }
        })
        .collect();

    WorkoutSession {
        id: start_time.timestamp_millis().to_string(),
        remote_session_id: None,
        name: template.name.clone(),
        start_time,
        exercises,
        is_active: true,
    }
}

/// Sum of `weight * reps` over completed sets only. Empty or non-numeric
/// fields count as zero.
pub fn compute_exercise_volume(exercise: &SessionExercise) -> f64 {
    exercise
        .sets
        .iter()
        .filter(|s| s.completed)
        .map(|s| parse_metric(&s.weight) * parse_metric(&s.reps))
        .sum()
}

pub fn compute_session_volume(session: &WorkoutSession) -> f64 {
    session.exercises.iter().map(compute_exercise_volume).sum()
}

pub fn count_completed_sets(session: &WorkoutSession) -> usize {
    session
        .exercises
        .iter()
        .map(|e| e.sets.iter().filter(|s| s.completed).count())
        .sum()
}

/// Build the finish payload: completed sets only, renumbered 1..n per
/// exercise; exercises with no completed set are dropped entirely.
pub fn build_finish_payload(
    session: &WorkoutSession,
    template: &WorkoutTemplate,
) -> FinishSessionRequest {
    let mut exercises = Vec::new();
    for (position, exercise) in session.exercises.iter().enumerate() {
        let Some(template_exercise) = template.exercises_list.get(position) else {
            continue;
        };
        let completed: Vec<&WorkoutSet> = exercise.sets.iter().filter(|s| s.completed).collect();
        if completed.is_empty() {
            continue;
        }
        let sets = completed
            .iter()
            .enumerate()
            .map(|(number, set)| FinishSet {
                set_number: (number + 1) as u32,
                weight: parse_metric(&set.weight),
                reps: parse_metric(&set.reps) as u32,
                rir: parse_metric(&set.rir),
            })
            .collect();
        exercises.push(FinishExercise {
            exercise_id: template_exercise.id,
            volume: compute_exercise_volume(exercise),
            sets,
        });
    }

    FinishSessionRequest {
        session_id: session.remote_session_id.clone(),
        workout_id: template.id,
        started_at: session.start_time.to_rfc3339(),
        exercises,
    }
}

/// Parse a raw user-entered field, treating anything non-numeric as zero.
pub fn parse_metric(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}

fn display_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_metric_treats_garbage_as_zero() {
        assert_eq!(parse_metric(""), 0.0);
        assert_eq!(parse_metric("abc"), 0.0);
        assert_eq!(parse_metric(" 12.5 "), 12.5);
        assert_eq!(parse_metric("10"), 10.0);
    }

    #[test]
    fn display_number_drops_trailing_zero_fraction() {
        assert_eq!(display_number(100.0), "100");
        assert_eq!(display_number(102.5), "102.5");
    }

    #[test]
    fn workout_key_is_prefix_plus_id() {
        assert_eq!(workout_key(42), "workout_42");
    }
}
