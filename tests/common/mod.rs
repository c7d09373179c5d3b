#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use ironlog::api::{
    ApiError, CreateSessionResponse, FinishSessionRequest, PreviousExercise,
    PreviousSessionResponse, WorkoutApi,
};
use ironlog::models::{TemplateExercise, WorkoutTemplate};
use ironlog::store::{KeyValueStore, MemoryStore, StoreError};

/// Scripted fake of the coach API: fixed responses plus a call log.
#[derive(Default)]
pub struct ScriptedApi {
    pub fail_create: bool,
    pub fail_previous: bool,
    pub fail_finish: bool,
    pub previous: Vec<PreviousExercise>,
    created: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
    pub finished: Mutex<Vec<FinishSessionRequest>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_previous(previous: Vec<PreviousExercise>) -> Self {
        Self {
            previous,
            ..Self::default()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn failing_finish() -> Self {
        Self {
            fail_finish: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl WorkoutApi for ScriptedApi {
    async fn create_session(&self, workout_id: i64) -> Result<CreateSessionResponse, ApiError> {
        self.log(format!("create {workout_id}"));
        if self.fail_create {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CreateSessionResponse {
            status: "ok".to_string(),
            session_id: Some(format!("sess-{n}")),
        })
    }

    async fn previous_session(
        &self,
        workout_id: i64,
    ) -> Result<PreviousSessionResponse, ApiError> {
        self.log(format!("previous {workout_id}"));
        if self.fail_previous {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        Ok(PreviousSessionResponse {
            status: "ok".to_string(),
            previous_session_list: self.previous.clone(),
        })
    }

    async fn finish_session(&self, payload: &FinishSessionRequest) -> Result<(), ApiError> {
        self.log("finish".to_string());
        if self.fail_finish {
            return Err(ApiError::Status {
                status: 500,
                data: serde_json::json!({"detail": "boom"}),
            });
        }
        self.finished.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Key-value store that records the order of operations against it.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    pub ops: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyValueStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.ops.lock().unwrap().push(format!("set {key}={value}"));
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.ops.lock().unwrap().push(format!("remove {key}"));
        self.inner.remove(key).await
    }
}

/// Store whose every operation fails, for the swallowed-error paths.
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk unavailable")))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk unavailable")))
    }

    async fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk unavailable")))
    }
}

pub fn squat_template() -> WorkoutTemplate {
    WorkoutTemplate {
        id: 42,
        name: "Leg Day".to_string(),
        exercises_list: vec![TemplateExercise {
            id: 7,
            exercise_name: "Squat".to_string(),
            sets: Some(3),
            min_reps: Some(8),
            max_reps: Some(12),
            rest_seconds: None,
            observations: None,
        }],
    }
}

pub fn two_exercise_template() -> WorkoutTemplate {
    WorkoutTemplate {
        id: 42,
        name: "Push Day".to_string(),
        exercises_list: vec![
            TemplateExercise {
                id: 7,
                exercise_name: "Bench Press".to_string(),
                sets: Some(3),
                min_reps: Some(6),
                max_reps: Some(10),
                rest_seconds: Some(180),
                observations: None,
            },
            TemplateExercise {
                id: 9,
                exercise_name: "Overhead Press".to_string(),
                sets: None,
                min_reps: None,
                max_reps: None,
                rest_seconds: None,
                observations: Some("Strict form".to_string()),
            },
        ],
    }
}
