use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors surfaced by the coach API client.
/// Non-2xx responses carry the status code and whatever body the server sent.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("server returned {status}: {data}")]
    Status { status: u16, data: Value },
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    pub status: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviousSessionResponse {
    pub status: String,
    #[serde(default)]
    pub previous_session_list: Vec<PreviousExercise>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviousExercise {
    pub exercise_id: i64,
    #[serde(default)]
    pub sets: Vec<PreviousSet>,
}

/// Historical per-set data, matched to current sets by 1-based `set_number`.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviousSet {
    pub set_number: u32,
    pub reps_done: Option<u32>,
    pub reps_in_reserve: Option<f64>,
    pub weight: Option<f64>,
}

/// Payload sent when a session is finished. Only completed sets are included,
/// renumbered 1..n; exercises without a completed set are absent entirely.
#[derive(Debug, Clone, Serialize)]
pub struct FinishSessionRequest {
    pub session_id: Option<String>,
    pub workout_id: i64,
    pub started_at: String,
    pub exercises: Vec<FinishExercise>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinishExercise {
    pub exercise_id: i64,
    pub volume: f64,
    pub sets: Vec<FinishSet>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinishSet {
    pub set_number: u32,
    pub weight: f64,
    pub reps: u32,
    pub rir: f64,
}

/// The three coach-API endpoints the session lifecycle needs.
/// Kept as a trait so commands and tests can run against fakes.
#[async_trait]
pub trait WorkoutApi: Send + Sync {
    async fn create_session(&self, workout_id: i64) -> Result<CreateSessionResponse, ApiError>;
    async fn previous_session(
        &self,
        workout_id: i64,
    ) -> Result<PreviousSessionResponse, ApiError>;
    async fn finish_session(&self, payload: &FinishSessionRequest) -> Result<(), ApiError>;
}

/// reqwest-backed client for the coach API.
pub struct HttpWorkoutApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpWorkoutApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn prepare(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(REQUEST_TIMEOUT);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.prepare(builder).send().await?;
        let status = response.status();
        if !status.is_success() {
            let data = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(ApiError::Status {
                status: status.as_u16(),
                data,
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// Like `execute`, but only the status code matters.
    async fn execute_unit(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        let response = self.prepare(builder).send().await?;
        let status = response.status();
        if !status.is_success() {
            let data = response.json::<Value>().await.unwrap_or(Value::Null);
            return Err(ApiError::Status {
                status: status.as_u16(),
                data,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WorkoutApi for HttpWorkoutApi {
    async fn create_session(&self, workout_id: i64) -> Result<CreateSessionResponse, ApiError> {
        let url = self.url(&format!("workouts/{workout_id}/sessions"));
        self.execute(self.client.post(url)).await
    }

    async fn previous_session(
        &self,
        workout_id: i64,
    ) -> Result<PreviousSessionResponse, ApiError> {
        let url = self.url(&format!("workouts/{workout_id}/sessions/previous"));
        self.execute(self.client.get(url)).await
    }

    async fn finish_session(&self, payload: &FinishSessionRequest) -> Result<(), ApiError> {
        let url = self.url("sessions/finish");
        self.execute_unit(self.client.post(url).json(payload)).await
    }
}

/// Stand-in used when no API endpoint is configured. Every call fails as a
/// transport error, which the lifecycle treats as degraded mode.
pub struct OfflineApi;

#[async_trait]
impl WorkoutApi for OfflineApi {
    async fn create_session(&self, _workout_id: i64) -> Result<CreateSessionResponse, ApiError> {
        Err(offline())
    }

    async fn previous_session(
        &self,
        _workout_id: i64,
    ) -> Result<PreviousSessionResponse, ApiError> {
        Err(offline())
    }

    async fn finish_session(&self, _payload: &FinishSessionRequest) -> Result<(), ApiError> {
        Err(offline())
    }
}

fn offline() -> ApiError {
    ApiError::Transport(
        "no API endpoint configured; run `ironlog config set api_url <URL>`".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_payload_serializes_wire_field_names() {
        let payload = FinishSessionRequest {
            session_id: Some("abc".to_string()),
            workout_id: 42,
            started_at: "2026-08-07T10:00:00+00:00".to_string(),
            exercises: vec![FinishExercise {
                exercise_id: 7,
                volume: 1000.0,
                sets: vec![FinishSet {
                    set_number: 1,
                    weight: 100.0,
                    reps: 10,
                    rir: 2.0,
                }],
            }],
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["workout_id"], 42);
        assert_eq!(value["exercises"][0]["exercise_id"], 7);
        assert_eq!(value["exercises"][0]["sets"][0]["set_number"], 1);
        assert_eq!(value["exercises"][0]["sets"][0]["weight"], 100.0);
    }

    #[test]
    fn previous_session_response_tolerates_missing_list() {
        let parsed: PreviousSessionResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(parsed.previous_session_list.is_empty());
    }
}
