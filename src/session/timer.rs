use std::collections::HashMap;

use chrono::{DateTime, Local};

/// Notification text shown when a rest countdown completes.
pub const REST_FINISHED_MESSAGE: &str = "Rest finished! Time for the next set!";

/// What a single one-second tick produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestTick {
    Idle,
    Running { exercise_id: String, remaining: u32 },
    Finished { exercise_id: String },
}

#[derive(Debug, Clone)]
struct RestCountdown {
    exercise_id: String,
    /// Seconds the countdown was started with; cancelled countdowns reset
    /// their display to this value, not to zero.
    duration: u32,
    remaining: u32,
}

/// Wall-clock bookkeeping for one session: the elapsed-time display and at
/// most one rest countdown at a time. Pure state machine; the caller drives
/// it once per second and owns (and must cancel) the actual interval.
pub struct SessionTimerEngine {
    start_time: DateTime<Local>,
    active: Option<RestCountdown>,
    display: HashMap<String, u32>,
}

impl SessionTimerEngine {
    pub fn new(start_time: DateTime<Local>) -> Self {
        Self {
            start_time,
            active: None,
            display: HashMap::new(),
        }
    }

    /// Elapsed session time as `"{minutes}m {seconds}s"`, floored.
    pub fn elapsed_display(&self, now: DateTime<Local>) -> String {
        let total = (now - self.start_time).num_seconds().max(0);
        format!("{}m {}s", total / 60, total % 60)
    }

    /// Begin a countdown for `exercise_id`. Any running countdown (same or
    /// other exercise) is cancelled first and its display reset to its own
    /// start duration. A zero-second countdown completes immediately.
    pub fn start_rest_countdown(&mut self, exercise_id: &str, duration_seconds: u32) -> RestTick {
        if let Some(previous) = self.active.take() {
            self.display.insert(previous.exercise_id, previous.duration);
        }

        if duration_seconds == 0 {
            self.display.insert(exercise_id.to_string(), 0);
            return RestTick::Finished {
                exercise_id: exercise_id.to_string(),
            };
        }

        self.display
            .insert(exercise_id.to_string(), duration_seconds);
        self.active = Some(RestCountdown {
            exercise_id: exercise_id.to_string(),
            duration: duration_seconds,
            remaining: duration_seconds,
        });
        RestTick::Running {
            exercise_id: exercise_id.to_string(),
            remaining: duration_seconds,
        }
    }

    /// Advance the running countdown by one second. On completion the active
    /// marker is cleared and the display stays pinned at zero until a new
    /// countdown starts for that exercise.
    pub fn tick(&mut self) -> RestTick {
        let Some(countdown) = self.active.as_mut() else {
            return RestTick::Idle;
        };

        countdown.remaining -= 1;
        let remaining = countdown.remaining;
        let exercise_id = countdown.exercise_id.clone();
        self.display.insert(exercise_id.clone(), remaining);

        if remaining == 0 {
            self.active = None;
            RestTick::Finished { exercise_id }
        } else {
            RestTick::Running {
                exercise_id,
                remaining,
            }
        }
    }

    /// Cancel the running countdown, resetting its display to the countdown's
    /// start duration. No-op when idle.
    pub fn cancel_rest(&mut self) {
        if let Some(previous) = self.active.take() {
            self.display.insert(previous.exercise_id, previous.duration);
        }
    }

    pub fn active_exercise(&self) -> Option<&str> {
        self.active.as_ref().map(|c| c.exercise_id.as_str())
    }

    pub fn remaining_seconds(&self, exercise_id: &str) -> Option<u32> {
        self.display.get(exercise_id).copied()
    }

    pub fn remaining_display(&self, exercise_id: &str) -> Option<String> {
        self.remaining_seconds(exercise_id).map(format_remaining)
    }
}

/// Countdown rendering: `"{minutes}:{seconds two-digit}"`.
pub fn format_remaining(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn engine() -> SessionTimerEngine {
        SessionTimerEngine::new(Local::now())
    }

    #[test]
    fn elapsed_display_floors_both_components() {
        let start = Local::now();
        let engine = SessionTimerEngine::new(start);
        assert_eq!(engine.elapsed_display(start + Duration::seconds(0)), "0m 0s");
        assert_eq!(
            engine.elapsed_display(start + Duration::seconds(59)),
            "0m 59s"
        );
        assert_eq!(
            engine.elapsed_display(start + Duration::seconds(61)),
            "1m 1s"
        );
        assert_eq!(
            engine.elapsed_display(start + Duration::milliseconds(1500)),
            "0m 1s"
        );
    }

    #[test]
    fn countdown_runs_to_completion_and_pins_at_zero() {
        let mut engine = engine();
        engine.start_rest_countdown("e1", 3);

        assert_eq!(
            engine.tick(),
            RestTick::Running {
                exercise_id: "e1".to_string(),
                remaining: 2
            }
        );
        assert_eq!(
            engine.tick(),
            RestTick::Running {
                exercise_id: "e1".to_string(),
                remaining: 1
            }
        );
        assert_eq!(
            engine.tick(),
            RestTick::Finished {
                exercise_id: "e1".to_string()
            }
        );

        assert_eq!(engine.active_exercise(), None);
        assert_eq!(engine.remaining_seconds("e1"), Some(0));
        assert_eq!(engine.tick(), RestTick::Idle);
        assert_eq!(engine.remaining_seconds("e1"), Some(0));
    }

    #[test]
    fn starting_second_countdown_resets_first_to_its_rest_time() {
        let mut engine = engine();
        engine.start_rest_countdown("e1", 120);
        engine.tick();
        engine.tick();
        assert_eq!(engine.remaining_seconds("e1"), Some(118));

        engine.start_rest_countdown("e2", 60);
        assert_eq!(engine.remaining_seconds("e1"), Some(120));
        assert_eq!(engine.remaining_seconds("e2"), Some(60));
        assert_eq!(engine.active_exercise(), Some("e2"));
    }

    #[test]
    fn restarting_same_exercise_replaces_the_countdown() {
        let mut engine = engine();
        engine.start_rest_countdown("e1", 90);
        engine.tick();
        let tick = engine.start_rest_countdown("e1", 90);
        assert_eq!(
            tick,
            RestTick::Running {
                exercise_id: "e1".to_string(),
                remaining: 90
            }
        );
        assert_eq!(engine.remaining_seconds("e1"), Some(90));
    }

    #[test]
    fn zero_duration_fires_completion_immediately() {
        let mut engine = engine();
        let tick = engine.start_rest_countdown("e1", 0);
        assert_eq!(
            tick,
            RestTick::Finished {
                exercise_id: "e1".to_string()
            }
        );
        assert_eq!(engine.active_exercise(), None);
        assert_eq!(engine.remaining_seconds("e1"), Some(0));
    }

    #[test]
    fn cancel_resets_display_and_clears_active() {
        let mut engine = engine();
        engine.start_rest_countdown("e1", 45);
        engine.tick();
        engine.cancel_rest();
        assert_eq!(engine.active_exercise(), None);
        assert_eq!(engine.remaining_seconds("e1"), Some(45));
    }

    #[test]
    fn remaining_renders_minutes_and_two_digit_seconds() {
        assert_eq!(format_remaining(0), "0:00");
        assert_eq!(format_remaining(5), "0:05");
        assert_eq!(format_remaining(90), "1:30");
        assert_eq!(format_remaining(600), "10:00");
    }
}
