use chrono::{Duration, Local};

use ironlog::session::timer::{RestTick, SessionTimerEngine, format_remaining};

#[test]
fn one_countdown_at_a_time_across_the_whole_session() {
    let mut engine = SessionTimerEngine::new(Local::now());

    // First exercise rests at 120s, runs for a while...
    engine.start_rest_countdown("e1", 120);
    for _ in 0..30 {
        engine.tick();
    }
    assert_eq!(engine.remaining_seconds("e1"), Some(90));

    // ...then the user completes a set elsewhere. The old countdown is
    // cancelled and its display resets to its rest time, not to zero.
    engine.start_rest_countdown("e2", 60);
    assert_eq!(engine.active_exercise(), Some("e2"));
    assert_eq!(engine.remaining_seconds("e1"), Some(120));

    // The new countdown runs to completion and pins at zero.
    let mut last = RestTick::Idle;
    for _ in 0..60 {
        last = engine.tick();
    }
    assert_eq!(
        last,
        RestTick::Finished {
            exercise_id: "e2".to_string()
        }
    );
    assert_eq!(engine.active_exercise(), None);
    assert_eq!(engine.remaining_seconds("e2"), Some(0));
    assert_eq!(engine.remaining_display("e2").as_deref(), Some("0:00"));

    // A fresh countdown for the finished exercise replaces the pinned zero.
    engine.start_rest_countdown("e2", 60);
    assert_eq!(engine.remaining_seconds("e2"), Some(60));
}

#[test]
fn elapsed_and_remaining_use_their_own_formats() {
    let start = Local::now();
    let engine = SessionTimerEngine::new(start);

    // Elapsed is "{m}m {s}s", countdowns are "{m}:{ss}".
    assert_eq!(
        engine.elapsed_display(start + Duration::seconds(754)),
        "12m 34s"
    );
    assert_eq!(format_remaining(754), "12:34");
    assert_eq!(format_remaining(61), "1:01");
}

#[test]
fn zero_rest_time_completes_without_ticking() {
    let mut engine = SessionTimerEngine::new(Local::now());
    let tick = engine.start_rest_countdown("e1", 0);
    assert_eq!(
        tick,
        RestTick::Finished {
            exercise_id: "e1".to_string()
        }
    );
    assert_eq!(engine.tick(), RestTick::Idle);
}
