use std::fs;
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{HttpWorkoutApi, OfflineApi, WorkoutApi};
use crate::cli::SessionCmd;
use crate::config::Config;
use crate::models::{WorkoutSession, WorkoutTemplate};
use crate::session::coordinator::{
    self, SessionError, SetField, WorkoutSessionCoordinator, compute_exercise_volume,
    compute_session_volume, count_completed_sets,
};
use crate::session::resume::PendingResumeSlot;
use crate::session::timer::{self, RestTick, SessionTimerEngine};
use crate::store::KeyValueStore;

const ACTIVE_SESSION_KEY: &str = "active_session";

/// What the CLI keeps between invocations: the session model plus the
/// template it was built from (needed for merge/finish/cache keys).
#[derive(Debug, Serialize, Deserialize)]
struct ActiveState {
    template: WorkoutTemplate,
    session: WorkoutSession,
}

pub async fn handle(cmd: SessionCmd, store: Arc<dyn KeyValueStore>, json: bool) -> Result<()> {
    match cmd {
        SessionCmd::Start { template } => start(&template, store).await,
        SessionCmd::Show => show(store, json).await,
        SessionCmd::Edit {
            exercise,
            set,
            weight,
            reps,
            rir,
        } => edit(store, &exercise, set, weight, reps, rir).await,
        SessionCmd::Done {
            exercise,
            set,
            no_timer,
        } => done(store, &exercise, set, no_timer).await,
        SessionCmd::AddSet { exercise } => add_set(store, &exercise).await,
        SessionCmd::Rest { exercise, seconds } => rest(store, &exercise, seconds).await,
        SessionCmd::Note { exercise, note } => note_cmd(store, &exercise, &note).await,
        SessionCmd::Timer { watch } => timer_cmd(store, watch).await,
        SessionCmd::Minimize => minimize(store).await,
        SessionCmd::Resume => resume(store).await,
        SessionCmd::Finish => finish(store).await,
        SessionCmd::Discard => discard(store).await,
        SessionCmd::Reset => reset(store).await,
    }
}

async fn start(template_path: &str, store: Arc<dyn KeyValueStore>) -> Result<()> {
    if load_active(store.as_ref()).await.is_some() {
        println!(
            "{} there is already an active session; `session finish` or `session discard` it first",
            "error:".red().bold()
        );
        return Ok(());
    }

    let raw = match fs::read_to_string(template_path) {
        Ok(raw) => raw,
        Err(err) => {
            println!(
                "{} could not read template `{}`: {}",
                "error:".red().bold(),
                template_path,
                err
            );
            return Ok(());
        }
    };
    let template: WorkoutTemplate = match toml::from_str(&raw) {
        Ok(template) => template,
        Err(err) => {
            println!(
                "{} invalid template `{}`: {}",
                "error:".red().bold(),
                template_path,
                err
            );
            return Ok(());
        }
    };

    let mut coordinator = WorkoutSessionCoordinator::new(build_api(), store.clone());
    if let Err(err) = coordinator.initialize_session(&template) {
        println!("{} {}", "error:".red().bold(), err);
        return Ok(());
    }

    // Best effort: a failed create or fetch leaves the session in degraded
    // mode with no remote id and no previous-set references.
    coordinator.sync_remote(&template).await;

    let session = coordinator
        .session()
        .cloned()
        .expect("session exists after initialization");
    let degraded = session.remote_session_id.is_none();

    println!("{}", "Exercises:".cyan().bold());
    for (i, exercise) in session.exercises.iter().enumerate() {
        let idx = format!("{}", i + 1).yellow();
        println!(
            "{} • {} — {} sets ({}-{} reps, rest {})",
            idx,
            exercise.name.bold(),
            exercise.target_sets,
            exercise.target_min_reps,
            exercise.target_max_reps,
            timer::format_remaining(exercise.rest_seconds)
        );
        if let Some(observations) = &exercise.observations {
            println!("    {}", observations.dimmed());
        }
    }

    save_active(
        store.as_ref(),
        &ActiveState {
            template,
            session,
        },
    )
    .await;

    println!("\n{} session started", "ok:".green().bold());
    if degraded {
        println!(
            "{} server unreachable; tracking locally without previous-session data",
            "note:".yellow().bold()
        );
    }

    let slot = PendingResumeSlot::new(store);
    if slot.peek().await.is_some() {
        println!(
            "{} a minimized workout is still pending (`session resume` picks it up later)",
            "note:".yellow().bold()
        );
    }

    Ok(())
}

async fn show(store: Arc<dyn KeyValueStore>, json: bool) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state.session)?);
        return Ok(());
    }

    let engine = SessionTimerEngine::new(state.session.start_time);
    println!(
        "{} {} (started {}, elapsed {})",
        "Session:".cyan().bold(),
        state.session.name.bold(),
        state.session.start_time.format("%H:%M"),
        engine.elapsed_display(Local::now())
    );

    println!("\n{}", "Exercises:".cyan().bold());

    // Pre-render the previous-session column so current values line up.
    let prev_columns: Vec<Vec<String>> = state
        .session
        .exercises
        .iter()
        .map(|exercise| {
            exercise
                .sets
                .iter()
                .map(|set| match (&set.previous_weight, &set.previous_reps) {
                    (Some(weight), Some(reps)) => {
                        let rir = set
                            .previous_rir
                            .as_deref()
                            .map(|r| format!(" @{r}"))
                            .unwrap_or_default();
                        format!("prev {}kg × {}{}", weight, reps, rir)
                    }
                    _ => String::new(),
                })
                .collect()
        })
        .collect();
    let prev_width = prev_columns
        .iter()
        .flat_map(|sets| sets.iter().map(|s| s.len()))
        .max()
        .unwrap_or(0);

    for (i, exercise) in state.session.exercises.iter().enumerate() {
        let idx = format!("{}", i + 1).yellow();
        println!(
            "{} • {} — rest {}",
            idx,
            exercise.name.bold(),
            timer::format_remaining(exercise.rest_seconds).dimmed()
        );

        for (set_index, set) in exercise.sets.iter().enumerate() {
            let set_num = format!("{}", set_index + 1).yellow();
            let current = if set.weight.is_empty() && set.reps.is_empty() {
                "·".dimmed().to_string()
            } else {
                let rir = if set.rir.is_empty() {
                    String::new()
                } else {
                    format!(" @RIR {}", set.rir)
                };
                format!("{}kg × {}{}", set.weight, set.reps, rir)
            };
            let mark = if set.completed {
                "✓".green().to_string()
            } else {
                " ".to_string()
            };
            let prev = format!("{:<width$}", prev_columns[i][set_index], width = prev_width)
                .dimmed();
            println!("    {} • {} | {} {}", set_num, prev, current, mark);
        }

        let volume = compute_exercise_volume(exercise);
        if volume > 0.0 {
            println!("    {}", format!("volume: {} kg", format_volume(volume)).dimmed());
        }
        if !exercise.notes.is_empty() {
            println!("    {}", format!("note: {}", exercise.notes).dimmed());
        }
        println!();
    }

    println!(
        "{} {} completed sets, {} kg total volume",
        "Totals:".cyan().bold(),
        count_completed_sets(&state.session),
        format_volume(compute_session_volume(&state.session))
    );

    Ok(())
}

async fn edit(
    store: Arc<dyn KeyValueStore>,
    exercise: &str,
    set: Option<usize>,
    weight: Option<String>,
    reps: Option<String>,
    rir: Option<String>,
) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };

    let Some(exercise_id) = resolve_exercise(&state.session, exercise) else {
        println!(
            "{} no exercise `{}` in the current session",
            "error:".red().bold(),
            exercise
        );
        return Ok(());
    };
    let Some((set_id, set_number)) = resolve_set(&state.session, &exercise_id, set) else {
        println!("{} no such set", "error:".red().bold());
        return Ok(());
    };

    if weight.is_none() && reps.is_none() && rir.is_none() {
        println!(
            "{} nothing to update; pass --weight, --reps, or --rir",
            "warning:".yellow().bold()
        );
        return Ok(());
    }

    let template = state.template.clone();
    let mut coordinator =
        WorkoutSessionCoordinator::restore(build_api(), store.clone(), state.session);
    let updates = [
        (SetField::Weight, weight),
        (SetField::Reps, reps),
        (SetField::Rir, rir),
    ];
    for (field, value) in updates {
        if let Some(value) = value {
            coordinator.update_set_field(&exercise_id, &set_id, field, &value)?;
        }
    }

    let session = coordinator.session().cloned().expect("session still active");
    let exercise_name = session
        .exercises
        .iter()
        .find(|e| e.id == exercise_id)
        .map(|e| e.name.clone())
        .unwrap_or_default();
    save_active(store.as_ref(), &ActiveState { template, session }).await;

    println!(
        "{} updated set {} of {}",
        "ok:".green().bold(),
        set_number,
        exercise_name.bold()
    );
    Ok(())
}

async fn done(
    store: Arc<dyn KeyValueStore>,
    exercise: &str,
    set: usize,
    no_timer: bool,
) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };

    let Some(exercise_id) = resolve_exercise(&state.session, exercise) else {
        println!(
            "{} no exercise `{}` in the current session",
            "error:".red().bold(),
            exercise
        );
        return Ok(());
    };
    let Some((set_id, set_number)) = resolve_set(&state.session, &exercise_id, Some(set)) else {
        println!("{} no such set", "error:".red().bold());
        return Ok(());
    };

    let template = state.template.clone();
    let mut coordinator =
        WorkoutSessionCoordinator::restore(build_api(), store.clone(), state.session);
    let completed = coordinator.toggle_set_completion(&exercise_id, &set_id)?;

    let session = coordinator.session().cloned().expect("session still active");
    let rest_seconds = session
        .exercises
        .iter()
        .find(|e| e.id == exercise_id)
        .map(|e| e.rest_seconds)
        .unwrap_or(coordinator::DEFAULT_REST_SECONDS);
    let start_time = session.start_time;

    // Persist before the countdown so an interrupt cannot lose the toggle.
    save_active(store.as_ref(), &ActiveState { template, session }).await;

    if !completed {
        println!("{} set {} reopened", "ok:".green().bold(), set_number);
        return Ok(());
    }

    println!("{} set {} completed", "ok:".green().bold(), set_number);
    if no_timer {
        return Ok(());
    }

    run_rest_countdown(start_time, &exercise_id, rest_seconds).await;
    Ok(())
}

/// Drive the rest countdown to completion or ctrl-c. The interval handle
/// lives in this scope only, so leaving it always stops the ticking.
async fn run_rest_countdown(
    start_time: chrono::DateTime<Local>,
    exercise_id: &str,
    rest_seconds: u32,
) {
    let mut engine = SessionTimerEngine::new(start_time);

    if let RestTick::Finished { .. } = engine.start_rest_countdown(exercise_id, rest_seconds) {
        println!("{}", timer::REST_FINISHED_MESSAGE.green().bold());
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.tick().await; // first tick is immediate

    render_countdown(&engine, exercise_id);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine.tick() {
                    RestTick::Running { .. } => render_countdown(&engine, exercise_id),
                    RestTick::Finished { .. } => {
                        println!("\r{}          ", timer::REST_FINISHED_MESSAGE.green().bold());
                        break;
                    }
                    RestTick::Idle => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                engine.cancel_rest();
                println!(
                    "\n{} rest cancelled (display resets to {})",
                    "note:".yellow().bold(),
                    engine.remaining_display(exercise_id).unwrap_or_default()
                );
                break;
            }
        }
    }
}

fn render_countdown(engine: &SessionTimerEngine, exercise_id: &str) {
    let remaining = engine.remaining_display(exercise_id).unwrap_or_default();
    print!(
        "\r  resting {}  (elapsed {})  ",
        remaining.bold(),
        engine.elapsed_display(Local::now()).dimmed()
    );
    let _ = std::io::stdout().flush();
}

async fn add_set(store: Arc<dyn KeyValueStore>, exercise: &str) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };
    let Some(exercise_id) = resolve_exercise(&state.session, exercise) else {
        println!(
            "{} no exercise `{}` in the current session",
            "error:".red().bold(),
            exercise
        );
        return Ok(());
    };

    let template = state.template.clone();
    let mut coordinator =
        WorkoutSessionCoordinator::restore(build_api(), store.clone(), state.session);
    coordinator.append_set(&exercise_id)?;

    let session = coordinator.session().cloned().expect("session still active");
    let (name, count) = session
        .exercises
        .iter()
        .find(|e| e.id == exercise_id)
        .map(|e| (e.name.clone(), e.sets.len()))
        .unwrap_or_default();
    save_active(store.as_ref(), &ActiveState { template, session }).await;

    println!(
        "{} added set {} to {}",
        "ok:".green().bold(),
        count,
        name.bold()
    );
    Ok(())
}

async fn rest(store: Arc<dyn KeyValueStore>, exercise: &str, seconds: u32) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };
    let Some(exercise_id) = resolve_exercise(&state.session, exercise) else {
        println!(
            "{} no exercise `{}` in the current session",
            "error:".red().bold(),
            exercise
        );
        return Ok(());
    };

    let template = state.template.clone();
    let mut coordinator =
        WorkoutSessionCoordinator::restore(build_api(), store.clone(), state.session);
    coordinator.set_exercise_rest_time(&exercise_id, seconds)?;

    let session = coordinator.session().cloned().expect("session still active");
    save_active(store.as_ref(), &ActiveState { template, session }).await;

    println!(
        "{} rest time set to {}",
        "ok:".green().bold(),
        timer::format_remaining(seconds)
    );
    Ok(())
}

async fn note_cmd(store: Arc<dyn KeyValueStore>, exercise: &str, note: &str) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };
    let Some(exercise_id) = resolve_exercise(&state.session, exercise) else {
        println!(
            "{} no exercise `{}` in the current session",
            "error:".red().bold(),
            exercise
        );
        return Ok(());
    };

    let template = state.template.clone();
    let mut coordinator =
        WorkoutSessionCoordinator::restore(build_api(), store.clone(), state.session);
    coordinator.set_exercise_notes(&exercise_id, note)?;

    let session = coordinator.session().cloned().expect("session still active");
    save_active(store.as_ref(), &ActiveState { template, session }).await;

    println!("{} note saved", "ok:".green().bold());
    Ok(())
}

async fn timer_cmd(store: Arc<dyn KeyValueStore>, watch: bool) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };

    let engine = SessionTimerEngine::new(state.session.start_time);
    if !watch {
        println!(
            "{} {}",
            "Elapsed:".cyan().bold(),
            engine.elapsed_display(Local::now())
        );
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                print!(
                    "\r{} {}   ",
                    "Elapsed:".cyan().bold(),
                    engine.elapsed_display(Local::now())
                );
                let _ = std::io::stdout().flush();
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }
    Ok(())
}

async fn minimize(store: Arc<dyn KeyValueStore>) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };

    let template = state.template.clone();
    let mut coordinator =
        WorkoutSessionCoordinator::restore(build_api(), store.clone(), state.session);
    let pending = coordinator.minimize(&template)?;

    let slot = PendingResumeSlot::new(store.clone());
    slot.show(&pending).await;
    clear_active(store.as_ref()).await;

    println!(
        "{} session minimized; `session resume` continues it",
        "ok:".green().bold()
    );
    println!(
        "{} set entries do not survive the round-trip, only the clock does",
        "note:".yellow().bold()
    );
    Ok(())
}

async fn resume(store: Arc<dyn KeyValueStore>) -> Result<()> {
    if load_active(store.as_ref()).await.is_some() {
        println!(
            "{} there is already an active session; finish or discard it first",
            "error:".red().bold()
        );
        return Ok(());
    }

    let slot = PendingResumeSlot::new(store.clone());
    let Some(pending) = slot.peek().await else {
        println!("{} no minimized workout to resume", "error:".red().bold());
        return Ok(());
    };

    let mut coordinator = WorkoutSessionCoordinator::new(build_api(), store.clone());
    if let Err(err) = coordinator.resume(&pending) {
        println!("{} {}", "error:".red().bold(), err);
        return Ok(());
    }
    slot.hide().await;

    let session = coordinator.session().cloned().expect("session resumed");
    let elapsed = SessionTimerEngine::new(session.start_time).elapsed_display(Local::now());
    save_active(
        store.as_ref(),
        &ActiveState {
            template: pending.template,
            session,
        },
    )
    .await;

    println!(
        "{} session resumed (elapsed {})",
        "ok:".green().bold(),
        elapsed
    );
    Ok(())
}

async fn finish(store: Arc<dyn KeyValueStore>) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session", "error:".red().bold());
        return Ok(());
    };

    // Exercises with no completed set never reach the server; say so before
    // sending instead of dropping them silently.
    let dropped: Vec<&str> = state
        .session
        .exercises
        .iter()
        .filter(|e| e.sets.iter().all(|s| !s.completed))
        .map(|e| e.name.as_str())
        .collect();
    if !dropped.is_empty() {
        println!(
            "{} no completed sets for {}; they will not be saved",
            "note:".yellow().bold(),
            dropped.join(", ")
        );
    }

    let template = state.template.clone();
    let start_time = state.session.start_time;
    let completed = count_completed_sets(&state.session);
    let volume = compute_session_volume(&state.session);

    let mut coordinator =
        WorkoutSessionCoordinator::restore(build_api(), store.clone(), state.session);
    match coordinator.finish(&template).await {
        Ok(_) => {
            clear_active(store.as_ref()).await;
            let duration = Local::now() - start_time;
            println!("{} session finished", "ok:".green().bold());
            println!(
                "{} {} — {} completed sets, {} kg volume in {}m",
                "Session:".cyan().bold(),
                template.name.bold(),
                completed,
                format_volume(volume),
                duration.num_minutes()
            );
        }
        Err(SessionError::Finish(err)) => {
            println!(
                "{} could not save the session: {}",
                "error:".red().bold(),
                err
            );
            println!(
                "{} your progress is kept; run `session finish` again to retry",
                "note:".yellow().bold()
            );
        }
        Err(err) => println!("{} {}", "error:".red().bold(), err),
    }

    Ok(())
}

async fn discard(store: Arc<dyn KeyValueStore>) -> Result<()> {
    let Some(state) = load_active(store.as_ref()).await else {
        println!("{} no active session to discard", "error:".red().bold());
        return Ok(());
    };

    let template = state.template.clone();
    let mut coordinator =
        WorkoutSessionCoordinator::restore(build_api(), store.clone(), state.session);
    let slot = PendingResumeSlot::new(store.clone());
    coordinator.discard(&template, &slot).await;
    clear_active(store.as_ref()).await;

    println!("{} session discarded", "ok:".green().bold());
    Ok(())
}

async fn reset(store: Arc<dyn KeyValueStore>) -> Result<()> {
    let workout_id = load_active(store.as_ref())
        .await
        .map(|state| state.template.id);

    let mut coordinator = WorkoutSessionCoordinator::new(build_api(), store.clone());
    coordinator.reset(workout_id).await;

    let slot = PendingResumeSlot::new(store.clone());
    slot.discard().await;
    clear_active(store.as_ref()).await;

    println!("{} local session state cleared", "ok:".green().bold());
    Ok(())
}

//
// Helpers
//

fn build_api() -> Arc<dyn WorkoutApi> {
    let config = Config::load_default();
    match config.api_url() {
        Some(url) => Arc::new(HttpWorkoutApi::new(url, config.api_token())),
        None => Arc::new(OfflineApi),
    }
}

/// Accept a 1-based display index, an exercise id, or a name.
fn resolve_exercise(session: &WorkoutSession, raw: &str) -> Option<String> {
    if let Ok(index) = raw.parse::<usize>() {
        if index >= 1 {
            return session.exercises.get(index - 1).map(|e| e.id.clone());
        }
        return None;
    }
    session
        .exercises
        .iter()
        .find(|e| e.id == raw || e.name.eq_ignore_ascii_case(raw))
        .map(|e| e.id.clone())
}

/// Pick a set by 1-based number, or default to the first blank set
/// (falling back to the last one). Returns the id and the display number.
fn resolve_set(
    session: &WorkoutSession,
    exercise_id: &str,
    set: Option<usize>,
) -> Option<(String, usize)> {
    let exercise = session.exercises.iter().find(|e| e.id == exercise_id)?;
    match set {
        Some(number) => {
            if number < 1 {
                return None;
            }
            exercise
                .sets
                .get(number - 1)
                .map(|s| (s.id.clone(), number))
        }
        None => exercise
            .sets
            .iter()
            .position(|s| s.is_blank())
            .or_else(|| exercise.sets.len().checked_sub(1))
            .map(|index| (exercise.sets[index].id.clone(), index + 1)),
    }
}

fn format_volume(volume: f64) -> String {
    if volume.fract() == 0.0 {
        format!("{:.0}", volume)
    } else {
        format!("{:.1}", volume)
    }
}

async fn load_active(store: &dyn KeyValueStore) -> Option<ActiveState> {
    let raw = match store.get(ACTIVE_SESSION_KEY).await {
        Ok(raw) => raw?,
        Err(err) => {
            warn!("could not read active session: {err}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!("discarding unreadable active session: {err}");
            None
        }
    }
}

async fn save_active(store: &dyn KeyValueStore, state: &ActiveState) {
    let encoded = match serde_json::to_string(state) {
        Ok(encoded) => encoded,
        Err(err) => {
            warn!("could not encode active session: {err}");
            return;
        }
    };
    if let Err(err) = store.set(ACTIVE_SESSION_KEY, &encoded).await {
        warn!("could not persist active session: {err}");
    }
}

async fn clear_active(store: &dyn KeyValueStore) {
    if let Err(err) = store.remove(ACTIVE_SESSION_KEY).await {
        warn!("could not clear active session: {err}");
    }
}
