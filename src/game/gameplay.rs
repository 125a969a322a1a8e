use crate::config::GameplayConfig;
use crate::core::clock::{PlaybackClock, PlaybackError};
use crate::core::tracking::HandSnapshot;
use crate::game::chart::{self, Chart};
use crate::game::field;
use crate::game::judgment;
use crate::game::note::{Hand, NoteResult};
use crate::game::scheduler::{NoteEvent, NoteEventKind, Scheduler};
use crate::game::session::{Effect, GameStatus, Session};
use crate::game::stage_stats::RoundStats;
use glam::Vec3;
use log::{debug, info, warn};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum StartError {
    NotIdle(GameStatus),
    NoAudio,
    TrackingNotReady,
    Playback(PlaybackError),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotIdle(status) => write!(f, "cannot start from {status}"),
            Self::NoAudio => write!(f, "no audio track loaded"),
            Self::TrackingNotReady => write!(f, "hand tracking is not ready"),
            Self::Playback(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Playback(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoteLifecycle {
    Pending,
    Hit { elapsed: f32 },
    Missed,
}

/// What the renderer needs for one note this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteView {
    pub index: usize,
    pub id: String,
    pub hand: Hand,
    pub position: Vec3,
    pub lifecycle: NoteLifecycle,
}

pub struct State {
    pub cfg: GameplayConfig,
    pub chart: Arc<Chart>,
    pub scheduler: Scheduler,
    pub session: Session,
    pub stats: RoundStats,
    pub current_music_time: f32,
    log_timer: f32,
}

pub fn init(cfg: GameplayConfig) -> State {
    init_with_chart(cfg, chart::generate(cfg.bpm))
}

pub fn init_with_chart(cfg: GameplayConfig, chart: Chart) -> State {
    info!(
        "Initializing gameplay: {} notes at {:.1} BPM (last at {:.2}s), {}s time limit.",
        chart.len(),
        chart.bpm,
        chart.last_note_time().unwrap_or(0.0),
        cfg.time_limit_seconds
    );
    if chart.is_empty() {
        warn!("Chart has no notes; only the countdown can end the round.");
    }
    let scheduler = Scheduler::new(&chart);
    State {
        cfg,
        chart: Arc::new(chart),
        scheduler,
        session: Session::new(cfg.time_limit_seconds),
        stats: RoundStats::default(),
        current_music_time: 0.0,
        log_timer: 0.0,
    }
}

#[inline(always)]
pub fn mark_tracking_ready(state: &mut State) -> bool {
    state.session.mark_tracking_ready()
}

fn reset_round(state: &mut State) {
    state.scheduler.reset(&state.chart);
    state.stats = RoundStats::default();
    state.current_music_time = 0.0;
    state.log_timer = 0.0;
}

/// Starts a round from IDLE. Playback is requested before anything in the
/// session changes, so a rejected `play()` leaves the state untouched.
pub fn start(
    state: &mut State,
    clock: &mut dyn PlaybackClock,
    audio_loaded: bool,
    tracking_ready: bool,
) -> Result<(), StartError> {
    let status = state.session.status();
    if status != GameStatus::Idle {
        return Err(StartError::NotIdle(status));
    }
    if !audio_loaded {
        return Err(StartError::NoAudio);
    }
    if !tracking_ready {
        return Err(StartError::TrackingNotReady);
    }
    clock.rewind();
    if let Err(e) = clock.play() {
        warn!("Could not start playback: {e}");
        return Err(StartError::Playback(e));
    }
    reset_round(state);
    state.session.begin_round(&state.cfg);
    info!("Round started with {} notes.", state.chart.len());
    Ok(())
}

/// Flips PLAYING and PAUSED. Any other status is a no-op.
pub fn toggle_pause(state: &mut State, clock: &mut dyn PlaybackClock) -> Result<(), PlaybackError> {
    match state.session.status() {
        GameStatus::Playing => {
            clock.pause();
            state.session.pause();
            info!("Paused at {:.2}s.", clock.current_time());
        }
        GameStatus::Paused => {
            if let Err(e) = clock.play() {
                warn!("Could not resume playback: {e}");
                return Err(e);
            }
            state.session.resume();
            info!("Resumed at {:.2}s.", clock.current_time());
        }
        _ => {}
    }
    Ok(())
}

/// Returns to IDLE with the clock stopped at zero. Returns false when there
/// was nothing to reset.
pub fn reset(state: &mut State, clock: &mut dyn PlaybackClock) -> bool {
    if !state.session.reset(&state.cfg) {
        return false;
    }
    clock.pause();
    clock.rewind();
    reset_round(state);
    info!("Round reset.");
    true
}

fn apply_effect(state: &State, clock: &mut dyn PlaybackClock, effect: Effect) {
    match effect {
        Effect::StopClock => {
            clock.pause();
            info!(
                "Round ended with {} at {:.2}s.",
                state.session.status(),
                clock.current_time()
            );
        }
    }
}

// Returns false once the round is no longer PLAYING.
fn resolve_note(
    state: &mut State,
    clock: &mut dyn PlaybackClock,
    note_index: usize,
    result: NoteResult,
    events: &mut SmallVec<[NoteEvent; 4]>,
) -> bool {
    if state.session.status() != GameStatus::Playing {
        return false;
    }
    let Some(event) = state.scheduler.resolve(note_index, result) else {
        return true;
    };
    match event.kind {
        NoteEventKind::Hit { offset, .. } => {
            debug!(
                "HIT: {} ({}) offset {:+.1}ms",
                event.note_id,
                event.hand.as_str(),
                offset * 1000.0
            );
        }
        NoteEventKind::Miss => {
            info!(
                "MISSED: {} ({}) at {:.2}s",
                event.note_id,
                event.hand.as_str(),
                event.note_time
            );
        }
    }
    state.stats.record(&event);
    let effect = state.session.apply(&event, &state.cfg);
    events.push(event);
    if let Some(effect) = effect {
        apply_effect(state, clock, effect);
    }
    state.session.status() == GameStatus::Playing
}

/// One frame of gameplay: spawn, retire overdue notes, then test strikes
/// against `hands`. Does nothing unless the round is PLAYING. Returns the
/// events produced this frame in resolution order.
pub fn update(
    state: &mut State,
    clock: &mut dyn PlaybackClock,
    hands: &HandSnapshot,
    delta_time: f32,
) -> SmallVec<[NoteEvent; 4]> {
    let mut events = SmallVec::new();
    if state.session.status() != GameStatus::Playing {
        return events;
    }
    let music_time = clock.current_time();
    state.current_music_time = music_time;
    let cfg = state.cfg;

    state.scheduler.spawn_due(music_time, &cfg);

    for note_index in state.scheduler.overdue(music_time, &cfg) {
        if !resolve_note(state, clock, note_index, NoteResult::Missed, &mut events) {
            return events;
        }
    }

    let struck = judgment::find_strikes(&state.scheduler, hands, music_time, &cfg);
    for note_index in struck {
        let hit = NoteResult::Hit {
            hit_time: music_time,
        };
        if !resolve_note(state, clock, note_index, hit, &mut events) {
            return events;
        }
    }

    state.log_timer += delta_time;
    if state.log_timer >= 1.0 {
        info!(
            "Time: {:.2}, Score: {}, Combo: {}, Health: {:.1}, Remaining: {}, Active Notes: {}, Spawned: {}/{}",
            music_time,
            state.session.score(),
            state.session.combo(),
            state.session.health(),
            state.session.countdown_label(),
            state.scheduler.active_len(),
            state.scheduler.next_spawn_index(),
            state.chart.len()
        );
        state.log_timer -= 1.0;
    }
    events
}

/// One tick of the one-second countdown task. Returns true if the round
/// ended on this tick.
pub fn countdown_tick(state: &mut State, clock: &mut dyn PlaybackClock) -> bool {
    match state.session.countdown_tick() {
        Some(effect) => {
            apply_effect(state, clock, effect);
            true
        }
        None => false,
    }
}

/// Notes inside the visibility window at the last sampled time. Hit notes
/// stay visible briefly after the strike.
pub fn visible_notes(state: &State) -> Vec<NoteView> {
    let cfg = &state.cfg;
    let now = state.current_music_time;
    let window = cfg.visible_window_seconds;
    let notes = state.scheduler.notes();
    let first = notes.partition_point(|n| n.time <= now - window);

    let mut out = Vec::new();
    for (index, note) in notes.iter().enumerate().skip(first) {
        if note.time - now >= window {
            break;
        }
        let lifecycle = if let Some(hit_time) = note.hit_time() {
            let elapsed = now - hit_time;
            if elapsed >= cfg.hit_linger_seconds {
                continue;
            }
            NoteLifecycle::Hit { elapsed }
        } else if note.result().is_some() {
            NoteLifecycle::Missed
        } else {
            NoteLifecycle::Pending
        };
        out.push(NoteView {
            index,
            id: note.id.clone(),
            hand: note.hand,
            position: field::note_position(note, now, cfg),
            lifecycle,
        });
    }
    out
}
