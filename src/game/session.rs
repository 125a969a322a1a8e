//! Scoring and health state machine.
//!
//! `Session` is the single writer of score, combo, health, the countdown and
//! the round status. Both periodic tasks (frame update and countdown) reach it
//! only through the transition functions below. A transition that ends the
//! round hands back [`Effect::StopClock`] exactly once; the caller is
//! responsible for pausing the playback clock in response.

use crate::config::GameplayConfig;
use crate::game::life::{self, MAX_HEALTH, MIN_HEALTH};
use crate::game::scheduler::{NoteEvent, NoteEventKind};
use log::info;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Loading,
    Idle,
    Playing,
    Paused,
    GameOver,
    Victory,
}

impl GameStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "LOADING",
            Self::Idle => "IDLE",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::GameOver => "GAME_OVER",
            Self::Victory => "VICTORY",
        }
    }

    #[inline(always)]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver | Self::Victory)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    StopClock,
}

#[derive(Clone, Debug)]
pub struct Session {
    score: u32,
    combo: u32,
    max_combo: u32,
    health: f32,
    time_remaining: u32,
    status: GameStatus,
}

impl Session {
    pub const fn new(time_limit_seconds: u32) -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            health: MAX_HEALTH,
            time_remaining: time_limit_seconds,
            status: GameStatus::Loading,
        }
    }

    #[inline(always)]
    pub const fn score(&self) -> u32 {
        self.score
    }

    #[inline(always)]
    pub const fn combo(&self) -> u32 {
        self.combo
    }

    #[inline(always)]
    pub const fn max_combo(&self) -> u32 {
        self.max_combo
    }

    #[inline(always)]
    pub const fn health(&self) -> f32 {
        self.health
    }

    #[inline(always)]
    pub const fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    #[inline(always)]
    pub const fn status(&self) -> GameStatus {
        self.status
    }

    #[inline(always)]
    pub fn display_health(&self) -> u32 {
        life::display_health(self.health)
    }

    /// Countdown as shown on the HUD, `m:ss`.
    pub fn countdown_label(&self) -> String {
        format!("{}:{:02}", self.time_remaining / 60, self.time_remaining % 60)
    }

    fn reset_fields(&mut self, cfg: &GameplayConfig) {
        self.score = 0;
        self.combo = 0;
        self.max_combo = 0;
        self.health = MAX_HEALTH;
        self.time_remaining = cfg.time_limit_seconds;
    }

    /// LOADING -> IDLE once the tracker reports ready. Returns true on transition.
    pub fn mark_tracking_ready(&mut self) -> bool {
        if self.status != GameStatus::Loading {
            return false;
        }
        self.status = GameStatus::Idle;
        info!("Hand tracking ready; waiting for start.");
        true
    }

    /// IDLE -> PLAYING with every field re-initialized. The caller checks the
    /// start preconditions and gets the clock running first.
    pub fn begin_round(&mut self, cfg: &GameplayConfig) -> bool {
        if self.status != GameStatus::Idle {
            return false;
        }
        self.reset_fields(cfg);
        self.status = GameStatus::Playing;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.status != GameStatus::Playing {
            return false;
        }
        self.status = GameStatus::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != GameStatus::Paused {
            return false;
        }
        self.status = GameStatus::Playing;
        true
    }

    /// Back to IDLE from a running, paused or finished round. LOADING and
    /// IDLE are left untouched.
    pub fn reset(&mut self, cfg: &GameplayConfig) -> bool {
        match self.status {
            GameStatus::Loading | GameStatus::Idle => false,
            GameStatus::Playing | GameStatus::Paused | GameStatus::GameOver | GameStatus::Victory => {
                self.reset_fields(cfg);
                self.status = GameStatus::Idle;
                true
            }
        }
    }

    /// Folds one hit or miss into the session. Events arriving outside
    /// PLAYING are ignored.
    pub fn apply(&mut self, event: &NoteEvent, cfg: &GameplayConfig) -> Option<Effect> {
        if self.status != GameStatus::Playing {
            return None;
        }
        match event.kind {
            NoteEventKind::Hit { .. } => {
                self.score = self.score.saturating_add(cfg.score_per_hit);
                self.combo = self.combo.saturating_add(1);
                self.max_combo = self.max_combo.max(self.combo);
                self.health = life::apply_life_change(self.health, cfg.health_per_hit.abs());
                None
            }
            NoteEventKind::Miss => {
                self.combo = 0;
                self.health = life::apply_life_change(self.health, -cfg.health_per_miss.abs());
                if self.health <= MIN_HEALTH {
                    self.health = MIN_HEALTH;
                    self.status = GameStatus::GameOver;
                    info!("Health depleted: GAME OVER.");
                    return Some(Effect::StopClock);
                }
                None
            }
        }
    }

    /// One second of the countdown. Only counts while PLAYING.
    pub fn countdown_tick(&mut self) -> Option<Effect> {
        if self.status != GameStatus::Playing {
            return None;
        }
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining == 0 {
            self.status = GameStatus::Victory;
            info!("Time is up: VICTORY.");
            return Some(Effect::StopClock);
        }
        None
    }

    #[cfg(test)]
    pub(crate) fn force_health(&mut self, health: f32) {
        self.health = health.clamp(MIN_HEALTH, MAX_HEALTH);
    }

    #[cfg(test)]
    pub(crate) fn force_time_remaining(&mut self, seconds: u32) {
        self.time_remaining = seconds;
    }
}
