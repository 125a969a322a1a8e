//! Scripted stand-in for a camera hand-tracking pipeline.
//!
//! The bot reads the published playback time, swings each hand through the
//! next note assigned to it so the hand meets the note at the strike plane,
//! and reports samples at its own cadence. Positional jitter, random sample
//! dropout and a share of deliberately ignored notes keep the feed as noisy as
//! a real tracker.

use crate::config::{Config, GameplayConfig};
use crate::core::clock::SharedMusicTime;
use crate::core::tracking::{HandSnapshot, TrackingMessage, TrackingSource, VelocityEstimator};
use crate::game::chart::Chart;
use crate::game::field;
use crate::game::note::{Hand, Note};
use glam::Vec3;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

// Seconds before a note's time at which the swing starts.
const SWING_LEAD: f32 = 0.4;
// Seconds after a note's time during which the hand stays on it.
const FOLLOW_THROUGH: f32 = 0.08;
// Depth range the hand will reach into around the strike plane.
const REACH: f32 = 0.5;
const VELOCITY_SMOOTHING: f32 = 0.6;

const LEFT_REST: Vec3 = Vec3::new(-0.7, 1.2, 0.6);
const RIGHT_REST: Vec3 = Vec3::new(0.7, 1.2, 0.6);

#[inline(always)]
fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

#[derive(Clone, Copy, Debug)]
pub struct SimSettings {
    pub rate_hz: u32,
    pub jitter: f32,
    pub dropout: f32,
    pub miss_rate: f32,
    pub seed: u64,
    pub warmup: Duration,
}

impl SimSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            rate_hz: cfg.tracker_rate,
            jitter: finite_or_zero(cfg.tracker_jitter).max(0.0),
            dropout: finite_or_zero(cfg.tracker_dropout).clamp(0.0, 1.0),
            miss_rate: finite_or_zero(cfg.tracker_miss_rate).clamp(0.0, 1.0),
            seed: cfg.tracker_seed,
            warmup: Duration::from_millis(cfg.tracker_warmup_ms),
        }
    }
}

pub struct SimulatedTracker {
    chart: Arc<Chart>,
    gameplay: GameplayConfig,
    music_time: SharedMusicTime,
    settings: SimSettings,
    rng: StdRng,
    // Indexed like `chart.notes()`; true means the bot lets the note through.
    ignored: Vec<bool>,
    left_velocity: VelocityEstimator,
    right_velocity: VelocityEstimator,
}

impl SimulatedTracker {
    pub fn new(
        chart: Arc<Chart>,
        gameplay: GameplayConfig,
        music_time: SharedMusicTime,
        settings: SimSettings,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let ignored = chart
            .notes()
            .iter()
            .map(|_| rng.random_bool(f64::from(settings.miss_rate)))
            .collect();
        Self {
            chart,
            gameplay,
            music_time,
            settings,
            rng,
            ignored,
            left_velocity: VelocityEstimator::new(VELOCITY_SMOOTHING),
            right_velocity: VelocityEstimator::new(VELOCITY_SMOOTHING),
        }
    }

    pub fn ignored_count(&self) -> usize {
        self.ignored.iter().filter(|&&skip| skip).count()
    }

    /// Next note the bot intends to strike with `hand`.
    fn target(&self, hand: Hand, music_time: f32) -> Option<&Note> {
        let notes = self.chart.notes();
        let first = notes.partition_point(|n| n.time < music_time - FOLLOW_THROUGH);
        notes[first..]
            .iter()
            .enumerate()
            .find(|(offset, n)| n.hand == hand && !self.ignored[first + offset])
            .map(|(_, n)| n)
    }

    /// Noise-free hand position at `music_time`.
    fn aim(&self, hand: Hand, music_time: f32) -> Vec3 {
        let rest = match hand {
            Hand::Left => LEFT_REST,
            Hand::Right => RIGHT_REST,
        };
        let Some(note) = self.target(hand, music_time) else {
            return rest;
        };
        let until = note.time - music_time;
        if until > SWING_LEAD {
            return rest;
        }
        let cfg = &self.gameplay;
        let mut on_note = field::strike_point(note, cfg);
        on_note.z = field::depth_at(note.time, music_time, cfg)
            .clamp(cfg.strike_z - REACH, cfg.strike_z + REACH);
        let progress = (1.0 - until / SWING_LEAD).clamp(0.0, 1.0);
        rest.lerp(on_note, progress)
    }

    fn jitter(&mut self) -> Vec3 {
        let j = self.settings.jitter;
        if j <= 0.0 {
            return Vec3::ZERO;
        }
        Vec3::new(
            self.rng.random_range(-j..j),
            self.rng.random_range(-j..j),
            self.rng.random_range(-j..j),
        )
    }

    fn observe(&mut self, hand: Hand, music_time: f32) -> Option<Vec3> {
        if self.rng.random_bool(f64::from(self.settings.dropout)) {
            return None;
        }
        Some(self.aim(hand, music_time) + self.jitter())
    }

    /// One tracker sample at `music_time`.
    pub fn sample(&mut self, music_time: f32) -> HandSnapshot {
        let left = self.observe(Hand::Left, music_time);
        let right = self.observe(Hand::Right, music_time);
        HandSnapshot {
            left,
            right,
            left_velocity: self.left_velocity.update(left, music_time),
            right_velocity: self.right_velocity.update(right, music_time),
        }
    }
}

impl TrackingSource for SimulatedTracker {
    fn run(mut self: Box<Self>, tx: Sender<TrackingMessage>) {
        if self.settings.rate_hz == 0 {
            let _ = tx.send(TrackingMessage::Failed(
                "tracker rate must be at least 1 Hz".to_string(),
            ));
            return;
        }
        thread::sleep(self.settings.warmup);
        info!(
            "Simulated tracker ready at {} Hz ({} of {} notes will be let through).",
            self.settings.rate_hz,
            self.ignored_count(),
            self.chart.len()
        );
        if tx.send(TrackingMessage::Ready).is_err() {
            return;
        }
        let period = Duration::from_secs_f64(1.0 / f64::from(self.settings.rate_hz));
        loop {
            thread::sleep(period);
            let now = self.music_time.load();
            let snapshot = self.sample(now);
            if tx.send(TrackingMessage::Frame(snapshot)).is_err() {
                debug!("Tracking feed dropped; simulated tracker exiting.");
                break;
            }
        }
    }
}
