//! Hand-tracking input boundary.
//!
//! A [`TrackingSource`] runs on its own thread at its own cadence and pushes
//! [`TrackingMessage`]s over a channel. The frame loop owns a
//! [`TrackingFeed`] and polls it once per frame: the channel is drained
//! without blocking and only the newest snapshot is kept. Stale samples are
//! tolerated, never waited on.

use crate::game::note::Hand;
use glam::Vec3;
use log::{info, warn};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

/// Per-frame hand sample in note space. An absent hand is `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HandSnapshot {
    pub left: Option<Vec3>,
    pub right: Option<Vec3>,
    pub left_velocity: Vec3,
    pub right_velocity: Vec3,
}

impl HandSnapshot {
    #[inline(always)]
    pub const fn position(&self, hand: Hand) -> Option<Vec3> {
        match hand {
            Hand::Left => self.left,
            Hand::Right => self.right,
        }
    }

    #[inline(always)]
    pub const fn velocity(&self, hand: Hand) -> Vec3 {
        match hand {
            Hand::Left => self.left_velocity,
            Hand::Right => self.right_velocity,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrackingMessage {
    Ready,
    Failed(String),
    Frame(HandSnapshot),
}

/// Anything that can deliver tracking messages over a channel.
pub trait TrackingSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<TrackingMessage>);
}

/// Spawns a tracking source on its own thread and returns the feed reading it.
pub fn spawn_tracking_source<T: TrackingSource>(source: T) -> TrackingFeed {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    TrackingFeed::new(rx)
}

#[derive(Debug)]
pub struct TrackingFeed {
    rx: Receiver<TrackingMessage>,
    ready: bool,
    failed: Option<String>,
    latest: Option<HandSnapshot>,
    disconnected: bool,
}

impl TrackingFeed {
    pub fn new(rx: Receiver<TrackingMessage>) -> Self {
        Self {
            rx,
            ready: false,
            failed: None,
            latest: None,
            disconnected: false,
        }
    }

    /// Drains everything queued since the last poll. Returns true when the
    /// feed just became ready.
    pub fn poll(&mut self) -> bool {
        let was_ready = self.ready;
        loop {
            match self.rx.try_recv() {
                Ok(TrackingMessage::Ready) => {
                    if self.failed.is_none() {
                        self.ready = true;
                    }
                }
                Ok(TrackingMessage::Failed(reason)) => {
                    warn!("Hand tracking failed to initialize: {reason}");
                    self.ready = false;
                    self.failed = Some(reason);
                }
                Ok(TrackingMessage::Frame(snapshot)) => {
                    self.latest = Some(snapshot);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        info!("Hand tracking source stopped.");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }
        !was_ready && self.ready
    }

    #[inline(always)]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn failure(&self) -> Option<&str> {
        self.failed.as_deref()
    }

    /// Newest snapshot, or an all-absent one if nothing has arrived yet.
    #[inline(always)]
    pub fn latest(&self) -> HandSnapshot {
        self.latest.unwrap_or_default()
    }
}

/// Finite-difference velocity with exponential smoothing. Losing the hand
/// drops the history so the next sighting starts from rest.
#[derive(Clone, Copy, Debug)]
pub struct VelocityEstimator {
    smoothing: f32,
    last: Option<(Vec3, f32)>,
    velocity: Vec3,
}

impl VelocityEstimator {
    /// `smoothing` is the weight of the newest difference in [0, 1].
    pub fn new(smoothing: f32) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 1.0),
            last: None,
            velocity: Vec3::ZERO,
        }
    }

    pub fn update(&mut self, position: Option<Vec3>, time: f32) -> Vec3 {
        let Some(position) = position else {
            self.last = None;
            self.velocity = Vec3::ZERO;
            return self.velocity;
        };
        if let Some((prev, prev_time)) = self.last {
            let dt = time - prev_time;
            if dt > f32::EPSILON {
                let raw = (position - prev) / dt;
                self.velocity = self.velocity.lerp(raw, self.smoothing);
            }
        }
        self.last = Some((position, time));
        self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_keeps_only_newest_snapshot() {
        let (tx, rx) = mpsc::channel();
        let mut feed = TrackingFeed::new(rx);
        assert!(!feed.poll());
        assert_eq!(feed.latest(), HandSnapshot::default());

        tx.send(TrackingMessage::Ready).unwrap();
        for x in 0..5 {
            tx.send(TrackingMessage::Frame(HandSnapshot {
                left: Some(Vec3::new(x as f32, 0.0, 0.0)),
                ..HandSnapshot::default()
            }))
            .unwrap();
        }
        assert!(feed.poll());
        assert!(feed.is_ready());
        assert_eq!(feed.latest().left, Some(Vec3::new(4.0, 0.0, 0.0)));
        // Nothing new: still ready, not "just became ready", same snapshot.
        assert!(!feed.poll());
        assert_eq!(feed.latest().left, Some(Vec3::new(4.0, 0.0, 0.0)));
    }

    #[test]
    fn failure_blocks_readiness() {
        let (tx, rx) = mpsc::channel();
        let mut feed = TrackingFeed::new(rx);
        tx.send(TrackingMessage::Failed("no camera".into())).unwrap();
        tx.send(TrackingMessage::Ready).unwrap();
        drop(tx);
        assert!(!feed.poll());
        assert!(!feed.is_ready());
        assert_eq!(feed.failure(), Some("no camera"));
    }

    #[test]
    fn snapshot_lookup_by_hand() {
        let snap = HandSnapshot {
            left: Some(Vec3::ONE),
            right: None,
            left_velocity: Vec3::X,
            right_velocity: Vec3::Y,
        };
        assert_eq!(snap.position(Hand::Left), Some(Vec3::ONE));
        assert_eq!(snap.position(Hand::Right), None);
        assert_eq!(snap.velocity(Hand::Right), Vec3::Y);
    }

    #[test]
    fn velocity_follows_motion_and_resets_on_loss() {
        let mut est = VelocityEstimator::new(1.0);
        assert_eq!(est.update(Some(Vec3::ZERO), 0.0), Vec3::ZERO);
        let v = est.update(Some(Vec3::new(0.0, -1.0, 0.0)), 0.5);
        assert!((v - Vec3::new(0.0, -2.0, 0.0)).length() < 1e-5);
        assert_eq!(est.update(None, 0.6), Vec3::ZERO);
        // First sighting after loss has no history.
        assert_eq!(est.update(Some(Vec3::ONE), 0.7), Vec3::ZERO);
    }

    #[test]
    fn velocity_is_smoothed() {
        let mut est = VelocityEstimator::new(0.5);
        est.update(Some(Vec3::ZERO), 0.0);
        let v = est.update(Some(Vec3::X), 1.0);
        assert!((v.x - 0.5).abs() < 1e-6);
        let v = est.update(Some(Vec3::X * 2.0), 2.0);
        assert!((v.x - 0.75).abs() < 1e-6);
    }
}
