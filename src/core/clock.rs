//! Playback clock boundary.
//!
//! The playing track is the only timing authority for note positions. The
//! gameplay core reads `current_time()` once per frame and issues
//! play/pause/rewind in lock-step with its own status changes; it never
//! decodes or buffers audio itself.

use crate::core::audio::AudioSource;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    NoSource,
    Rejected(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSource => write!(f, "no audio source loaded"),
            Self::Rejected(reason) => write!(f, "playback rejected: {reason}"),
        }
    }
}

impl std::error::Error for PlaybackError {}

pub trait PlaybackClock {
    /// Seconds since the start of the track; frozen while paused.
    fn current_time(&self) -> f32;
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    /// Seeks back to zero without changing the play/pause state.
    fn rewind(&mut self);
    fn is_playing(&self) -> bool;
}

/// Wall-clock stopwatch standing in for the audio device position of a
/// loaded track. Time stops at the end of the track.
#[derive(Debug)]
pub struct AudioClock {
    source: Option<AudioSource>,
    started_at: Option<Instant>,
    accumulated: Duration,
}

impl AudioClock {
    pub const fn new() -> Self {
        Self {
            source: None,
            started_at: None,
            accumulated: Duration::ZERO,
        }
    }

    /// Swaps in a new track. Playback stops and rewinds.
    pub fn load(&mut self, source: AudioSource) {
        self.started_at = None;
        self.accumulated = Duration::ZERO;
        self.source = Some(source);
    }

    pub const fn source(&self) -> Option<&AudioSource> {
        self.source.as_ref()
    }

    pub const fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn elapsed(&self) -> Duration {
        let raw = match self.started_at {
            Some(start) => self.accumulated + start.elapsed(),
            None => self.accumulated,
        };
        match &self.source {
            Some(source) => raw.min(source.duration()),
            None => raw,
        }
    }

    fn at_end(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| self.elapsed() >= source.duration())
    }
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock for AudioClock {
    fn current_time(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.source.is_none() {
            return Err(PlaybackError::NoSource);
        }
        if self.at_end() {
            self.pause();
            return Err(PlaybackError::Rejected("track has ended".to_string()));
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.started_at.is_some() {
            self.accumulated = self.elapsed();
            self.started_at = None;
        }
    }

    fn rewind(&mut self) {
        self.accumulated = Duration::ZERO;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn is_playing(&self) -> bool {
        self.started_at.is_some() && !self.at_end()
    }
}

/// Last sampled playback time, published for threads outside the frame loop.
#[derive(Clone, Debug, Default)]
pub struct SharedMusicTime(Arc<AtomicU32>);

impl SharedMusicTime {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU32::new(0.0f32.to_bits())))
    }

    #[inline(always)]
    pub fn store(&self, seconds: f32) {
        self.0.store(seconds.to_bits(), Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Clock advanced by hand for deterministic tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    time: f32,
    playing: bool,
    /// While set, `play()` fails with this reason.
    pub reject_play: Option<String>,
    pub play_calls: u32,
    pub pause_calls: u32,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward only while playing.
    pub fn advance(&mut self, seconds: f32) {
        if self.playing && seconds > 0.0 {
            self.time += seconds;
        }
    }
}

#[cfg(test)]
impl PlaybackClock for ManualClock {
    fn current_time(&self) -> f32 {
        self.time
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if let Some(reason) = &self.reject_play {
            return Err(PlaybackError::Rejected(reason.clone()));
        }
        self.play_calls += 1;
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.pause_calls += 1;
        self.playing = false;
    }

    fn rewind(&mut self) {
        self.time = 0.0;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{AudioFormat, AudioInfo};

    fn track(seconds: f32) -> AudioSource {
        AudioSource::with_info(
            "test.mp3",
            AudioInfo {
                format: AudioFormat::Mp3,
                sample_rate: 44_100,
                channels: 2,
                duration: Duration::from_secs_f32(seconds),
            },
        )
    }

    #[test]
    fn manual_clock_only_advances_while_playing() {
        let mut clock = ManualClock::new();
        clock.advance(1.0);
        assert_eq!(clock.current_time(), 0.0);
        clock.play().unwrap();
        clock.advance(1.5);
        clock.pause();
        clock.advance(10.0);
        assert_eq!(clock.current_time(), 1.5);
        clock.rewind();
        assert_eq!(clock.current_time(), 0.0);
        assert!(!clock.is_playing());
    }

    #[test]
    fn manual_clock_can_reject_play() {
        let mut clock = ManualClock {
            reject_play: Some("autoplay blocked".into()),
            ..ManualClock::default()
        };
        assert_eq!(
            clock.play(),
            Err(PlaybackError::Rejected("autoplay blocked".into()))
        );
        assert!(!clock.is_playing());
    }

    #[test]
    fn shared_time_crosses_threads() {
        let shared = SharedMusicTime::new();
        assert_eq!(shared.load(), 0.0);
        let writer = shared.clone();
        std::thread::spawn(move || writer.store(12.25)).join().unwrap();
        assert_eq!(shared.load(), 12.25);
    }

    #[test]
    fn audio_clock_needs_a_source() {
        let mut clock = AudioClock::new();
        assert_eq!(clock.play(), Err(PlaybackError::NoSource));
        assert!(!clock.is_playing());
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn audio_clock_freezes_when_paused() {
        let mut clock = AudioClock::new();
        clock.load(track(60.0));
        clock.play().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        clock.pause();
        let frozen = clock.current_time();
        assert!(frozen >= 0.015);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.current_time(), frozen);
        clock.rewind();
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn audio_clock_stops_at_track_end() {
        let mut clock = AudioClock::new();
        clock.load(track(0.01));
        clock.play().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!((clock.current_time() - 0.01).abs() < 1e-6);
        assert!(!clock.is_playing());
        assert_eq!(
            clock.play(),
            Err(PlaybackError::Rejected("track has ended".into()))
        );
        clock.rewind();
        assert_eq!(clock.current_time(), 0.0);
        assert_eq!(clock.play(), Ok(()));
        assert!(clock.is_playing());
    }
}
