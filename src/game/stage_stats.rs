use chrono::Local;
use serde::Serialize;

use crate::game::gameplay::State;
use crate::game::scheduler::{NoteEvent, NoteEventKind};
use crate::game::session::GameStatus;

/// Running tallies for the current round.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RoundStats {
    pub hits: u32,
    pub misses: u32,
    abs_offset_sum: f64,
}

impl RoundStats {
    pub fn record(&mut self, event: &NoteEvent) {
        match event.kind {
            NoteEventKind::Hit { offset, .. } => {
                self.hits += 1;
                self.abs_offset_sum += f64::from(offset.abs());
            }
            NoteEventKind::Miss => self.misses += 1,
        }
    }

    #[inline(always)]
    pub const fn judged(&self) -> u32 {
        self.hits + self.misses
    }

    pub fn accuracy_percent(&self) -> f64 {
        let judged = self.judged();
        if judged == 0 {
            return 0.0;
        }
        f64::from(self.hits) * 100.0 / f64::from(judged)
    }

    pub fn mean_abs_offset_ms(&self) -> Option<f64> {
        (self.hits > 0).then(|| self.abs_offset_sum * 1000.0 / f64::from(self.hits))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StageSummary {
    pub status: GameStatus,
    pub score: u32,
    pub max_combo: u32,
    pub hits: u32,
    pub misses: u32,
    pub judged: u32,
    pub total_notes: usize,
    pub accuracy_percent: f64,
    pub mean_abs_offset_ms: Option<f64>,
    pub health: u32,
    pub time_remaining: u32,
    pub played_at: String,
}

impl StageSummary {
    pub fn from_state(state: &State) -> Self {
        let session = &state.session;
        let stats = &state.stats;
        Self {
            status: session.status(),
            score: session.score(),
            max_combo: session.max_combo(),
            hits: stats.hits,
            misses: stats.misses,
            judged: stats.judged(),
            total_notes: state.chart.len(),
            accuracy_percent: stats.accuracy_percent(),
            mean_abs_offset_ms: stats.mean_abs_offset_ms(),
            health: session.display_health(),
            time_remaining: session.time_remaining(),
            played_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn log(&self) {
        let offset = self
            .mean_abs_offset_ms
            .map_or_else(|| "-".to_string(), |ms| format!("{ms:.1}ms"));
        log::info!(
            "Round finished: {} | Score: {} | Max Combo: {} | Hits: {} | Misses: {} | Judged: {}/{} | Accuracy: {:.2}% | Mean Offset: {} | Health: {}",
            self.status,
            self.score,
            self.max_combo,
            self.hits,
            self.misses,
            self.judged,
            self.total_notes,
            self.accuracy_percent,
            offset,
            self.health
        );
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::note::Hand;

    fn event(kind: NoteEventKind) -> NoteEvent {
        NoteEvent {
            note_index: 0,
            note_id: "note-0".into(),
            hand: Hand::Right,
            note_time: 2.0,
            kind,
        }
    }

    #[test]
    fn tallies_hits_and_misses() {
        let mut stats = RoundStats::default();
        assert_eq!(stats.accuracy_percent(), 0.0);
        assert_eq!(stats.mean_abs_offset_ms(), None);
        stats.record(&event(NoteEventKind::Hit {
            hit_time: 1.95,
            offset: -0.05,
        }));
        stats.record(&event(NoteEventKind::Hit {
            hit_time: 2.15,
            offset: 0.15,
        }));
        stats.record(&event(NoteEventKind::Miss));
        stats.record(&event(NoteEventKind::Miss));
        assert_eq!(stats.judged(), 4);
        assert!((stats.accuracy_percent() - 50.0).abs() < 1e-9);
        let ms = stats.mean_abs_offset_ms().unwrap();
        assert!((ms - 100.0).abs() < 1e-3);
    }

    #[test]
    fn summary_serializes_status_tag() {
        let summary = StageSummary {
            status: GameStatus::GameOver,
            score: 300,
            max_combo: 3,
            hits: 3,
            misses: 10,
            judged: 13,
            total_notes: 148,
            accuracy_percent: 23.08,
            mean_abs_offset_ms: None,
            health: 0,
            time_remaining: 41,
            played_at: "2026-01-01 00:00:00".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "GAME_OVER");
        assert_eq!(json["score"], 300);
        assert!(json["mean_abs_offset_ms"].is_null());
    }
}
