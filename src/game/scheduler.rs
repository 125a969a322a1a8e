//! Spawn/despawn scheduling.
//!
//! The scheduler owns the round's working copy of the chart and the set of
//! spawned-but-unresolved notes. Notes enter the active set once the playback
//! clock is within one look-ahead of their strike time, and leave it the
//! moment they are resolved, either as a hit (reported by the judgment pass)
//! or as a miss once they have drifted past the miss depth.

use crate::config::GameplayConfig;
use crate::game::chart::Chart;
use crate::game::field;
use crate::game::note::{Hand, Note, NoteResult};
use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq)]
pub enum NoteEventKind {
    Hit {
        hit_time: f32,
        /// `hit_time - note.time`; negative means early.
        offset: f32,
    },
    Miss,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NoteEvent {
    pub note_index: usize,
    pub note_id: String,
    pub hand: Hand,
    pub note_time: f32,
    pub kind: NoteEventKind,
}

impl NoteEvent {
    #[inline(always)]
    pub const fn is_hit(&self) -> bool {
        matches!(self.kind, NoteEventKind::Hit { .. })
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    notes: Vec<Note>,
    next_spawn_index: usize,
    // Indices into `notes`, kept in spawn order (ascending time).
    active: Vec<usize>,
}

impl Scheduler {
    pub fn new(chart: &Chart) -> Self {
        let mut s = Self::default();
        s.reset(chart);
        s
    }

    /// Re-seeds the scheduler for a fresh round.
    pub fn reset(&mut self, chart: &Chart) {
        self.notes.clear();
        self.notes.extend(chart.notes().iter().cloned());
        for note in &mut self.notes {
            note.clear();
        }
        self.next_spawn_index = 0;
        self.active.clear();
    }

    #[inline(always)]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[inline(always)]
    pub const fn next_spawn_index(&self) -> usize {
        self.next_spawn_index
    }

    #[inline(always)]
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    #[cfg(test)]
    pub fn is_active(&self, note_index: usize) -> bool {
        self.active.contains(&note_index)
    }

    /// Active notes in ascending time order.
    pub fn active_notes(&self) -> impl Iterator<Item = (usize, &Note)> + '_ {
        self.active.iter().map(move |&i| (i, &self.notes[i]))
    }

    /// Moves every chart entry whose spawn time has arrived into the active
    /// set. Returns how many were spawned.
    pub fn spawn_due(&mut self, music_time: f32, cfg: &GameplayConfig) -> usize {
        let look_ahead = field::look_ahead_seconds(cfg);
        let start = self.next_spawn_index;
        while let Some(note) = self.notes.get(self.next_spawn_index) {
            if note.time - look_ahead > music_time {
                break;
            }
            if note.is_pending() {
                self.active.push(self.next_spawn_index);
            }
            self.next_spawn_index += 1;
        }
        self.next_spawn_index - start
    }

    /// Active notes whose depth has passed the miss depth, in ascending time
    /// order. Nothing is resolved here.
    pub fn overdue(&self, music_time: f32, cfg: &GameplayConfig) -> SmallVec<[usize; 4]> {
        self.active_notes()
            .filter(|(_, note)| {
                note.is_pending() && field::depth_at(note.time, music_time, cfg) > cfg.miss_z
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Resolves an active note and drops it from the active set. Returns the
    /// event to report, or `None` if the note was not active or already
    /// resolved.
    pub fn resolve(&mut self, note_index: usize, result: NoteResult) -> Option<NoteEvent> {
        let pos = self.active.iter().position(|&i| i == note_index)?;
        let note = &mut self.notes[note_index];
        if !note.resolve(result) {
            self.active.remove(pos);
            return None;
        }
        self.active.remove(pos);
        let kind = match result {
            NoteResult::Hit { hit_time } => NoteEventKind::Hit {
                hit_time,
                offset: hit_time - note.time,
            },
            NoteResult::Missed => NoteEventKind::Miss,
        };
        Some(NoteEvent {
            note_index,
            note_id: note.id.clone(),
            hand: note.hand,
            note_time: note.time,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::note::CutDirection;

    fn chart_at(times: &[f32]) -> Chart {
        let notes = times
            .iter()
            .enumerate()
            .map(|(i, &t)| Note::new(format!("note-{i}"), t, 1, 0, Hand::Left, CutDirection::Any))
            .collect();
        Chart::from_notes(120.0, notes)
    }

    #[test]
    fn spawns_once_inside_look_ahead() {
        let cfg = GameplayConfig::default();
        let mut s = Scheduler::new(&chart_at(&[3.0, 3.2, 10.0]));
        // Look-ahead is 2.5s: nothing before 0.5s.
        assert_eq!(s.spawn_due(0.49, &cfg), 0);
        assert_eq!(s.spawn_due(0.5, &cfg), 1);
        assert_eq!(s.spawn_due(0.8, &cfg), 1);
        assert_eq!(s.next_spawn_index(), 2);
        assert_eq!(s.active_len(), 2);
        // Cursor never re-spawns.
        assert_eq!(s.spawn_due(0.8, &cfg), 0);
        assert_eq!(s.active_len(), 2);
    }

    #[test]
    fn several_notes_can_spawn_in_one_tick() {
        let cfg = GameplayConfig::default();
        let mut s = Scheduler::new(&chart_at(&[1.0, 1.5, 2.0, 9.0]));
        assert_eq!(s.spawn_due(0.0, &cfg), 3);
        let order: Vec<_> = s.active_notes().map(|(i, _)| i).collect();
        assert_eq!(order, [0, 1, 2]);
    }

    #[test]
    fn overdue_requires_passing_miss_depth() {
        let cfg = GameplayConfig::default();
        let mut s = Scheduler::new(&chart_at(&[2.0]));
        s.spawn_due(0.0, &cfg);
        // Miss depth 5 is reached 5/12s after the strike time.
        assert!(s.overdue(2.0 + 5.0 / 12.0 - 0.01, &cfg).is_empty());
        assert_eq!(s.overdue(2.5, &cfg).as_slice(), &[0]);
    }

    #[test]
    fn resolve_removes_from_active_exactly_once() {
        let cfg = GameplayConfig::default();
        let mut s = Scheduler::new(&chart_at(&[2.0, 2.0]));
        s.spawn_due(0.0, &cfg);
        let ev = s.resolve(0, NoteResult::Missed).unwrap();
        assert_eq!(ev.kind, NoteEventKind::Miss);
        assert_eq!(ev.note_id, "note-0");
        assert!(!s.is_active(0));
        assert!(s.resolve(0, NoteResult::Missed).is_none());
        assert!(s.resolve(0, NoteResult::Hit { hit_time: 2.0 }).is_none());
        assert_eq!(s.notes()[0].result(), Some(NoteResult::Missed));

        let ev = s.resolve(1, NoteResult::Hit { hit_time: 1.9 }).unwrap();
        match ev.kind {
            NoteEventKind::Hit { hit_time, offset } => {
                assert!((hit_time - 1.9).abs() < 1e-6);
                assert!((offset + 0.1).abs() < 1e-5);
            }
            NoteEventKind::Miss => panic!("expected a hit"),
        }
        assert_eq!(s.active_len(), 0);
    }

    #[test]
    fn multiple_misses_in_one_tick_are_reported_separately() {
        let cfg = GameplayConfig::default();
        let mut s = Scheduler::new(&chart_at(&[1.0, 1.1, 1.2]));
        s.spawn_due(0.0, &cfg);
        let overdue = s.overdue(3.0, &cfg);
        assert_eq!(overdue.len(), 3);
        let events: Vec<_> = overdue
            .into_iter()
            .filter_map(|i| s.resolve(i, NoteResult::Missed))
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(s.active_len(), 0);
    }

    #[test]
    fn reset_clears_results_and_cursor() {
        let cfg = GameplayConfig::default();
        let chart = chart_at(&[1.0]);
        let mut s = Scheduler::new(&chart);
        s.spawn_due(0.0, &cfg);
        s.resolve(0, NoteResult::Missed);
        s.reset(&chart);
        assert_eq!(s.next_spawn_index(), 0);
        assert!(s.notes()[0].is_pending());
        assert_eq!(s.active_len(), 0);
    }

    #[test]
    fn empty_chart_never_spawns() {
        let cfg = GameplayConfig::default();
        let mut s = Scheduler::new(&Chart::default());
        assert_eq!(s.spawn_due(1000.0, &cfg), 0);
        assert!(s.overdue(1000.0, &cfg).is_empty());
    }
}
