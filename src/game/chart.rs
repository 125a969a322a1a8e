use crate::game::field;
use crate::game::note::{CutDirection, Hand, Note};
use log::warn;

pub const DEFAULT_BPM: f32 = 120.0;

const FIRST_BEAT: u32 = 4;
const LAST_BEAT_EXCLUSIVE: u32 = 300;
const BEAT_STRIDE: usize = 2;
const BEATS_PER_PHASE: u32 = 16;
const PHASE_COUNT: u32 = 3;

/// Time-ordered note schedule for one playthrough.
#[derive(Clone, Debug, Default)]
pub struct Chart {
    pub bpm: f32,
    notes: Vec<Note>,
}

impl Chart {
    /// Builds a chart from arbitrary notes. Entries with a non-finite time or a
    /// lane/layer outside the grid are dropped; the rest are sorted by time.
    pub fn from_notes(bpm: f32, notes: Vec<Note>) -> Self {
        let mut kept: Vec<Note> = notes
            .into_iter()
            .filter(|note| {
                let ok = note.time.is_finite() && field::is_on_grid(note.line_index, note.line_layer);
                if !ok {
                    warn!(
                        "Dropping malformed note '{}' (time={}, lane={}, layer={}).",
                        note.id, note.time, note.line_index, note.line_layer
                    );
                }
                ok
            })
            .collect();
        // Stable, so notes sharing a time keep their emission order.
        kept.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { bpm, notes: kept }
    }

    #[inline(always)]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn last_note_time(&self) -> Option<f32> {
        self.notes.last().map(|n| n.time)
    }
}

/// Fixed procedural pattern keyed only on `bpm`. It does not look at the
/// uploaded track: there is no beat detection, every song gets the same
/// three-phase drum pattern.
pub fn generate(bpm: f32) -> Chart {
    let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { DEFAULT_BPM };
    let beat_time = 60.0 / bpm;
    let mut notes = Vec::with_capacity(256);
    let mut next_id = 0usize;
    let mut push = |notes: &mut Vec<Note>, time: f32, lane: usize, layer: usize, hand: Hand| {
        notes.push(Note::new(
            format!("note-{next_id}"),
            time,
            lane,
            layer,
            hand,
            CutDirection::Any,
        ));
        next_id += 1;
    };

    for beat in (FIRST_BEAT..LAST_BEAT_EXCLUSIVE).step_by(BEAT_STRIDE) {
        let time = beat as f32 * beat_time;
        match (beat / BEATS_PER_PHASE) % PHASE_COUNT {
            0 => {
                if beat % 4 == 0 {
                    push(&mut notes, time, 1, 0, Hand::Left);
                } else {
                    push(&mut notes, time, 2, 0, Hand::Right);
                }
            }
            1 => {
                if beat % 8 == 0 {
                    push(&mut notes, time, 0, 1, Hand::Left);
                    push(&mut notes, time, 3, 1, Hand::Right);
                }
            }
            _ => {
                push(&mut notes, time, 1, 0, Hand::Left);
                push(&mut notes, time + beat_time, 2, 0, Hand::Right);
            }
        }
    }

    Chart::from_notes(bpm, notes)
}
