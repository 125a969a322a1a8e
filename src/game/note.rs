use glam::Vec3;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub enum CutDirection {
    Up,
    Down,
    Left,
    Right,
    #[default]
    Any,
}

impl CutDirection {
    /// Unit vector the hand must be travelling along, `None` for a
    /// proximity-only strike.
    pub const fn vector(self) -> Option<Vec3> {
        match self {
            Self::Up => Some(Vec3::Y),
            Self::Down => Some(Vec3::NEG_Y),
            Self::Left => Some(Vec3::NEG_X),
            Self::Right => Some(Vec3::X),
            Self::Any => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum NoteResult {
    Hit { hit_time: f32 },
    Missed,
}

#[derive(Clone, Debug)]
pub struct Note {
    pub id: String,
    /// Seconds from performance start at which the note reaches the strike plane.
    pub time: f32,
    pub line_index: usize,
    pub line_layer: usize,
    pub hand: Hand,
    pub cut_direction: CutDirection,
    result: Option<NoteResult>,
}

impl Note {
    pub fn new(
        id: String,
        time: f32,
        line_index: usize,
        line_layer: usize,
        hand: Hand,
        cut_direction: CutDirection,
    ) -> Self {
        Self {
            id,
            time,
            line_index,
            line_layer,
            hand,
            cut_direction,
            result: None,
        }
    }

    #[inline(always)]
    pub const fn result(&self) -> Option<NoteResult> {
        self.result
    }

    #[inline(always)]
    pub const fn is_pending(&self) -> bool {
        self.result.is_none()
    }

    #[inline(always)]
    pub const fn hit_time(&self) -> Option<f32> {
        match self.result {
            Some(NoteResult::Hit { hit_time }) => Some(hit_time),
            _ => None,
        }
    }

    /// Resolution happens at most once; later calls leave the first result in
    /// place and return false.
    pub fn resolve(&mut self, result: NoteResult) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(result);
        true
    }

    /// Drops the resolution so the note can be replayed in a fresh round.
    pub(crate) fn clear(&mut self) {
        self.result = None;
    }
}
