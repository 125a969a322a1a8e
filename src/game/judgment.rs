use crate::config::GameplayConfig;
use crate::core::tracking::HandSnapshot;
use crate::game::field;
use crate::game::note::{CutDirection, Note};
use crate::game::scheduler::Scheduler;
use glam::Vec3;
use smallvec::SmallVec;

/// True while the note's depth lies inside the strike window. The window is
/// open on both ends and wider upstream of the plane than past it.
#[inline(always)]
pub fn in_hit_window(depth: f32, cfg: &GameplayConfig) -> bool {
    depth > cfg.strike_z - cfg.hit_window_before && depth < cfg.strike_z + cfg.hit_window_after
}

#[inline(always)]
fn direction_satisfied(direction: CutDirection, velocity: Vec3, cfg: &GameplayConfig) -> bool {
    match direction.vector() {
        None => true,
        Some(dir) => velocity.dot(dir) > cfg.cut_speed_threshold,
    }
}

/// Tests a single note against one hand sample.
pub fn is_strike(
    note: &Note,
    hand_position: Vec3,
    hand_velocity: Vec3,
    music_time: f32,
    cfg: &GameplayConfig,
) -> bool {
    let depth = field::depth_at(note.time, music_time, cfg);
    if !in_hit_window(depth, cfg) {
        return false;
    }
    let note_position = field::note_position(note, music_time, cfg);
    if hand_position.distance(note_position) >= cfg.strike_radius {
        return false;
    }
    direction_satisfied(note.cut_direction, hand_velocity, cfg)
}

/// Active notes struck this frame, in ascending time order.
///
/// Every candidate is tested against the same `hands` snapshot; nothing is
/// resolved here, so one strike never changes what a later note sees. A
/// missing sample for the note's hand means no strike this frame.
pub fn find_strikes(
    scheduler: &Scheduler,
    hands: &HandSnapshot,
    music_time: f32,
    cfg: &GameplayConfig,
) -> SmallVec<[usize; 4]> {
    let mut struck = SmallVec::new();
    for (index, note) in scheduler.active_notes() {
        if !note.is_pending() {
            continue;
        }
        let Some(position) = hands.position(note.hand) else {
            continue;
        };
        if is_strike(note, position, hands.velocity(note.hand), music_time, cfg) {
            struck.push(index);
        }
    }
    struck
}
