use crate::config::GameplayConfig;
use crate::game::note::Note;
use glam::Vec3;

pub const LANE_COUNT: usize = 4;
pub const LAYER_COUNT: usize = 3;

pub const LANE_WIDTH: f32 = 0.8;
pub const LANE_X_POSITIONS: [f32; LANE_COUNT] = [
    -1.5 * LANE_WIDTH,
    -0.5 * LANE_WIDTH,
    0.5 * LANE_WIDTH,
    1.5 * LANE_WIDTH,
];
// Low, mid, high
pub const LAYER_Y_POSITIONS: [f32; LAYER_COUNT] = [0.8, 1.6, 2.4];

#[inline(always)]
pub const fn is_on_grid(line_index: usize, line_layer: usize) -> bool {
    line_index < LANE_COUNT && line_layer < LAYER_COUNT
}

#[inline(always)]
pub fn lane_x(line_index: usize) -> f32 {
    LANE_X_POSITIONS[line_index.min(LANE_COUNT - 1)]
}

#[inline(always)]
pub fn layer_y(line_layer: usize) -> f32 {
    LAYER_Y_POSITIONS[line_layer.min(LAYER_COUNT - 1)]
}

/// Seconds a note needs to travel from the spawn depth to the strike plane.
#[inline(always)]
pub fn look_ahead_seconds(cfg: &GameplayConfig) -> f32 {
    if cfg.note_speed <= 0.0 || !cfg.note_speed.is_finite() {
        return 0.0;
    }
    (cfg.spawn_z - cfg.strike_z).abs() / cfg.note_speed
}

/// Depth along the travel axis. Equals `strike_z` exactly at `note_time` and
/// grows toward the player as the clock advances.
#[inline(always)]
pub fn depth_at(note_time: f32, music_time: f32, cfg: &GameplayConfig) -> f32 {
    (note_time - music_time).mul_add(-cfg.note_speed, cfg.strike_z)
}

#[inline(always)]
pub fn note_position(note: &Note, music_time: f32, cfg: &GameplayConfig) -> Vec3 {
    Vec3::new(
        lane_x(note.line_index),
        layer_y(note.line_layer),
        depth_at(note.time, music_time, cfg),
    )
}

/// Point where a note crosses the strike plane.
#[inline(always)]
pub fn strike_point(note: &Note, cfg: &GameplayConfig) -> Vec3 {
    Vec3::new(lane_x(note.line_index), layer_y(note.line_layer), cfg.strike_z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::note::{CutDirection, Hand};

    #[test]
    fn depth_is_linear_in_time() {
        let cfg = GameplayConfig::default();
        assert!((depth_at(2.0, 2.0, &cfg) - cfg.strike_z).abs() < 1e-6);
        // One second early: twelve units upstream of the plane.
        assert!((depth_at(3.0, 2.0, &cfg) - -12.0).abs() < 1e-5);
        assert!((depth_at(1.5, 2.0, &cfg) - 6.0).abs() < 1e-5);
    }

    #[test]
    fn look_ahead_matches_travel_distance() {
        let cfg = GameplayConfig::default();
        assert!((look_ahead_seconds(&cfg) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn grid_lookup_clamps_out_of_range() {
        assert_eq!(lane_x(9), LANE_X_POSITIONS[3]);
        assert_eq!(layer_y(7), LAYER_Y_POSITIONS[2]);
        assert!(is_on_grid(3, 2));
        assert!(!is_on_grid(4, 0));
    }

    #[test]
    fn note_position_uses_lane_and_layer() {
        let cfg = GameplayConfig::default();
        let note = Note::new("n".into(), 4.0, 2, 1, Hand::Right, CutDirection::Any);
        let pos = note_position(&note, 4.0, &cfg);
        assert!((pos.x - 0.4).abs() < 1e-6);
        assert!((pos.y - 1.6).abs() < 1e-6);
        assert!(pos.z.abs() < 1e-6);
    }
}
