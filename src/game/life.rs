pub const MAX_HEALTH: f32 = 100.0;
pub const MIN_HEALTH: f32 = 0.0;

pub const LIFE_HIT: f32 = 1.5;
pub const LIFE_MISS: f32 = -10.0;

/// Applies `delta` and clamps into [MIN_HEALTH, MAX_HEALTH].
#[inline(always)]
pub fn apply_life_change(health: f32, delta: f32) -> f32 {
    let next = health + delta;
    if next.is_nan() {
        return health.clamp(MIN_HEALTH, MAX_HEALTH);
    }
    next.clamp(MIN_HEALTH, MAX_HEALTH)
}

/// Health as shown on the meter: rounded up to a whole percent.
#[inline(always)]
pub fn display_health(health: f32) -> u32 {
    health.clamp(MIN_HEALTH, MAX_HEALTH).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heal_caps_at_max() {
        assert_eq!(apply_life_change(99.5, LIFE_HIT), MAX_HEALTH);
        assert_eq!(apply_life_change(50.0, LIFE_HIT), 51.5);
    }

    #[test]
    fn penalty_floors_at_zero() {
        assert_eq!(apply_life_change(5.0, LIFE_MISS), 0.0);
        assert_eq!(apply_life_change(100.0, LIFE_MISS), 90.0);
    }

    #[test]
    fn display_rounds_up() {
        assert_eq!(display_health(51.5), 52);
        assert_eq!(display_health(0.2), 1);
        assert_eq!(display_health(0.0), 0);
        assert_eq!(display_health(100.0), 100);
    }
}
