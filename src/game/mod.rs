pub mod chart;
pub mod field;
pub mod gameplay;
pub mod judgment;
pub mod life;
pub mod note;
pub mod scheduler;
pub mod session;
pub mod stage_stats;
