pub mod audio;
pub mod clock;
pub mod sim_tracker;
pub mod tracking;
