use crate::game::{chart, life};
use ini::Ini;
use log::{info, warn};
use std::str::FromStr;
use std::sync::Mutex;

const CONFIG_PATH: &str = "drumsync.ini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

/// Tunables of the gameplay core. Passed by value into the gameplay state so
/// the core never reaches for the global config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameplayConfig {
    pub bpm: f32,
    pub time_limit_seconds: u32,
    pub note_speed: f32,
    pub spawn_z: f32,
    pub strike_z: f32,
    pub miss_z: f32,
    /// Depth tolerance upstream of the strike plane.
    pub hit_window_before: f32,
    /// Depth tolerance past the strike plane.
    pub hit_window_after: f32,
    pub strike_radius: f32,
    /// Minimum hand speed along a note's cut direction (units/s).
    pub cut_speed_threshold: f32,
    pub score_per_hit: u32,
    pub health_per_hit: f32,
    pub health_per_miss: f32,
    pub visible_window_seconds: f32,
    pub hit_linger_seconds: f32,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            bpm: chart::DEFAULT_BPM,
            time_limit_seconds: 90,
            note_speed: 12.0,
            spawn_z: -30.0,
            strike_z: 0.0,
            miss_z: 5.0,
            hit_window_before: 1.2,
            hit_window_after: 0.6,
            strike_radius: 0.9,
            cut_speed_threshold: 1.0,
            score_per_hit: 100,
            health_per_hit: life::LIFE_HIT,
            health_per_miss: life::LIFE_MISS,
            visible_window_seconds: 4.5,
            hit_linger_seconds: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub log_level: LogLevel,
    pub frame_rate: u32,
    pub auto_start: bool,
    /// Samples per second produced by the simulated tracker.
    pub tracker_rate: u32,
    pub tracker_jitter: f32,
    /// Chance per sample that a hand is reported as absent.
    pub tracker_dropout: f32,
    /// Fraction of notes the simulated player lets through.
    pub tracker_miss_rate: f32,
    pub tracker_seed: u64,
    pub tracker_warmup_ms: u64,
    pub gameplay: GameplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            frame_rate: 60,
            auto_start: true,
            tracker_rate: 30,
            tracker_jitter: 0.05,
            tracker_dropout: 0.02,
            tracker_miss_rate: 0.1,
            tracker_seed: 7,
            tracker_warmup_ms: 500,
            gameplay: GameplayConfig::default(),
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn bool_str(v: bool) -> &'static str {
    if v { "1" } else { "0" }
}

fn to_ini(cfg: &Config) -> Ini {
    let g = &cfg.gameplay;
    let mut conf = Ini::new();
    // Keys in alphabetical order within each section.
    conf.with_section(Some("Gameplay"))
        .set("Bpm", g.bpm.to_string())
        .set("CutSpeedThreshold", g.cut_speed_threshold.to_string())
        .set("HealthPerHit", g.health_per_hit.to_string())
        .set("HealthPerMiss", g.health_per_miss.to_string())
        .set("HitLingerSeconds", g.hit_linger_seconds.to_string())
        .set("HitWindowAfter", g.hit_window_after.to_string())
        .set("HitWindowBefore", g.hit_window_before.to_string())
        .set("MissZ", g.miss_z.to_string())
        .set("NoteSpeed", g.note_speed.to_string())
        .set("ScorePerHit", g.score_per_hit.to_string())
        .set("SpawnZ", g.spawn_z.to_string())
        .set("StrikeRadius", g.strike_radius.to_string())
        .set("StrikeZ", g.strike_z.to_string())
        .set("TimeLimitSeconds", g.time_limit_seconds.to_string())
        .set("VisibleWindowSeconds", g.visible_window_seconds.to_string());
    conf.with_section(Some("Options"))
        .set("AutoStart", bool_str(cfg.auto_start))
        .set("FrameRate", cfg.frame_rate.to_string())
        .set("LogLevel", cfg.log_level.as_str())
        .set("TrackerDropout", cfg.tracker_dropout.to_string())
        .set("TrackerJitter", cfg.tracker_jitter.to_string())
        .set("TrackerMissRate", cfg.tracker_miss_rate.to_string())
        .set("TrackerRate", cfg.tracker_rate.to_string())
        .set("TrackerSeed", cfg.tracker_seed.to_string())
        .set("TrackerWarmupMs", cfg.tracker_warmup_ms.to_string());
    conf
}

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    to_ini(&Config::default()).write_to_file(CONFIG_PATH)
}

/// Reads `key` and parses it; a present but unparsable value falls back to
/// `default` with a warning.
fn read<T: FromStr>(conf: &Ini, section: &str, key: &str, default: T) -> T {
    match conf.get_from(Some(section), key) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid value '{raw}' for [{section}] {key}; using default.");
            default
        }),
    }
}

fn read_flag(conf: &Ini, section: &str, key: &str, default: bool) -> bool {
    let Some(raw) = conf.get_from(Some(section), key) else {
        return default;
    };
    let v = raw.trim();
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("on") {
        true
    } else if v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") || v.eq_ignore_ascii_case("off") {
        false
    } else {
        v.parse::<u8>().map_or(default, |n| n != 0)
    }
}

fn read_positive(conf: &Ini, section: &str, key: &str, default: f32) -> f32 {
    let v = read(conf, section, key, default);
    if v.is_finite() && v > 0.0 {
        v
    } else {
        warn!("[{section}] {key} must be positive; using default {default}.");
        default
    }
}

fn read_finite(conf: &Ini, section: &str, key: &str, default: f32) -> f32 {
    let v = read(conf, section, key, default);
    if v.is_finite() {
        v
    } else {
        warn!("[{section}] {key} must be a finite number; using default {default}.");
        default
    }
}

/// Probability-like value in [0, 1]. Non-finite input falls back to `default`.
fn read_unit(conf: &Ini, section: &str, key: &str, default: f32) -> f32 {
    let v = read(conf, section, key, default);
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        warn!("[{section}] {key} must be a number between 0 and 1; using default {default}.");
        default
    }
}

fn read_non_negative(conf: &Ini, section: &str, key: &str, default: f32) -> f32 {
    let v = read(conf, section, key, default);
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        warn!("[{section}] {key} must be zero or more; using default {default}.");
        default
    }
}

fn from_ini(conf: &Ini) -> Config {
    let d = Config::default();
    let dg = d.gameplay;

    let log_level = conf
        .get_from(Some("Options"), "LogLevel")
        .and_then(|v| LogLevel::from_str(v).ok())
        .unwrap_or(d.log_level);

    let mut gameplay = GameplayConfig {
        bpm: read_positive(conf, "Gameplay", "Bpm", dg.bpm),
        time_limit_seconds: read(conf, "Gameplay", "TimeLimitSeconds", dg.time_limit_seconds),
        note_speed: read_positive(conf, "Gameplay", "NoteSpeed", dg.note_speed),
        spawn_z: read_finite(conf, "Gameplay", "SpawnZ", dg.spawn_z),
        strike_z: read_finite(conf, "Gameplay", "StrikeZ", dg.strike_z),
        miss_z: read_finite(conf, "Gameplay", "MissZ", dg.miss_z),
        hit_window_before: read_positive(conf, "Gameplay", "HitWindowBefore", dg.hit_window_before),
        hit_window_after: read_positive(conf, "Gameplay", "HitWindowAfter", dg.hit_window_after),
        strike_radius: read_positive(conf, "Gameplay", "StrikeRadius", dg.strike_radius),
        cut_speed_threshold: read_finite(conf, "Gameplay", "CutSpeedThreshold", dg.cut_speed_threshold),
        score_per_hit: read(conf, "Gameplay", "ScorePerHit", dg.score_per_hit),
        health_per_hit: read_non_negative(conf, "Gameplay", "HealthPerHit", dg.health_per_hit),
        health_per_miss: read_finite(conf, "Gameplay", "HealthPerMiss", dg.health_per_miss).min(0.0),
        visible_window_seconds: read_positive(conf, "Gameplay", "VisibleWindowSeconds", dg.visible_window_seconds),
        hit_linger_seconds: read_positive(conf, "Gameplay", "HitLingerSeconds", dg.hit_linger_seconds),
    };
    if gameplay.spawn_z >= gameplay.strike_z || gameplay.miss_z <= gameplay.strike_z {
        warn!(
            "Depth layout must satisfy SpawnZ < StrikeZ < MissZ (got {} / {} / {}); using defaults.",
            gameplay.spawn_z, gameplay.strike_z, gameplay.miss_z
        );
        gameplay.spawn_z = dg.spawn_z;
        gameplay.strike_z = dg.strike_z;
        gameplay.miss_z = dg.miss_z;
    }

    Config {
        log_level,
        frame_rate: read(conf, "Options", "FrameRate", d.frame_rate).clamp(1, 1000),
        auto_start: read_flag(conf, "Options", "AutoStart", d.auto_start),
        tracker_rate: read(conf, "Options", "TrackerRate", d.tracker_rate).clamp(1, 1000),
        tracker_jitter: read_non_negative(conf, "Options", "TrackerJitter", d.tracker_jitter),
        tracker_dropout: read_unit(conf, "Options", "TrackerDropout", d.tracker_dropout),
        tracker_miss_rate: read_unit(conf, "Options", "TrackerMissRate", d.tracker_miss_rate),
        tracker_seed: read(conf, "Options", "TrackerSeed", d.tracker_seed),
        tracker_warmup_ms: read(conf, "Options", "TrackerWarmupMs", d.tracker_warmup_ms),
        gameplay,
    }
}

pub fn load() {
    if !std::path::Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(CONFIG_PATH) {
        Ok(conf) => {
            *CONFIG.lock().unwrap() = from_ini(&conf);
            info!("Configuration loaded from '{CONFIG_PATH}'.");
        }
        Err(e) => {
            warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values.");
        }
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let conf = Ini::load_from_str("[Options]\nLogLevel=Debug\n").unwrap();
        let cfg = from_ini(&conf);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.frame_rate, 60);
        assert_eq!(cfg.gameplay, GameplayConfig::default());
    }

    #[test]
    fn invalid_values_fall_back() {
        let conf = Ini::load_from_str(
            "[Gameplay]\nNoteSpeed=-3\nScorePerHit=lots\nStrikeRadius=1.25\n\
             [Options]\nAutoStart=no\nTrackerDropout=4\n",
        )
        .unwrap();
        let cfg = from_ini(&conf);
        assert_eq!(cfg.gameplay.note_speed, 12.0);
        assert_eq!(cfg.gameplay.score_per_hit, 100);
        assert_eq!(cfg.gameplay.strike_radius, 1.25);
        assert!(!cfg.auto_start);
        assert_eq!(cfg.tracker_dropout, 1.0);
    }

    #[test]
    fn non_finite_tracker_values_fall_back() {
        let conf = Ini::load_from_str(
            "[Options]\nTrackerMissRate=NaN\nTrackerDropout=nan\nTrackerJitter=inf\n\
             [Gameplay]\nStrikeZ=NaN\nCutSpeedThreshold=-inf\nHealthPerHit=NaN\n",
        )
        .unwrap();
        let cfg = from_ini(&conf);
        let d = Config::default();
        assert_eq!(cfg.tracker_miss_rate, d.tracker_miss_rate);
        assert_eq!(cfg.tracker_dropout, d.tracker_dropout);
        assert_eq!(cfg.tracker_jitter, d.tracker_jitter);
        assert_eq!(cfg.gameplay, GameplayConfig::default());
    }

    #[test]
    fn negative_jitter_falls_back() {
        let conf = Ini::load_from_str("[Options]\nTrackerJitter=-0.5\nTrackerMissRate=-2\n").unwrap();
        let cfg = from_ini(&conf);
        assert_eq!(cfg.tracker_jitter, 0.05);
        assert_eq!(cfg.tracker_miss_rate, 0.0);
    }

    #[test]
    fn inverted_depth_layout_is_rejected() {
        let conf = Ini::load_from_str("[Gameplay]\nSpawnZ=10\nMissZ=-5\n").unwrap();
        let cfg = from_ini(&conf);
        assert_eq!(cfg.gameplay.spawn_z, -30.0);
        assert_eq!(cfg.gameplay.miss_z, 5.0);
    }

    #[test]
    fn written_defaults_read_back_unchanged() {
        let written = to_ini(&Config::default());
        let cfg = from_ini(&written);
        assert_eq!(cfg.gameplay, GameplayConfig::default());
        assert_eq!(cfg.log_level, LogLevel::Info);
        assert_eq!(cfg.tracker_seed, 7);
        assert!(cfg.auto_start);
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!(LogLevel::from_str("TRACE"), Ok(LogLevel::Trace));
        assert_eq!(LogLevel::from_str(" warning "), Ok(LogLevel::Warn));
        assert!(LogLevel::from_str("loud").is_err());
        assert_eq!(LogLevel::Off.as_level_filter(), log::LevelFilter::Off);
    }
}
