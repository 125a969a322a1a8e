mod app;
mod config;
mod core;
mod game;

use std::path::PathBuf;

const USAGE: &str = "usage: drumsync <audio-file> [--json] [--manual]";

fn parse_args(args: impl Iterator<Item = String>) -> Result<app::Options, String> {
    let mut audio_path = None;
    let mut json = false;
    let mut manual = false;
    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            "--manual" => manual = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => {
                return Err(format!("unknown option '{flag}'\n{USAGE}"));
            }
            _ if audio_path.is_none() => audio_path = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument '{arg}'\n{USAGE}")),
        }
    }
    let audio_path = audio_path.ok_or_else(|| USAGE.to_string())?;
    Ok(app::Options {
        audio_path,
        json,
        manual,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let opts = parse_args(std::env::args().skip(1))?;
    config::load();
    log::set_max_level(config::get().log_level.as_level_filter());
    app::run(opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn audio_path_and_flags() {
        let opts = parse_args(args(&["song.ogg", "--json"])).unwrap();
        assert_eq!(opts.audio_path, PathBuf::from("song.ogg"));
        assert!(opts.json);
        assert!(!opts.manual);
    }

    #[test]
    fn missing_or_extra_arguments_are_rejected() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["a.ogg", "b.ogg"])).is_err());
        assert!(parse_args(args(&["a.ogg", "--loud"])).is_err());
    }
}
