use crate::config::{self, Config};
use crate::core::audio::AudioSource;
use crate::core::clock::{AudioClock, PlaybackClock, SharedMusicTime};
use crate::core::sim_tracker::{SimSettings, SimulatedTracker};
use crate::core::tracking::{self, TrackingFeed};
use crate::game::gameplay::{self, NoteLifecycle};
use crate::game::session::GameStatus;
use crate::game::stage_stats::StageSummary;

use log::{debug, error, info, warn};
use std::error::Error;
use std::io::BufRead;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{self, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct Options {
    pub audio_path: PathBuf,
    pub json: bool,
    pub manual: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Pause,
    Reset,
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "s" => Ok(Self::Start),
            "pause" | "resume" | "p" => Ok(Self::Pause),
            "reset" | "r" => Ok(Self::Reset),
            "status" | "?" => Ok(Self::Status),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            _ => Err(()),
        }
    }
}

fn spawn_stdin_reader(tx: UnboundedSender<Command>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(()) => warn!("Unknown command '{}'. Try start, pause, reset, status or quit.", line.trim()),
            }
        }
        debug!("stdin closed; command reader exiting.");
    });
}

/// One-second countdown cadence. Pausing keeps whatever is left of the
/// current second so a resume picks up where it stopped.
#[derive(Debug)]
struct CountdownTimer {
    period: Duration,
    next: time::Instant,
    paused_left: Option<Duration>,
}

impl CountdownTimer {
    fn new(period: Duration, now: time::Instant) -> Self {
        Self {
            period,
            next: now + period,
            paused_left: None,
        }
    }

    fn restart(&mut self, now: time::Instant) {
        self.next = now + self.period;
        self.paused_left = None;
    }

    fn pause(&mut self, now: time::Instant) {
        if self.paused_left.is_none() {
            self.paused_left = Some(self.next.saturating_duration_since(now));
        }
    }

    fn resume(&mut self, now: time::Instant) {
        if let Some(left) = self.paused_left.take() {
            self.next = now + left;
        }
    }

    const fn deadline(&self) -> time::Instant {
        self.next
    }

    /// Schedules the next tick. A late tick delays the cadence instead of
    /// bursting.
    fn fire(&mut self, now: time::Instant) {
        self.next += self.period;
        if self.next <= now {
            self.next = now + self.period;
        }
    }
}

/// Everything the frame and countdown tasks share. Both run on the same
/// thread, so they never overlap.
struct AppState {
    gameplay: gameplay::State,
    clock: AudioClock,
    tracking: TrackingFeed,
    music_time: SharedMusicTime,
    auto_start: bool,
    json: bool,
    last_frame_time: Instant,
    round_reported: bool,
}

impl AppState {
    fn new(cfg: &Config, source: AudioSource, opts: &Options) -> Self {
        let gameplay = gameplay::init(cfg.gameplay);
        let music_time = SharedMusicTime::new();
        let tracker = SimulatedTracker::new(
            gameplay.chart.clone(),
            cfg.gameplay,
            music_time.clone(),
            SimSettings::from_config(cfg),
        );
        let mut clock = AudioClock::new();
        clock.load(source);
        Self {
            gameplay,
            clock,
            tracking: tracking::spawn_tracking_source(tracker),
            music_time,
            auto_start: cfg.auto_start && !opts.manual,
            json: opts.json,
            last_frame_time: Instant::now(),
            round_reported: false,
        }
    }

    fn status(&self) -> GameStatus {
        self.gameplay.session.status()
    }

    fn start(&mut self, countdown: &mut CountdownTimer) -> bool {
        let audio_loaded = self.clock.has_source();
        let tracking_ready = self.tracking.is_ready();
        match gameplay::start(&mut self.gameplay, &mut self.clock, audio_loaded, tracking_ready) {
            Ok(()) => {
                if let Some(source) = self.clock.source() {
                    info!("Playing '{}'.", source.name());
                }
                countdown.restart(time::Instant::now());
                self.round_reported = false;
                self.last_frame_time = Instant::now();
                true
            }
            Err(e) => {
                warn!("Start refused: {e}");
                false
            }
        }
    }

    fn handle_command(&mut self, cmd: Command, countdown: &mut CountdownTimer) {
        match cmd {
            Command::Start => {
                self.start(countdown);
            }
            Command::Pause => {
                if gameplay::toggle_pause(&mut self.gameplay, &mut self.clock).is_ok() {
                    let now = time::Instant::now();
                    match self.status() {
                        GameStatus::Paused => countdown.pause(now),
                        GameStatus::Playing => countdown.resume(now),
                        _ => {}
                    }
                }
            }
            Command::Reset => {
                if gameplay::reset(&mut self.gameplay, &mut self.clock) {
                    self.music_time.store(0.0);
                }
            }
            Command::Status => self.log_hud(),
            Command::Quit => {}
        }
    }

    fn log_hud(&self) {
        let session = &self.gameplay.session;
        let views = gameplay::visible_notes(&self.gameplay);
        let pending = views
            .iter()
            .filter(|v| v.lifecycle == NoteLifecycle::Pending)
            .count();
        info!(
            "[{}] Score: {} | Combo: {} | Health: {} | Time: {} | Visible: {} ({} pending)",
            session.status(),
            session.score(),
            session.combo(),
            session.display_health(),
            session.countdown_label(),
            views.len(),
            pending
        );
    }

    fn frame(&mut self) -> Result<(), Box<dyn Error>> {
        let now = Instant::now();
        let delta_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        if self.tracking.poll() {
            gameplay::mark_tracking_ready(&mut self.gameplay);
        }
        if self.status() == GameStatus::Loading {
            if let Some(reason) = self.tracking.failure() {
                return Err(format!("hand tracking unavailable: {reason}").into());
            }
        }

        let hands = self.tracking.latest();
        let events = gameplay::update(&mut self.gameplay, &mut self.clock, &hands, delta_time);
        if !events.is_empty() {
            let hits = events.iter().filter(|e| e.is_hit()).count();
            debug!(
                "{} note event(s) this frame ({} hit, {} missed).",
                events.len(),
                hits,
                events.len() - hits
            );
        }
        self.music_time.store(self.clock.current_time());
        Ok(())
    }

    fn countdown(&mut self) {
        gameplay::countdown_tick(&mut self.gameplay, &mut self.clock);
    }

    /// Logs (and optionally prints) the summary once per finished round.
    fn report_if_finished(&mut self) -> Result<(), Box<dyn Error>> {
        if self.round_reported || !self.status().is_terminal() {
            return Ok(());
        }
        self.round_reported = true;
        let summary = StageSummary::from_state(&self.gameplay);
        summary.log();
        if self.json {
            println!("{}", summary.to_json()?);
        }
        Ok(())
    }
}

async fn run_loop(cfg: Config, source: AudioSource, opts: Options) -> Result<(), Box<dyn Error>> {
    let mut app = AppState::new(&cfg, source, &opts);

    let frame_rate = cfg.frame_rate.max(1);
    let mut frame = time::interval(Duration::from_secs_f64(1.0 / f64::from(frame_rate)));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut countdown = CountdownTimer::new(Duration::from_secs(1), time::Instant::now());

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(cmd_tx);
    let mut commands_open = true;

    let auto_mode = app.auto_start;
    if auto_mode {
        info!("Auto-start enabled; the round begins once hand tracking is ready.");
    } else {
        info!("Commands: start, pause, reset, status, quit.");
    }

    loop {
        tokio::select! {
            _ = frame.tick() => {
                app.frame()?;
                if app.auto_start && app.status() == GameStatus::Idle {
                    app.auto_start = false;
                    app.start(&mut countdown);
                }
            }
            _ = time::sleep_until(countdown.deadline()), if app.status() == GameStatus::Playing => {
                countdown.fire(time::Instant::now());
                app.countdown();
            }
            cmd = cmd_rx.recv(), if commands_open => match cmd {
                Some(Command::Quit) => {
                    info!("Quit requested.");
                    break;
                }
                Some(cmd) => app.handle_command(cmd, &mut countdown),
                None => commands_open = false,
            },
        }

        app.report_if_finished()?;
        if auto_mode && app.round_reported {
            break;
        }
        // Without stdin nothing can start another round.
        if !commands_open {
            let waiting_on_auto_start = auto_mode && (app.auto_start || app.status() != GameStatus::Idle);
            if !waiting_on_auto_start {
                info!("No more commands; exiting.");
                break;
            }
        }
    }

    if app.clock.is_playing() {
        app.clock.pause();
    }
    if matches!(app.status(), GameStatus::Playing | GameStatus::Paused) {
        StageSummary::from_state(&app.gameplay).log();
    }
    Ok(())
}

pub fn run(opts: Options) -> Result<(), Box<dyn Error>> {
    let cfg = config::get();
    let source = match AudioSource::open(&opts.audio_path) {
        Ok(source) => source,
        Err(e) => {
            error!("{e}");
            return Err(e.into());
        }
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(run_loop(cfg, source, opts))
}
