pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod difficulty;
pub mod evaluate;
pub mod protocol;
pub mod router;
pub mod runtime;
pub mod session;
pub mod session_log;
pub mod stats;
pub mod sweep;
pub mod ui;

use crate::{
    config::{Config, ConfigStore, FileConfigStore},
    controller::{SessionController, StartOutcome},
    difficulty::{Difficulty, Level},
    protocol::{OneOrMany, SkillCheckOver, StartSkillCheck},
    runtime::{CrosstermEventSource, FixedTicker, RingEvent, Runner, SessionClock},
    session::ConfigError,
    stats::{AttemptDb, AttemptRow, DifficultySummary},
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Duration,
};

const TICK_RATE_MS: u64 = 33;

/// circular skill-check minigame with a rotating indicator, chained stages,
/// and attempt analytics
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A circular skill-check minigame: catch the rotating indicator inside the target arc. Chain stages with repeated -d flags, bind your own keys, and review attempt analytics."
)]
pub struct Cli {
    /// difficulty of each stage; repeat the flag for a multi-stage chain
    #[clap(short = 'd', long = "difficulty", value_enum)]
    difficulty: Vec<Level>,

    /// target arc width in degrees for a single custom stage (overrides -d)
    #[clap(long)]
    area_size: Option<f64>,

    /// indicator speed multiplier for the custom stage
    #[clap(long, requires = "area_size")]
    speed_multiplier: Option<f64>,

    /// accepted input key; repeat the flag for a pool (default "e")
    #[clap(short = 'k', long = "key")]
    keys: Vec<String>,

    /// seed for reproducible zone and key draws
    #[clap(long)]
    seed: Option<u64>,

    /// open the attempt history screen instead of starting a session
    #[clap(long)]
    stats: bool,

    /// do not record attempts to the stats database
    #[clap(long)]
    no_record: bool,

    /// print the handleSkillCheckOver envelope to stdout on exit
    #[clap(long)]
    emit_json: bool,
}

impl Cli {
    /// Build the host start command, falling back to persisted defaults
    /// for anything the flags leave unset.
    fn to_start_command(&self, config: &Config) -> StartSkillCheck {
        let stages = if let Some(area_size) = self.area_size {
            OneOrMany::One(Difficulty::Custom {
                area_size,
                speed_multiplier: self.speed_multiplier.unwrap_or(1.0),
            })
        } else if !self.difficulty.is_empty() {
            OneOrMany::Many(
                self.difficulty
                    .iter()
                    .map(|level| Difficulty::named(*level))
                    .collect(),
            )
        } else {
            OneOrMany::Many(config.difficulty.clone())
        };

        let inputs = if !self.keys.is_empty() {
            Some(self.keys.clone())
        } else if config.inputs.is_empty() {
            None
        } else {
            Some(config.inputs.clone())
        };

        StartSkillCheck { stages, inputs }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Playing,
    Results,
    History,
}

#[derive(Debug, Default)]
pub struct HistoryState {
    pub rows: Vec<AttemptRow>,
    pub summaries: Vec<DifficultySummary>,
    pub scroll_offset: usize,
}

pub struct App {
    pub cli: Option<Cli>,
    pub controller: Option<SessionController<StdRng>>,
    pub clock: SessionClock,
    pub state: AppState,
    pub reply: Option<SkillCheckOver>,
    pub rejection: Option<ConfigError>,
    pub history: HistoryState,
    pub record_attempts: bool,
    recorded: bool,
}

impl App {
    pub fn new(cli: Cli) -> Self {
        let config = FileConfigStore::new().load();
        let record_attempts = !cli.no_record && config.record_attempts;
        let open_stats = cli.stats;

        let mut app = Self {
            cli: Some(cli),
            controller: None,
            clock: SessionClock::start(),
            state: AppState::Results,
            reply: None,
            rejection: None,
            history: HistoryState::default(),
            record_attempts,
            recorded: false,
        };

        if open_stats {
            app.open_history();
        } else {
            app.start_session(true, &config);
        }
        app
    }

    /// Build a fresh controller from the CLI settings. Any previous session's
    /// controller is dropped here, releasing its input routing before the new
    /// session draws its first stage; the superseded session emits nothing.
    fn start_session(&mut self, reuse_seed: bool, config: &Config) {
        let cli = self.cli.clone().unwrap();
        let command = cli.to_start_command(config);
        let rng = match (reuse_seed, cli.seed) {
            (true, Some(seed)) => StdRng::seed_from_u64(seed),
            _ => StdRng::from_entropy(),
        };

        // Tear down any superseded session before the new one is built
        self.controller = None;
        self.clock = SessionClock::start();
        self.reply = None;
        self.rejection = None;
        self.recorded = false;

        match SessionController::start_command(&command, rng, self.clock.now_ms()) {
            StartOutcome::Started(controller) => {
                self.controller = Some(*controller);
                self.state = AppState::Playing;
            }
            StartOutcome::Rejected { error, reply } => {
                self.controller = None;
                self.rejection = Some(error);
                self.reply = Some(reply);
                self.recorded = true;
                self.state = AppState::Results;
            }
        }
    }

    pub fn reset(&mut self, reuse_seed: bool) {
        let config = FileConfigStore::new().load();
        self.start_session(reuse_seed, &config);
    }

    /// Terminal transition reached: persist the session and show results.
    pub fn finish(&mut self, reply: SkillCheckOver) {
        self.reply = Some(reply);
        self.state = AppState::Results;
        if self.recorded {
            return;
        }
        self.recorded = true;

        if let Some(controller) = self.controller.as_ref() {
            if self.record_attempts {
                if let Ok(mut db) = AttemptDb::new() {
                    let _ = db.record_session(controller.attempts());
                }
            }
            let _ = session_log::append_session(controller.result(), controller.attempts());
        }
    }

    pub fn open_history(&mut self) {
        if let Ok(db) = AttemptDb::new() {
            self.history.rows = db.recent(200).unwrap_or_default();
            self.history.summaries = db.summary_by_difficulty().unwrap_or_default();
        }
        self.history.scroll_offset = 0;
        self.state = AppState::History;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(cli);
    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;
    outcome?;

    if app.cli.as_ref().map(|c| c.emit_json).unwrap_or(false) {
        if let Some(reply) = app.reply {
            println!("{}", reply.envelope());
        }
    }

    Ok(())
}

#[derive(Debug)]
enum ExitType {
    Restart,
    New,
    Quit,
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        let mut exit_type: ExitType = ExitType::Quit;
        terminal.draw(|f| ui(app, f))?;

        loop {
            match runner.step() {
                RingEvent::Tick => {
                    if app.state == AppState::Playing {
                        let now = app.clock.now_ms();
                        if let Some(reply) = app.controller.as_mut().and_then(|c| c.on_tick(now))
                        {
                            app.finish(reply);
                        }
                        terminal.draw(|f| ui(app, f))?;
                    }
                }
                RingEvent::Resize => {
                    terminal.draw(|f| ui(app, f))?;
                }
                RingEvent::Key(key) => {
                    match key.code {
                        KeyCode::Esc => {
                            if app.state == AppState::Playing {
                                if let Some(reply) =
                                    app.controller.as_mut().and_then(|c| c.cancel())
                                {
                                    app.finish(reply);
                                }
                            } else {
                                break;
                            }
                        }
                        KeyCode::Up => {
                            if app.state == AppState::History {
                                app.history.scroll_offset =
                                    app.history.scroll_offset.saturating_sub(1);
                            }
                        }
                        KeyCode::Down => {
                            if app.state == AppState::History {
                                // Clamped against the row count in the renderer
                                app.history.scroll_offset += 1;
                            }
                        }
                        KeyCode::Char(c) => {
                            if key.modifiers.contains(KeyModifiers::CONTROL)
                                && key.code == KeyCode::Char('c')
                            // ctrl+c to quit
                            {
                                break;
                            }

                            match app.state {
                                AppState::Playing => {
                                    let now = app.clock.now_ms();
                                    if let Some(reply) = app
                                        .controller
                                        .as_mut()
                                        .and_then(|ctrl| ctrl.on_key(&c.to_string(), now))
                                    {
                                        app.finish(reply);
                                    }
                                }
                                AppState::Results => match key.code {
                                    KeyCode::Char('r') => {
                                        exit_type = ExitType::Restart;
                                        break;
                                    }
                                    KeyCode::Char('n') => {
                                        exit_type = ExitType::New;
                                        break;
                                    }
                                    KeyCode::Char('s') => {
                                        app.open_history();
                                    }
                                    _ => {}
                                },
                                AppState::History => match key.code {
                                    KeyCode::Char('r') => {
                                        exit_type = ExitType::Restart;
                                        break;
                                    }
                                    KeyCode::Char('n') => {
                                        exit_type = ExitType::New;
                                        break;
                                    }
                                    KeyCode::Char('b') => {
                                        if app.reply.is_some() {
                                            app.state = AppState::Results;
                                        }
                                    }
                                    _ => {}
                                },
                            }
                        }
                        _ => {}
                    }
                    terminal.draw(|f| ui(app, f))?;
                }
            }
        }

        match exit_type {
            ExitType::Restart => {
                app.reset(true);
            }
            ExitType::New => {
                app.reset(false);
            }
            ExitType::Quit => {
                break;
            }
        }
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    match app.state {
        AppState::Playing | AppState::Results => {
            f.render_widget(&*app, f.area());
        }
        AppState::History => {
            ui::render_history(app, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["ringcheck"]);

        assert!(cli.difficulty.is_empty());
        assert_eq!(cli.area_size, None);
        assert_eq!(cli.speed_multiplier, None);
        assert!(cli.keys.is_empty());
        assert_eq!(cli.seed, None);
        assert!(!cli.stats);
        assert!(!cli.no_record);
        assert!(!cli.emit_json);
    }

    #[test]
    fn repeated_difficulty_flags_build_a_chain() {
        let cli = Cli::parse_from(["ringcheck", "-d", "easy", "-d", "easy", "-d", "hard"]);
        let command = cli.to_start_command(&Config::default());

        assert_eq!(
            command.stages.as_slice(),
            [
                Difficulty::named(Level::Easy),
                Difficulty::named(Level::Easy),
                Difficulty::named(Level::Hard),
            ]
        );
    }

    #[test]
    fn custom_shape_overrides_named_difficulties() {
        let cli = Cli::parse_from([
            "ringcheck",
            "-d",
            "easy",
            "--area-size",
            "30",
            "--speed-multiplier",
            "2.0",
        ]);
        let command = cli.to_start_command(&Config::default());

        assert_eq!(
            command.stages.as_slice(),
            [Difficulty::Custom {
                area_size: 30.0,
                speed_multiplier: 2.0,
            }]
        );
    }

    #[test]
    fn key_flags_feed_the_input_pool() {
        let cli = Cli::parse_from(["ringcheck", "-k", "W", "-k", "A"]);
        let command = cli.to_start_command(&Config::default());
        assert_eq!(
            command.inputs.as_deref(),
            Some(&["W".to_string(), "A".into()][..])
        );
    }

    #[test]
    fn unset_flags_fall_back_to_config() {
        let cli = Cli::parse_from(["ringcheck"]);
        let config = Config {
            difficulty: vec![Difficulty::Named("hard".into())],
            inputs: vec!["q".into()],
            record_attempts: true,
        };
        let command = cli.to_start_command(&config);

        assert_eq!(
            command.stages.as_slice(),
            [Difficulty::Named("hard".into())]
        );
        assert_eq!(command.inputs.as_deref(), Some(&["q".to_string()][..]));
    }
}
