pub mod app_dirs;
pub mod config;
pub mod content;
pub mod final_stats;
pub mod history;
pub mod identity;
pub mod journal;
pub mod metrics;
pub mod runtime;
pub mod scores;
pub mod session;
pub mod submission;
pub mod ui;
pub mod util;

use std::error::Error;
use std::io::{self, stdin};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Instant;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use webbrowser::Browser;

use crate::app_dirs::AppDirs;
use crate::config::{Config, ConfigStore, FileConfigStore};
use crate::content::{ContentLibrary, TestDuration, TextMode};
use crate::identity::{IdentityProvider, StoredIdentity};
use crate::journal::{JournalEntry, SessionJournal};
use crate::runtime::{CrosstermEventSource, Event, FixedTicker, Runner};
use crate::scores::{LeaderboardEntry, ScoreStore, SqliteScoreStore, LEADERBOARD_SIZE};
use crate::session::{Phase, TypingTest};
use crate::submission::{Attempt, ScoreSubmitter, SubmissionOutcome, SubmissionUpdate, SubmitError};

/// Ticks between a stored personal best and the leaderboard reveal.
const REVEAL_DELAY_TICKS: u32 = 30;

/// terminal typing speed test with live charts and a local leaderboard
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing speed test: live WPM and accuracy, a smoothed performance chart, per-character outcome breakdown, and a per-user best-score leaderboard."
)]
pub struct Cli {
    /// test duration
    #[clap(short = 'd', long, value_enum)]
    duration: Option<TestDuration>,

    /// kind of text to type
    #[clap(short = 'm', long, value_enum)]
    mode: Option<TextMode>,

    /// draw from the competitive pool and mark scores as competitive
    #[clap(long)]
    competitive: bool,

    /// name to submit scores under
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// custom target text to type instead of the built-in pools
    #[clap(short = 'p', long)]
    prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
    Leaderboard,
}

pub struct App {
    pub test: TypingTest,
    pub state: AppState,
    pub status: Option<String>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub highlight_user: Option<String>,
    config: Config,
    config_store: FileConfigStore,
    custom_prompt: Option<String>,
    identity: StoredIdentity,
    submitter: ScoreSubmitter,
    journal: SessionJournal,
    db_path: PathBuf,
    events_tx: Sender<Event>,
    /// Bumped on every reset; stale submission results are discarded by it.
    epoch: u64,
    pending_reveal: Option<u32>,
}

enum Flow {
    Continue,
    Quit,
}

impl App {
    pub fn new(cli: Cli, events_tx: Sender<Event>) -> Self {
        let config_store = FileConfigStore::new();
        let mut config = config_store.load();
        if let Some(duration) = cli.duration {
            config.duration = duration;
        }
        if let Some(mode) = cli.mode {
            config.mode = mode;
        }
        if cli.competitive {
            config.competitive = true;
        }
        if cli.user.is_some() {
            config.username = cli.user.clone();
        }
        let _ = config_store.save(&config);

        let identity = StoredIdentity::new(config.username.clone());
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("typometer_scores.db"));
        let custom_prompt = cli.prompt;

        let settings = config.settings();
        let target = custom_prompt.clone().unwrap_or_else(|| {
            ContentLibrary::pick_text(settings.duration, settings.mode, settings.competitive)
        });

        Self {
            test: TypingTest::new(target, settings),
            state: AppState::Typing,
            status: None,
            leaderboard: Vec::new(),
            highlight_user: identity.current_user().map(|u| u.display_name),
            config,
            config_store,
            custom_prompt,
            identity,
            submitter: ScoreSubmitter::new(db_path.clone()),
            journal: SessionJournal::new(),
            db_path,
            events_tx,
            epoch: 0,
            pending_reveal: None,
        }
    }

    /// Reset to Idle with a fresh session. Cancels the scheduled reveal and
    /// invalidates any in-flight submission's follow-up actions.
    fn begin_session(&mut self, reuse_target: bool) {
        self.epoch += 1;
        self.pending_reveal = None;
        self.status = None;

        let settings = self.test.settings();
        let target = if reuse_target {
            self.test.target_text()
        } else {
            self.custom_prompt.clone().unwrap_or_else(|| {
                ContentLibrary::pick_text(settings.duration, settings.mode, settings.competitive)
            })
        };
        self.test.reset(target);
        self.state = AppState::Typing;
    }

    /// Journal the finished run, then hand it to the automatic submitter.
    /// The session's report is already sealed by the time this runs.
    fn on_completion(&mut self) {
        self.state = AppState::Results;

        let Some(report) = self.test.report().copied() else {
            return;
        };
        let settings = self.test.settings();

        if let Err(err) = self
            .journal
            .append(&JournalEntry::from_report(&report, settings))
        {
            self.status = Some(format!("session log not written: {err}"));
        }

        let attempt = Attempt::from_report(&report, settings);
        let tx = self.events_tx.clone();
        self.submitter.submit_auto(
            self.identity.current_user(),
            attempt,
            self.epoch,
            move |update| {
                let _ = tx.send(Event::Submission(update));
            },
        );
    }

    fn submit_manually(&mut self) {
        if self.test.is_submitted() {
            self.status = Some("score already submitted".to_string());
            return;
        }
        let Some(report) = self.test.report().copied() else {
            return;
        };
        let attempt = Attempt::from_report(&report, self.test.settings());
        let tx = self.events_tx.clone();
        match self.submitter.submit(
            self.identity.current_user(),
            attempt,
            self.epoch,
            move |update| {
                let _ = tx.send(Event::Submission(update));
            },
        ) {
            Ok(()) => self.status = Some("submitting...".to_string()),
            Err(SubmitError::AuthRequired) => {
                self.status = Some("sign in required: restart with --user <name>".to_string());
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn handle_submission(&mut self, update: SubmissionUpdate) {
        if update.epoch != self.epoch {
            // The session moved on; the write may have landed, but its UI
            // follow-ups die here.
            return;
        }
        match update.result {
            Ok(SubmissionOutcome::Improved {
                record,
                leaderboard,
            }) => {
                self.test.mark_submitted();
                self.leaderboard = leaderboard;
                self.highlight_user = Some(record.username);
                self.status = Some(format!("new personal best: {} wpm", record.wpm));
                if self.state != AppState::Leaderboard {
                    self.pending_reveal = Some(REVEAL_DELAY_TICKS);
                }
            }
            Ok(SubmissionOutcome::NotImproved { existing }) => {
                self.status = Some(format!(
                    "best stands at {} wpm / {:.1}% acc",
                    existing.wpm, existing.accuracy
                ));
            }
            Err(err) => {
                // Non-fatal: metrics stay local, persistence is deferred.
                self.status = Some(format!("score not saved: {err}"));
            }
        }
    }

    fn fetch_leaderboard(&mut self) {
        match SqliteScoreStore::open(&self.db_path)
            .and_then(|store| store.top_scores(LEADERBOARD_SIZE))
        {
            Ok(entries) => self.leaderboard = entries,
            Err(err) => self.status = Some(format!("leaderboard unavailable: {err}")),
        }
    }

    fn persist_settings(&mut self) {
        let settings = self.test.settings();
        self.config.duration = settings.duration;
        self.config.mode = settings.mode;
        self.config.competitive = settings.competitive;
        let _ = self.config_store.save(&self.config);
    }

    fn on_tick(&mut self, now: Instant) {
        let was_completed = self.test.is_completed();
        self.test.on_tick(now);
        if !was_completed && self.test.is_completed() {
            self.on_completion();
        }

        if let Some(remaining) = self.pending_reveal.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.pending_reveal = None;
                self.state = AppState::Leaderboard;
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        match self.state {
            AppState::Typing => self.handle_typing_key(key, now),
            AppState::Results => self.handle_results_key(key),
            AppState::Leaderboard => self.handle_leaderboard_key(key),
        }
    }

    fn handle_typing_key(&mut self, key: KeyEvent, now: Instant) -> Flow {
        match key.code {
            KeyCode::Esc => {
                if self.test.phase() == Phase::Idle {
                    return Flow::Quit;
                }
                self.begin_session(false);
            }
            KeyCode::Tab => {
                let next = match self.test.settings().duration {
                    TestDuration::Short => TestDuration::Medium,
                    TestDuration::Medium => TestDuration::Long,
                    TestDuration::Long => TestDuration::Marathon,
                    TestDuration::Marathon => TestDuration::Short,
                };
                // Rejected while the clock runs.
                if self.test.change_duration(next) {
                    self.persist_settings();
                    self.begin_session(false);
                }
            }
            KeyCode::BackTab => {
                let next = match self.test.settings().mode {
                    TextMode::Normal => TextMode::Code,
                    TextMode::Code => TextMode::Normal,
                };
                if self.test.set_mode(next) {
                    self.persist_settings();
                    self.begin_session(false);
                }
            }
            KeyCode::Char('k') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if self.test.toggle_competitive() {
                    self.persist_settings();
                    self.begin_session(false);
                }
            }
            KeyCode::Backspace => {
                let mut typed = self.test.current_line_typed().to_string();
                typed.pop();
                self.test.on_input(&typed, now);
            }
            KeyCode::Char(c) => {
                let was_completed = self.test.is_completed();
                let mut typed = self.test.current_line_typed().to_string();
                typed.push(c);
                self.test.on_input(&typed, now);
                if !was_completed && self.test.is_completed() {
                    self.on_completion();
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_results_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc | KeyCode::Char('n') => self.begin_session(false),
            KeyCode::Char('r') => self.begin_session(true),
            KeyCode::Char('s') => self.submit_manually(),
            KeyCode::Char('l') => {
                self.fetch_leaderboard();
                self.state = AppState::Leaderboard;
            }
            KeyCode::Char('t') => {
                if let Some(report) = self.test.report() {
                    if Browser::is_available() {
                        webbrowser::open(&format!(
                            "https://twitter.com/intent/tweet?text={}%20wpm%20%2F%20{:.1}%25%20acc%20on%20typometer",
                            report.wpm, report.accuracy
                        ))
                        .unwrap_or_default();
                    }
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_leaderboard_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc | KeyCode::Char('b') => {
                self.state = if self.test.report().is_some() {
                    AppState::Results
                } else {
                    AppState::Typing
                };
            }
            KeyCode::Char('n') => self.begin_session(false),
            KeyCode::Char('r') => self.begin_session(true),
            _ => {}
        }
        Flow::Continue
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
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let event_source = CrosstermEventSource::new();
    let events_tx = event_source.sender();
    let runner = Runner::new(event_source, FixedTicker::default());

    let mut app = App::new(cli, events_tx);
    let result = run(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run<B: ratatui::backend::Backend, E: crate::runtime::EventSource, T: crate::runtime::Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        let now = Instant::now();
        match runner.step() {
            Event::Tick => app.on_tick(now),
            Event::Resize => {}
            Event::FocusLost => app.test.pause(now),
            Event::FocusGained => app.test.resume(now),
            Event::Submission(update) => app.handle_submission(update),
            Event::Key(key) => {
                if let Flow::Quit = app.handle_key(key, now) {
                    return Ok(());
                }
            }
        }
    }
}
