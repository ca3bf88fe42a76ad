use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use gymtrack::{
    app::App,
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore},
    logging::{self, LogTarget},
    plan::{load_plan, Training},
    runtime::{EventSource, Runner, TerminalEvents},
    session::SessionStatus,
    storage::{state_key, KeyValueStore, SqliteStore},
    tracker::{SessionTracker, TransitionOutcome},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

/// track a training session: start, pause, resume, complete
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Tracks a training session with pause-aware timing. The session is stored on disk so it survives restarts; without --action an interactive session screen is opened."
)]
pub struct Cli {
    /// identifier of the training to track (defaults to the plan's id)
    #[clap(short = 't', long)]
    training: Option<String>,

    /// training plan JSON file, bare or wrapped in an API response envelope
    #[clap(short = 'p', long)]
    plan: Option<PathBuf>,

    /// session database file (overrides the config file)
    #[clap(long)]
    store: Option<PathBuf>,

    /// run a single action and print the session status instead of opening the screen
    #[clap(short = 'a', long, value_enum)]
    action: Option<Action>,

    /// log filter directive, e.g. "debug" or "gymtrack=trace"
    #[clap(long)]
    log_level: Option<String>,

    /// config file to use instead of the platform default
    #[clap(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Status,
    Start,
    Pause,
    Resume,
    Complete,
    Reset,
    /// every training with a stored session
    List,
}

impl Cli {
    fn load_config(&self) -> Config {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path).load(),
            None => FileConfigStore::new().load(),
        }
    }

    /// Explicit database location, if the flag or config names one
    fn store_path(&self, config: &Config) -> Option<PathBuf> {
        self.store.clone().or_else(|| config.store_path.clone())
    }

    fn load_training(&self) -> Result<Option<Training>, gymtrack::error::PlanError> {
        self.plan.as_ref().map(load_plan).transpose()
    }

    /// Training id from the flag, falling back to the plan's own id
    fn training_id(&self, plan: Option<&Training>) -> Option<String> {
        self.training
            .clone()
            .or_else(|| plan.map(|p| p.id.clone()))
    }
}

fn status_line<S: KeyValueStore, C: Clock>(tracker: &SessionTracker<S, C>) -> String {
    format!("{} {}s", tracker.status(), tracker.elapsed_seconds())
}

/// Apply one headless action; the returned outcome decides the exit code
fn run_action<S: KeyValueStore, C: Clock>(
    tracker: &mut SessionTracker<S, C>,
    action: Action,
) -> TransitionOutcome {
    match action {
        Action::Status | Action::List => TransitionOutcome::Ignored,
        Action::Start => tracker.start(),
        Action::Pause => tracker.pause(),
        Action::Resume => tracker.resume(),
        Action::Complete => tracker.complete(),
        Action::Reset => tracker.reset(),
    }
}

fn list_sessions(store: &SqliteStore) -> Result<Vec<String>, Box<dyn Error>> {
    let prefix = state_key("");
    let mut lines = Vec::new();
    for key in store.keys_with_prefix(&prefix)? {
        let training_id = &key[prefix.len()..];
        let tracker = SessionTracker::new(training_id, store, SystemClock);
        lines.push(format!("{training_id} {}", status_line(&tracker)));
    }
    Ok(lines)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "gymtrack failed");
            eprintln!("gymtrack: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let config = cli.load_config();
    let filter = logging::resolve_filter(cli.log_level.as_deref(), &config.log_filter);
    let log_target = match (cli.action, AppDirs::log_path()) {
        (None, Some(path)) => LogTarget::File(path),
        _ => LogTarget::Stderr,
    };
    if let Err(e) = logging::init(&filter, log_target) {
        eprintln!("gymtrack: logging disabled: {e}");
    }

    let store = match cli.store_path(&config) {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    };
    tracing::debug!(path = ?store.path(), "session store opened");

    if cli.action == Some(Action::List) {
        for line in list_sessions(&store)? {
            println!("{line}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let plan = cli.load_training()?;
    let Some(training_id) = cli.training_id(plan.as_ref()) else {
        let mut cmd = Cli::command();
        cmd.error(
            ErrorKind::MissingRequiredArgument,
            "either --training or --plan must be given",
        )
        .exit();
    };

    let mut tracker = SessionTracker::new(training_id.clone(), &store, SystemClock);

    if let Some(action) = cli.action {
        let outcome = run_action(&mut tracker, action);
        println!("{}", status_line(&tracker));
        return Ok(match outcome {
            TransitionOutcome::NotPersisted => {
                eprintln!("gymtrack: {action} could not be saved");
                ExitCode::FAILURE
            }
            TransitionOutcome::Ignored if action != Action::Status => {
                eprintln!(
                    "gymtrack: cannot {action} a session that is {}",
                    tracker.status()
                );
                ExitCode::SUCCESS
            }
            _ => ExitCode::SUCCESS,
        });
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty (use --action for headless use)")
            .exit();
    }

    let training = plan.unwrap_or_else(|| Training::untitled(training_id));
    let mut app = App::new(training, tracker);
    let runner = Runner::new(
        TerminalEvents::spawn(),
        Duration::from_millis(config.tick_rate_ms),
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result?;
    if app.tracker.status() == SessionStatus::InProgress {
        tracing::info!(training_id = %app.tracker.training_id(), "left screen with session running");
    }
    Ok(ExitCode::SUCCESS)
}

fn start_tui<B, S, C, E>(
    terminal: &mut Terminal<B>,
    app: &mut App<S, C>,
    runner: &Runner<E>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    S: KeyValueStore,
    C: Clock,
    E: EventSource,
{
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    while !app.should_quit {
        if app.on_event(runner.step()) && !app.should_quit {
            terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        }
    }

    Ok(())
}
