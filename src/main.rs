use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    io::{self, stdin},
    time::{Duration, Instant},
};

use cubik::api::ApiClient;
use cubik::app::App;
use cubik::app_dirs::AppDirs;
use cubik::config::{Config, ConfigStore, FileConfigStore};
use cubik::runtime::{CrosstermEventSource, FixedTicker, Runner};
use cubik::solve::PuzzleKind;
use cubik::stats::SolveJournal;
use cubik::worker;

const TICK_RATE_MS: u64 = 16;

/// terminal speedcubing timer backed by a training server
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal speedcubing timer with hold-to-arm starts, WCA-style inspection and penalties, live session statistics, and optimal-solution lookups, all backed by a training server."
)]
pub struct Cli {
    /// base URL of the training server
    #[clap(short = 'u', long)]
    server: Option<String>,

    /// puzzle event to practice
    #[clap(short, long, value_enum)]
    event: Option<PuzzleKind>,

    /// skip the inspection countdown for this run
    #[clap(long)]
    no_inspection: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// log in to the training server and store the auth token
    Login {
        email: String,
        #[clap(long)]
        password: String,
    },
    /// create an account on the training server
    Signup {
        email: String,
        name: String,
        #[clap(long)]
        password: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let store = FileConfigStore::new();
    let mut config = store.load();
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    if let Some(event) = cli.event {
        config.event = event;
    }
    if cli.no_inspection {
        config.inspection_enabled = false;
    }

    if let Some(command) = &cli.command {
        return run_auth(command, &config, &store);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let client = ApiClient::new(config.server_url.clone(), config.auth_token.clone())
        .map_err(io::Error::other)?;
    let journal = AppDirs::journal_path().map(SolveJournal::new);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Key releases drive the hold-to-arm flow; without the enhancement
    // protocol a plain tap starts and stops the timer instead.
    let hold_to_arm = matches!(supports_keyboard_enhancement(), Ok(true));
    if hold_to_arm {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let source = CrosstermEventSource::new();
    let jobs = worker::spawn(client, source.sender());
    let runner = Runner::new(
        source,
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    let mut app = App::new(config, Box::new(store), jobs, journal, hold_to_arm);

    loop {
        terminal.draw(|f| f.render_widget(&app, f.area()))?;
        let event = runner.step();
        app.handle_event(event, Instant::now());
        if app.should_quit {
            break;
        }
    }

    if hold_to_arm {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(())
}

fn run_auth(
    command: &Command,
    config: &Config,
    store: &FileConfigStore,
) -> Result<(), Box<dyn Error>> {
    let client =
        ApiClient::new(config.server_url.clone(), None).map_err(io::Error::other)?;

    let token = match command {
        Command::Login { email, password } => client.login(email, password),
        Command::Signup {
            email,
            name,
            password,
        } => client.signup(email, name, password),
    }
    .map_err(io::Error::other)?;

    let mut updated = config.clone();
    updated.auth_token = Some(token.token);
    store.save(&updated)?;

    println!("token saved; solves will be recorded to your account");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["cubik"]);

        assert_eq!(cli.server, None);
        assert!(cli.event.is_none());
        assert!(!cli.no_inspection);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_server_override() {
        let cli = Cli::parse_from(["cubik", "-u", "http://cube.local:5000"]);
        assert_eq!(cli.server.as_deref(), Some("http://cube.local:5000"));

        let cli = Cli::parse_from(["cubik", "--server", "http://cube.local:5000"]);
        assert_eq!(cli.server.as_deref(), Some("http://cube.local:5000"));
    }

    #[test]
    fn test_cli_event_values() {
        let cli = Cli::parse_from(["cubik", "-e", "3x3"]);
        assert_eq!(cli.event, Some(PuzzleKind::ThreeByThree));

        let cli = Cli::parse_from(["cubik", "--event", "2x2"]);
        assert_eq!(cli.event, Some(PuzzleKind::TwoByTwo));
    }

    #[test]
    fn test_cli_rejects_unknown_event() {
        assert!(Cli::try_parse_from(["cubik", "-e", "4x4"]).is_err());
    }

    #[test]
    fn test_cli_no_inspection_flag() {
        let cli = Cli::parse_from(["cubik", "--no-inspection"]);
        assert!(cli.no_inspection);
    }

    #[test]
    fn test_cli_login_subcommand() {
        let cli = Cli::parse_from(["cubik", "login", "ada@example.com", "--password", "hunter2"]);
        match cli.command {
            Some(Command::Login { email, password }) => {
                assert_eq!(email, "ada@example.com");
                assert_eq!(password, "hunter2");
            }
            other => panic!("expected login subcommand, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_signup_subcommand() {
        let cli = Cli::parse_from([
            "cubik",
            "signup",
            "ada@example.com",
            "Ada",
            "--password",
            "hunter2",
        ]);
        match cli.command {
            Some(Command::Signup {
                email,
                name,
                password,
            }) => {
                assert_eq!(email, "ada@example.com");
                assert_eq!(name, "Ada");
                assert_eq!(password, "hunter2");
            }
            other => panic!("expected signup subcommand, got {:?}", other),
        }
    }
}
