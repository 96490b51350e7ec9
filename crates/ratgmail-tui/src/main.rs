use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};

use ratgmail_core::{Authenticator, Draft, DraftKind, Label, MailService, MessageDetail, MessageSummary};
use ratgmail_mail::{DemoMailService, GmailAuth, GmailCredentials, MailEngine, MailEvent};

mod app_lifecycle_mod;
mod cli;
mod config_mod;
mod input_compose_mod;
mod input_main_mod;
mod keymap_mod;
mod logging_mod;
mod message_parse_mod;
mod render_mod;
mod sync_mod;
mod text_input_mod;
mod util_mod;

use crate::cli::Cli;
use crate::config_mod::{GmailConfig, ensure_default_config_exists, load_config};
use crate::logging_mod::init_logging;
use crate::render_mod::ui;
use crate::text_input_mod::TextInput;

const TICK_RATE: Duration = Duration::from_millis(200);
const LOADING_SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Inbox,
    Viewing,
    Loading,
    Composing,
    Replying,
    Searching,
    ManagingLabels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComposeField {
    From,
    To,
    Cc,
    Bcc,
    Subject,
    Body,
}

impl ComposeField {
    const ALL: [ComposeField; 6] = [
        ComposeField::From,
        ComposeField::To,
        ComposeField::Cc,
        ComposeField::Bcc,
        ComposeField::Subject,
        ComposeField::Body,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn label(self) -> &'static str {
        match self {
            ComposeField::From => "From",
            ComposeField::To => "To",
            ComposeField::Cc => "CC",
            ComposeField::Bcc => "BCC",
            ComposeField::Subject => "Subj",
            ComposeField::Body => "Body",
        }
    }
}

/// Path entry opened with Ctrl+A, bound to the draft it will extend.
#[derive(Debug, Clone)]
struct AttachmentEntry {
    kind: DraftKind,
    input: TextInput,
}

struct App {
    mode: Mode,
    engine: MailEngine,
    events: tokio::sync::mpsc::Receiver<MailEvent>,
    last_tick: Instant,
    spinner: usize,
    messages: Vec<MessageSummary>,
    list_title: String,
    message_index: usize,
    current: Option<MessageDetail>,
    view_scroll: u16,
    labels: Vec<Label>,
    label_index: usize,
    label_target: Option<String>,
    compose: Draft,
    compose_focus: ComposeField,
    compose_cursors: [usize; 6],
    reply: Draft,
    reply_to: Option<MessageDetail>,
    reply_cursor: usize,
    attachment_entry: Option<AttachmentEntry>,
    search: TextInput,
    notification: Option<String>,
    show_help: bool,
    picker_armed: bool,
    loading_return: Mode,
    sending: Option<DraftKind>,
    startup_pending: bool,
    fatal: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = init_logging() {
        eprintln!("logging disabled: {:#}", err);
    }
    if cli.config.is_none()
        && let Err(err) = ensure_default_config_exists()
    {
        warn!("config bootstrap failed: {:#}", err);
    }
    let config = load_config(cli.config.as_deref())?;
    let mut settings = config.mail.clone();
    if let Some(dir) = cli.downloads {
        settings.downloads_dir = dir;
    }

    let service: Arc<dyn MailService> = if cli.demo {
        info!("starting with the demo mailbox");
        Arc::new(DemoMailService::seeded()?)
    } else {
        gmail_authenticator(&config.gmail)?
            .authorize()
            .context("Gmail authorization failed")?
    };

    let rt = tokio::runtime::Runtime::new()?;
    let labels = match rt.block_on(service.list_labels()) {
        Ok(labels) => labels,
        Err(err) => {
            warn!("label prefetch failed: {:#}", err);
            Vec::new()
        }
    };
    let (engine, events) = rt.block_on(async { MailEngine::start(service, settings) });

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, App::new(engine, events, labels));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    rt.shutdown_timeout(Duration::from_millis(200));
    res
}

fn gmail_authenticator(config: &GmailConfig) -> Result<GmailAuth> {
    let credentials = if config.client_id.is_empty() {
        GmailCredentials::from_file(&config.credentials_file)?
    } else {
        GmailCredentials::new(config.client_id.clone(), config.client_secret.clone())
    };
    let token_path = config
        .token_file
        .clone()
        .or_else(GmailAuth::default_token_path)
        .context("Could not determine where to store the Gmail token")?;
    Ok(GmailAuth::new(credentials, token_path))
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui(frame, &mut app))?;

        app.drain_events();
        if let Some(err) = app.fatal.take() {
            return Err(anyhow!(err));
        }

        let timeout = TICK_RATE.saturating_sub(app.last_tick.elapsed());
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && app.on_key(key)
        {
            return Ok(());
        }

        if app.last_tick.elapsed() >= TICK_RATE {
            app.last_tick = Instant::now();
            app.on_tick();
        }
    }
}
