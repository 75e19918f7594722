//! Interactive REPL
//!
//! Reads slash commands and chat lines with reedline, dispatches them to the
//! REST client and the chat session manager, and renders the manager's
//! events as they arrive.

use chrono::Local;
use lt_api::{ApiClient, PasswordChange, SignupRequest, validate_tags};
use lt_chat::{ChatEvent, ChatHandle, ConnectionState};
use lt_core::history::HistoryIndex;
use lt_core::quota::{DailyQuota, QuotaKind};
use lt_core::{ClientState, Position};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, DefaultHinter, Emacs, KeyCode, KeyModifiers, Keybindings,
    MenuBuilder, Prompt, Reedline, ReedlineEvent, ReedlineMenu, Signal, Suggestion,
};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{info, warn};

use crate::error::{ClientError, Result};

/// Available commands for autocomplete display
const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help"),
    ("/login", "<username> <password>  Sign in"),
    ("/signup", "<username> <password> <tag,tag,...>  Create an account"),
    ("/logout", "Sign out"),
    ("/new", "Start a new conversation"),
    ("/history", "List past conversations"),
    ("/load", "<session_id>  Show a past conversation"),
    ("/where", "<latitude> <longitude>  Set your position"),
    ("/tags", "[tag,tag,...]  Show or change preference tags"),
    ("/password", "<current> <new>  Change password"),
    ("/me", "Show profile and today's allowance"),
    ("/delete-account", "Delete your account"),
    ("/quit", "Exit"),
];

/// Command completer for reedline
#[derive(Clone)]
pub struct CommandCompleter {
    commands: Vec<(&'static str, &'static str)>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.to_vec(),
        }
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if !line.starts_with('/') {
            return Vec::new();
        }

        self.commands
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(line))
            .map(|(cmd, desc)| Suggestion {
                value: cmd.to_string(),
                description: Some(desc.to_string()),
                extra: None,
                span: reedline::Span::new(0, pos),
                append_whitespace: true,
                style: None,
            })
            .collect()
    }
}

/// Custom prompt with colored styling
struct ColoredPrompt {
    style: Style,
}

impl ColoredPrompt {
    fn new() -> Self {
        Self {
            style: Color::Cyan.bold(),
        }
    }
}

impl Prompt for ColoredPrompt {
    fn render_prompt_left(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.style.paint("> ").to_string())
    }

    fn render_prompt_right(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: reedline::PromptEditMode) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }

    fn render_prompt_history_search_indicator(
        &self,
        _history_search: reedline::PromptHistorySearch,
    ) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Borrowed("")
    }
}

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Help,
    Login { username: String, password: String },
    Signup {
        username: String,
        password: String,
        tags: Vec<String>,
    },
    Logout,
    New,
    History,
    Load(String),
    Where(Position),
    /// `None` shows the current tags
    Tags(Option<Vec<String>>),
    Password { current: String, new: String },
    Me,
    DeleteAccount,
    Quit,
    /// Plain text for the chatbot
    Chat(String),
}

/// Parse a trimmed, non-empty input line
pub fn parse_command(input: &str) -> Result<CliCommand> {
    if !input.starts_with('/') {
        return Ok(CliCommand::Chat(input.to_string()));
    }

    let (name, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match (name.to_lowercase().as_str(), args.as_slice()) {
        ("/help" | "/?", _) => CliCommand::Help,
        ("/quit" | "/exit" | "/q", _) => CliCommand::Quit,
        ("/login", [username, password]) => CliCommand::Login {
            username: username.to_string(),
            password: password.to_string(),
        },
        ("/signup", [username, password, tags @ ..]) if !tags.is_empty() => CliCommand::Signup {
            username: username.to_string(),
            password: password.to_string(),
            tags: split_tags(&tags.join(",")),
        },
        ("/logout", []) => CliCommand::Logout,
        ("/new", []) => CliCommand::New,
        ("/history", []) => CliCommand::History,
        ("/load", [session_id]) => CliCommand::Load(session_id.to_string()),
        ("/where", _) if !rest.is_empty() => match Position::parse(rest) {
            Some(position) => CliCommand::Where(position),
            None => return Err(usage(&format!("not a valid position: {}", rest))),
        },
        ("/tags", []) => CliCommand::Tags(None),
        ("/tags", _) => CliCommand::Tags(Some(split_tags(rest))),
        ("/password", [current, new]) => CliCommand::Password {
            current: current.to_string(),
            new: new.to_string(),
        },
        ("/me", []) => CliCommand::Me,
        ("/delete-account", []) => CliCommand::DeleteAccount,
        (known, _) if COMMANDS.iter().any(|(cmd, _)| *cmd == known) => {
            let hint = COMMANDS
                .iter()
                .find(|(cmd, _)| *cmd == known)
                .map(|(_, desc)| *desc)
                .unwrap_or_default();
            return Err(usage(&format!("usage: {} {}", known, hint)));
        }
        _ => {
            return Err(usage(&format!(
                "unknown command: {}. Type /help for the list.",
                name
            )));
        }
    };
    Ok(command)
}

fn usage(message: &str) -> ClientError {
    ClientError::Usage(message.to_string())
}

fn split_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Everything the REPL needs to act on commands
pub struct App {
    pub api: ApiClient,
    pub state: ClientState,
    pub chat: ChatHandle,
    pub position: Position,
    pub message_quota: DailyQuota,
    /// Latest index pushed by the session manager
    pub history: Arc<RwLock<HistoryIndex>>,
}

impl App {
    async fn execute(&mut self, command: CliCommand) -> Result<()> {
        match command {
            CliCommand::Help => print_help(),
            CliCommand::Login { username, password } => {
                let tokens = self.api.login(&username, &password).await?;
                self.state.set_tokens(&tokens.access, &tokens.refresh)?;
                self.chat.reconnect()?;
                self.chat.refresh_history()?;
                println!("{}", Color::Green.paint(format!("Signed in as {}", username)));
            }
            CliCommand::Signup {
                username,
                password,
                tags,
            } => {
                let request = SignupRequest::new(username, password.clone(), password, tags);
                request.validate()?;
                self.api.signup(&request).await?;
                println!("Account created. Use /login to sign in.");
            }
            CliCommand::Logout => {
                if let Some(refresh) = self.state.refresh_token()? {
                    if let Err(e) = self.api.logout(&refresh).await {
                        warn!("Logout request failed: {}", e);
                    }
                }
                self.api.set_token(None);
                self.chat.logout()?;
                println!("Signed out.");
            }
            CliCommand::New => self.chat.refresh()?,
            CliCommand::History => {
                print_history(&*self.history.read().await);
                self.chat.refresh_history()?;
            }
            CliCommand::Load(session_id) => self.chat.load_session(session_id)?,
            CliCommand::Where(position) => {
                self.position = position;
                println!(
                    "Position set to {:.4}, {:.4}",
                    position.latitude, position.longitude
                );
            }
            CliCommand::Tags(None) => {
                let tags = self.api.get_tags().await?;
                println!("Tags: {}", tags.join(", "));
                println!(
                    "{}",
                    Style::new().dimmed().paint(format!("Available: {}", lt_api::AVAILABLE_TAGS.join(", ")))
                );
            }
            CliCommand::Tags(Some(tags)) => {
                validate_tags(&tags)?;
                self.api.update_tags(&tags).await?;
                println!("Tags updated: {}", tags.join(", "));
            }
            CliCommand::Password { current, new } => {
                let change = PasswordChange::new(current, new);
                change.validate()?;
                self.api.update_password(&change).await?;
                println!("Password changed.");
            }
            CliCommand::Me => {
                let profile = self.api.my_page().await?;
                let remaining = self
                    .state
                    .remaining(&self.message_quota, Local::now().date_naive())?;
                println!("User: {}", profile.username);
                println!("Tags: {}", profile.tags.join(", "));
                println!("Messages left today: {}/{}", remaining, self.message_quota.limit);
            }
            CliCommand::DeleteAccount => {
                self.api.delete_account().await?;
                self.state.clear_credentials()?;
                self.api.set_token(None);
                self.chat.logout()?;
                println!("Account deleted.");
            }
            CliCommand::Chat(text) => self.chat.send(text, self.position)?,
            CliCommand::Quit => {}
        }
        Ok(())
    }
}

/// Run CLI interactive mode until /quit or Ctrl-D
pub async fn run_cli(mut app: App, events: mpsc::UnboundedReceiver<ChatEvent>) -> anyhow::Result<()> {
    print_welcome();
    show_onboarding_hint(&app.state);

    let renderer = tokio::spawn(render_events(events, app.history.clone()));

    // Setup keybindings
    let mut keybindings = default_keybindings();

    // Trigger completion on '/' key
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Char('/'),
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );

    let menu = Box::new(
        ColumnarMenu::default()
            .with_name("command_menu")
            .with_columns(1)
            .with_column_width(Some(60))
            .with_only_buffer_difference(false),
    );

    let hinter = DefaultHinter::default().with_style(Style::new().dimmed());

    let mut line_editor = Reedline::create()
        .with_completer(Box::new(CommandCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(menu))
        .with_hinter(Box::new(hinter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    let prompt = ColoredPrompt::new();

    loop {
        // read_line blocks; keep the runtime's other tasks moving meanwhile
        let signal = tokio::task::block_in_place(|| line_editor.read_line(&prompt));

        match signal {
            Ok(Signal::Success(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                match parse_command(input) {
                    Ok(CliCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = app.execute(command).await {
                            eprintln!("{}", Color::Red.paint(format!("Error: {}", e)));
                        }
                    }
                    Err(e) => eprintln!("{}", Color::Yellow.paint(e.to_string())),
                }
            }
            Ok(Signal::CtrlC) => {
                println!("^C");
                continue;
            }
            Ok(Signal::CtrlD) => break,
            Err(err) => {
                eprintln!("{}", Color::Red.paint(format!("Error: {}", err)));
                break;
            }
        }
    }

    info!("Leaving interactive mode");
    if let Err(e) = app.chat.shutdown() {
        warn!("Chat manager already stopped: {}", e);
    }
    renderer.abort();
    println!("\nBye!\n");
    Ok(())
}

/// Default keybindings for reedline
fn default_keybindings() -> Keybindings {
    let mut keybindings = Keybindings::new();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::Edit(vec![reedline::EditCommand::Complete]),
    );
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Esc, ReedlineEvent::Esc);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('c'), ReedlineEvent::CtrlC);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::CtrlD);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings
}

async fn render_events(
    mut events: mpsc::UnboundedReceiver<ChatEvent>,
    history: Arc<RwLock<HistoryIndex>>,
) {
    while let Some(event) = events.recv().await {
        if let ChatEvent::HistoryReplaced(index) = event {
            *history.write().await = index;
            continue;
        }
        if let Some(line) = render(&event) {
            println!("{}", line);
        }
    }
}

/// Terminal text for one event, if it shows anything
pub fn render(event: &ChatEvent) -> Option<String> {
    let dim = Style::new().dimmed();
    let line = match event {
        ChatEvent::ConnectionChanged(ConnectionState::Open) => {
            Color::Green.paint("● connected").to_string()
        }
        ChatEvent::ConnectionChanged(ConnectionState::Connecting) => {
            dim.paint("● connecting...").to_string()
        }
        ChatEvent::ConnectionChanged(ConnectionState::Closed) => {
            Color::Yellow.paint("● disconnected, retrying shortly").to_string()
        }
        // The typed line is already on screen
        ChatEvent::MessageAppended { .. } => return None,
        ChatEvent::PlaceholderAdded { .. } => dim.paint("  ...").to_string(),
        ChatEvent::PlaceholderResolved {
            text,
            recommendations,
            ..
        } => {
            let mut out = format!("\n{}", Color::Cyan.paint(text));
            for place in recommendations {
                out.push_str(&format!("\n  • {}", Style::new().bold().paint(&place.name)));
                if !place.website.is_empty() {
                    out.push_str(&format!(" {}", dim.paint(&place.website)));
                }
            }
            out.push('\n');
            out
        }
        ChatEvent::PlaceholderFailed { reason, .. } => {
            Color::Red.paint(format!("  ✗ no reply: {}", reason)).to_string()
        }
        ChatEvent::ViewReplaced {
            session_id,
            records,
        } => {
            let mut out = format!("\n── {} ({} exchanges) ──", session_id, records.len());
            for record in records {
                let time = record.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
                out.push_str(&format!("\n{} {}", dim.paint(time.to_string()), record.message));
                out.push_str(&format!("\n{}", Color::Cyan.paint(&record.response)));
            }
            out.push_str(&format!(
                "\n{}\n",
                dim.paint("Read-only. Use /new to start a new conversation.")
            ));
            out
        }
        ChatEvent::SessionChanged(Some(id)) => dim.paint(format!("(session {})", id)).to_string(),
        ChatEvent::SessionChanged(None) => dim.paint("(new conversation)").to_string(),
        ChatEvent::ReauthRequired => Color::Yellow
            .paint("Your sign-in has expired. Use /login to sign in again.")
            .to_string(),
        ChatEvent::QuotaExceeded(QuotaKind::Messages) => Color::Yellow
            .paint("Daily message limit reached. Try again tomorrow.")
            .to_string(),
        ChatEvent::QuotaExceeded(QuotaKind::Refreshes) => Color::Yellow
            .paint("Daily new-conversation limit reached. Try again tomorrow.")
            .to_string(),
        ChatEvent::Notice(text) => dim.paint(text).to_string(),
        ChatEvent::InputCleared
        | ChatEvent::InputEnabled
        | ChatEvent::InputDisabled
        | ChatEvent::HistoryReplaced(_) => return None,
    };
    Some(line)
}

/// Print the welcome banner
fn print_welcome() {
    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          lazy-traveler - travel planning chat              ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  Type a message and press Enter to chat                    ║");
    println!("║  Commands: /help, /login, /new, /history, /quit            ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

/// First-run hint, shown once per installation
fn show_onboarding_hint(state: &ClientState) {
    match state.onboarding_hint_seen() {
        Ok(true) => return,
        Ok(false) => {}
        Err(e) => {
            warn!("Could not read onboarding flag: {}", e);
            return;
        }
    }

    println!("Tip: recommendations are based on your position, which starts at");
    println!("Jonggak station in Seoul. Set yours with /where <latitude> <longitude>.");
    println!("Sign in with /login to keep your conversations in /history.");
    println!();

    if let Err(e) = state.mark_onboarding_hint_seen() {
        warn!("Could not store onboarding flag: {}", e);
    }
}

/// Print help message
fn print_help() {
    println!();
    println!("Available commands:");
    for (cmd, desc) in COMMANDS {
        println!("  {:<16} {}", cmd, desc);
    }
    println!();
    println!("Anything else is sent to the chatbot.");
    println!();
}

/// Print the session index, newest day first
fn print_history(index: &HistoryIndex) {
    println!();
    if index.is_empty() {
        println!("No conversations yet.");
        println!();
        return;
    }

    println!("Conversations ({}):", index.len());
    for (day, sessions) in index.days() {
        println!("{}", Style::new().bold().paint(day.to_string()));
        for session in sessions {
            let preview: String = session.first_message.chars().take(40).collect();
            let marker = if session.confirmed { " " } else { "*" };
            println!("  {}{}  {}", marker, session.session_id, preview.replace('\n', " "));
        }
    }
    println!();
}
