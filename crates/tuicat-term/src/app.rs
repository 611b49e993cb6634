use crate::login::{FormAction, LoginForm, LoginPrefill};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, info, warn};
use tuicat_core::shell::{PickerKey, WELCOME};
use tuicat_core::{Completion, LocalShell, SessionClient, SessionUpdate, ShellEffect, ShellResponse};

/// Rows taken by the status bar.
pub const STATUS_ROWS: u16 = 1;

pub enum Mode {
    Local,
    Login(LoginForm),
    Remote,
}

pub struct App {
    pub shell: LocalShell,
    pub client: SessionClient,
    pub mode: Mode,
    /// Local transcript, one entry per line.
    pub lines: Vec<String>,
    pub input: String,
    pub candidates: Vec<String>,
    pub size: (u16, u16),
    pub quit: bool,
}

impl App {
    pub fn new(shell: LocalShell, client: SessionClient) -> Self {
        Self {
            shell,
            client,
            mode: Mode::Local,
            lines: vec![WELCOME.to_string()],
            input: String::new(),
            candidates: Vec::new(),
            size: (80, 24),
            quit: false,
        }
    }

    /// Opens the login form when pre-filled, otherwise tries a silent
    /// reconnect from the credential cache.
    pub async fn start(&mut self, prefill: Option<LoginPrefill>) {
        if let Some(prefill) = prefill {
            self.mode = Mode::Login(LoginForm::prefilled(prefill));
            return;
        }
        match self.client.resume().await {
            Ok(true) => self.mode = Mode::Remote,
            Ok(false) => {}
            Err(err) => {
                warn!(error = %err, "auto-reconnect failed");
                self.lines.push(err.to_string());
            }
        }
    }

    pub async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => {
                if matches!(key.kind, KeyEventKind::Release) {
                    return;
                }
                self.handle_key(key).await;
            }
            Event::Resize(w, h) => self.on_resize(w, h).await,
            _ => {}
        }
    }

    pub async fn on_resize(&mut self, cols: u16, rows: u16) {
        self.size = (cols, rows);
        self.shell.set_resolution(cols, rows);
        if matches!(self.mode, Mode::Remote) {
            self.forward_size().await;
        }
    }

    async fn forward_size(&mut self) {
        let (cols, rows) = self.size;
        let rows = rows.saturating_sub(STATUS_ROWS).max(1);
        if let Err(err) = self.client.resize(cols, rows).await {
            debug!(error = %err, "resize not forwarded");
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('q')) {
            self.quit = true;
            return;
        }
        match self.mode {
            Mode::Local => self.handle_local_key(key),
            Mode::Login(_) => self.handle_login_key(key).await,
            Mode::Remote => self.handle_remote_key(key).await,
        }
    }

    fn handle_local_key(&mut self, key: KeyEvent) {
        if self.shell.picker().is_some() {
            let picker_key = match key.code {
                KeyCode::Up => PickerKey::Up,
                KeyCode::Down => PickerKey::Down,
                KeyCode::Enter => PickerKey::Enter,
                KeyCode::Esc => PickerKey::Escape,
                _ => return,
            };
            if let Some(response) = self.shell.picker_key(picker_key) {
                self.apply_shell(response);
            }
            return;
        }

        if key.code != KeyCode::Tab {
            self.candidates.clear();
        }
        match key.code {
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.input);
                self.lines.push(format!("{} {}", self.shell.prompt(), command));
                let response = self.shell.execute(&command);
                self.apply_shell(response);
            }
            KeyCode::Tab => match self.shell.complete(&self.input) {
                Completion::Replaced(input) => {
                    self.input = input;
                    self.candidates.clear();
                }
                Completion::Candidates(names) => self.candidates = names,
                Completion::None => {}
            },
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.clear();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.push(c);
            }
            _ => {}
        }
    }

    fn apply_shell(&mut self, response: ShellResponse) {
        if response.effect == ShellEffect::ClearScreen {
            self.lines.clear();
        }
        self.lines.extend(response.lines);
        match response.effect {
            ShellEffect::BeginSshLogin => self.mode = Mode::Login(LoginForm::new()),
            ShellEffect::Exit => self.quit = true,
            ShellEffect::ThemeChanged(name) => debug!(theme = %name, "theme applied"),
            ShellEffect::None | ShellEffect::ClearScreen | ShellEffect::ThemePickerOpened => {}
        }
    }

    async fn handle_login_key(&mut self, key: KeyEvent) {
        let Mode::Login(form) = &mut self.mode else {
            return;
        };
        match form.handle_key(key) {
            FormAction::None => {}
            FormAction::Submit(credentials) => {
                info!(target_host = %credentials.host, port = credentials.port, "ssh login submitted");
                if let Err(err) = self.client.connect(credentials).await {
                    form.fail(err.to_string());
                }
            }
            FormAction::Cancel => {
                if self.client.state().is_connecting {
                    self.client.disconnect().await;
                }
                self.mode = Mode::Local;
                self.lines.push("SSH connection cancelled.".to_string());
            }
        }
    }

    async fn handle_remote_key(&mut self, key: KeyEvent) {
        if !self.client.state().is_connected {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let result = match key.code {
            KeyCode::Char('c') if ctrl => self.client.send_keys("\x03").await,
            KeyCode::Char('d') if ctrl => self.client.send_keys("\x04").await,
            KeyCode::Char('z') if ctrl => self.client.send_keys("\x1a").await,
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.input);
                self.client.send_input(&line).await
            }
            KeyCode::Backspace => {
                self.input.pop();
                Ok(())
            }
            KeyCode::Char(c) if !ctrl => {
                self.input.push(c);
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            warn!(error = %err, "input not delivered");
        }
    }

    /// Folds one bridge event into the view.
    pub async fn apply_update(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Connected { session_id } => {
                info!(session_id = ?session_id, "ssh session connected");
                self.mode = Mode::Remote;
                self.input.clear();
                self.forward_size().await;
            }
            SessionUpdate::Output(_) => {}
            SessionUpdate::Error(message) => {
                if let Mode::Login(form) = &mut self.mode {
                    form.fail(message);
                } else if matches!(self.mode, Mode::Remote) && !self.client.state().is_connected {
                    self.mode = Mode::Local;
                    self.lines.push(message);
                }
            }
            SessionUpdate::Disconnected | SessionUpdate::TransportClosed => {
                if let Mode::Login(form) = &mut self.mode {
                    if form.busy {
                        form.fail("Connection closed.");
                    }
                } else if matches!(self.mode, Mode::Remote) {
                    self.mode = Mode::Local;
                    self.input.clear();
                    self.lines.push("Connection closed.".to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tuicat_core::shell::{ClientEnvironment, ThemeStore};
    use tuicat_core::{CredentialCache, MemoryStore, StaticLocator};

    fn app() -> App {
        let store = Arc::new(MemoryStore::new());
        let shell = LocalShell::new(
            ThemeStore::load(store.clone(), "geist"),
            ClientEnvironment::detect(),
        );
        let client = SessionClient::new(
            Arc::new(StaticLocator("ws://127.0.0.1:1/ws".into())),
            CredentialCache::new(store),
        );
        App::new(shell, client)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn type_line(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).await;
        }
        app.handle_key(key(KeyCode::Enter)).await;
    }

    #[tokio::test]
    async fn local_command_echoes_prompt_and_output() {
        let mut app = app();
        type_line(&mut app, "cd projects").await;
        type_line(&mut app, "ls").await;
        assert_eq!(app.lines[1], "guest@tui.cat:~$ cd projects");
        assert_eq!(app.lines[2], "guest@tui.cat:/projects$ ls");
        assert!(app.lines[3].contains("nidalee.rs"));
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn clear_and_exit() {
        let mut app = app();
        type_line(&mut app, "clear").await;
        assert!(app.lines.is_empty());
        type_line(&mut app, "exit").await;
        assert!(app.quit);
    }

    #[tokio::test]
    async fn tab_completes_input() {
        let mut app = app();
        for c in "cd pro".chars() {
            app.handle_key(key(KeyCode::Char(c))).await;
        }
        app.handle_key(key(KeyCode::Tab)).await;
        assert_eq!(app.input, "cd projects/");
    }

    #[tokio::test]
    async fn ssh_opens_form_and_escape_returns() {
        let mut app = app();
        type_line(&mut app, "ssh").await;
        assert!(matches!(app.mode, Mode::Login(_)));
        app.handle_key(key(KeyCode::Esc)).await;
        assert!(matches!(app.mode, Mode::Local));
        assert_eq!(app.lines.last().map(String::as_str), Some("SSH connection cancelled."));
    }

    #[tokio::test]
    async fn theme_picker_takes_arrow_keys() {
        let mut app = app();
        type_line(&mut app, "theme").await;
        assert!(app.shell.picker().is_some());
        app.handle_key(key(KeyCode::Down)).await;
        app.handle_key(key(KeyCode::Enter)).await;
        assert!(app.shell.picker().is_none());
        assert_ne!(app.shell.themes().current(), "geist");
    }

    #[tokio::test]
    async fn error_during_login_lands_on_form() {
        let mut app = app();
        app.mode = Mode::Login(LoginForm::new());
        app.apply_update(SessionUpdate::Error("Authentication failed".into()))
            .await;
        match &app.mode {
            Mode::Login(form) => assert_eq!(form.error.as_deref(), Some("Authentication failed")),
            _ => panic!("form closed"),
        }
    }

    #[tokio::test]
    async fn remote_close_returns_to_local_shell() {
        let mut app = app();
        app.mode = Mode::Remote;
        app.input = "half typed".into();
        app.apply_update(SessionUpdate::Disconnected).await;
        assert!(matches!(app.mode, Mode::Local));
        assert!(app.input.is_empty());
        assert_eq!(app.lines.last().map(String::as_str), Some("Connection closed."));
    }

    #[tokio::test]
    async fn ctrl_q_quits_from_any_mode() {
        let mut app = app();
        app.mode = Mode::Remote;
        app.handle_key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL))
            .await;
        assert!(app.quit);
    }
}
