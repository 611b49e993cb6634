//! Offline command interpreter used while no remote session is connected.

pub mod fs;
pub mod neo;
pub mod theme;

pub use fs::{resolve_path, FileSystem, Node};
pub use neo::ClientEnvironment;
pub use theme::{PickerKey, PickerOutcome, ThemePalette, ThemePicker, ThemeStore, THEMES};

use std::time::Instant;
use tracing::{debug, warn};

pub const WELCOME: &str = "Welcome. Type 'help' for available commands or exit to close.";

const HELP: [(&str, &str); 9] = [
    ("theme", "Open interactive theme selector"),
    ("help", "Display this help information."),
    ("clear", "Clear the terminal screen."),
    ("neo", "Display system information."),
    ("ssh", "Connect to remote server via SSH."),
    ("ls", "List files and directories."),
    ("cd <dir>", "Change directory."),
    ("cat <file>", "Display file content."),
    ("exit", "Close the session and return to the homepage."),
];

const COMPLETING_COMMANDS: [&str; 3] = ["cat", "ls", "cd"];

/// Side effect the front-end must carry out after a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellEffect {
    None,
    ClearScreen,
    ThemeChanged(String),
    ThemePickerOpened,
    BeginSshLogin,
    Exit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellResponse {
    pub lines: Vec<String>,
    pub effect: ShellEffect,
}

impl ShellResponse {
    fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            effect: ShellEffect::None,
        }
    }

    fn effect(effect: ShellEffect) -> Self {
        Self {
            lines: Vec::new(),
            effect,
        }
    }

    fn with_effect(mut self, effect: ShellEffect) -> Self {
        self.effect = effect;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Input with the last token completed.
    Replaced(String),
    /// Several children match; input is left as is.
    Candidates(Vec<String>),
    None,
}

pub struct LocalShell {
    fs: FileSystem,
    cwd: String,
    themes: ThemeStore,
    picker: Option<ThemePicker>,
    env: ClientEnvironment,
    started: Instant,
}

impl LocalShell {
    pub fn new(themes: ThemeStore, env: ClientEnvironment) -> Self {
        Self::with_fs(FileSystem::builtin(), themes, env)
    }

    pub fn with_fs(fs: FileSystem, themes: ThemeStore, env: ClientEnvironment) -> Self {
        Self {
            fs,
            cwd: "/".to_string(),
            themes,
            picker: None,
            env,
            started: Instant::now(),
        }
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn themes(&self) -> &ThemeStore {
        &self.themes
    }

    pub fn set_resolution(&mut self, cols: u16, rows: u16) {
        self.env.resolution = Some((cols, rows));
    }

    pub fn prompt(&self) -> String {
        let path = if self.cwd == "/" { "~" } else { &self.cwd };
        format!("guest@tui.cat:{}$", path)
    }

    pub fn picker(&self) -> Option<&ThemePicker> {
        self.picker.as_ref()
    }

    pub fn execute(&mut self, input: &str) -> ShellResponse {
        let trimmed = input.trim();
        let mut parts = trimmed.split_whitespace();
        let Some(command) = parts.next() else {
            return ShellResponse::lines(Vec::<String>::new());
        };
        let args: Vec<&str> = parts.collect();
        let arg = args.join(" ");
        debug!(command, "local shell command");

        match command.to_lowercase().as_str() {
            "ls" => self.ls(args.first().copied()),
            "cat" => self.cat(&arg),
            "cd" => self.cd(&arg),
            "help" => self.help(),
            "clear" | "cls" => ShellResponse::effect(ShellEffect::ClearScreen),
            "theme" => self.theme(args.first().copied()),
            "neo" => ShellResponse::lines(self.env.report(self.started.elapsed())),
            "ssh" => ShellResponse::effect(ShellEffect::BeginSshLogin),
            "exit" => ShellResponse::lines(["Disconnecting..."]).with_effect(ShellEffect::Exit),
            _ => ShellResponse::lines([format!("command not found: {}", command)]),
        }
    }

    fn ls(&self, target: Option<&str>) -> ShellResponse {
        let path = match target {
            Some(target) => resolve_path(&self.cwd, target),
            None => self.cwd.clone(),
        };
        match self.fs.lookup(&path) {
            Some(Node::Directory { children }) if children.is_empty() => {
                ShellResponse::lines(["(empty directory)"])
            }
            Some(Node::Directory { children }) => {
                let names: Vec<String> = children
                    .iter()
                    .map(|(name, node)| {
                        if node.is_dir() {
                            format!("{}/", name)
                        } else {
                            name.clone()
                        }
                    })
                    .collect();
                ShellResponse::lines([names.join("  ")])
            }
            Some(Node::File { .. }) => ShellResponse::lines([target.unwrap_or(&path).to_string()]),
            None => ShellResponse::lines([format!(
                "ls: cannot access '{}': No such file or directory",
                target.unwrap_or(&path)
            )]),
        }
    }

    fn cat(&self, arg: &str) -> ShellResponse {
        if arg.is_empty() {
            return ShellResponse::lines(["cat: missing operand"]);
        }
        match self.fs.lookup(&resolve_path(&self.cwd, arg)) {
            Some(Node::File { content }) => ShellResponse::lines(content.lines()),
            Some(Node::Directory { .. }) => {
                ShellResponse::lines([format!("cat: {}: Is a directory", arg)])
            }
            None => ShellResponse::lines([format!("cat: {}: No such file or directory", arg)]),
        }
    }

    fn cd(&mut self, arg: &str) -> ShellResponse {
        if arg.is_empty() {
            self.cwd = "/".to_string();
            return ShellResponse::lines(Vec::<String>::new());
        }
        let resolved = resolve_path(&self.cwd, arg);
        if self.fs.directory(&resolved).is_some() {
            self.cwd = resolved;
            ShellResponse::lines(Vec::<String>::new())
        } else {
            ShellResponse::lines([format!("cd: no such file or directory: {}", arg)])
        }
    }

    fn help(&self) -> ShellResponse {
        let mut lines = vec!["Available commands:".to_string()];
        lines.extend(
            HELP.iter()
                .map(|(cmd, description)| format!("  {:<12}- {}", cmd, description)),
        );
        ShellResponse::lines(lines)
    }

    fn theme(&mut self, name: Option<&str>) -> ShellResponse {
        let Some(name) = name else {
            self.picker = Some(ThemePicker::open(&self.themes));
            return ShellResponse::lines(["Select theme (Esc to cancel, Enter to select):"])
                .with_effect(ShellEffect::ThemePickerOpened);
        };
        let name = name.to_lowercase();
        match self.themes.set(&name) {
            Ok(true) => ShellResponse::lines([format!("Theme changed to: {}", name)])
                .with_effect(ShellEffect::ThemeChanged(name)),
            Ok(false) => ShellResponse::lines([
                format!("Invalid theme: {}", name),
                format!("  Available themes: {}", THEMES.join(", ")),
            ]),
            Err(err) => {
                warn!(error = %err, "failed to persist theme");
                ShellResponse::lines([format!("Theme changed to: {}", name)])
                    .with_effect(ShellEffect::ThemeChanged(name))
            }
        }
    }

    /// Routes a key to the open theme picker. `None` when no picker is open.
    pub fn picker_key(&mut self, key: PickerKey) -> Option<ShellResponse> {
        let picker = self.picker.as_mut()?;
        let outcome = match picker.handle(key, &mut self.themes) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "failed to persist theme");
                PickerOutcome::Applied(self.themes.current().to_string())
            }
        };
        let response = match outcome {
            PickerOutcome::Moved => {
                ShellResponse::effect(ShellEffect::ThemeChanged(self.themes.current().to_string()))
            }
            PickerOutcome::Applied(name) => {
                self.picker = None;
                ShellResponse::lines([format!("Theme changed to: {}", name)])
                    .with_effect(ShellEffect::ThemeChanged(name))
            }
            PickerOutcome::Cancelled => {
                self.picker = None;
                ShellResponse::lines(["Theme selection cancelled."])
                    .with_effect(ShellEffect::ThemeChanged(self.themes.current().to_string()))
            }
        };
        Some(response)
    }

    /// Tab completion of the last token against the current directory.
    pub fn complete(&self, input: &str) -> Completion {
        let parts: Vec<&str> = input.split(' ').collect();
        let command = parts[0].to_lowercase();
        if parts.len() < 2 || !COMPLETING_COMMANDS.contains(&command.as_str()) {
            return Completion::None;
        }
        let Some(children) = self.fs.directory(&self.cwd) else {
            return Completion::None;
        };
        let fragment = parts[parts.len() - 1].to_lowercase();
        let matches: Vec<(&String, &Node)> = children
            .iter()
            .filter(|(name, _)| name.to_lowercase().starts_with(&fragment))
            .collect();
        match matches.as_slice() {
            [] => Completion::None,
            [(name, node)] => {
                let suffix = if node.is_dir() { "/" } else { " " };
                let mut completed: Vec<String> =
                    parts[..parts.len() - 1].iter().map(|p| p.to_string()).collect();
                completed.push(format!("{}{}", name, suffix));
                Completion::Replaced(completed.join(" "))
            }
            many => Completion::Candidates(many.iter().map(|(name, _)| (*name).clone()).collect()),
        }
    }
}
