use crate::error::CoreError;
use crate::storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, warn};

pub const THEME_KEY: &str = "tui-cat-theme";
pub const DEFAULT_THEME: &str = "geist";

pub const THEMES: [&str; 11] = [
    "geist",
    "catppuccin-latte",
    "catppuccin-mocha",
    "solarized-light",
    "solarized-dark",
    "nord",
    "dracula",
    "gruvbox-dark",
    "tokyo-night",
    "everforest-dark",
    "papercolor-light",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Colours a front-end needs to paint one theme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemePalette {
    pub background: Rgb,
    pub foreground: Rgb,
    pub prompt: Rgb,
    pub accent: Rgb,
    pub muted: Rgb,
}

pub fn palette(name: &str) -> Option<ThemePalette> {
    let p = |bg, fg, prompt, accent, muted| ThemePalette {
        background: bg,
        foreground: fg,
        prompt,
        accent,
        muted,
    };
    Some(match name {
        "geist" => p(
            Rgb(0, 0, 0),
            Rgb(237, 237, 237),
            Rgb(80, 227, 194),
            Rgb(0, 112, 243),
            Rgb(136, 136, 136),
        ),
        "catppuccin-latte" => p(
            Rgb(239, 241, 245),
            Rgb(76, 79, 105),
            Rgb(64, 160, 43),
            Rgb(136, 57, 239),
            Rgb(140, 143, 161),
        ),
        "catppuccin-mocha" => p(
            Rgb(30, 30, 46),
            Rgb(205, 214, 244),
            Rgb(166, 227, 161),
            Rgb(203, 166, 247),
            Rgb(127, 132, 156),
        ),
        "solarized-light" => p(
            Rgb(253, 246, 227),
            Rgb(101, 123, 131),
            Rgb(133, 153, 0),
            Rgb(38, 139, 210),
            Rgb(147, 161, 161),
        ),
        "solarized-dark" => p(
            Rgb(0, 43, 54),
            Rgb(131, 148, 150),
            Rgb(133, 153, 0),
            Rgb(38, 139, 210),
            Rgb(88, 110, 117),
        ),
        "nord" => p(
            Rgb(46, 52, 64),
            Rgb(216, 222, 233),
            Rgb(163, 190, 140),
            Rgb(136, 192, 208),
            Rgb(76, 86, 106),
        ),
        "dracula" => p(
            Rgb(40, 42, 54),
            Rgb(248, 248, 242),
            Rgb(80, 250, 123),
            Rgb(189, 147, 249),
            Rgb(98, 114, 164),
        ),
        "gruvbox-dark" => p(
            Rgb(40, 40, 40),
            Rgb(235, 219, 178),
            Rgb(184, 187, 38),
            Rgb(250, 189, 47),
            Rgb(146, 131, 116),
        ),
        "tokyo-night" => p(
            Rgb(26, 27, 38),
            Rgb(192, 202, 245),
            Rgb(158, 206, 106),
            Rgb(122, 162, 247),
            Rgb(86, 95, 137),
        ),
        "everforest-dark" => p(
            Rgb(45, 53, 59),
            Rgb(211, 198, 170),
            Rgb(167, 192, 128),
            Rgb(127, 187, 179),
            Rgb(133, 146, 137),
        ),
        "papercolor-light" => p(
            Rgb(238, 238, 238),
            Rgb(68, 68, 68),
            Rgb(0, 135, 0),
            Rgb(0, 95, 175),
            Rgb(135, 135, 135),
        ),
        _ => return None,
    })
}

pub fn is_theme(name: &str) -> bool {
    THEMES.contains(&name)
}

/// Current theme name, persisted under [`THEME_KEY`].
#[derive(Clone)]
pub struct ThemeStore {
    store: Arc<dyn KeyValueStore>,
    current: String,
}

impl ThemeStore {
    /// Loads the stored theme, falling back to `default` when absent or unknown.
    pub fn load(store: Arc<dyn KeyValueStore>, default: &str) -> Self {
        let fallback = if is_theme(default) {
            default
        } else {
            DEFAULT_THEME
        };
        let current = match store.get(THEME_KEY) {
            Ok(Some(name)) if is_theme(&name) => name,
            Ok(_) => fallback.to_string(),
            Err(err) => {
                warn!(error = %err, "theme unreadable, using default");
                fallback.to_string()
            }
        };
        Self { store, current }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn palette(&self) -> ThemePalette {
        palette(&self.current)
            .or_else(|| palette(DEFAULT_THEME))
            .unwrap_or(ThemePalette {
                background: Rgb(0, 0, 0),
                foreground: Rgb(229, 231, 235),
                prompt: Rgb(34, 197, 94),
                accent: Rgb(59, 130, 246),
                muted: Rgb(107, 114, 128),
            })
    }

    /// Switches and persists. Unknown names are rejected with `Ok(false)`.
    pub fn set(&mut self, name: &str) -> Result<bool, CoreError> {
        if !is_theme(name) {
            return Ok(false);
        }
        self.current = name.to_string();
        self.store.set(THEME_KEY, name)?;
        debug!(theme = name, "theme saved");
        Ok(true)
    }

    /// Switches without persisting, for live preview.
    fn preview(&mut self, name: &str) {
        if is_theme(name) {
            self.current = name.to_string();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickerKey {
    Up,
    Down,
    Enter,
    Escape,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PickerOutcome {
    Moved,
    Applied(String),
    Cancelled,
}

/// Interactive selection with live preview; cancel restores the theme that
/// was active when the picker opened.
#[derive(Clone, Debug)]
pub struct ThemePicker {
    initial: String,
    index: usize,
}

impl ThemePicker {
    pub fn open(themes: &ThemeStore) -> Self {
        let initial = themes.current().to_string();
        let index = THEMES.iter().position(|t| *t == initial).unwrap_or(0);
        Self { initial, index }
    }

    pub fn highlighted(&self) -> usize {
        self.index
    }

    pub fn handle(&mut self, key: PickerKey, themes: &mut ThemeStore) -> Result<PickerOutcome, CoreError> {
        let len = THEMES.len();
        match key {
            PickerKey::Down => {
                self.index = (self.index + 1) % len;
                themes.preview(THEMES[self.index]);
                Ok(PickerOutcome::Moved)
            }
            PickerKey::Up => {
                self.index = (self.index + len - 1) % len;
                themes.preview(THEMES[self.index]);
                Ok(PickerOutcome::Moved)
            }
            PickerKey::Enter => {
                let name = THEMES[self.index].to_string();
                themes.set(&name)?;
                Ok(PickerOutcome::Applied(name))
            }
            PickerKey::Escape => {
                themes.preview(&self.initial);
                Ok(PickerOutcome::Cancelled)
            }
        }
    }
}
