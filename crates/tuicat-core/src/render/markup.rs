//! Display-time styling of the transcript buffer: HTML markup for web
//! consumers and styled runs for cell-based front-ends.

use super::palette::{self, Color, ANSI_PALETTE, DEFAULT_BG, DEFAULT_FG};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

/// Every escape sequence the renderer interprets or discards. Group 1 holds
/// the parameters of an SGR sequence.
static ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \x1b\[([0-9;]*)m
        | \x1b\][0-9]*;[^\x07\x1b]*(?:\x07|\x1b\\)
        | \x1b\[[0-?]*[\x20-/]*[@-~]
        | \x1b[()][A-Z0-9]
        | \x1b[78=>]
        ",
    )
    .expect("escape regex is valid")
});

/// Parameter remnants of split sequences and non-printable bytes.
static REMNANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \[?\d+(?:;\d+)+m
        | ;\d+m
        | [\x00-\x08\x0B\x0C\x0E-\x1F\x7F]
        ",
    )
    .expect("remnant regex is valid")
});

/// Renders a raw transcript as HTML: escaped text, `<span>` styling, `<br/>`
/// line breaks. No escape byte survives.
pub fn render_markup(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 64);
    for run in styled_runs(raw) {
        let body = escape_html(&run.text).replace('\n', "<br/>");
        if run.style.is_plain() {
            out.push_str(&body);
        } else {
            let _ = write!(out, "<span style=\"{}\">{}</span>", run.style.css(), body);
        }
    }
    out
}

/// The transcript with every escape sequence and carriage return removed.
pub fn plain_text(raw: &str) -> String {
    styled_runs(raw).into_iter().map(|run| run.text).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    pub style: TextStyle,
}

/// Splits a raw transcript into runs of text sharing one style. Carriage
/// returns are dropped and `\n` stays in the text.
pub fn styled_runs(raw: &str) -> Vec<StyledRun> {
    let mut runs = Vec::new();
    let mut style = TextStyle::default();
    let mut pending = String::new();
    let mut last = 0;
    for caps in ESCAPE.captures_iter(raw) {
        let Some(m) = caps.get(0) else { continue };
        pending.push_str(&raw[last..m.start()]);
        last = m.end();
        if let Some(params) = caps.get(1) {
            push_run(&mut runs, &pending, &style);
            pending.clear();
            style.apply(params.as_str());
        }
    }
    pending.push_str(&raw[last..]);
    push_run(&mut runs, &pending, &style);
    runs
}

/// Styled runs grouped by line.
pub fn styled_lines(raw: &str) -> Vec<Vec<StyledRun>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    for run in styled_runs(raw) {
        for (i, piece) in run.text.split('\n').enumerate() {
            if i > 0 {
                lines.push(std::mem::take(&mut current));
            }
            if !piece.is_empty() {
                current.push(StyledRun {
                    text: piece.to_string(),
                    style: run.style.clone(),
                });
            }
        }
    }
    lines.push(current);
    lines
}

fn push_run(runs: &mut Vec<StyledRun>, raw_text: &str, style: &TextStyle) {
    let text = REMNANT.replace_all(raw_text, "").replace('\r', "");
    if text.is_empty() {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.style == *style => last.text.push_str(&text),
        _ => runs.push(StyledRun {
            text,
            style: style.clone(),
        }),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
    pub faint: bool,
    pub italic: bool,
    pub underline: bool,
    pub inverse: bool,
    pub strike: bool,
}

impl TextStyle {
    pub fn is_plain(&self) -> bool {
        *self == TextStyle::default()
    }

    /// Foreground and background after inverse video is applied.
    pub fn resolved_colors(&self) -> (Option<Color>, Option<Color>) {
        if self.inverse {
            (
                Some(self.bg.unwrap_or(DEFAULT_BG)),
                Some(self.fg.unwrap_or(DEFAULT_FG)),
            )
        } else {
            (self.fg, self.bg)
        }
    }

    fn css(&self) -> String {
        let (fg, bg) = self.resolved_colors();
        let mut css = String::new();
        if let Some(fg) = fg {
            let _ = write!(css, "color:{};", fg);
        }
        if let Some(bg) = bg {
            let _ = write!(css, "background-color:{};", bg);
        }
        if self.bold {
            css.push_str("font-weight:bold;");
        }
        if self.faint {
            css.push_str("opacity:0.7;");
        }
        if self.italic {
            css.push_str("font-style:italic;");
        }
        match (self.underline, self.strike) {
            (true, true) => css.push_str("text-decoration:underline line-through;"),
            (true, false) => css.push_str("text-decoration:underline;"),
            (false, true) => css.push_str("text-decoration:line-through;"),
            (false, false) => {}
        }
        css.trim_end_matches(';').to_string()
    }

    fn apply(&mut self, params: &str) {
        let codes: Vec<u32> = if params.is_empty() {
            vec![0]
        } else {
            params
                .split(';')
                .map(|p| p.parse().unwrap_or(0))
                .collect()
        };
        let mut i = 0;
        while i < codes.len() {
            match codes[i] {
                0 => *self = TextStyle::default(),
                1 => self.bold = true,
                2 => self.faint = true,
                3 => self.italic = true,
                4 => self.underline = true,
                7 => self.inverse = true,
                9 => self.strike = true,
                21 | 22 => {
                    self.bold = false;
                    self.faint = false;
                }
                23 => self.italic = false,
                24 => self.underline = false,
                27 => self.inverse = false,
                29 => self.strike = false,
                n @ 30..=37 => self.fg = Some(ANSI_PALETTE[(n - 30) as usize]),
                39 => self.fg = None,
                n @ 40..=47 => self.bg = Some(ANSI_PALETTE[(n - 40) as usize]),
                49 => self.bg = None,
                n @ 90..=97 => self.fg = Some(ANSI_PALETTE[(n - 90 + 8) as usize]),
                n @ 100..=107 => self.bg = Some(ANSI_PALETTE[(n - 100 + 8) as usize]),
                n @ (38 | 48) => {
                    let (color, used) = extended_color(&codes[i + 1..]);
                    if let Some(color) = color {
                        if n == 38 {
                            self.fg = Some(color);
                        } else {
                            self.bg = Some(color);
                        }
                    }
                    i += used;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Colour from the parameters following a 38/48 code and how many it consumed.
fn extended_color(rest: &[u32]) -> (Option<Color>, usize) {
    match rest {
        [5, index, ..] => (u8::try_from(*index).ok().map(palette::color_256), 2),
        [2, r, g, b, ..] => {
            let c = |v: u32| v.min(255) as u8;
            (Some(Color::Rgb(c(*r), c(*g), c(*b))), 4)
        }
        _ => (None, rest.len()),
    }
}
