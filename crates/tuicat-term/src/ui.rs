use crate::app::{App, Mode, STATUS_ROWS};
use crate::login::{AuthKind, Field, LoginForm};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph};
use tuicat_core::render::Color as TermColor;
use tuicat_core::shell::{ThemePalette, THEMES};
use tuicat_core::{styled_lines, TextStyle};

#[derive(Clone, Copy)]
struct Colors {
    background: Color,
    text: Color,
    prompt: Color,
    accent: Color,
    muted: Color,
    error: Color,
}

impl From<ThemePalette> for Colors {
    fn from(palette: ThemePalette) -> Self {
        let rgb = |c: tuicat_core::shell::theme::Rgb| Color::Rgb(c.0, c.1, c.2);
        Self {
            background: rgb(palette.background),
            text: rgb(palette.foreground),
            prompt: rgb(palette.prompt),
            accent: rgb(palette.accent),
            muted: rgb(palette.muted),
            error: Color::Rgb(239, 68, 68),
        }
    }
}

pub fn draw(f: &mut ratatui::Frame<'_>, app: &App) {
    let colors = Colors::from(app.shell.themes().palette());
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(STATUS_ROWS)])
        .split(f.area());
    let base = Style::default().fg(colors.text).bg(colors.background);
    f.render_widget(Block::default().style(base), f.area());

    match &app.mode {
        Mode::Local => draw_local(f, app, layout[0], colors),
        Mode::Login(form) => draw_login(f, form, layout[0], colors),
        Mode::Remote if app.client.is_resuming() => draw_reconnecting(f, layout[0], colors),
        Mode::Remote => draw_remote(f, app, layout[0], colors),
    }
    draw_status(f, app, layout[1], colors);
}

/// Keeps the last lines that fit.
fn tail(lines: Vec<Line<'_>>, height: u16) -> Text<'_> {
    let skip = lines.len().saturating_sub(height as usize);
    Text::from(lines.into_iter().skip(skip).collect::<Vec<_>>())
}

fn draw_local(f: &mut ratatui::Frame<'_>, app: &App, area: Rect, colors: Colors) {
    let mut lines: Vec<Line> = app
        .lines
        .iter()
        .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(colors.text))))
        .collect();

    if let Some(picker) = app.shell.picker() {
        for (i, name) in THEMES.iter().enumerate() {
            let line = if i == picker.highlighted() {
                Line::from(Span::styled(
                    format!("> {}", name),
                    Style::default().fg(colors.accent).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(Span::styled(format!("  {}", name), Style::default().fg(colors.muted)))
            };
            lines.push(line);
        }
    } else {
        lines.push(Line::from(vec![
            Span::styled(app.shell.prompt(), Style::default().fg(colors.prompt)),
            Span::raw(" "),
            Span::styled(app.input.clone(), Style::default().fg(colors.text)),
            Span::styled("_", Style::default().fg(colors.muted)),
        ]));
        if !app.candidates.is_empty() {
            lines.push(Line::from(Span::styled(
                app.candidates.join("  "),
                Style::default().fg(colors.muted),
            )));
        }
    }
    f.render_widget(Paragraph::new(tail(lines, area.height)), area);
}

fn draw_login(f: &mut ratatui::Frame<'_>, form: &LoginForm, area: Rect, colors: Colors) {
    let field = |label: &str, value: String, which: Field| {
        let focused = form.focus == which;
        let value_style = if focused {
            Style::default().fg(colors.text).add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default().fg(colors.text)
        };
        Line::from(vec![
            Span::styled(format!("{:<6}", label), Style::default().fg(colors.prompt)),
            Span::styled(value, value_style),
            Span::styled(if focused { "_" } else { "" }, Style::default().fg(colors.muted)),
        ])
    };
    let auth = |kind: AuthKind, label: &'static str| {
        if form.auth == kind {
            Span::styled(label, Style::default().fg(colors.accent))
        } else {
            Span::styled(label, Style::default().fg(colors.muted))
        }
    };
    let secret_label = match form.auth {
        AuthKind::Password => "pass:",
        AuthKind::KeyFile => "key:",
    };

    let mut lines = vec![
        Line::from(Span::styled("ssh connection setup", Style::default().fg(colors.text))),
        Line::default(),
        field("host:", form.host.clone(), Field::Host),
        field("user:", form.username.clone(), Field::User),
        Line::from(vec![
            Span::styled(format!("{:<6}", "auth:"), Style::default().fg(colors.prompt)),
            auth(AuthKind::Password, "[password]"),
            Span::styled(" / ", Style::default().fg(colors.muted)),
            auth(AuthKind::KeyFile, "[key]"),
        ]),
        field(secret_label, form.secret_display(), Field::Secret),
        field("port:", form.port.clone(), Field::Port),
        Line::default(),
    ];
    if form.busy {
        lines.push(Line::from(Span::styled("connecting...", Style::default().fg(colors.muted))));
    } else if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(colors.error))));
    }
    lines.push(Line::from(Span::styled(
        "enter: next  tab: switch auth  esc: cancel",
        Style::default().fg(colors.muted),
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.accent));
    f.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
}

fn draw_reconnecting(f: &mut ratatui::Frame<'_>, area: Rect, colors: Colors) {
    let top = area.height.saturating_sub(2) / 2;
    let mut lines = vec![Line::default(); top as usize];
    lines.push(
        Line::from(Span::styled(
            "Reconnecting to SSH session",
            Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
        ))
        .centered(),
    );
    lines.push(
        Line::from(Span::styled(
            "Please wait while we restore your connection...",
            Style::default().fg(colors.muted),
        ))
        .centered(),
    );
    f.render_widget(Paragraph::new(Text::from(lines)), area);
}

fn draw_remote(f: &mut ratatui::Frame<'_>, app: &App, area: Rect, colors: Colors) {
    let mut lines: Vec<Line> = styled_lines(&app.client.state().output)
        .into_iter()
        .map(|runs| {
            Line::from(
                runs.into_iter()
                    .map(|run| Span::styled(run.text, style_for_run(&run.style, colors)))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    // The remote prompt is the tail of the transcript; typed input continues it.
    if let Some(last) = lines.last_mut() {
        last.spans.push(Span::styled(app.input.clone(), Style::default().fg(colors.text)));
        last.spans.push(Span::styled("_", Style::default().fg(colors.muted)));
    }
    f.render_widget(Paragraph::new(tail(lines, area.height)), area);
}

fn style_for_run(run: &TextStyle, colors: Colors) -> Style {
    let mut style = Style::default().fg(run.fg.map(map_color).unwrap_or(colors.text));
    if let Some(color) = run.bg {
        style = style.bg(map_color(color));
    }
    if run.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if run.faint {
        style = style.add_modifier(Modifier::DIM);
    }
    if run.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if run.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if run.inverse {
        style = style.add_modifier(Modifier::REVERSED);
    }
    if run.strike {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    style
}

fn map_color(color: TermColor) -> Color {
    let (r, g, b) = color.channels();
    Color::Rgb(r, g, b)
}

fn draw_status(f: &mut ratatui::Frame<'_>, app: &App, area: Rect, colors: Colors) {
    let state = app.client.state();
    let mut spans = vec![Span::styled(" tui.cat ", Style::default().fg(colors.background).bg(colors.accent))];
    match &app.mode {
        Mode::Remote => {
            let who = state.remote_prompt.clone().unwrap_or_else(|| "ssh".to_string());
            spans.push(Span::styled(format!(" {} ", who), Style::default().fg(colors.prompt)));
            if let Some(id) = &state.session_id {
                let short: String = id.chars().take(8).collect();
                spans.push(Span::styled(format!("session {} ", short), Style::default().fg(colors.muted)));
            }
        }
        _ => spans.push(Span::styled(
            format!(" theme: {} ", app.shell.themes().current()),
            Style::default().fg(colors.muted),
        )),
    }
    if let Some(error) = &state.error {
        if matches!(app.mode, Mode::Remote) {
            spans.push(Span::styled(error.clone(), Style::default().fg(colors.error)));
        }
    }
    spans.push(Span::styled("  ctrl-q quit", Style::default().fg(colors.muted)));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuicat_core::shell::theme::palette;

    fn colors() -> Colors {
        Colors::from(palette("geist").unwrap())
    }

    #[test]
    fn remote_runs_keep_color_and_weight() {
        let lines = styled_lines("\x1b[1;31merr\x1b[0m ok\x1b[38;2;1;2;3mx");
        let runs = &lines[0];
        let bold_red = style_for_run(&runs[0].style, colors());
        assert_eq!(bold_red.fg, Some(Color::Rgb(0xef, 0x44, 0x44)));
        assert!(bold_red.add_modifier.contains(Modifier::BOLD));

        let plain = style_for_run(&runs[1].style, colors());
        assert_eq!(plain.fg, Some(colors().text));
        assert!(plain.add_modifier.is_empty());

        let truecolor = style_for_run(&runs[2].style, colors());
        assert_eq!(truecolor.fg, Some(Color::Rgb(1, 2, 3)));
    }

    #[test]
    fn inverse_maps_to_reversed() {
        let lines = styled_lines("\x1b[7;2;9mx");
        let style = style_for_run(&lines[0][0].style, colors());
        assert!(style.add_modifier.contains(Modifier::REVERSED));
        assert!(style.add_modifier.contains(Modifier::DIM));
        assert!(style.add_modifier.contains(Modifier::CROSSED_OUT));
    }
}
