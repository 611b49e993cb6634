//! Terminal output handling.
//!
//! Ingestion keeps a raw transcript buffer that is the source of truth for
//! what the remote shell printed. It drops sequences that have no meaning in a
//! linear transcript and models a full screen clear by collapsing the buffer to
//! the prompt that follows it. Styling is resolved only when the buffer is
//! rendered, see [`markup`].

pub mod markup;
pub mod palette;

pub use markup::{plain_text, render_markup, styled_lines, StyledRun, TextStyle};
pub use palette::Color;

use regex::Regex;
use std::sync::LazyLock;

const CLEAR_SEQUENCES: [&str; 3] = ["\x1b[H\x1b[2J", "\x1b[2J\x1b[H", "\x1b[H\x1b[3J"];

/// Cursor positioning and mode toggles with no transcript representation.
/// SGR (`m`) is left alone.
static TRANSCRIPT_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \x1b\[\??[0-9;]*[A-HJKfhlsu]            # cursor move, erase, save/restore, modes
        | \x1b[78=>]                             # DEC save/restore, keypad modes
        | \x1b\][012];[^\x07\x1b]*(?:\x07|\x1b\\) # window/icon title
        | \x1b[()][A-Z0-9]                       # character set selection
        ",
    )
    .expect("transcript noise regex is valid")
});

static PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^@\s]+@[^:\s]+[:$#]").expect("prompt regex is valid"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ingest {
    /// The cleaned chunk was appended to the buffer.
    Appended(String),
    /// A screen clear replaced the whole buffer.
    Reset,
}

pub fn is_clear_screen(chunk: &str) -> bool {
    CLEAR_SEQUENCES.iter().any(|seq| chunk.contains(seq))
}

pub fn strip_transcript_noise(chunk: &str) -> String {
    TRANSCRIPT_NOISE.replace_all(chunk, "").into_owned()
}

/// Tail of `text` starting at the last `user@host` prompt, if any.
pub fn last_prompt_fragment(text: &str) -> Option<&str> {
    PROMPT.find_iter(text).last().map(|m| &text[m.start()..])
}

/// `user@host` of the last prompt in `text`, without the trailing marker.
pub fn prompt_identity(text: &str) -> Option<String> {
    let cleaned = strip_sgr(text);
    PROMPT
        .find_iter(&cleaned)
        .last()
        .map(|m| m.as_str()[..m.as_str().len() - 1].to_string())
}

fn strip_sgr(text: &str) -> String {
    static SGR: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("sgr regex is valid"));
    SGR.replace_all(text, "").into_owned()
}

/// Feeds one output chunk into the transcript buffer.
pub fn ingest(buffer: &mut String, chunk: &str) -> Ingest {
    if is_clear_screen(chunk) {
        let cleaned = strip_transcript_noise(chunk);
        buffer.clear();
        if let Some(prompt) = last_prompt_fragment(&cleaned) {
            buffer.push_str(prompt);
        }
        return Ingest::Reset;
    }
    let cleaned = strip_transcript_noise(chunk);
    buffer.push_str(&cleaned);
    Ingest::Appended(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_screen_keeps_only_trailing_prompt() {
        let mut buffer = "old output\r\nmore\r\n".to_string();
        let result = ingest(&mut buffer, "\x1b[H\x1b[2Jguest@tui.cat:~$ ");
        assert_eq!(result, Ingest::Reset);
        assert_eq!(buffer, "guest@tui.cat:~$ ");
    }

    #[test]
    fn clear_variants_are_recognised() {
        for seq in ["\x1b[2J\x1b[H", "\x1b[H\x1b[3J"] {
            let mut buffer = "history".to_string();
            ingest(&mut buffer, &format!("{}root@box# ", seq));
            assert_eq!(buffer, "root@box# ");
        }
    }

    #[test]
    fn clear_without_prompt_empties_buffer() {
        let mut buffer = "history".to_string();
        assert_eq!(ingest(&mut buffer, "\x1b[H\x1b[2J"), Ingest::Reset);
        assert!(buffer.is_empty());
    }

    #[test]
    fn clear_picks_last_prompt_in_chunk() {
        let mut buffer = String::new();
        ingest(
            &mut buffer,
            "\x1b[H\x1b[2Ja@b:~$ ls\r\nfile\r\na@b:~/src$ ",
        );
        assert_eq!(buffer, "a@b:~/src$ ");
    }

    #[test]
    fn append_strips_cursor_and_title_but_keeps_color() {
        let mut buffer = "$ ".to_string();
        let chunk = "\x1b]0;user@host: ~\x07\x1b[?2004h\x1b[32mok\x1b[0m\x1b[K\x1b(B\x1b7x\x1b8";
        let result = ingest(&mut buffer, chunk);
        assert_eq!(result, Ingest::Appended("\x1b[32mok\x1b[0mx".to_string()));
        assert_eq!(buffer, "$ \x1b[32mok\x1b[0mx");
    }

    #[test]
    fn append_is_verbatim_for_plain_text() {
        let mut buffer = String::new();
        ingest(&mut buffer, "line one\r\n");
        ingest(&mut buffer, "line two");
        assert_eq!(buffer, "line one\r\nline two");
    }

    #[test]
    fn prompt_identity_ignores_colors() {
        let text = "x\r\n\x1b[01;32mdev@web1\x1b[00m:\x1b[01;34m~\x1b[00m$ ";
        assert_eq!(prompt_identity(text).as_deref(), Some("dev@web1"));
        assert_eq!(prompt_identity("no prompt here"), None);
    }
}
