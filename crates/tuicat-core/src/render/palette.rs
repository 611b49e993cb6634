use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    /// Palette or 256-colour table entry, written `#rrggbb`.
    Hex(u8, u8, u8),
    /// 24-bit colour, written `rgb(r,g,b)`.
    Rgb(u8, u8, u8),
}

impl Color {
    pub fn channels(self) -> (u8, u8, u8) {
        match self {
            Color::Hex(r, g, b) | Color::Rgb(r, g, b) => (r, g, b),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Color::Hex(r, g, b) => write!(f, "#{:02x}{:02x}{:02x}", r, g, b),
            Color::Rgb(r, g, b) => write!(f, "rgb({},{},{})", r, g, b),
        }
    }
}

/// Colours for SGR 30–37/40–47 (0–7) and their bright variants 90–97/100–107 (8–15).
pub const ANSI_PALETTE: [Color; 16] = [
    Color::Hex(0x1f, 0x29, 0x37),
    Color::Hex(0xef, 0x44, 0x44),
    Color::Hex(0x22, 0xc5, 0x5e),
    Color::Hex(0xf5, 0x9e, 0x0b),
    Color::Hex(0x3b, 0x82, 0xf6),
    Color::Hex(0xa8, 0x55, 0xf7),
    Color::Hex(0x06, 0xb6, 0xd4),
    Color::Hex(0xf3, 0xf4, 0xf6),
    Color::Hex(0x6b, 0x72, 0x80),
    Color::Hex(0xf8, 0x71, 0x71),
    Color::Hex(0x4a, 0xde, 0x80),
    Color::Hex(0xfb, 0xbf, 0x24),
    Color::Hex(0x60, 0xa5, 0xfa),
    Color::Hex(0xc0, 0x84, 0xfc),
    Color::Hex(0x22, 0xd3, 0xee),
    Color::Hex(0xff, 0xff, 0xff),
];

/// Base of the 256-colour table; indices 0–15 of `38;5;n` use these.
pub const XTERM_BASE: [Color; 16] = [
    Color::Hex(0x00, 0x00, 0x00),
    Color::Hex(0x80, 0x00, 0x00),
    Color::Hex(0x00, 0x80, 0x00),
    Color::Hex(0x80, 0x80, 0x00),
    Color::Hex(0x00, 0x00, 0x80),
    Color::Hex(0x80, 0x00, 0x80),
    Color::Hex(0x00, 0x80, 0x80),
    Color::Hex(0xc0, 0xc0, 0xc0),
    Color::Hex(0x80, 0x80, 0x80),
    Color::Hex(0xff, 0x00, 0x00),
    Color::Hex(0x00, 0xff, 0x00),
    Color::Hex(0xff, 0xff, 0x00),
    Color::Hex(0x00, 0x00, 0xff),
    Color::Hex(0xff, 0x00, 0xff),
    Color::Hex(0x00, 0xff, 0xff),
    Color::Hex(0xff, 0xff, 0xff),
];

pub const DEFAULT_FG: Color = Color::Hex(0xe5, 0xe7, 0xeb);
pub const DEFAULT_BG: Color = Color::Hex(0x00, 0x00, 0x00);

/// xterm 256-colour index.
pub fn color_256(index: u8) -> Color {
    match index {
        0..=15 => XTERM_BASE[index as usize],
        16..=231 => {
            let n = index - 16;
            Color::Hex(cube(n / 36), cube((n % 36) / 6), cube(n % 6))
        }
        _ => {
            let gray = (8 + (index as u16 - 232) * 10).min(255) as u8;
            Color::Hex(gray, gray, gray)
        }
    }
}

fn cube(level: u8) -> u8 {
    if level == 0 {
        0
    } else {
        55 + level * 40
    }
}
