use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#rrggbb` (leading `#` optional). Malformed channels read as 0.
    pub fn hex(s: &str) -> Self {
        let s = s.strip_prefix('#').unwrap_or(s);
        let channel = |range: std::ops::Range<usize>| {
            s.get(range).and_then(|c| u8::from_str_radix(c, 16).ok()).unwrap_or(0)
        };
        Self { r: channel(0..2), g: channel(2..4), b: channel(4..6), a: 1.0 }
    }

    pub const fn with_alpha(mut self, a: f64) -> Self {
        self.a = a;
        self
    }

    pub fn to_svg_fill(&self) -> String {
        if (self.a - 1.0).abs() < 1e-6 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({},{},{},{:.3})", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_svg_fill())
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Bar fill of histogram panels.
pub const BAR_FILL: &str = "#1f77b4";
/// Light grid lines behind the bars.
pub const GRID: &str = "#b0b0b0";
