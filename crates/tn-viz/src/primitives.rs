use crate::color::Color;

/// Fill and stroke of rectangles.
#[derive(Debug, Clone)]
pub struct Style {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self { fill: None, stroke: None, stroke_width: 1.0, opacity: 1.0 }
    }
}

impl Style {
    pub fn filled(color: Color) -> Self {
        Self { fill: Some(color), ..Default::default() }
    }

    pub fn stroked(color: Color, width: f64) -> Self {
        Self { stroke: Some(color), stroke_width: width, ..Default::default() }
    }

    pub fn with_stroke(mut self, color: Color, width: f64) -> Self {
        self.stroke = Some(color);
        self.stroke_width = width;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LineStyle {
    pub color: Color,
    pub width: f64,
    pub dash: Option<String>,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self { color: Color::BLACK, width: 1.0, dash: None }
    }
}

impl LineStyle {
    pub fn solid(color: Color, width: f64) -> Self {
        Self { color, width, dash: None }
    }

    pub fn dashed(color: Color, width: f64) -> Self {
        Self { color, width, dash: Some("4 2".into()) }
    }
}

#[derive(Debug, Clone)]
pub struct TextStyle {
    pub size: f64,
    pub color: Color,
    pub bold: bool,
    pub anchor: TextAnchor,
    pub baseline: TextBaseline,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 10.0,
            color: Color::BLACK,
            bold: false,
            anchor: TextAnchor::Start,
            baseline: TextBaseline::Alphabetic,
        }
    }
}

impl TextStyle {
    pub fn sized(size: f64) -> Self {
        Self { size, ..Default::default() }
    }

    pub fn anchored(mut self, anchor: TextAnchor, baseline: TextBaseline) -> Self {
        self.anchor = anchor;
        self.baseline = baseline;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn as_str(&self) -> &str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBaseline {
    Alphabetic,
    Central,
    Hanging,
}

impl TextBaseline {
    pub fn as_str(&self) -> &str {
        match self {
            TextBaseline::Alphabetic => "auto",
            TextBaseline::Central => "central",
            TextBaseline::Hanging => "hanging",
        }
    }
}

/// Rough advance width of `text` in points, assuming an average glyph
/// width of 0.55 em. Only used to reserve margins for tick labels.
pub fn estimate_text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * 0.55
}
