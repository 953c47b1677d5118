use std::fmt::{self, Write as FmtWrite};

use crate::primitives::{LineStyle, Style, TextStyle};

/// An SVG element stored for deferred rendering.
#[derive(Debug, Clone)]
enum SvgElement {
    Rect { x: f64, y: f64, w: f64, h: f64, style: Style },
    Line { x1: f64, y1: f64, x2: f64, y2: f64, style: LineStyle },
    Text { x: f64, y: f64, content: String, style: TextStyle },
}

/// Immediate-mode SVG canvas. Coordinates in points (1pt = 1/72").
///
/// The document is produced by the [`fmt::Display`] impl, so
/// `canvas.to_string()` yields a complete `<svg>` string.
#[derive(Debug, Clone)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    elements: Vec<SvgElement>,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> crate::Result<Self> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(crate::RenderError::Layout(format!(
                "canvas size must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height, elements: Vec::new() })
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: &Style) {
        self.elements.push(SvgElement::Rect { x, y, w, h, style: style.clone() });
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, style: &LineStyle) {
        self.elements.push(SvgElement::Line { x1, y1, x2, y2, style: style.clone() });
    }

    pub fn text(&mut self, x: f64, y: f64, content: &str, style: &TextStyle) {
        self.elements.push(SvgElement::Text { x, y, content: content.to_string(), style: style.clone() });
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl fmt::Display for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height,
        )?;
        writeln!(f, r#"<rect width="{}" height="{}" fill="white" />"#, self.width, self.height)?;
        for elem in &self.elements {
            render_element(f, elem)?;
        }
        f.write_str("</svg>\n")
    }
}

fn render_element<W: FmtWrite>(out: &mut W, elem: &SvgElement) -> fmt::Result {
    match elem {
        SvgElement::Rect { x, y, w, h, style } => {
            write!(out, r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}""#)?;
            write_style_attrs(out, style)?;
            out.write_str(" />\n")
        }
        SvgElement::Line { x1, y1, x2, y2, style } => {
            write!(out, r#"<line x1="{x1:.2}" y1="{y1:.2}" x2="{x2:.2}" y2="{y2:.2}""#)?;
            write_line_attrs(out, style)?;
            out.write_str(" />\n")
        }
        SvgElement::Text { x, y, content, style } => {
            write!(out, r#"<text x="{x:.2}" y="{y:.2}""#)?;
            write!(out, r#" font-family="sans-serif" font-size="{:.1}""#, style.size)?;
            write!(out, r#" fill="{}""#, style.color.to_svg_fill())?;
            write!(out, r#" text-anchor="{}""#, style.anchor.as_str())?;
            write!(out, r#" dominant-baseline="{}""#, style.baseline.as_str())?;
            if style.bold {
                out.write_str(r#" font-weight="bold""#)?;
            }
            out.write_char('>')?;
            write_escaped(out, content)?;
            out.write_str("</text>\n")
        }
    }
}

fn write_escaped<W: FmtWrite>(out: &mut W, content: &str) -> fmt::Result {
    for ch in content.chars() {
        match ch {
            '<' => out.write_str("&lt;")?,
            '>' => out.write_str("&gt;")?,
            '&' => out.write_str("&amp;")?,
            '"' => out.write_str("&quot;")?,
            _ => out.write_char(ch)?,
        }
    }
    Ok(())
}

fn write_style_attrs<W: FmtWrite>(out: &mut W, style: &Style) -> fmt::Result {
    match &style.fill {
        Some(fill) => write!(out, r#" fill="{}""#, fill.to_svg_fill())?,
        None => out.write_str(r#" fill="none""#)?,
    }
    if let Some(stroke) = &style.stroke {
        write!(out, r#" stroke="{}""#, stroke.to_svg_fill())?;
        write!(out, r#" stroke-width="{:.2}""#, style.stroke_width)?;
    }
    if (style.opacity - 1.0).abs() > 1e-4 {
        write!(out, r#" opacity="{:.3}""#, style.opacity)?;
    }
    Ok(())
}

fn write_line_attrs<W: FmtWrite>(out: &mut W, style: &LineStyle) -> fmt::Result {
    write!(out, r#" stroke="{}""#, style.color.to_svg_fill())?;
    write!(out, r#" stroke-width="{:.2}""#, style.width)?;
    if let Some(dash) = &style.dash {
        write!(out, r#" stroke-dasharray="{dash}""#)?;
    }
    Ok(())
}
