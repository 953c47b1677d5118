use crate::RenderError;

/// Rasterize an SVG document to PNG bytes at `dpi` (SVG units are points).
///
/// Text is resolved against the system font database; glyphs are skipped
/// when no font matches.
pub fn svg_to_png(svg: &str, dpi: u32) -> crate::Result<Vec<u8>> {
    if dpi == 0 {
        return Err(RenderError::Png("dpi must be positive".into()));
    }
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt).map_err(|e| RenderError::Png(e.to_string()))?;

    let scale = dpi as f32 / 72.0;
    let size = tree.size();
    let w = (size.width() * scale).ceil() as u32;
    let h = (size.height() * scale).ceil() as u32;

    let mut pixmap = tiny_skia::Pixmap::new(w, h)
        .ok_or_else(|| RenderError::Png(format!("failed to create {}x{} pixmap", w, h)))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap.encode_png().map_err(|e| RenderError::Png(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::color::Color;
    use crate::primitives::Style;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn rasterizes_simple_canvas() {
        let mut c = Canvas::new(72.0, 36.0).unwrap();
        c.rect(10.0, 10.0, 20.0, 10.0, &Style::filled(Color::hex("#1f77b4")));
        let bytes = svg_to_png(&c.to_string(), 144).unwrap();
        assert_eq!(&bytes[..8], &PNG_MAGIC);
        // IHDR width/height at 2x scale
        assert_eq!(u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]), 144);
        assert_eq!(u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]), 72);
    }

    #[test]
    fn invalid_svg_is_an_error() {
        assert!(matches!(svg_to_png("not svg", 72), Err(RenderError::Png(_))));
        assert!(svg_to_png("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"1\" height=\"1\"/>", 0).is_err());
    }
}
