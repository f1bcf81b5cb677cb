//! Utility functions

// Wide variant — for the header logo
pub const LOGO_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 192 128"><defs><style>.c1{fill:#fff}.c2{fill:#2dd4bf}</style></defs><path class="c1" fill-rule="evenodd" d="M20 8h152c6.63 0 12 5.37 12 12v88c0 6.63-5.37 12-12 12H20c-6.63 0-12-5.37-12-12V20C8 13.37 13.37 8 20 8zm0 10c-1.1 0-2 .9-2 2v88c0 1.1.9 2 2 2h152c1.1 0 2-.9 2-2V20c0-1.1-.9-2-2-2H20z"/><path class="c1" d="M32 102l34-44 26 30 18-20 50 34z"/><path class="c2" d="M138 28l5 11 11 5-11 5-5 11-5-11-11-5 11-5z"/><path class="c2" d="M160 26l2 4 4 2-4 2-2 4-2-4-4-2 4-2z"/></svg>"#;

// Square viewBox — for window/taskbar icons
pub const ICON_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 192 192"><defs><style>.c1{fill:#fff}.c2{fill:#2dd4bf}</style></defs><path class="c1" fill-rule="evenodd" d="M20 8h152c6.63 0 12 5.37 12 12v152c0 6.63-5.37 12-12 12H20c-6.63 0-12-5.37-12-12V20C8 13.37 13.37 8 20 8zm0 10c-1.1 0-2 .9-2 2v152c0 1.1.9 2 2 2h152c1.1 0 2-.9 2-2V20c0-1.1-.9-2-2-2H20z"/><path class="c1" d="M32 166l42-58 28 32 20-24 38 50z"/><path class="c2" d="M128 40l8 16 16 8-16 8-8 16-8-16-16-8 16-8z"/><path class="c2" d="M160 34l2.5 5.5 5.5 2.5-5.5 2.5-2.5 5.5-2.5-5.5-5.5-2.5 5.5-2.5z"/></svg>"#;

/// Rasterize the logo SVG at the given width, preserving aspect ratio.
pub fn rasterize_logo(width: u32) -> (Vec<u8>, u32, u32) {
    let tree = resvg::usvg::Tree::from_str(LOGO_SVG, &resvg::usvg::Options::default()).unwrap();
    let svg_size = tree.size();
    let scale = width as f32 / svg_size.width();
    let height = (svg_size.height() * scale).ceil() as u32;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height).unwrap();
    resvg::render(
        &tree,
        resvg::usvg::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    (premul_to_straight(&pixmap), width, height)
}

/// Rasterize the icon SVG to a square image (for window/taskbar icons).
pub fn rasterize_logo_square(size: u32) -> (Vec<u8>, u32, u32) {
    let tree = resvg::usvg::Tree::from_str(ICON_SVG, &resvg::usvg::Options::default()).unwrap();
    let scale = size as f32 / tree.size().width();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size, size).unwrap();
    resvg::render(
        &tree,
        resvg::usvg::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    (premul_to_straight(&pixmap), size, size)
}

fn premul_to_straight(pixmap: &resvg::tiny_skia::Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let a = p.alpha();
            if a == 0 {
                [0, 0, 0, 0]
            } else {
                let r = (p.red() as u16 * 255 / a as u16) as u8;
                let g = (p.green() as u16 * 255 / a as u16) as u8;
                let b = (p.blue() as u16 * 255 / a as u16) as u8;
                [r, g, b, a]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logo_rasterizes_at_requested_width() {
        let (pixels, w, h) = rasterize_logo(96);
        assert_eq!(w, 96);
        assert_eq!(h, 64); // 192x128 viewBox, aspect preserved
        assert_eq!(pixels.len(), (w * h * 4) as usize);
    }

    #[test]
    fn icon_rasterizes_square() {
        let (pixels, w, h) = rasterize_logo_square(64);
        assert_eq!((w, h), (64, 64));
        assert_eq!(pixels.len(), (64 * 64 * 4) as usize);
        // The sparkle motif must actually land on the canvas.
        assert!(pixels.iter().any(|&b| b != 0));
    }
}
