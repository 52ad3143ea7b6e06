use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Position as a fraction (0..1) of the rendered page, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormPoint {
    pub x: f32,
    pub y: f32,
}

impl NormPoint {
    pub fn distance_to(&self, other: &NormPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Rectangle in PDF point space: bottom-left origin, y-up, 1/72 inch units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PdfRect {
    pub const ZERO: PdfRect = PdfRect { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };
}

/// Rendered size of one page alongside its true PDF page size.
///
/// Render dimensions are client (CSS) pixels of the painted canvas, not the
/// canvas's internal pixel buffer, so overlays stay aligned at any device
/// pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub render_width_px: f32,
    pub render_height_px: f32,
    pub pdf_width_pt: f32,
    pub pdf_height_pt: f32,
}

impl PageGeometry {
    pub fn is_renderable(&self) -> bool {
        self.render_width_px > 0.0 && self.render_height_px > 0.0
    }
}

pub fn to_normalized(point: PixelPoint, container: PixelRect) -> NormPoint {
    if container.w <= 0.0 || container.h <= 0.0 {
        return NormPoint { x: 0.0, y: 0.0 };
    }

    NormPoint {
        x: ((point.x - container.x) / container.w).clamp(0.0, 1.0),
        y: ((point.y - container.y) / container.h).clamp(0.0, 1.0),
    }
}

pub fn norm_rect_from_corners(a: NormPoint, b: NormPoint) -> NormRect {
    NormRect {
        x: a.x.min(b.x),
        y: a.y.min(b.y),
        w: (a.x - b.x).abs(),
        h: (a.y - b.y).abs(),
    }
}

/// Fractions only hold for the render size they are displayed at, so this is
/// recomputed on every render or zoom change.
pub fn to_pixel_rect(rect: NormRect, geometry: &PageGeometry) -> PixelRect {
    PixelRect {
        x: rect.x * geometry.render_width_px,
        y: rect.y * geometry.render_height_px,
        w: rect.w * geometry.render_width_px,
        h: rect.h * geometry.render_height_px,
    }
}

/// Maps a top-left-origin, y-down screen rectangle into bottom-left-origin,
/// y-up PDF space. The PDF y-origin is the PDF-space position of the screen
/// rectangle's bottom edge.
pub fn to_pdf_rect(rect: PixelRect, geometry: &PageGeometry) -> PdfRect {
    if !geometry.is_renderable() {
        return PdfRect::ZERO;
    }

    let scale_x = geometry.pdf_width_pt / geometry.render_width_px;
    let scale_y = geometry.pdf_height_pt / geometry.render_height_px;

    let bottom_edge_px = rect.y + rect.h;

    PdfRect {
        x: rect.x * scale_x,
        y: (geometry.render_height_px - bottom_edge_px) * scale_y,
        width: rect.w * scale_x,
        height: rect.h * scale_y,
    }
}

pub fn pdf_to_pixel_rect(rect: PdfRect, geometry: &PageGeometry) -> PixelRect {
    if geometry.pdf_width_pt <= 0.0 || geometry.pdf_height_pt <= 0.0 {
        return PixelRect { x: 0.0, y: 0.0, w: 0.0, h: 0.0 };
    }

    let scale_x = geometry.render_width_px / geometry.pdf_width_pt;
    let scale_y = geometry.render_height_px / geometry.pdf_height_pt;

    let top_edge_pt = rect.y + rect.height;

    PixelRect {
        x: rect.x * scale_x,
        y: (geometry.pdf_height_pt - top_edge_pt) * scale_y,
        w: rect.width * scale_x,
        h: rect.height * scale_y,
    }
}

pub fn norm_to_pdf_rect(rect: NormRect, geometry: &PageGeometry) -> PdfRect {
    to_pdf_rect(to_pixel_rect(rect, geometry), geometry)
}

pub fn norm_point_to_pdf(point: NormPoint, geometry: &PageGeometry) -> (f32, f32) {
    if !geometry.is_renderable() {
        return (0.0, 0.0);
    }

    (point.x * geometry.pdf_width_pt, (1.0 - point.y) * geometry.pdf_height_pt)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageGeometry = PageGeometry {
        render_width_px: 800.0,
        render_height_px: 1000.0,
        pdf_width_pt: 612.0,
        pdf_height_pt: 792.0,
    };

    fn assert_close(left: f32, right: f32) {
        assert!((left - right).abs() < 1e-3, "{left} != {right}");
    }

    #[test]
    fn normalized_coordinates_are_container_relative_and_clamped() {
        let container = PixelRect { x: 100.0, y: 50.0, w: 400.0, h: 500.0 };

        let inside = to_normalized(PixelPoint { x: 300.0, y: 300.0 }, container);
        assert_close(inside.x, 0.5);
        assert_close(inside.y, 0.5);

        let outside = to_normalized(PixelPoint { x: 9999.0, y: -20.0 }, container);
        assert_close(outside.x, 1.0);
        assert_close(outside.y, 0.0);
    }

    #[test]
    fn zero_size_container_short_circuits() {
        let container = PixelRect { x: 0.0, y: 0.0, w: 0.0, h: 0.0 };
        let point = to_normalized(PixelPoint { x: 10.0, y: 10.0 }, container);

        assert_eq!(point, NormPoint { x: 0.0, y: 0.0 });
    }

    #[test]
    fn corner_order_does_not_matter() {
        let a = NormPoint { x: 0.8, y: 0.1 };
        let b = NormPoint { x: 0.2, y: 0.6 };

        assert_eq!(norm_rect_from_corners(a, b), norm_rect_from_corners(b, a));

        let rect = norm_rect_from_corners(a, b);
        assert_close(rect.x, 0.2);
        assert_close(rect.y, 0.1);
        assert_close(rect.w, 0.6);
        assert_close(rect.h, 0.5);
    }

    #[test]
    fn top_left_screen_rect_touches_pdf_page_top() {
        let screen = PixelRect { x: 0.0, y: 0.0, w: 100.0, h: 50.0 };
        let pdf = to_pdf_rect(screen, &LETTER);

        assert_close(pdf.x, 0.0);
        assert_close(pdf.width, 76.5);
        assert_close(pdf.y + pdf.height, 792.0);
    }

    #[test]
    fn screen_pdf_screen_round_trip() {
        let screen = PixelRect { x: 37.5, y: 412.25, w: 120.0, h: 64.5 };

        let round_tripped = pdf_to_pixel_rect(to_pdf_rect(screen, &LETTER), &LETTER);

        assert_close(round_tripped.x, screen.x);
        assert_close(round_tripped.y, screen.y);
        assert_close(round_tripped.w, screen.w);
        assert_close(round_tripped.h, screen.h);
    }

    #[test]
    fn unrendered_page_maps_to_zero_rect() {
        let unrendered = PageGeometry {
            render_width_px: 0.0,
            render_height_px: 0.0,
            pdf_width_pt: 612.0,
            pdf_height_pt: 792.0,
        };
        let screen = PixelRect { x: 10.0, y: 10.0, w: 100.0, h: 100.0 };

        assert_eq!(to_pdf_rect(screen, &unrendered), PdfRect::ZERO);
    }

    #[test]
    fn normalized_rect_scales_with_render_size() {
        let rect = NormRect { x: 0.25, y: 0.5, w: 0.5, h: 0.1 };

        let at_100 = to_pixel_rect(rect, &LETTER);
        assert_close(at_100.x, 200.0);
        assert_close(at_100.y, 500.0);
        assert_close(at_100.w, 400.0);
        assert_close(at_100.h, 100.0);

        let zoomed = PageGeometry { render_width_px: 1600.0, render_height_px: 2000.0, ..LETTER };
        let at_200 = to_pixel_rect(rect, &zoomed);
        assert_close(at_200.w, 800.0);
        assert_close(at_200.h, 200.0);
    }

    #[test]
    fn normalized_point_flips_into_pdf_space() {
        let top_left = norm_point_to_pdf(NormPoint { x: 0.0, y: 0.0 }, &LETTER);
        assert_close(top_left.0, 0.0);
        assert_close(top_left.1, 792.0);

        let bottom_right = norm_point_to_pdf(NormPoint { x: 1.0, y: 1.0 }, &LETTER);
        assert_close(bottom_right.0, 612.0);
        assert_close(bottom_right.1, 0.0);
    }
}
