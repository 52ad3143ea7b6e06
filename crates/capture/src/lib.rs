//! Pointer gesture capture for annotation overlays.
//!
//! One machine per overlay, driven by pointer events that have already been
//! routed to a page. A gesture is one pointer-down-to-pointer-up interaction
//! and produces at most one annotation; sub-threshold gestures are treated as
//! accidental clicks and dropped without an error.

use annot_model::{Annotation, FreehandStroke, OverlayConfig, RectAnnotation, ToolMode};
use log::debug;
use overlay_core::{norm_rect_from_corners, to_normalized, NormPoint, PageGeometry, PixelPoint, PixelRect};

/// Minimum normalized extent a rectangle side (or total drag) must reach to
/// be committed.
pub const MIN_GESTURE_EXTENT: f32 = 0.002;

/// Minimum normalized displacement between recorded brush points. Keeps
/// dense pointer-move streams from exploding the point count.
pub const BRUSH_DECIMATION_STEP: f32 = 0.002;

/// In-progress gesture, exposed so the view layer can draw a live preview.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    Rect { page: u32, start: NormPoint, current: NormPoint },
    Brush { page: u32, points: Vec<NormPoint>, size: f32 },
}

impl Draft {
    pub fn page(&self) -> u32 {
        match self {
            Draft::Rect { page, .. } | Draft::Brush { page, .. } => *page,
        }
    }
}

#[derive(Debug)]
enum GestureState {
    Idle,
    Dragging(Draft),
}

#[derive(Debug)]
pub struct CaptureMachine {
    config: OverlayConfig,
    state: GestureState,
}

impl CaptureMachine {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config, state: GestureState::Idle }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging(_))
    }

    pub fn draft(&self) -> Option<&Draft> {
        match &self.state {
            GestureState::Idle => None,
            GestureState::Dragging(draft) => Some(draft),
        }
    }

    /// Disabling mid-gesture discards the draft; annotations already
    /// committed stay visible but inert.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        if !enabled {
            self.state = GestureState::Idle;
        }
    }

    /// Switching tools finalizes any in-flight draft first so no draft ever
    /// survives a mode change: committed if it clears the thresholds,
    /// dropped otherwise.
    pub fn set_mode(&mut self, mode: ToolMode) -> Option<(u32, Annotation)> {
        let committed = match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Idle => None,
            GestureState::Dragging(draft) => self.finalize(draft),
        };

        self.config.mode = mode;
        committed
    }

    pub fn set_appearance(&mut self, color: annot_model::Color, alpha: f32, brush_size_px: f32) {
        self.config.color = color;
        self.config.alpha = alpha.clamp(0.0, 1.0);
        self.config.brush_size_px = brush_size_px;
    }

    /// `position` is in page-local pixels; `geometry` is the page's current
    /// measurement, `None` while the page has not rendered yet (capture is
    /// not possible then).
    pub fn pointer_down(
        &mut self,
        page: u32,
        position: PixelPoint,
        geometry: Option<&PageGeometry>,
        primary: bool,
    ) {
        if !self.config.enabled || !primary || self.is_dragging() {
            return;
        }

        let Some(geometry) = geometry.filter(|geometry| geometry.is_renderable()) else {
            debug!("pointer down on page {page} ignored: no render geometry yet");
            return;
        };

        let point = normalize(position, geometry);
        let draft = match self.config.mode {
            ToolMode::Rect => Draft::Rect { page, start: point, current: point },
            ToolMode::Brush => Draft::Brush {
                page,
                points: vec![point],
                size: self.config.brush_size_px / geometry.render_width_px,
            },
        };

        self.state = GestureState::Dragging(draft);
    }

    pub fn pointer_move(&mut self, position: PixelPoint, geometry: Option<&PageGeometry>) {
        let Some(geometry) = geometry.filter(|geometry| geometry.is_renderable()) else {
            return;
        };
        let point = normalize(position, geometry);

        match &mut self.state {
            GestureState::Idle => {}
            GestureState::Dragging(Draft::Rect { current, .. }) => *current = point,
            GestureState::Dragging(Draft::Brush { points, .. }) => {
                let far_enough = points
                    .last()
                    .map(|last| last.distance_to(&point) >= BRUSH_DECIMATION_STEP)
                    .unwrap_or(true);
                if far_enough {
                    points.push(point);
                }
            }
        }
    }

    /// Ends the gesture. Returns the committed annotation and its page, or
    /// `None` when the gesture was degenerate.
    pub fn pointer_up(
        &mut self,
        position: PixelPoint,
        geometry: Option<&PageGeometry>,
    ) -> Option<(u32, Annotation)> {
        self.pointer_move(position, geometry);

        match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Idle => None,
            GestureState::Dragging(draft) => self.finalize(draft),
        }
    }

    /// Pointer-cancel and pointer-leave: the draft is dropped, never
    /// committed.
    pub fn pointer_cancel(&mut self) {
        if self.is_dragging() {
            debug!("gesture cancelled");
        }
        self.state = GestureState::Idle;
    }

    fn finalize(&self, draft: Draft) -> Option<(u32, Annotation)> {
        match draft {
            Draft::Rect { page, start, current } => {
                let rect = norm_rect_from_corners(start, current);
                if rect.w < MIN_GESTURE_EXTENT || rect.h < MIN_GESTURE_EXTENT {
                    debug!("degenerate rectangle gesture on page {page} dropped");
                    return None;
                }
                Some((page, Annotation::Rect(RectAnnotation::new(rect))))
            }
            Draft::Brush { page, points, size } => {
                if points.len() < 2 {
                    debug!("degenerate brush gesture on page {page} dropped");
                    return None;
                }
                Some((
                    page,
                    Annotation::Freehand(FreehandStroke::new(
                        points,
                        size,
                        self.config.color,
                        self.config.alpha,
                    )),
                ))
            }
        }
    }
}

fn normalize(position: PixelPoint, geometry: &PageGeometry) -> NormPoint {
    let container = PixelRect {
        x: 0.0,
        y: 0.0,
        w: geometry.render_width_px,
        h: geometry.render_height_px,
    };
    to_normalized(position, container)
}
