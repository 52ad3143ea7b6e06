use std::collections::HashMap;

use log::{debug, warn};
use overlay_core::PageGeometry;

/// Per-page geometry captured at save time.
pub type GeometryMap = HashMap<u32, PageGeometry>;

/// Layout notifications from the page renderer. `PageRendered` follows every
/// paint (initial render and zoom changes); `PageResized` comes from the
/// resize observation on the page container (fullscreen toggle, window or
/// sidebar resize), which may lag the layout change by a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutEvent {
    PageRendered {
        page: u32,
        client_width_px: f32,
        client_height_px: f32,
        pdf_width_pt: f32,
        pdf_height_pt: f32,
    },
    PageResized {
        page: u32,
        client_width_px: f32,
        client_height_px: f32,
    },
    PageRenderFailed {
        page: u32,
    },
    DocumentClosed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PageState {
    Ready(PageGeometry),
    Failed,
}

/// Tracks the measured geometry of every rendered page.
///
/// Lookups for pages that have not rendered (or whose render failed) return
/// `None` rather than a stale or default value; callers treat that as
/// "capture not possible yet". A render failure is isolated to its page.
#[derive(Debug, Default)]
pub struct RenderSync {
    pages: HashMap<u32, PageState>,
    epoch: u64,
}

impl RenderSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: LayoutEvent) {
        self.epoch += 1;

        match event {
            LayoutEvent::PageRendered {
                page,
                client_width_px,
                client_height_px,
                pdf_width_pt,
                pdf_height_pt,
            } => {
                self.pages.insert(
                    page,
                    PageState::Ready(PageGeometry {
                        render_width_px: client_width_px,
                        render_height_px: client_height_px,
                        pdf_width_pt,
                        pdf_height_pt,
                    }),
                );
            }
            LayoutEvent::PageResized { page, client_width_px, client_height_px } => {
                match self.pages.get_mut(&page) {
                    Some(PageState::Ready(geometry)) => {
                        geometry.render_width_px = client_width_px;
                        geometry.render_height_px = client_height_px;
                    }
                    Some(PageState::Failed) | None => {
                        // No geometry is invented for a page that never
                        // painted; the next successful render measures it.
                        debug!("resize for unrendered page {page} ignored");
                    }
                }
            }
            LayoutEvent::PageRenderFailed { page } => {
                warn!("page {page} failed to render; capture disabled for it");
                self.pages.insert(page, PageState::Failed);
            }
            LayoutEvent::DocumentClosed => self.pages.clear(),
        }
    }

    pub fn geometry(&self, page: u32) -> Option<PageGeometry> {
        match self.pages.get(&page) {
            Some(PageState::Ready(geometry)) => Some(*geometry),
            Some(PageState::Failed) | None => None,
        }
    }

    pub fn is_failed(&self, page: u32) -> bool {
        matches!(self.pages.get(&page), Some(PageState::Failed))
    }

    /// Count of applied events. Consumers that cached a lookup can compare
    /// epochs to detect staleness; one frame of lag is expected and fine.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn snapshot(&self) -> GeometryMap {
        self.pages
            .iter()
            .filter_map(|(page, state)| match state {
                PageState::Ready(geometry) => Some((*page, *geometry)),
                PageState::Failed => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(page: u32, width: f32, height: f32) -> LayoutEvent {
        LayoutEvent::PageRendered {
            page,
            client_width_px: width,
            client_height_px: height,
            pdf_width_pt: 612.0,
            pdf_height_pt: 792.0,
        }
    }

    #[test]
    fn unrendered_page_has_no_geometry() {
        let sync = RenderSync::new();
        assert!(sync.geometry(1).is_none());
    }

    #[test]
    fn render_records_geometry_and_resize_updates_it() {
        let mut sync = RenderSync::new();
        sync.apply(rendered(1, 800.0, 1000.0));

        let geometry = sync.geometry(1).expect("geometry expected after render");
        assert_eq!(geometry.render_width_px, 800.0);
        assert_eq!(geometry.pdf_height_pt, 792.0);

        sync.apply(LayoutEvent::PageResized { page: 1, client_width_px: 400.0, client_height_px: 500.0 });

        let resized = sync.geometry(1).expect("geometry expected after resize");
        assert_eq!(resized.render_width_px, 400.0);
        assert_eq!(resized.render_height_px, 500.0);
        assert_eq!(resized.pdf_width_pt, 612.0);
    }

    #[test]
    fn resize_before_first_render_is_ignored() {
        let mut sync = RenderSync::new();
        sync.apply(LayoutEvent::PageResized { page: 3, client_width_px: 640.0, client_height_px: 800.0 });

        assert!(sync.geometry(3).is_none());
    }

    #[test]
    fn render_failure_is_isolated_to_its_page() {
        let mut sync = RenderSync::new();
        sync.apply(rendered(1, 800.0, 1000.0));
        sync.apply(rendered(2, 800.0, 1000.0));

        sync.apply(LayoutEvent::PageRenderFailed { page: 2 });

        assert!(sync.geometry(1).is_some());
        assert!(sync.geometry(2).is_none());
        assert!(sync.is_failed(2));
        assert!(!sync.is_failed(1));
    }

    #[test]
    fn rerender_recovers_a_failed_page() {
        let mut sync = RenderSync::new();
        sync.apply(LayoutEvent::PageRenderFailed { page: 1 });
        sync.apply(rendered(1, 800.0, 1000.0));

        assert!(sync.geometry(1).is_some());
        assert!(!sync.is_failed(1));
    }

    #[test]
    fn snapshot_excludes_failed_pages() {
        let mut sync = RenderSync::new();
        sync.apply(rendered(1, 800.0, 1000.0));
        sync.apply(rendered(2, 800.0, 1000.0));
        sync.apply(LayoutEvent::PageRenderFailed { page: 2 });

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&1));
    }

    #[test]
    fn document_close_resets_all_pages() {
        let mut sync = RenderSync::new();
        sync.apply(rendered(1, 800.0, 1000.0));
        sync.apply(rendered(2, 800.0, 1000.0));

        sync.apply(LayoutEvent::DocumentClosed);

        assert!(sync.geometry(1).is_none());
        assert!(sync.snapshot().is_empty());
    }

    #[test]
    fn epoch_advances_with_every_event() {
        let mut sync = RenderSync::new();
        assert_eq!(sync.epoch(), 0);

        sync.apply(rendered(1, 800.0, 1000.0));
        sync.apply(LayoutEvent::PageResized { page: 1, client_width_px: 640.0, client_height_px: 800.0 });

        assert_eq!(sync.epoch(), 2);
    }
}
