use annot_model::AnnotationStore;
use render_sync::{LayoutEvent, RenderSync};

/// Mutable client state for the document currently open in the viewer.
///
/// The store and geometry map are scoped to one document URL: switching
/// papers, or swapping in a server-baked replacement, resets both. Nothing
/// here survives a reload by design.
#[derive(Debug, Default)]
pub struct ReviewSession {
    document_url: String,
    pub store: AnnotationStore,
    pub sync: RenderSync,
}

impl ReviewSession {
    pub fn new(document_url: impl Into<String>) -> Self {
        Self {
            document_url: document_url.into(),
            store: AnnotationStore::new(),
            sync: RenderSync::new(),
        }
    }

    pub fn document_url(&self) -> &str {
        &self.document_url
    }

    pub fn change_document(&mut self, url: impl Into<String>) {
        self.document_url = url.into();
        self.store.clear_on_document_change();
        self.sync.apply(LayoutEvent::DocumentClosed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annot_model::{Annotation, RectAnnotation};
    use overlay_core::NormRect;

    #[test]
    fn document_switch_clears_store_and_geometry() {
        let mut session = ReviewSession::new("https://files.example.com/papers/a.pdf");
        session.sync.apply(LayoutEvent::PageRendered {
            page: 1,
            client_width_px: 800.0,
            client_height_px: 1000.0,
            pdf_width_pt: 612.0,
            pdf_height_pt: 792.0,
        });
        session.store.append(
            1,
            Annotation::Rect(RectAnnotation::new(NormRect { x: 0.1, y: 0.1, w: 0.2, h: 0.2 })),
        );

        session.change_document("https://files.example.com/papers/b.pdf");

        assert_eq!(session.document_url(), "https://files.example.com/papers/b.pdf");
        assert!(session.store.is_empty());
        assert!(session.sync.geometry(1).is_none());
    }
}
