//! Bake-and-upload orchestration.
//!
//! Saving reads the annotation store and the geometry captured at save time,
//! resolves every annotation into PDF point space, fetches the current
//! document binary, bakes, uploads, and finally swaps the session onto the
//! server-returned URL. Failures leave the session exactly as it was; the
//! cooperative in-flight flag is released on every path.

mod session;
pub mod transport;

pub use session::ReviewSession;
pub use transport::{HttpTransport, Transport, TransportError, UploadRequest, UploadedDocument};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use annot_model::{Annotation, Color, ToolMode};
use bake_engine::{BakeError, DrawOp, PdfWriter, RectPlacement, StrokePlacement};
use log::debug;
use overlay_core::{norm_point_to_pdf, norm_to_pdf_rect};
use render_sync::GeometryMap;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("page {page} has no recorded geometry")]
    GeometryUnavailable { page: u32 },
    #[error("failed to fetch source document: {0}")]
    Fetch(#[source] TransportError),
    #[error("failed to bake annotations: {0}")]
    Bake(#[from] BakeError),
    #[error("failed to upload baked document: {0}")]
    Upload(#[source] TransportError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a save is in flight; the document switch is blocked")]
    SaveInFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveOptions {
    /// Only annotations of this mode are baked; a session never mixes modes
    /// in one save.
    pub mode: ToolMode,
    /// Fill style for baked rectangles. Strokes carry their own style.
    pub color: Color,
    pub alpha: f32,
    pub upload_endpoint: String,
    pub destination: Option<String>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved { url: String },
    /// Another save was already pending; this call did nothing.
    AlreadyInFlight,
    NothingToSave,
}

pub struct SaveCoordinator<T, W> {
    session: Mutex<ReviewSession>,
    transport: T,
    writer: W,
    in_flight: AtomicBool,
}

impl<T: Transport, W: PdfWriter> SaveCoordinator<T, W> {
    pub fn new(session: ReviewSession, transport: T, writer: W) -> Self {
        Self { session: Mutex::new(session), transport, writer, in_flight: AtomicBool::new(false) }
    }

    /// True while a save is pending. The UI uses this to disable every save
    /// trigger, including the keyboard shortcut.
    pub fn is_saving(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn with_session<R>(&self, f: impl FnOnce(&mut ReviewSession) -> R) -> R {
        f(&mut self.lock_session())
    }

    /// Switches the active document, clearing the store. Blocked while a
    /// save is pending so the pipeline and the switch cannot race.
    pub fn change_document(&self, url: impl Into<String>) -> Result<(), SessionError> {
        if self.is_saving() {
            return Err(SessionError::SaveInFlight);
        }

        self.lock_session().change_document(url);
        Ok(())
    }

    pub async fn save(&self, options: &SaveOptions) -> Result<SaveOutcome, SaveError> {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            return Ok(SaveOutcome::AlreadyInFlight);
        };

        let (document_url, annotations, geometry) = {
            let session = self.lock_session();
            let annotations: Vec<(u32, Annotation)> = session
                .store
                .iter_mode(options.mode)
                .map(|(page, annotation)| (page, annotation.clone()))
                .collect();
            (session.document_url().to_owned(), annotations, session.sync.snapshot())
        };

        if annotations.is_empty() {
            return Ok(SaveOutcome::NothingToSave);
        }

        let ops = resolve_draw_ops(&annotations, &geometry, options)?;
        debug!("baking {} annotations into {document_url}", ops.len());

        let source = self.transport.fetch(&document_url).await.map_err(SaveError::Fetch)?;
        let baked = self.writer.bake(&source, &ops)?;

        let uploaded = self
            .transport
            .upload(
                &options.upload_endpoint,
                UploadRequest {
                    bytes: baked,
                    file_name: file_name_for(&document_url),
                    destination: options.destination.clone(),
                    overwrite: options.overwrite,
                },
            )
            .await
            .map_err(SaveError::Upload)?;

        // The annotations now live in the file itself; the session starts
        // over on the baked document.
        let url = canonicalize_document_url(&uploaded.url);
        self.lock_session().change_document(url.clone());

        Ok(SaveOutcome::Saved { url })
    }

    fn lock_session(&self) -> MutexGuard<'_, ReviewSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves stored normalized annotations against the save-time geometry
/// snapshot. Any annotated page without geometry aborts the save before
/// network work starts.
fn resolve_draw_ops(
    annotations: &[(u32, Annotation)],
    geometry: &GeometryMap,
    options: &SaveOptions,
) -> Result<Vec<DrawOp>, SaveError> {
    let mut ops = Vec::with_capacity(annotations.len());

    for (page, annotation) in annotations {
        let page_geometry =
            *geometry.get(page).ok_or(SaveError::GeometryUnavailable { page: *page })?;

        match annotation {
            Annotation::Rect(rect) => ops.push(DrawOp::FillRect(RectPlacement {
                page: *page,
                rect: norm_to_pdf_rect(rect.rect, &page_geometry),
                color: options.color,
                alpha: options.alpha,
            })),
            Annotation::Freehand(stroke) => ops.push(DrawOp::StrokePath(StrokePlacement {
                page: *page,
                points: stroke
                    .points
                    .iter()
                    .map(|point| norm_point_to_pdf(*point, &page_geometry))
                    .collect(),
                width_pt: stroke.size * page_geometry.pdf_width_pt,
                color: stroke.color,
                alpha: stroke.alpha,
            })),
        }
    }

    Ok(ops)
}

/// Collapses duplicate path separators and strips the cache-busting query
/// and fragment from a server-returned document URL.
pub fn canonicalize_document_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            let collapsed = collapse_slashes(url.path());
            url.set_path(&collapsed);
            url.to_string()
        }
        // Relative document paths never carry a scheme; canonicalize the
        // string directly.
        Err(_) => {
            let path = raw.split(['?', '#']).next().unwrap_or(raw);
            collapse_slashes(path)
        }
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_was_slash = false;

    for character in path.chars() {
        if character == '/' {
            if previous_was_slash {
                continue;
            }
            previous_was_slash = true;
        } else {
            previous_was_slash = false;
        }
        collapsed.push(character);
    }

    collapsed
}

fn file_name_for(document_url: &str) -> String {
    let path = document_url.split(['?', '#']).next().unwrap_or(document_url);
    let name = path.rsplit('/').next().unwrap_or("");

    if name.is_empty() {
        "document.pdf".to_owned()
    } else {
        name.to_owned()
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then_some(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
