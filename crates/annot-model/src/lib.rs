use std::collections::BTreeMap;
use std::str::FromStr;

use overlay_core::{NormPoint, NormRect};
use serde::{Deserialize, Serialize};

pub type AnnotationId = uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid hex color {0:?}")]
pub struct ColorParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_normalized(&self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    /// Accepts `#rrggbb` and the shorthand `#rgb`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value.strip_prefix('#').unwrap_or(value);

        let channel = |range: &str| u8::from_str_radix(range, 16);

        match digits.len() {
            6 => {
                let r = channel(&digits[0..2]);
                let g = channel(&digits[2..4]);
                let b = channel(&digits[4..6]);
                match (r, g, b) {
                    (Ok(r), Ok(g), Ok(b)) => Ok(Self { r, g, b }),
                    _ => Err(ColorParseError(value.to_owned())),
                }
            }
            3 => {
                let expand = |range: &str| channel(range).map(|nibble| nibble * 0x11);
                let r = expand(&digits[0..1]);
                let g = expand(&digits[1..2]);
                let b = expand(&digits[2..3]);
                match (r, g, b) {
                    (Ok(r), Ok(g), Ok(b)) => Ok(Self { r, g, b }),
                    _ => Err(ColorParseError(value.to_owned())),
                }
            }
            _ => Err(ColorParseError(value.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolMode {
    Rect,
    Brush,
}

/// Capture-time options for one overlay.
///
/// `enabled` gates pointer capture entirely; `color` and `alpha` are applied
/// verbatim to baked fills; `brush_size_px` is normalized against the render
/// width when a stroke starts so strokes keep their weight across zoom levels.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    pub enabled: bool,
    pub mode: ToolMode,
    pub color: Color,
    pub alpha: f32,
    pub brush_size_px: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ToolMode::Rect,
            color: Color::rgb(255, 235, 59),
            alpha: 0.35,
            brush_size_px: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectAnnotation {
    pub id: AnnotationId,
    pub rect: NormRect,
}

impl RectAnnotation {
    pub fn new(rect: NormRect) -> Self {
        Self { id: AnnotationId::new_v4(), rect }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreehandStroke {
    pub id: AnnotationId,
    pub points: Vec<NormPoint>,
    /// Stroke width as a fraction of the render width at capture time.
    pub size: f32,
    pub color: Color,
    pub alpha: f32,
}

impl FreehandStroke {
    pub fn new(points: Vec<NormPoint>, size: f32, color: Color, alpha: f32) -> Self {
        Self { id: AnnotationId::new_v4(), points, size, color, alpha }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    Rect(RectAnnotation),
    Freehand(FreehandStroke),
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        match self {
            Annotation::Rect(rect) => rect.id,
            Annotation::Freehand(stroke) => stroke.id,
        }
    }

    pub fn mode(&self) -> ToolMode {
        match self {
            Annotation::Rect(_) => ToolMode::Rect,
            Annotation::Freehand(_) => ToolMode::Brush,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JournalEntry {
    page: u32,
    id: AnnotationId,
    mode: ToolMode,
}

/// Per-page annotation sequences plus a document-wide insertion journal.
///
/// Pages are 1-based. The journal is what makes `undo_last` remove the newest
/// annotation regardless of which page it landed on. Transient by contract:
/// the store is created empty per document and reset whenever the document
/// URL changes.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    pages: BTreeMap<u32, Vec<Annotation>>,
    journal: Vec<JournalEntry>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, page: u32, annotation: Annotation) {
        self.journal.push(JournalEntry { page, id: annotation.id(), mode: annotation.mode() });
        self.pages.entry(page).or_default().push(annotation);
    }

    /// Removes the most recently appended annotation of `mode` across the
    /// whole document. An emptied page loses its map entry entirely.
    pub fn undo_last(&mut self, mode: ToolMode) -> Option<Annotation> {
        let journal_index = self.journal.iter().rposition(|entry| entry.mode == mode)?;
        let entry = self.journal.remove(journal_index);

        let annotations = self.pages.get_mut(&entry.page)?;
        let position = annotations.iter().rposition(|annotation| annotation.id() == entry.id)?;
        let removed = annotations.remove(position);

        if annotations.is_empty() {
            self.pages.remove(&entry.page);
        }

        Some(removed)
    }

    /// Removes every annotation of `mode`, leaving the other mode untouched.
    pub fn clear_all(&mut self, mode: ToolMode) -> usize {
        let mut removed = 0;

        self.pages.retain(|_, annotations| {
            annotations.retain(|annotation| {
                let keep = annotation.mode() != mode;
                if !keep {
                    removed += 1;
                }
                keep
            });
            !annotations.is_empty()
        });
        self.journal.retain(|entry| entry.mode != mode);

        removed
    }

    /// Unconditional full reset, invoked whenever the active document URL
    /// changes.
    pub fn clear_on_document_change(&mut self) {
        self.pages.clear();
        self.journal.clear();
    }

    pub fn can_undo(&self, mode: ToolMode) -> bool {
        self.journal.iter().any(|entry| entry.mode == mode)
    }

    pub fn can_clear(&self, mode: ToolMode) -> bool {
        self.can_undo(mode)
    }

    pub fn annotations_on(&self, page: u32) -> &[Annotation] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_page(&self, page: u32) -> bool {
        self.pages.contains_key(&page)
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    /// All annotations of `mode` in page order, for baking.
    pub fn iter_mode(&self, mode: ToolMode) -> impl Iterator<Item = (u32, &Annotation)> {
        self.pages.iter().flat_map(move |(page, annotations)| {
            annotations
                .iter()
                .filter(move |annotation| annotation.mode() == mode)
                .map(move |annotation| (*page, annotation))
        })
    }

    pub fn len(&self) -> usize {
        self.journal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }
}
