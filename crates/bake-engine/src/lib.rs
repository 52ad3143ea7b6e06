//! Draws annotations into the PDF itself.
//!
//! Baking appends content streams to the target pages: rectangles become
//! filled, borderless fills; freehand strokes become stroked polyline paths.
//! The input buffer is never modified; a new serialized document is returned.

use std::collections::{BTreeMap, HashMap};

use annot_model::Color;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId};
use overlay_core::PdfRect;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BakeError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document has no pages")]
    EmptyDocument,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
}

/// A rectangle fill resolved to PDF point space, 1-based page number.
#[derive(Debug, Clone, PartialEq)]
pub struct RectPlacement {
    pub page: u32,
    pub rect: PdfRect,
    pub color: Color,
    pub alpha: f32,
}

/// A freehand stroke resolved to PDF point space.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokePlacement {
    pub page: u32,
    pub points: Vec<(f32, f32)>,
    pub width_pt: f32,
    pub color: Color,
    pub alpha: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect(RectPlacement),
    StrokePath(StrokePlacement),
}

impl DrawOp {
    pub fn page(&self) -> u32 {
        match self {
            DrawOp::FillRect(placement) => placement.page,
            DrawOp::StrokePath(placement) => placement.page,
        }
    }
}

pub trait PdfWriter {
    fn bake(&self, pdf: &[u8], ops: &[DrawOp]) -> Result<Vec<u8>, BakeError>;
}

#[derive(Debug, Default)]
pub struct LopdfWriter;

impl LopdfWriter {
    pub fn new() -> Self {
        Self
    }
}

impl PdfWriter for LopdfWriter {
    fn bake(&self, pdf: &[u8], ops: &[DrawOp]) -> Result<Vec<u8>, BakeError> {
        let mut doc = Document::load_mem(pdf)?;
        let pages = doc.get_pages();

        if pages.is_empty() {
            return Err(BakeError::EmptyDocument);
        }
        let page_count = pages.len() as u32;

        let mut by_page: BTreeMap<u32, Vec<&DrawOp>> = BTreeMap::new();
        for op in ops {
            by_page.entry(op.page()).or_default().push(op);
        }

        let mut alpha_names = AlphaStates::default();

        for (page, page_ops) in by_page {
            let page_id =
                *pages.get(&page).ok_or(BakeError::PageOutOfRange { page, page_count })?;

            let mut operations = Vec::new();
            for op in page_ops {
                match op {
                    DrawOp::FillRect(placement) => {
                        operations.push(Operation::new("q", vec![]));
                        if placement.alpha < 1.0 {
                            let name =
                                alpha_names.resolve(&mut doc, page_id, placement.alpha)?;
                            operations
                                .push(Operation::new("gs", vec![Object::Name(name.into_bytes())]));
                        }
                        let (r, g, b) = placement.color.to_normalized();
                        operations.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
                        operations.push(Operation::new(
                            "re",
                            vec![
                                placement.rect.x.into(),
                                placement.rect.y.into(),
                                placement.rect.width.into(),
                                placement.rect.height.into(),
                            ],
                        ));
                        operations.push(Operation::new("f", vec![]));
                        operations.push(Operation::new("Q", vec![]));
                    }
                    DrawOp::StrokePath(placement) => {
                        let Some((first, rest)) = placement.points.split_first() else {
                            continue;
                        };
                        if rest.is_empty() {
                            continue;
                        }

                        operations.push(Operation::new("q", vec![]));
                        if placement.alpha < 1.0 {
                            let name =
                                alpha_names.resolve(&mut doc, page_id, placement.alpha)?;
                            operations
                                .push(Operation::new("gs", vec![Object::Name(name.into_bytes())]));
                        }
                        let (r, g, b) = placement.color.to_normalized();
                        operations.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
                        operations.push(Operation::new("w", vec![placement.width_pt.into()]));
                        // Round caps and joins for brush strokes.
                        operations.push(Operation::new("J", vec![1.into()]));
                        operations.push(Operation::new("j", vec![1.into()]));
                        operations.push(Operation::new("m", vec![first.0.into(), first.1.into()]));
                        for point in rest {
                            operations
                                .push(Operation::new("l", vec![point.0.into(), point.1.into()]));
                        }
                        operations.push(Operation::new("S", vec![]));
                        operations.push(Operation::new("Q", vec![]));
                    }
                }
            }

            if operations.is_empty() {
                continue;
            }
            let encoded = Content { operations }.encode()?;
            doc.add_page_contents(page_id, encoded)?;
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

pub fn default_writer() -> LopdfWriter {
    LopdfWriter::new()
}

/// Named `/ExtGState` entries created for non-opaque fills, deduplicated per
/// page and alpha value within one bake.
#[derive(Debug, Default)]
struct AlphaStates {
    names: HashMap<(ObjectId, u32), String>,
    counter: usize,
}

impl AlphaStates {
    fn resolve(
        &mut self,
        doc: &mut Document,
        page_id: ObjectId,
        alpha: f32,
    ) -> Result<String, BakeError> {
        let key = (page_id, alpha.to_bits());
        if let Some(name) = self.names.get(&key) {
            return Ok(name.clone());
        }

        self.counter += 1;
        let name = format!("GSa{}", self.counter);
        let gs_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => alpha,
            "CA" => alpha,
        });
        attach_ext_gstate(doc, page_id, &name, gs_id)?;

        self.names.insert(key, name.clone());
        Ok(name)
    }
}

/// Registers `name` in the page's `Resources /ExtGState` dictionary, handling
/// both inline and referenced resource dictionaries.
fn attach_ext_gstate(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    gs_id: ObjectId,
) -> Result<(), BakeError> {
    let mut resources = {
        let page_dict = doc.get_object_mut(page_id).and_then(|object| object.as_dict_mut())?;
        match page_dict.remove(b"Resources") {
            Some(object @ (Object::Reference(_) | Object::Dictionary(_))) => object,
            _ => Object::Dictionary(dictionary! {}),
        }
    };

    if let Object::Reference(reference) = resources {
        let resource_dict =
            doc.get_object_mut(reference).and_then(|object| object.as_dict_mut())?;
        set_gs_entry(resource_dict, name, gs_id);
    } else if let Object::Dictionary(resource_dict) = &mut resources {
        set_gs_entry(resource_dict, name, gs_id);
    }

    let page_dict = doc.get_object_mut(page_id).and_then(|object| object.as_dict_mut())?;
    page_dict.set("Resources", resources);
    Ok(())
}

fn set_gs_entry(resource_dict: &mut lopdf::Dictionary, name: &str, gs_id: ObjectId) {
    if !matches!(resource_dict.get(b"ExtGState"), Ok(Object::Dictionary(_))) {
        resource_dict.set("ExtGState", Object::Dictionary(dictionary! {}));
    }
    if let Ok(Object::Dictionary(ext_gstate)) = resource_dict.get_mut(b"ExtGState") {
        ext_gstate.set(name, gs_id);
    }
}
