//! Widget placement: which page holds a widget, and where on it
//!
//! The index is built once per document from every page's `/Annots`
//! array. Lookups that fail fall back to a zero position instead of an
//! error; placement is enrichment, never a reason to reject a document.

use super::document::{number, resolve};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Centimeters per PDF point (1/72 inch)
pub const CM_PER_POINT: f64 = 0.0352778;

/// Widget rectangle in raw PDF points, origin bottom-left.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RawRect {
    /// Normalize a `[x1 y1 x2 y2]` rectangle so the origin is the lower-left corner.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }
}

/// Position of a field on its page, in centimeters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldPosition {
    /// Zero-based page index
    pub page_index: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FieldPosition {
    pub fn from_points(page_index: u32, rect: &RawRect) -> Self {
        Self {
            page_index,
            x: points_to_cm(rect.x),
            y: points_to_cm(rect.y),
            width: points_to_cm(rect.width),
            height: points_to_cm(rect.height),
        }
    }
}

/// Convert points to centimeters, rounded to two decimals.
pub fn points_to_cm(points: f64) -> f64 {
    (points * CM_PER_POINT * 100.0).round() / 100.0
}

/// Where a widget sits: the converted position plus the raw rectangle the
/// reading-order sort works on.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Placement {
    pub position: FieldPosition,
    pub raw: RawRect,
}

/// Page lookup for widget annotations
#[derive(Debug, Default)]
pub struct WidgetPageIndex {
    /// Widget object -> zero-based page index, from `/Annots`
    widgets: HashMap<ObjectId, u32>,
    /// Page object -> zero-based page index, for `/P` back references
    pages: HashMap<ObjectId, u32>,
}

impl WidgetPageIndex {
    pub fn build(doc: &Document) -> Self {
        let mut index = Self::default();

        // get_pages() numbers pages from 1
        for (page_number, page_id) in doc.get_pages() {
            let page_index = page_number.saturating_sub(1);
            index.pages.insert(page_id, page_index);

            let Some(annots) = doc
                .get_dictionary(page_id)
                .ok()
                .and_then(|page| page.get(b"Annots").ok())
                .and_then(|obj| resolve(doc, obj))
                .and_then(|obj| obj.as_array().ok())
            else {
                continue;
            };

            for annot in annots {
                if let Object::Reference(annot_id) = annot {
                    // First page wins if a widget is listed twice
                    index.widgets.entry(*annot_id).or_insert(page_index);
                }
            }
        }

        index
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page listing `widget` in its `/Annots`, else the page its `/P` names.
    pub fn page_of(&self, doc: &Document, widget: ObjectId) -> Option<u32> {
        if let Some(page_index) = self.widgets.get(&widget) {
            return Some(*page_index);
        }

        match doc.get_dictionary(widget).ok()?.get(b"P").ok()? {
            Object::Reference(page_id) => self.pages.get(page_id).copied(),
            _ => None,
        }
    }

    /// Resolve a widget's placement; all zeros when the widget is missing
    /// or not on any page.
    pub fn locate(&self, doc: &Document, widget: Option<ObjectId>) -> Placement {
        let Some(widget) = widget else {
            return Placement::default();
        };
        let Some(page_index) = self.page_of(doc, widget) else {
            tracing::debug!(?widget, "Widget is not referenced by any page");
            return Placement::default();
        };

        let raw = doc
            .get_dictionary(widget)
            .ok()
            .and_then(|dict| widget_rect(doc, dict))
            .unwrap_or_default();

        Placement {
            position: FieldPosition::from_points(page_index, &raw),
            raw,
        }
    }
}

/// A widget's `/Rect`, normalized.
pub fn widget_rect(doc: &Document, widget: &Dictionary) -> Option<RawRect> {
    let rect = resolve(doc, widget.get(b"Rect").ok()?)?.as_array().ok()?;
    if rect.len() < 4 {
        return None;
    }

    let mut corners = [0.0; 4];
    for (slot, value) in corners.iter_mut().zip(rect) {
        *slot = number(resolve(doc, value)?)?;
    }

    Some(RawRect::from_corners(
        corners[0], corners[1], corners[2], corners[3],
    ))
}
