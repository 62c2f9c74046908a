//! PDF form layer
//!
//! This module reads and writes AcroForm fields using lopdf.

mod document;
mod extract;
mod fill;
mod widgets;

#[cfg(test)]
#[path = "../../tests/common/form_builder.rs"]
mod form_builder;

pub use document::{AcroField, FieldClass, FormDocument};
pub use extract::{extract_form_fields, FieldKind, FormField, ROW_TOLERANCE_POINTS};
pub use fill::{
    fill_form_fields, FieldOutcome, FieldUpdate, FillInstruction, FillReport, FillValue,
};
pub use widgets::{points_to_cm, FieldPosition, RawRect, WidgetPageIndex, CM_PER_POINT};
