//! Form field extraction
//!
//! Reads every terminal field of a document into a [`FormField`] and
//! returns them in approximate reading order.

use super::document::{name_string, text_string, AcroField, FieldClass, FormDocument};
use super::widgets::{FieldPosition, RawRect, WidgetPageIndex};
use crate::error::Result;
use lopdf::Object;

/// Fields whose bottom edges are at most this many points apart share a row.
pub const ROW_TOLERANCE_POINTS: f64 = 10.0;

/// A field's kind together with the data only that kind carries.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text {
        value: Option<String>,
        max_length: Option<u32>,
    },
    Checkbox {
        checked: bool,
    },
    Radio {
        selected: Option<String>,
        options: Vec<String>,
    },
    Dropdown {
        selected: Option<String>,
        options: Vec<String>,
    },
    Unknown,
}

impl FieldKind {
    /// Wire name of the kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Checkbox { .. } => "checkbox",
            FieldKind::Radio { .. } => "radio",
            FieldKind::Dropdown { .. } => "dropdown",
            FieldKind::Unknown => "unknown",
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match self {
            FieldKind::Radio { options, .. } | FieldKind::Dropdown { options, .. } => {
                Some(options)
            }
            _ => None,
        }
    }
}

/// One form field as reported to callers
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
    pub position: FieldPosition,
}

/// A field plus the raw rectangle its row placement is computed from.
#[derive(Debug, Clone)]
pub(crate) struct LocatedField {
    pub field: FormField,
    pub raw: RawRect,
}

/// Extract all form fields from PDF bytes, in reading order.
pub fn extract_form_fields(data: &[u8]) -> Result<Vec<FormField>> {
    let form = FormDocument::load(data)?;
    let doc = form.document();
    let index = WidgetPageIndex::build(doc);

    let located: Vec<LocatedField> = form
        .fields()
        .iter()
        .map(|field| {
            let placement = index.locate(doc, field.first_widget());
            LocatedField {
                field: FormField {
                    name: field.name.clone(),
                    kind: read_kind(&form, field),
                    position: placement.position,
                },
                raw: placement.raw,
            }
        })
        .collect();

    tracing::debug!(
        fields = located.len(),
        pages = index.page_count(),
        "Extracted form fields"
    );

    Ok(order_fields(located))
}

/// Read a field's kind and current state.
pub(crate) fn read_kind(form: &FormDocument, field: &AcroField) -> FieldKind {
    match field.class() {
        FieldClass::Text => FieldKind::Text {
            value: field
                .value
                .as_ref()
                .and_then(text_string)
                .filter(|text| !text.is_empty()),
            max_length: field
                .max_len
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0),
        },
        FieldClass::Checkbox => FieldKind::Checkbox {
            checked: is_checked(form, field),
        },
        FieldClass::Radio => FieldKind::Radio {
            selected: radio_selection(form, field),
            options: radio_options(form, field),
        },
        FieldClass::Dropdown => FieldKind::Dropdown {
            selected: choice_selection(field),
            options: choice_options(field),
        },
        FieldClass::Unknown => FieldKind::Unknown,
    }
}

/// `/V`, or the first widget's `/AS` when the field has no value.
fn button_state(form: &FormDocument, field: &AcroField) -> Option<String> {
    let state = match &field.value {
        Some(value) => name_string(value),
        None => field
            .first_widget()
            .and_then(|widget| form.widget_appearance_state(widget)),
    };
    state.filter(|state| state != "Off")
}

fn is_checked(form: &FormDocument, field: &AcroField) -> bool {
    let Some(state) = button_state(form, field) else {
        return false;
    };

    let on_states: Vec<String> = form
        .widget_on_states(field)
        .into_iter()
        .flatten()
        .collect();
    on_states.is_empty() || on_states.contains(&state)
}

/// Export values from `/Opt`, one per widget, when the group declares them.
pub(crate) fn export_values(field: &AcroField) -> Option<Vec<String>> {
    if field.options.is_empty() {
        return None;
    }
    field.options.iter().map(text_string).collect()
}

pub(crate) fn radio_options(form: &FormDocument, field: &AcroField) -> Vec<String> {
    let candidates = export_values(field).unwrap_or_else(|| {
        form.widget_on_states(field)
            .into_iter()
            .flatten()
            .collect()
    });

    let mut options: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !options.contains(&candidate) {
            options.push(candidate);
        }
    }
    options
}

fn radio_selection(form: &FormDocument, field: &AcroField) -> Option<String> {
    let state = button_state(form, field)?;

    // With export values, the on-state is only a positional key into /Opt
    if let Some(exports) = export_values(field) {
        let on_states = form.widget_on_states(field);
        if let Some(position) = on_states
            .iter()
            .position(|on| on.as_deref() == Some(state.as_str()))
        {
            if let Some(export) = exports.get(position) {
                return Some(export.clone());
            }
        }
    }

    Some(state)
}

/// Display text of each `/Opt` entry; pairs are `[export display]`.
pub(crate) fn choice_options(field: &AcroField) -> Vec<String> {
    field
        .options
        .iter()
        .filter_map(|option| match option {
            Object::Array(pair) => pair.get(1).or_else(|| pair.first()).and_then(text_string),
            other => text_string(other),
        })
        .collect()
}

fn choice_selection(field: &AcroField) -> Option<String> {
    let selected = match field.value.as_ref()? {
        Object::Array(values) => values.first().and_then(text_string),
        other => text_string(other),
    };
    selected.filter(|value| !value.is_empty())
}

/// Sort fields by page, then into rows top to bottom, each row left to right.
///
/// Fields are scanned by descending bottom edge; a field joins the current
/// row when it sits within [`ROW_TOLERANCE_POINTS`] of the previous field.
pub(crate) fn order_fields(mut located: Vec<LocatedField>) -> Vec<FormField> {
    located.sort_by(|a, b| {
        a.field
            .position
            .page_index
            .cmp(&b.field.position.page_index)
            .then(b.raw.y.total_cmp(&a.raw.y))
    });

    let mut ordered = Vec::with_capacity(located.len());
    let mut row: Vec<LocatedField> = Vec::new();
    let mut previous: Option<(u32, f64)> = None;

    for entry in located {
        let page_index = entry.field.position.page_index;
        let same_row = matches!(
            previous,
            Some((page, y)) if page == page_index && y - entry.raw.y <= ROW_TOLERANCE_POINTS
        );
        if !same_row {
            flush_row(&mut row, &mut ordered);
        }
        previous = Some((page_index, entry.raw.y));
        row.push(entry);
    }
    flush_row(&mut row, &mut ordered);

    ordered
}

fn flush_row(row: &mut Vec<LocatedField>, ordered: &mut Vec<FormField>) {
    row.sort_by(|a, b| a.raw.x.total_cmp(&b.raw.x));
    ordered.extend(row.drain(..).map(|entry| entry.field));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pdf::form_builder::FormBuilder;
    use pretty_assertions::assert_eq;

    fn located(name: &str, page_index: u32, x: f64, y: f64) -> LocatedField {
        LocatedField {
            field: FormField {
                name: name.to_string(),
                kind: FieldKind::Unknown,
                position: FieldPosition {
                    page_index,
                    ..FieldPosition::default()
                },
            },
            raw: RawRect {
                x,
                y,
                width: 10.0,
                height: 10.0,
            },
        }
    }

    fn names(fields: &[FormField]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_rows_ordered_top_to_bottom() {
        let ordered = order_fields(vec![
            located("bottom", 0, 50.0, 100.0),
            located("top", 0, 300.0, 700.0),
            located("middle", 0, 50.0, 400.0),
        ]);
        assert_eq!(names(&ordered), vec!["top", "middle", "bottom"]);
    }

    #[test]
    fn test_same_row_ordered_left_to_right() {
        let ordered = order_fields(vec![
            located("right", 0, 300.0, 500.0),
            located("left", 0, 50.0, 492.0),
            located("center", 0, 150.0, 509.0),
        ]);
        assert_eq!(names(&ordered), vec!["left", "center", "right"]);
    }

    #[test]
    fn test_row_tolerance_boundary() {
        let within = order_fields(vec![
            located("b", 0, 200.0, 500.0),
            located("a", 0, 100.0, 490.0),
        ]);
        assert_eq!(names(&within), vec!["a", "b"]);

        let beyond = order_fields(vec![
            located("b", 0, 200.0, 500.0),
            located("a", 0, 100.0, 489.5),
        ]);
        assert_eq!(names(&beyond), vec!["b", "a"]);
    }

    #[test]
    fn test_pages_ordered_before_rows() {
        let ordered = order_fields(vec![
            located("second-page", 1, 50.0, 750.0),
            located("first-page-low", 0, 50.0, 50.0),
        ]);
        assert_eq!(names(&ordered), vec!["first-page-low", "second-page"]);
    }

    #[test]
    fn test_row_grouping_chains_through_neighbours() {
        // 505 is within 10 of 510, 498 is within 10 of 505 but not of 510
        let ordered = order_fields(vec![
            located("c", 0, 10.0, 498.0),
            located("b", 0, 200.0, 505.0),
            located("a", 0, 300.0, 510.0),
            located("below", 0, 5.0, 480.0),
        ]);
        assert_eq!(names(&ordered), vec!["c", "b", "a", "below"]);
    }

    #[test]
    fn test_extract_empty_text_and_checked_box() {
        let data = FormBuilder::new()
            .text_field("fullName", 0, [50, 700, 250, 720], None)
            .checkbox("agree", 0, [50, 650, 70, 670], true)
            .build();

        let fields = extract_form_fields(&data).unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "fullName");
        assert_eq!(
            fields[0].kind,
            FieldKind::Text {
                value: None,
                max_length: None
            }
        );
        assert_eq!(fields[1].name, "agree");
        assert_eq!(fields[1].kind, FieldKind::Checkbox { checked: true });
    }

    #[test]
    fn test_extract_text_value_and_max_length() {
        let data = FormBuilder::new()
            .text_field_with_max_len("zip", 0, [50, 700, 150, 720], Some("8001"), 5)
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert_eq!(
            fields[0].kind,
            FieldKind::Text {
                value: Some("8001".to_string()),
                max_length: Some(5)
            }
        );
    }

    #[test]
    fn test_extract_radio_group() {
        let data = FormBuilder::new()
            .radio_group(
                "gender",
                0,
                &[("male", [50, 350, 70, 370]), ("female", [50, 320, 70, 340])],
                Some("male"),
            )
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert_eq!(
            fields[0].kind,
            FieldKind::Radio {
                selected: Some("male".to_string()),
                options: vec!["male".to_string(), "female".to_string()]
            }
        );
    }

    #[test]
    fn test_extract_radio_group_without_selection() {
        let data = FormBuilder::new()
            .radio_group(
                "choice",
                0,
                &[("option1", [50, 350, 70, 370]), ("option2", [50, 320, 70, 340])],
                None,
            )
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert!(matches!(
            fields[0].kind,
            FieldKind::Radio { selected: None, .. }
        ));
    }

    #[test]
    fn test_extract_radio_group_with_export_values() {
        let data = FormBuilder::new()
            .radio_group_with_exports(
                "plan",
                0,
                &[("0", "Basic", [50, 350, 70, 370]), ("1", "Premium", [80, 350, 100, 370])],
                Some("1"),
            )
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert_eq!(
            fields[0].kind,
            FieldKind::Radio {
                selected: Some("Premium".to_string()),
                options: vec!["Basic".to_string(), "Premium".to_string()]
            }
        );
    }

    #[test]
    fn test_extract_dropdown() {
        let data = FormBuilder::new()
            .dropdown(
                "country",
                0,
                [50, 350, 250, 380],
                &["USA", "Canada", "Mexico"],
                Some("Canada"),
            )
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert_eq!(
            fields[0].kind,
            FieldKind::Dropdown {
                selected: Some("Canada".to_string()),
                options: vec!["USA".to_string(), "Canada".to_string(), "Mexico".to_string()]
            }
        );
    }

    #[test]
    fn test_extract_dropdown_without_selection() {
        let data = FormBuilder::new()
            .dropdown(
                "language",
                0,
                [50, 350, 250, 380],
                &["English", "Spanish", "French"],
                None,
            )
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert!(matches!(
            fields[0].kind,
            FieldKind::Dropdown { selected: None, .. }
        ));
    }

    #[test]
    fn test_push_button_and_list_box_are_unknown() {
        let data = FormBuilder::new()
            .push_button("submit", 0, [50, 100, 120, 120])
            .list_box("tags", 0, [200, 100, 300, 160], &["a", "b"])
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert!(fields.iter().all(|f| f.kind == FieldKind::Unknown));
        assert!(fields.iter().all(|f| f.kind.options().is_none()));
    }

    #[test]
    fn test_extract_orders_by_position() {
        let data = FormBuilder::with_pages(2)
            .text_field("page2", 1, [50, 700, 250, 720], None)
            .text_field("lastName", 0, [300, 702, 500, 722], None)
            .text_field("email", 0, [50, 600, 250, 620], None)
            .text_field("firstName", 0, [50, 700, 250, 720], None)
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert_eq!(names(&fields), vec!["firstName", "lastName", "email", "page2"]);
        assert_eq!(fields[3].position.page_index, 1);
    }

    #[test]
    fn test_extract_position_in_centimeters() {
        let data = FormBuilder::new()
            .text_field("fullName", 0, [100, 700, 300, 720], None)
            .build();

        let fields = extract_form_fields(&data).unwrap();
        assert_eq!(
            fields[0].position,
            FieldPosition {
                page_index: 0,
                x: 3.53,
                y: 24.69,
                width: 7.06,
                height: 0.71
            }
        );
    }

    #[test]
    fn test_extract_is_deterministic() {
        let data = FormBuilder::new()
            .text_field("a", 0, [50, 700, 250, 720], Some("x"))
            .checkbox("b", 0, [300, 700, 320, 720], false)
            .build();

        assert_eq!(
            extract_form_fields(&data).unwrap(),
            extract_form_fields(&data).unwrap()
        );
    }

    #[test]
    fn test_extract_rejects_corrupt_bytes() {
        let result = extract_form_fields(b"%PDF-1.4\n%%EOF");
        assert!(matches!(result, Err(Error::DocumentLoad { .. })));
    }
}
