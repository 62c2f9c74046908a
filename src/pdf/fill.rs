//! Form filling
//!
//! Each entry of a [`FillInstruction`] is applied on its own. An entry
//! that names no field, carries the wrong value type, or is refused by the
//! field is recorded as skipped; the rest of the batch still runs and the
//! document is still saved.

use super::document::{encode_text, AcroField, FormDocument};
use super::extract::{export_values, read_kind, FieldKind};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// On-state used when checking a box whose widgets declare none.
const DEFAULT_ON_STATE: &str = "Yes";

/// A value to write into a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Text(String),
    Flag(bool),
    Number(serde_json::Number),
}

impl FillValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FillValue::Text(_) => "string",
            FillValue::Flag(_) => "boolean",
            FillValue::Number(_) => "number",
        }
    }

    /// String form written into text fields.
    pub fn to_text(&self) -> String {
        match self {
            FillValue::Text(text) => text.clone(),
            FillValue::Flag(flag) => flag.to_string(),
            FillValue::Number(number) => format_number(number),
        }
    }
}

impl From<&str> for FillValue {
    fn from(value: &str) -> Self {
        FillValue::Text(value.to_string())
    }
}

impl From<String> for FillValue {
    fn from(value: String) -> Self {
        FillValue::Text(value)
    }
}

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        FillValue::Flag(value)
    }
}

impl From<i64> for FillValue {
    fn from(value: i64) -> Self {
        FillValue::Number(value.into())
    }
}

/// Integers print as integers; floats use the shortest representation,
/// without a trailing `.0` for integral values.
fn format_number(number: &serde_json::Number) -> String {
    if number.is_f64() {
        match number.as_f64() {
            Some(value) => value.to_string(),
            None => number.to_string(),
        }
    } else {
        number.to_string()
    }
}

/// Field name -> value mapping to apply to a form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillInstruction {
    values: BTreeMap<String, FillValue>,
}

impl FillInstruction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FillValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FillValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Decode a JSON document holding an object of scalar values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json.trim()).map_err(|e| Error::InvalidFieldsJson {
                reason: e.to_string(),
            })?;
        Self::from_json_value(value)
    }

    /// Accept an already parsed JSON object. Values must be strings,
    /// booleans, or numbers.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let map = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(Error::InvalidFieldsJson {
                    reason: format!("expected a JSON object, found {}", json_type_name(&other)),
                })
            }
        };

        let mut instruction = Self::new();
        for (name, value) in map {
            let value = match value {
                serde_json::Value::String(text) => FillValue::Text(text),
                serde_json::Value::Bool(flag) => FillValue::Flag(flag),
                serde_json::Value::Number(number) => FillValue::Number(number),
                other => {
                    return Err(Error::InvalidFieldsJson {
                        reason: format!(
                            "value for \"{}\" must be a string, boolean, or number, found {}",
                            name,
                            json_type_name(&other)
                        ),
                    })
                }
            };
            instruction.values.insert(name, value);
        }

        Ok(instruction)
    }
}

impl<K: Into<String>, V: Into<FillValue>> FromIterator<(K, V)> for FillInstruction {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut instruction = Self::new();
        for (name, value) in iter {
            instruction.insert(name, value);
        }
        instruction
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// What happened to one entry of a fill instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Applied,
    SkippedUnknownField,
    SkippedTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    SkippedRejectedValue {
        reason: String,
    },
}

impl FieldUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, FieldUpdate::Applied)
    }

    /// Human readable reason for a skip.
    pub fn reason(&self) -> Option<String> {
        match self {
            FieldUpdate::Applied => None,
            FieldUpdate::SkippedUnknownField => Some("Field not found in PDF".to_string()),
            FieldUpdate::SkippedTypeMismatch { expected, found } => {
                Some(format!("Expected {}, got {}", expected, found))
            }
            FieldUpdate::SkippedRejectedValue { reason } => Some(reason.clone()),
        }
    }
}

/// Outcome of one instruction entry
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutcome {
    pub name: String,
    pub update: FieldUpdate,
}

/// Per-entry results of a fill pass, in instruction order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    pub outcomes: Vec<FieldOutcome>,
}

impl FillReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.update.is_applied()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.outcomes.iter().filter(|o| !o.update.is_applied())
    }

    pub fn outcome(&self, name: &str) -> Option<&FieldUpdate> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.update)
    }
}

/// Fill form fields in a PDF and return the re-serialized bytes with the
/// per-field report.
pub fn fill_form_fields(
    data: &[u8],
    instruction: &FillInstruction,
) -> Result<(Vec<u8>, FillReport)> {
    let mut form = FormDocument::load(data)?;
    let fields = form.fields();

    // First field wins when a name occurs twice
    let mut by_name: HashMap<&str, &AcroField> = HashMap::with_capacity(fields.len());
    for field in &fields {
        by_name.entry(field.name.as_str()).or_insert(field);
    }

    let mut report = FillReport::default();
    for (name, value) in instruction.iter() {
        let update = match by_name.get(name) {
            Some(field) => apply_value(&mut form, field, value),
            None => FieldUpdate::SkippedUnknownField,
        };

        if let Some(reason) = update.reason() {
            tracing::warn!(field = name, reason = %reason, "Skipped form field");
        }
        report.outcomes.push(FieldOutcome {
            name: name.to_string(),
            update,
        });
    }

    if report.applied_count() > 0 && !form.set_need_appearances() {
        tracing::debug!("Document has no AcroForm dictionary to flag for appearance rebuild");
    }

    let output = form.save()?;
    tracing::debug!(
        applied = report.applied_count(),
        total = report.outcomes.len(),
        bytes = output.len(),
        "Filled form"
    );

    Ok((output, report))
}

fn apply_value(form: &mut FormDocument, field: &AcroField, value: &FillValue) -> FieldUpdate {
    let kind = read_kind(form, field);

    let written = match (&kind, value) {
        (FieldKind::Text { .. }, value) => {
            form.set_field_value(field, encode_text(&value.to_text()))
        }
        (FieldKind::Checkbox { .. }, FillValue::Flag(checked)) => {
            let state = if *checked {
                form.widget_on_states(field)
                    .into_iter()
                    .flatten()
                    .next()
                    .unwrap_or_else(|| DEFAULT_ON_STATE.to_string())
            } else {
                "Off".to_string()
            };
            form.set_button_state(field, &state)
        }
        (FieldKind::Radio { options, .. }, FillValue::Text(option)) => {
            if !options.contains(option) {
                return rejected_option(option, options);
            }
            let state = radio_on_state(form, field, option);
            form.set_button_state(field, &state)
        }
        (FieldKind::Dropdown { options, .. }, FillValue::Text(option)) => {
            let position = options.iter().position(|o| o == option);
            if position.is_none() && !field.is_editable() {
                return rejected_option(option, options);
            }
            form.set_field_value(field, encode_text(option))
                .and_then(|_| form.set_selected_indices(field, position))
        }
        (kind, value) => {
            return FieldUpdate::SkippedTypeMismatch {
                expected: expected_value_type(kind),
                found: value.type_name(),
            }
        }
    };

    match written {
        Ok(()) => FieldUpdate::Applied,
        Err(e) => FieldUpdate::SkippedRejectedValue {
            reason: e.to_string(),
        },
    }
}

/// Value type a field kind accepts.
fn expected_value_type(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Text { .. } => "string, boolean, or number",
        FieldKind::Checkbox { .. } => "boolean",
        FieldKind::Radio { .. } | FieldKind::Dropdown { .. } => "string",
        FieldKind::Unknown => "no value (unsupported field type)",
    }
}

fn rejected_option(option: &str, options: &[String]) -> FieldUpdate {
    FieldUpdate::SkippedRejectedValue {
        reason: format!(
            "\"{}\" is not one of the field's options [{}]",
            option,
            options.join(", ")
        ),
    }
}

/// Appearance state that selects `option` in a radio group.
fn radio_on_state(form: &FormDocument, field: &AcroField, option: &str) -> String {
    // Export values map positionally onto the widgets' on-states; the first
    // matching /Opt entry wins when exports repeat
    let Some(position) = export_values(field)
        .and_then(|exports| exports.iter().position(|export| export == option))
    else {
        return option.to_string();
    };
    form.widget_on_states(field)
        .into_iter()
        .nth(position)
        .flatten()
        .unwrap_or_else(|| option.to_string())
}
