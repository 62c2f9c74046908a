//! Loaded PDF document with an AcroForm
//!
//! [`FormDocument`] owns one parsed document for the duration of a request.
//! It walks the `/AcroForm /Fields` tree into flat [`AcroField`] handles and
//! offers the few low-level writes the filler needs.

use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::HashSet;

/// Field flag: button is a radio group (bit 16)
pub(crate) const FLAG_RADIO: i64 = 1 << 15;
/// Field flag: button is a push button (bit 17)
pub(crate) const FLAG_PUSHBUTTON: i64 = 1 << 16;
/// Field flag: choice field is a combo box (bit 18)
pub(crate) const FLAG_COMBO: i64 = 1 << 17;
/// Field flag: combo box accepts values outside its option list (bit 19)
pub(crate) const FLAG_EDIT: i64 = 1 << 18;

/// Guards against cyclic `/Kids` and absurdly deep hierarchies.
const MAX_FIELD_DEPTH: usize = 64;
/// Longest chain of indirect references followed when resolving an object.
const MAX_REFERENCE_HOPS: usize = 16;

/// Widget kind of a terminal field, derived from `/FT` and `/Ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Text,
    Checkbox,
    Radio,
    Dropdown,
    Unknown,
}

/// A terminal form field with its inherited attributes resolved.
#[derive(Debug, Clone)]
pub struct AcroField {
    /// Object holding the field dictionary; writes go here
    pub id: ObjectId,
    /// Fully qualified name
    pub name: String,
    /// `/FT`, possibly inherited
    pub field_type: Option<Vec<u8>>,
    /// `/Ff`, possibly inherited
    pub flags: i64,
    /// `/V`, possibly inherited, references resolved
    pub value: Option<Object>,
    /// `/MaxLen`, possibly inherited
    pub max_len: Option<i64>,
    /// `/Opt` entries, references resolved
    pub options: Vec<Object>,
    /// Widget annotations in declaration order
    pub widgets: Vec<ObjectId>,
}

impl AcroField {
    pub fn class(&self) -> FieldClass {
        match self.field_type.as_deref() {
            Some(b"Tx") => FieldClass::Text,
            Some(b"Btn") if self.flags & FLAG_PUSHBUTTON != 0 => FieldClass::Unknown,
            Some(b"Btn") if self.flags & FLAG_RADIO != 0 => FieldClass::Radio,
            Some(b"Btn") => FieldClass::Checkbox,
            Some(b"Ch") if self.flags & FLAG_COMBO != 0 => FieldClass::Dropdown,
            _ => FieldClass::Unknown,
        }
    }

    /// Whether a combo box accepts free text.
    pub fn is_editable(&self) -> bool {
        self.flags & FLAG_EDIT != 0
    }

    pub fn first_widget(&self) -> Option<ObjectId> {
        self.widgets.first().copied()
    }
}

/// Attributes a field node passes down to its kids.
#[derive(Debug, Clone, Default)]
struct Inherited {
    field_type: Option<Vec<u8>>,
    flags: Option<i64>,
    value: Option<Object>,
    max_len: Option<i64>,
    options: Option<Vec<Object>>,
}

/// A parsed PDF document held for one extract or fill pass
pub struct FormDocument {
    doc: Document,
}

impl FormDocument {
    /// Parse PDF bytes. Fails with [`Error::DocumentLoad`] when the bytes
    /// are not a PDF or have no usable document catalog.
    pub fn load(data: &[u8]) -> Result<Self> {
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::DocumentLoad {
                reason: "Not a valid PDF file".to_string(),
            });
        }

        let doc = Document::load_mem(data).map_err(|e| Error::DocumentLoad {
            reason: e.to_string(),
        })?;

        let form = Self { doc };
        form.catalog()?;
        Ok(form)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Serialize the (possibly modified) document into a fresh buffer.
    pub fn save(mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| Error::DocumentSave {
                reason: e.to_string(),
            })?;
        Ok(buffer)
    }

    fn catalog_id(&self) -> Result<ObjectId> {
        match self.doc.trailer.get(b"Root") {
            Ok(Object::Reference(id)) => Ok(*id),
            _ => Err(Error::DocumentLoad {
                reason: "Document has no catalog".to_string(),
            }),
        }
    }

    fn catalog(&self) -> Result<&Dictionary> {
        let id = self.catalog_id()?;
        self.doc.get_dictionary(id).map_err(|e| Error::DocumentLoad {
            reason: format!("Document catalog is unreadable: {}", e),
        })
    }

    fn acroform(&self) -> Option<&Dictionary> {
        let catalog = self.catalog().ok()?;
        let acroform = resolve(&self.doc, catalog.get(b"AcroForm").ok()?)?;
        acroform.as_dict().ok()
    }

    fn acroform_mut(&mut self) -> Option<&mut Dictionary> {
        let catalog_id = self.catalog_id().ok()?;
        let entry = self
            .doc
            .get_dictionary(catalog_id)
            .ok()?
            .get(b"AcroForm")
            .ok()?
            .clone();

        match entry {
            Object::Reference(id) => self.doc.get_dictionary_mut(id).ok(),
            Object::Dictionary(_) => self
                .doc
                .get_dictionary_mut(catalog_id)
                .ok()?
                .get_mut(b"AcroForm")
                .ok()?
                .as_dict_mut()
                .ok(),
            _ => None,
        }
    }

    /// All terminal fields of the form in `/Fields` order. A document
    /// without an AcroForm has no fields.
    pub fn fields(&self) -> Vec<AcroField> {
        let Some(acroform) = self.acroform() else {
            return Vec::new();
        };
        let Some(entries) = acroform
            .get(b"Fields")
            .ok()
            .and_then(|obj| resolve(&self.doc, obj))
            .and_then(|obj| obj.as_array().ok())
        else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        let mut visited = HashSet::new();
        for entry in entries {
            if let Object::Reference(id) = entry {
                self.walk_field_tree(
                    *id,
                    None,
                    &Inherited::default(),
                    0,
                    &mut visited,
                    &mut fields,
                );
            }
        }

        fields
    }

    fn walk_field_tree(
        &self,
        id: ObjectId,
        parent_name: Option<&str>,
        inherited: &Inherited,
        depth: usize,
        visited: &mut HashSet<ObjectId>,
        fields: &mut Vec<AcroField>,
    ) {
        if depth >= MAX_FIELD_DEPTH || !visited.insert(id) {
            return;
        }
        let Ok(dict) = self.doc.get_dictionary(id) else {
            return;
        };

        let partial_name = dict
            .get(b"T")
            .ok()
            .and_then(|obj| resolve(&self.doc, obj))
            .and_then(text_string);
        let full_name = match (parent_name, partial_name) {
            (Some(parent), Some(name)) => format!("{}.{}", parent, name),
            (Some(parent), None) => parent.to_string(),
            (None, Some(name)) => name,
            (None, None) => String::new(),
        };

        let own = self.inherit(dict, inherited);

        let mut widgets = Vec::new();
        let mut has_child_fields = false;
        let kids = dict
            .get(b"Kids")
            .ok()
            .and_then(|obj| resolve(&self.doc, obj))
            .and_then(|obj| obj.as_array().ok());

        if let Some(kids) = kids {
            for kid in kids {
                let Object::Reference(kid_id) = kid else {
                    continue;
                };
                let is_field = self
                    .doc
                    .get_dictionary(*kid_id)
                    .map(|kid_dict| kid_dict.has(b"T"))
                    .unwrap_or(false);

                if is_field {
                    has_child_fields = true;
                    self.walk_field_tree(
                        *kid_id,
                        Some(&full_name),
                        &own,
                        depth + 1,
                        visited,
                        fields,
                    );
                } else {
                    widgets.push(*kid_id);
                }
            }
        } else {
            // Field and widget share one dictionary
            widgets.push(id);
        }

        if has_child_fields && widgets.is_empty() {
            return;
        }

        fields.push(AcroField {
            id,
            name: full_name,
            field_type: own.field_type,
            flags: own.flags.unwrap_or(0),
            value: own.value,
            max_len: own.max_len,
            options: own.options.unwrap_or_default(),
            widgets,
        });
    }

    fn inherit(&self, dict: &Dictionary, parent: &Inherited) -> Inherited {
        let get = |key: &[u8]| dict.get(key).ok().and_then(|obj| resolve(&self.doc, obj));

        Inherited {
            field_type: get(b"FT")
                .and_then(|obj| match obj {
                    Object::Name(name) => Some(name.clone()),
                    _ => None,
                })
                .or_else(|| parent.field_type.clone()),
            flags: get(b"Ff")
                .and_then(integer)
                .or(parent.flags),
            value: get(b"V").cloned().or_else(|| parent.value.clone()),
            max_len: get(b"MaxLen").and_then(integer).or(parent.max_len),
            options: get(b"Opt")
                .and_then(|obj| obj.as_array().ok())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| resolve(&self.doc, item).cloned())
                        .collect()
                })
                .or_else(|| parent.options.clone()),
        }
    }

    /// On-state of each widget: the first appearance state name other than
    /// `Off`, or `None` when the widget declares no appearances.
    pub fn widget_on_states(&self, field: &AcroField) -> Vec<Option<String>> {
        field
            .widgets
            .iter()
            .map(|id| {
                self.doc
                    .get_dictionary(*id)
                    .ok()
                    .and_then(|widget| on_state(&self.doc, widget))
            })
            .collect()
    }

    /// Current `/AS` of a widget.
    pub fn widget_appearance_state(&self, widget: ObjectId) -> Option<String> {
        self.doc
            .get_dictionary(widget)
            .ok()?
            .get(b"AS")
            .ok()
            .and_then(|obj| resolve(&self.doc, obj))
            .and_then(name_string)
    }

    /// Set `/V` on the field dictionary.
    pub fn set_field_value(&mut self, field: &AcroField, value: Object) -> Result<()> {
        self.field_dict_mut(field)?.set("V", value);
        Ok(())
    }

    /// Set or clear the selected option indices of a choice field.
    pub fn set_selected_indices(&mut self, field: &AcroField, index: Option<usize>) -> Result<()> {
        let dict = self.field_dict_mut(field)?;
        match index {
            Some(index) => dict.set("I", vec![Object::Integer(index as i64)]),
            None => {
                dict.remove(b"I");
            }
        }
        Ok(())
    }

    /// Set `/V` to `state` and flip every widget whose on-state matches it
    /// to that state, all others to `Off`.
    pub fn set_button_state(&mut self, field: &AcroField, state: &str) -> Result<()> {
        let on_states = self.widget_on_states(field);
        self.set_field_value(field, Object::Name(state.as_bytes().to_vec()))?;

        for (widget, on) in field.widgets.iter().zip(on_states) {
            let appearance = match on {
                Some(on) if on == state => on,
                _ => "Off".to_string(),
            };
            let dict = self
                .doc
                .get_dictionary_mut(*widget)
                .map_err(|e| Error::FieldUpdate {
                    name: field.name.clone(),
                    reason: format!("widget {:?} is unreadable: {}", widget, e),
                })?;
            dict.set("AS", Object::Name(appearance.into_bytes()));
        }
        Ok(())
    }

    /// Ask viewers to rebuild widget appearances from the new values.
    pub fn set_need_appearances(&mut self) -> bool {
        match self.acroform_mut() {
            Some(acroform) => {
                acroform.set("NeedAppearances", Object::Boolean(true));
                true
            }
            None => false,
        }
    }

    fn field_dict_mut(&mut self, field: &AcroField) -> Result<&mut Dictionary> {
        self.doc
            .get_dictionary_mut(field.id)
            .map_err(|e| Error::FieldUpdate {
                name: field.name.clone(),
                reason: e.to_string(),
            })
    }
}

/// Follow indirect references to the underlying object.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_REFERENCE_HOPS {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

pub(crate) fn integer(obj: &Object) -> Option<i64> {
    match obj {
        Object::Integer(n) => Some(*n),
        Object::Real(r) => Some(f64::from(*r) as i64),
        _ => None,
    }
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(n) => Some(*n as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

pub(crate) fn name_string(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// A PDF text string, or a name standing in for one.
pub(crate) fn text_string(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(_) => name_string(obj),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE or UTF-8 when a byte order mark is
/// present, otherwise one character per byte.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        bytes.iter().map(|&b| pdf_doc_char(b)).collect()
    }
}

/// PDFDocEncoding 0x18..=0x1F
const PDF_DOC_ACCENTS: [u16; 8] = [
    0x02d8, 0x02c7, 0x02c6, 0x02d9, 0x02dd, 0x02db, 0x02da, 0x02dc,
];

/// PDFDocEncoding 0x80..=0x9F; 0x9F is undefined
const PDF_DOC_HIGH: [u16; 32] = [
    0x2022, 0x2020, 0x2021, 0x2026, 0x2014, 0x2013, 0x0192, 0x2044, 0x2039, 0x203a, 0x2212,
    0x2030, 0x201e, 0x201c, 0x201d, 0x2018, 0x2019, 0x201a, 0x2122, 0xfb01, 0xfb02, 0x0141,
    0x0152, 0x0160, 0x0178, 0x017d, 0x0131, 0x0142, 0x0153, 0x0161, 0x017e, 0xfffd,
];

/// Map one PDFDocEncoding byte; outside the tables it matches Latin-1.
fn pdf_doc_char(byte: u8) -> char {
    let code = match byte {
        0x18..=0x1f => PDF_DOC_ACCENTS[usize::from(byte - 0x18)],
        0x80..=0x9f => PDF_DOC_HIGH[usize::from(byte - 0x80)],
        0xa0 => 0x20ac,
        other => u16::from(other),
    };
    char::from_u32(u32::from(code)).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Encode a text string: ASCII as a literal, anything else as UTF-16BE.
pub(crate) fn encode_text(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn on_state(doc: &Document, widget: &Dictionary) -> Option<String> {
    let appearances = resolve(doc, widget.get(b"AP").ok()?)?.as_dict().ok()?;

    [b"N".as_slice(), b"D".as_slice()]
        .iter()
        .filter_map(|key| appearances.get(key).ok())
        .filter_map(|obj| resolve(doc, obj))
        .filter_map(|obj| obj.as_dict().ok())
        .find_map(|states| {
            states
                .iter()
                .map(|(key, _)| key)
                .find(|key| key.as_slice() != b"Off")
                .map(|key| String::from_utf8_lossy(key).into_owned())
        })
}
