//! Builds small AcroForm documents in memory for tests and benchmarks.
#![allow(dead_code)]

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

const FLAG_NO_TOGGLE_TO_OFF: i64 = 1 << 14;
const FLAG_RADIO: i64 = 1 << 15;
const FLAG_PUSHBUTTON: i64 = 1 << 16;
const FLAG_COMBO: i64 = 1 << 17;
const FLAG_EDIT: i64 = 1 << 18;

/// Letter-sized pages with form fields placed on them.
pub struct FormBuilder {
    doc: Document,
    pages_id: ObjectId,
    pages: Vec<ObjectId>,
    annots: Vec<Vec<Object>>,
    fields: Vec<Object>,
    with_acroform: bool,
}

impl Default for FormBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormBuilder {
    /// One empty 612x792 page.
    pub fn new() -> Self {
        Self::with_pages(1)
    }

    pub fn with_pages(count: usize) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            pages.push(page_id);
        }

        Self {
            doc,
            pages_id,
            annots: vec![Vec::new(); count],
            pages,
            fields: Vec::new(),
            with_acroform: true,
        }
    }

    /// Leave the catalog without an `/AcroForm` entry.
    pub fn without_acroform(mut self) -> Self {
        self.with_acroform = false;
        self
    }

    pub fn text_field(self, name: &str, page: usize, rect: [i64; 4], value: Option<&str>) -> Self {
        self.text_field_inner(name, page, rect, value, None)
    }

    pub fn text_field_with_max_len(
        self,
        name: &str,
        page: usize,
        rect: [i64; 4],
        value: Option<&str>,
        max_len: i64,
    ) -> Self {
        self.text_field_inner(name, page, rect, value, Some(max_len))
    }

    fn text_field_inner(
        mut self,
        name: &str,
        page: usize,
        rect: [i64; 4],
        value: Option<&str>,
        max_len: Option<i64>,
    ) -> Self {
        let mut dict = self.widget_dict(page, rect);
        dict.set("FT", "Tx");
        dict.set("T", Object::string_literal(name));
        if let Some(value) = value {
            dict.set("V", Object::string_literal(value));
        }
        if let Some(max_len) = max_len {
            dict.set("MaxLen", max_len);
        }
        self.add_field_widget(page, dict);
        self
    }

    /// Checkbox with the conventional `Yes` on-state.
    pub fn checkbox(self, name: &str, page: usize, rect: [i64; 4], checked: bool) -> Self {
        self.checkbox_with_on_state(name, page, rect, "Yes", checked)
    }

    pub fn checkbox_with_on_state(
        mut self,
        name: &str,
        page: usize,
        rect: [i64; 4],
        on_state: &str,
        checked: bool,
    ) -> Self {
        let state = if checked { on_state } else { "Off" };
        let appearances = self.appearances(on_state);

        let mut dict = self.widget_dict(page, rect);
        dict.set("FT", "Btn");
        dict.set("T", Object::string_literal(name));
        dict.set("AP", appearances);
        dict.set("AS", Object::Name(state.as_bytes().to_vec()));
        dict.set("V", Object::Name(state.as_bytes().to_vec()));
        self.add_field_widget(page, dict);
        self
    }

    /// Radio group whose widgets use the option names as on-states.
    pub fn radio_group(
        self,
        name: &str,
        page: usize,
        options: &[(&str, [i64; 4])],
        selected: Option<&str>,
    ) -> Self {
        let buttons: Vec<(&str, Option<&str>, [i64; 4])> = options
            .iter()
            .map(|(option, rect)| (*option, None, *rect))
            .collect();
        self.radio_group_inner(name, page, &buttons, selected)
    }

    /// Radio group with `/Opt` export values; `selected` names an on-state.
    pub fn radio_group_with_exports(
        self,
        name: &str,
        page: usize,
        buttons: &[(&str, &str, [i64; 4])],
        selected: Option<&str>,
    ) -> Self {
        let buttons: Vec<(&str, Option<&str>, [i64; 4])> = buttons
            .iter()
            .map(|(on_state, export, rect)| (*on_state, Some(*export), *rect))
            .collect();
        self.radio_group_inner(name, page, &buttons, selected)
    }

    fn radio_group_inner(
        mut self,
        name: &str,
        page: usize,
        buttons: &[(&str, Option<&str>, [i64; 4])],
        selected: Option<&str>,
    ) -> Self {
        let parent_id = self.doc.new_object_id();

        let mut kids = Vec::with_capacity(buttons.len());
        let mut exports = Vec::new();
        for (on_state, export, rect) in buttons {
            let appearances = self.appearances(on_state);
            let state = if selected == Some(*on_state) { *on_state } else { "Off" };

            let mut widget = self.widget_dict(page, *rect);
            widget.set("Parent", parent_id);
            widget.set("AP", appearances);
            widget.set("AS", Object::Name(state.as_bytes().to_vec()));
            let widget_id = self.doc.add_object(widget);

            self.annots[page].push(widget_id.into());
            kids.push(Object::Reference(widget_id));
            if let Some(export) = export {
                exports.push(Object::string_literal(*export));
            }
        }

        let mut parent = dictionary! {
            "FT" => "Btn",
            "Ff" => FLAG_RADIO | FLAG_NO_TOGGLE_TO_OFF,
            "T" => Object::string_literal(name),
            "Kids" => kids,
        };
        if !exports.is_empty() {
            parent.set("Opt", exports);
        }
        if let Some(selected) = selected {
            parent.set("V", Object::Name(selected.as_bytes().to_vec()));
        }

        self.doc.objects.insert(parent_id, Object::Dictionary(parent));
        self.fields.push(parent_id.into());
        self
    }

    pub fn dropdown(
        self,
        name: &str,
        page: usize,
        rect: [i64; 4],
        options: &[&str],
        selected: Option<&str>,
    ) -> Self {
        self.choice_field(name, page, rect, FLAG_COMBO, options, selected)
    }

    /// Combo box that accepts values outside its option list.
    pub fn editable_dropdown(
        self,
        name: &str,
        page: usize,
        rect: [i64; 4],
        options: &[&str],
    ) -> Self {
        self.choice_field(name, page, rect, FLAG_COMBO | FLAG_EDIT, options, None)
    }

    pub fn list_box(self, name: &str, page: usize, rect: [i64; 4], options: &[&str]) -> Self {
        self.choice_field(name, page, rect, 0, options, None)
    }

    fn choice_field(
        mut self,
        name: &str,
        page: usize,
        rect: [i64; 4],
        flags: i64,
        options: &[&str],
        selected: Option<&str>,
    ) -> Self {
        let mut dict = self.widget_dict(page, rect);
        dict.set("FT", "Ch");
        dict.set("Ff", flags);
        dict.set("T", Object::string_literal(name));
        dict.set(
            "Opt",
            options
                .iter()
                .map(|option| Object::string_literal(*option))
                .collect::<Vec<Object>>(),
        );
        if let Some(selected) = selected {
            dict.set("V", Object::string_literal(selected));
        }
        self.add_field_widget(page, dict);
        self
    }

    pub fn push_button(mut self, name: &str, page: usize, rect: [i64; 4]) -> Self {
        let mut dict = self.widget_dict(page, rect);
        dict.set("FT", "Btn");
        dict.set("Ff", FLAG_PUSHBUTTON);
        dict.set("T", Object::string_literal(name));
        self.add_field_widget(page, dict);
        self
    }

    /// Text field `child` under a non-terminal field `parent` that carries
    /// no type of its own.
    pub fn nested_text_field(
        mut self,
        parent: &str,
        child: &str,
        page: usize,
        rect: [i64; 4],
    ) -> Self {
        let parent_id = self.doc.new_object_id();

        let mut widget = self.widget_dict(page, rect);
        widget.set("Parent", parent_id);
        widget.set("FT", "Tx");
        widget.set("T", Object::string_literal(child));
        let child_id = self.doc.add_object(widget);
        self.annots[page].push(child_id.into());

        self.doc.objects.insert(
            parent_id,
            Object::Dictionary(dictionary! {
                "T" => Object::string_literal(parent),
                "Kids" => vec![Object::Reference(child_id)],
            }),
        );
        self.fields.push(parent_id.into());
        self
    }

    /// Text field missing from every page's `/Annots`, optionally with a
    /// `/P` reference to `page`.
    pub fn unlisted_text_field(
        mut self,
        name: &str,
        page: usize,
        rect: [i64; 4],
        with_page_ref: bool,
    ) -> Self {
        let mut dict = self.widget_dict(page, rect);
        if !with_page_ref {
            dict.remove(b"P");
        }
        dict.set("FT", "Tx");
        dict.set("T", Object::string_literal(name));
        let id = self.doc.add_object(dict);
        self.fields.push(id.into());
        self
    }

    /// Serialize the document.
    pub fn build(mut self) -> Vec<u8> {
        for (page_id, annots) in self.pages.iter().zip(&self.annots) {
            if annots.is_empty() {
                continue;
            }
            self.doc
                .get_dictionary_mut(*page_id)
                .expect("page dictionary")
                .set("Annots", annots.clone());
        }

        let kids: Vec<Object> = self.pages.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        };
        if self.with_acroform {
            let acroform_id = self.doc.add_object(dictionary! {
                "Fields" => self.fields.clone(),
                "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
            });
            catalog.set("AcroForm", acroform_id);
        }
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer).expect("serialize test PDF");
        buffer
    }

    /// Widget annotation entries shared by every field kind.
    fn widget_dict(&self, page: usize, rect: [i64; 4]) -> Dictionary {
        dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Rect" => rect.iter().map(|n| Object::Integer(*n)).collect::<Vec<Object>>(),
            "F" => 4,
            "P" => self.pages[page],
        }
    }

    /// `/AP` with a normal appearance for `on_state` and `Off`.
    fn appearances(&mut self, on_state: &str) -> Dictionary {
        let on_id = self.doc.add_object(Stream::new(dictionary! {}, b"0 g".to_vec()));
        let off_id = self.doc.add_object(Stream::new(dictionary! {}, Vec::new()));

        let mut normal = Dictionary::new();
        normal.set(on_state.as_bytes().to_vec(), on_id);
        normal.set("Off", off_id);

        dictionary! { "N" => normal }
    }

    fn add_field_widget(&mut self, page: usize, dict: Dictionary) {
        let id = self.doc.add_object(dict);
        self.annots[page].push(id.into());
        self.fields.push(id.into());
    }
}
