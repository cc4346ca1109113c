use crate::schema::{CatalogOption, FieldSpec, FieldType};
use crate::services::gateway::plain_string;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Current value of an input, independent of the widget that holds it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Choice(JsonValue),
    Choices(Vec<JsonValue>),
}

/// What the engine needs from any input kind.
pub trait InputCapability {
    fn value(&self) -> FieldValue;
    /// Apply a stored value. Returns false when it cannot be represented
    /// yet, e.g. a choice whose option has not been loaded.
    fn set_json(&mut self, value: &JsonValue) -> bool;
    fn is_filled(&self) -> bool;
    /// Payload form; `None` means the field is left out.
    fn to_json(&self) -> Option<JsonValue>;
}

#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub text: String,
    pub multiline: bool,
}

impl InputCapability for TextInput {
    fn value(&self) -> FieldValue {
        FieldValue::Text(self.text.clone())
    }

    fn set_json(&mut self, value: &JsonValue) -> bool {
        self.text = plain_string(value);
        true
    }

    fn is_filled(&self) -> bool {
        !self.text.trim().is_empty()
    }

    fn to_json(&self) -> Option<JsonValue> {
        let t = self.text.trim();
        (!t.is_empty()).then(|| JsonValue::String(t.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectInput {
    pub options: Vec<CatalogOption>,
    pub selected: Option<usize>,
}

impl SelectInput {
    pub fn selected_option(&self) -> Option<&CatalogOption> {
        self.selected.and_then(|i| self.options.get(i))
    }
}

impl InputCapability for SelectInput {
    fn value(&self) -> FieldValue {
        match self.selected_option() {
            Some(o) => FieldValue::Choice(o.id.clone()),
            None => FieldValue::Null,
        }
    }

    fn set_json(&mut self, value: &JsonValue) -> bool {
        if value.is_null() {
            self.selected = None;
            return true;
        }
        match match_option(&self.options, value) {
            Some(i) => {
                self.selected = Some(i);
                true
            }
            None => false,
        }
    }

    fn is_filled(&self) -> bool {
        self.selected_option().is_some()
    }

    fn to_json(&self) -> Option<JsonValue> {
        self.selected_option().map(|o| o.id.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MultiSelectInput {
    pub options: Vec<CatalogOption>,
    pub checked: Vec<bool>,
}

impl MultiSelectInput {
    pub fn checked_ids(&self) -> Vec<JsonValue> {
        self.options
            .iter()
            .zip(&self.checked)
            .filter(|(_, c)| **c)
            .map(|(o, _)| o.id.clone())
            .collect()
    }

    pub fn toggle(&mut self, idx: usize) {
        if let Some(c) = self.checked.get_mut(idx) {
            *c = !*c;
        }
    }
}

impl InputCapability for MultiSelectInput {
    fn value(&self) -> FieldValue {
        FieldValue::Choices(self.checked_ids())
    }

    fn set_json(&mut self, value: &JsonValue) -> bool {
        let wanted: HashSet<String> = match value {
            JsonValue::Array(items) => items.iter().map(plain_string).collect(),
            JsonValue::Null => HashSet::new(),
            single => std::iter::once(plain_string(single)).collect(),
        };
        if wanted.is_empty() {
            self.checked = vec![false; self.options.len()];
            return true;
        }
        if self.options.is_empty() {
            return false;
        }
        self.checked = self
            .options
            .iter()
            .map(|o| wanted.contains(&plain_string(&o.id)))
            .collect();
        true
    }

    fn is_filled(&self) -> bool {
        self.options
            .iter()
            .zip(&self.checked)
            .any(|(o, c)| *c && !o.label.trim().is_empty())
    }

    fn to_json(&self) -> Option<JsonValue> {
        let ids = self.checked_ids();
        (!ids.is_empty()).then_some(JsonValue::Array(ids))
    }
}

/// Index of the option identified by `value`: exact JSON identity first,
/// then string equality so `"3"` finds id `3`.
pub fn match_option(options: &[CatalogOption], value: &JsonValue) -> Option<usize> {
    if value.is_null() {
        return None;
    }
    options.iter().position(|o| o.id == *value).or_else(|| {
        let wanted = plain_string(value);
        options.iter().position(|o| plain_string(&o.id) == wanted)
    })
}

#[derive(Debug, Clone)]
pub enum FieldInput {
    Text(TextInput),
    Select(SelectInput),
    Multi(MultiSelectInput),
}

impl FieldInput {
    fn inner(&self) -> &dyn InputCapability {
        match self {
            FieldInput::Text(t) => t,
            FieldInput::Select(s) => s,
            FieldInput::Multi(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn InputCapability {
        match self {
            FieldInput::Text(t) => t,
            FieldInput::Select(s) => s,
            FieldInput::Multi(m) => m,
        }
    }

    pub fn options(&self) -> &[CatalogOption] {
        match self {
            FieldInput::Text(_) => &[],
            FieldInput::Select(s) => &s.options,
            FieldInput::Multi(m) => &m.options,
        }
    }

    /// Replace the option list. The selection is reset, never merged.
    pub fn set_options(&mut self, options: Vec<CatalogOption>) {
        match self {
            FieldInput::Text(_) => {}
            FieldInput::Select(s) => {
                s.options = options;
                s.selected = None;
            }
            FieldInput::Multi(m) => {
                m.checked = vec![false; options.len()];
                m.options = options;
            }
        }
    }

    pub fn clear_options(&mut self) {
        self.set_options(Vec::new());
    }

    /// Id of the single selected option, the value dependents and
    /// extensions key off.
    pub fn selected_id(&self) -> Option<JsonValue> {
        match self {
            FieldInput::Select(s) => s.selected_option().map(|o| o.id.clone()),
            _ => None,
        }
    }

    pub fn selected_label(&self) -> Option<String> {
        match self {
            FieldInput::Select(s) => s.selected_option().map(|o| o.label.clone()),
            _ => None,
        }
    }
}

impl InputCapability for FieldInput {
    fn value(&self) -> FieldValue {
        self.inner().value()
    }

    fn set_json(&mut self, value: &JsonValue) -> bool {
        self.inner_mut().set_json(value)
    }

    fn is_filled(&self) -> bool {
        self.inner().is_filled()
    }

    fn to_json(&self) -> Option<JsonValue> {
        self.inner().to_json()
    }
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub key: String,
    pub label: String,
    pub kind: FieldType,
    pub required: bool,
    pub nullable: bool,
    pub input: FieldInput,
    // Catalog request finished (successfully or not)
    pub options_loaded: bool,
    pub load_error: Option<String>,
}

impl FormField {
    pub fn from_spec(spec: &FieldSpec) -> Self {
        let kind = spec.kind();
        let input = match kind {
            FieldType::ComboMulti => FieldInput::Multi(MultiSelectInput {
                checked: vec![false; spec.options.len()],
                options: spec.options.clone(),
            }),
            FieldType::ComboDynamic | FieldType::ComboStatic => FieldInput::Select(SelectInput {
                options: spec.options.clone(),
                selected: None,
            }),
            FieldType::Textarea => FieldInput::Text(TextInput {
                text: String::new(),
                multiline: true,
            }),
            FieldType::Text | FieldType::Group => FieldInput::Text(TextInput::default()),
        };
        let label = if spec.label.is_empty() {
            spec.key.clone()
        } else {
            spec.label.clone()
        };
        Self {
            key: spec.key.clone(),
            label,
            kind,
            required: spec.required,
            nullable: spec.nullable,
            input,
            options_loaded: kind == FieldType::ComboStatic || !spec.options.is_empty(),
            load_error: None,
        }
    }

    pub fn is_combo(&self) -> bool {
        !matches!(self.input, FieldInput::Text(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> Vec<CatalogOption> {
        vec![
            CatalogOption::new(1, "One"),
            CatalogOption::new("2", "Two"),
            CatalogOption::new(json!({"k": 3}), "Three"),
        ]
    }

    #[test]
    fn option_matching_prefers_identity_then_string_form() {
        let o = opts();
        assert_eq!(match_option(&o, &json!(1)), Some(0));
        assert_eq!(match_option(&o, &json!("1")), Some(0));
        assert_eq!(match_option(&o, &json!(2)), Some(1));
        assert_eq!(match_option(&o, &json!({"k": 3})), Some(2));
        assert_eq!(match_option(&o, &json!("missing")), None);
        assert_eq!(match_option(&o, &JsonValue::Null), None);
    }

    #[test]
    fn whitespace_text_is_not_filled_and_is_omitted() {
        let mut t = TextInput::default();
        t.set_json(&json!("   "));
        assert!(!t.is_filled());
        assert_eq!(t.to_json(), None);
        t.set_json(&json!("  Acme "));
        assert_eq!(t.to_json(), Some(json!("Acme")));
        t.set_json(&json!(42));
        assert_eq!(t.text, "42");
    }

    #[test]
    fn select_reports_unmatched_values_and_resets_on_new_options() {
        let mut input = FieldInput::Select(SelectInput::default());
        assert!(!input.set_json(&json!(1)));
        input.set_options(opts());
        assert!(input.set_json(&json!("1")));
        assert_eq!(input.to_json(), Some(json!(1)));
        assert_eq!(input.selected_label().as_deref(), Some("One"));
        input.set_options(opts());
        assert!(!input.is_filled());
        assert!(input.set_json(&json!("2")));
        assert!(input.set_json(&JsonValue::Null));
        assert_eq!(input.to_json(), None);
    }

    #[test]
    fn multi_select_checks_by_string_identity() {
        let mut m = MultiSelectInput::default();
        assert!(!m.set_json(&json!([1])));
        m.options = opts();
        assert!(m.set_json(&json!(["1", 2])));
        assert_eq!(m.checked, vec![true, true, false]);
        assert_eq!(m.to_json(), Some(json!([1, "2"])));
        m.toggle(0);
        m.toggle(1);
        assert!(!m.is_filled());
        assert_eq!(m.to_json(), None);
    }

    #[test]
    fn field_from_spec_picks_input_kind() {
        let spec = FieldSpec {
            key: "tags".into(),
            field_type: FieldType::ComboDynamic,
            multiple: true,
            ..Default::default()
        };
        let f = FormField::from_spec(&spec);
        assert!(matches!(f.input, FieldInput::Multi(_)));
        assert_eq!(f.label, "tags");
        assert!(!f.options_loaded);

        let spec = FieldSpec {
            key: "notes".into(),
            field_type: FieldType::Textarea,
            ..Default::default()
        };
        match FormField::from_spec(&spec).input {
            FieldInput::Text(t) => assert!(t.multiline),
            _ => panic!("expected text input"),
        }
    }
}
