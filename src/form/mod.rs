//! Headless form state: the registry of live inputs grouped into wizard
//! steps. Rendering and key handling live in `widgets`.

pub mod field;
pub mod payload;
pub mod progress;

pub use field::{FieldInput, FieldValue, FormField, InputCapability};

use crate::schema::{CatalogOption, Section};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionOrigin {
    Base,
    Extension(String),
}

/// One wizard step. `keys` index into the field registry in display order.
#[derive(Debug, Clone)]
pub struct SectionNode {
    pub title: String,
    pub description: String,
    pub origin: SectionOrigin,
    pub keys: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FormState {
    fields: Vec<FormField>,
    sections: Vec<SectionNode>,
}

impl FormState {
    /// Append a section and register its leaf fields. Keys already present
    /// are skipped so the registry keeps one entry per key.
    pub fn add_section(&mut self, section: &Section, origin: SectionOrigin) -> Vec<String> {
        let mut keys = Vec::new();
        for spec in section.leaf_fields() {
            if self.get(&spec.key).is_some() {
                tracing::warn!(field = %spec.key, "field already registered; skipping");
                continue;
            }
            self.fields.push(FormField::from_spec(spec));
            keys.push(spec.key.clone());
        }
        self.sections.push(SectionNode {
            title: section.title.clone(),
            description: section.description.clone(),
            origin,
            keys: keys.clone(),
        });
        keys
    }

    /// Drop every section contributed by extension `name` along with its
    /// fields. Returns the removed keys.
    pub fn remove_extension_sections(&mut self, name: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.sections.retain(|s| match &s.origin {
            SectionOrigin::Extension(n) if n == name => {
                removed.extend(s.keys.iter().cloned());
                false
            }
            _ => true,
        });
        self.fields.retain(|f| !removed.contains(&f.key));
        removed
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn sections(&self) -> &[SectionNode] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, key: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut FormField> {
        self.fields.iter_mut().find(|f| f.key == key)
    }

    pub fn section_fields(&self, idx: usize) -> Vec<&FormField> {
        self.sections
            .get(idx)
            .map(|s| s.keys.iter().filter_map(|k| self.get(k)).collect())
            .unwrap_or_default()
    }

    pub fn get_value(&self, key: &str) -> Option<FieldValue> {
        self.get(key).map(|f| f.input.value())
    }

    /// Programmatic write. False when the key is unknown or the value does
    /// not match any loaded option.
    pub fn set_value(&mut self, key: &str, value: &JsonValue) -> bool {
        self.get_mut(key)
            .map(|f| f.input.set_json(value))
            .unwrap_or(false)
    }

    /// Replace a combo's options. Returns true when a selection was lost.
    pub fn set_options(&mut self, key: &str, options: Vec<CatalogOption>) -> bool {
        let Some(field) = self.get_mut(key) else {
            return false;
        };
        let had_value = field.input.is_filled();
        field.input.set_options(options);
        field.options_loaded = true;
        had_value
    }

    pub fn clear_options(&mut self, key: &str) -> bool {
        let Some(field) = self.get_mut(key) else {
            return false;
        };
        let had_value = field.input.is_filled();
        field.input.clear_options();
        field.options_loaded = false;
        field.load_error = None;
        had_value
    }

    pub fn is_field_filled(&self, key: &str) -> bool {
        self.get(key).is_some_and(|f| f.input.is_filled())
    }
}
