use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// One selectable entry of a combo, either declared statically in the
/// schema or fetched from a catalog endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: JsonValue,
    #[serde(alias = "nombre", alias = "name", alias = "title")]
    pub label: String,
}

impl CatalogOption {
    pub fn new(id: impl Into<JsonValue>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    #[serde(alias = "combo", alias = "combo-dynamic")]
    ComboDynamic,
    #[serde(alias = "combo-static")]
    ComboStatic,
    #[serde(alias = "combo-multi")]
    ComboMulti,
    // Container only; its nested fields are flattened into the section.
    Group,
}

impl FieldType {
    pub fn is_combo(self) -> bool {
        matches!(
            self,
            FieldType::ComboDynamic | FieldType::ComboStatic | FieldType::ComboMulti
        )
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldSpec {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<CatalogOption>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub cache_key: Option<String>,
    #[serde(default)]
    pub depends_on: Option<String>,
    #[serde(default)]
    pub dependency_endpoint_template: Option<String>,
    #[serde(default)]
    pub triggers_reload: Vec<String>,
    #[serde(default)]
    pub multiple: bool,
    // Serialize as null instead of omitting the key when empty
    #[serde(default)]
    pub nullable: bool,
    // Children of a `group`
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl FieldSpec {
    /// Effective type: a combo flagged `multiple` behaves as a multi-select.
    pub fn kind(&self) -> FieldType {
        if self.multiple && self.field_type.is_combo() {
            FieldType::ComboMulti
        } else {
            self.field_type
        }
    }

    pub fn effective_cache_key(&self) -> Option<String> {
        self.source.as_ref()?;
        Some(
            self.cache_key
                .clone()
                .unwrap_or_else(|| format!("cache_{}", self.key)),
        )
    }

    /// Catalog fetched once when the field is constructed, as opposed to
    /// one reloaded whenever its trigger changes.
    pub fn is_preloaded_catalog(&self) -> bool {
        self.kind().is_combo()
            && self.field_type != FieldType::ComboStatic
            && self.source.is_some()
            && self.depends_on.is_none()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl Section {
    pub fn leaf_fields(&self) -> Vec<&FieldSpec> {
        fn walk<'a>(fields: &'a [FieldSpec], out: &mut Vec<&'a FieldSpec>) {
            for f in fields {
                if f.field_type == FieldType::Group {
                    walk(&f.fields, out);
                } else {
                    out.push(f);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.fields, &mut out);
        out
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtensionSpec {
    pub name: String,
    pub trigger: String,
    #[serde(default)]
    pub values: Vec<JsonValue>,
    #[serde(default)]
    pub label_contains: Vec<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub skip_sections: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveMethod {
    #[default]
    Put,
    Post,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubResourceSpec {
    pub name: String,
    // May contain `{id}`
    pub endpoint: String,
    #[serde(default)]
    pub method: SaveMethod,
    // payload key -> form key
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub extension: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FormSchema {
    #[serde(default = "default_title_new")]
    pub title_new: String,
    #[serde(default = "default_title_edit")]
    pub title_edit: String,
    #[serde(default = "default_width")]
    pub width: u16,
    #[serde(default = "default_height")]
    pub height: u16,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub extensions: Vec<ExtensionSpec>,
    #[serde(default)]
    pub sub_resources: Vec<SubResourceSpec>,
    #[serde(default)]
    pub identity_key: Option<String>,
    #[serde(default = "default_record_id_key")]
    pub record_id_key: String,
    #[serde(default)]
    pub invalidate_cache_keys: Vec<String>,
}

impl Default for FormSchema {
    fn default() -> Self {
        Self {
            title_new: default_title_new(),
            title_edit: default_title_edit(),
            width: default_width(),
            height: default_height(),
            endpoint: None,
            sections: vec![],
            extensions: vec![],
            sub_resources: vec![],
            identity_key: None,
            record_id_key: default_record_id_key(),
            invalidate_cache_keys: vec![],
        }
    }
}

fn default_title_new() -> String {
    "New record".to_string()
}

fn default_title_edit() -> String {
    "Edit record".to_string()
}

fn default_width() -> u16 {
    1100
}

fn default_height() -> u16 {
    750
}

fn default_record_id_key() -> String {
    "id".to_string()
}

impl FormSchema {
    pub fn leaf_keys(&self) -> HashSet<String> {
        keys_of(&self.sections)
    }

    pub fn find_field(&self, key: &str) -> Option<&FieldSpec> {
        self.sections
            .iter()
            .flat_map(|s| s.leaf_fields())
            .find(|f| f.key == key)
    }
}

fn keys_of(sections: &[Section]) -> HashSet<String> {
    sections
        .iter()
        .flat_map(|s| s.leaf_fields())
        .map(|f| f.key.clone())
        .collect()
}

/// Read a schema document. `.json` files go through serde_json, anything
/// else through serde_yaml.
pub fn parse(path: &Path) -> Result<FormSchema, SchemaError> {
    let text = std::fs::read_to_string(path).map_err(|e| SchemaError::Parse {
        path: path.to_path_buf(),
        message: format!("reading: {e}"),
    })?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        serde_json::from_str(&text).map_err(|e| SchemaError::Parse {
            path: path.to_path_buf(),
            message: format!("{}:{}: {e}", e.line(), e.column()),
        })
    } else {
        serde_yaml::from_str(&text).map_err(|e| {
            let message = match e.location() {
                Some(loc) => format!("{}:{}: {e}", loc.line(), loc.column()),
                None => e.to_string(),
            };
            SchemaError::Parse {
                path: path.to_path_buf(),
                message,
            }
        })
    }
}

/// Structural checks over a set of sections. `external_keys` are keys that
/// live outside these sections (base keys for an extension and vice versa)
/// and may legitimately be referenced.
pub fn validate_sections(
    sections: &[Section],
    external_keys: &HashSet<String>,
) -> Result<(), SchemaError> {
    let mut keys: HashSet<&str> = HashSet::new();
    for section in sections {
        for field in section.leaf_fields() {
            if field.key.trim().is_empty() {
                return Err(SchemaError::invalid(
                    field.label.clone(),
                    format!("field in section '{}' has no key", section.title),
                ));
            }
            if !keys.insert(field.key.as_str()) || external_keys.contains(&field.key) {
                return Err(SchemaError::invalid(field.key.clone(), "duplicate key"));
            }
        }
    }
    let known = |k: &str| keys.contains(k) || external_keys.contains(k);
    for field in sections.iter().flat_map(|s| s.leaf_fields()) {
        if let Some(parent) = &field.depends_on {
            let template = field.dependency_endpoint_template.as_deref().ok_or_else(|| {
                SchemaError::invalid(
                    field.key.clone(),
                    format!("depends_on '{parent}' requires a dependency_endpoint_template"),
                )
            })?;
            if !template.contains("{value}") {
                return Err(SchemaError::invalid(
                    field.key.clone(),
                    "dependency_endpoint_template must contain a {value} placeholder",
                ));
            }
            if !field.kind().is_combo() {
                return Err(SchemaError::invalid(
                    field.key.clone(),
                    "only combo fields can depend on another field",
                ));
            }
            if !known(parent) {
                return Err(SchemaError::invalid(
                    field.key.clone(),
                    format!("depends_on refers to unknown field '{parent}'"),
                ));
            }
        }
        if !field.triggers_reload.is_empty() {
            if !field.kind().is_combo() {
                return Err(SchemaError::invalid(
                    field.key.clone(),
                    "triggers_reload is only allowed on combo fields",
                ));
            }
            if let Some(missing) = field.triggers_reload.iter().find(|t| !known(t)) {
                return Err(SchemaError::invalid(
                    field.key.clone(),
                    format!("triggers_reload refers to unknown field '{missing}'"),
                ));
            }
        }
        if field.field_type == FieldType::ComboDynamic
            && field.source.is_none()
            && field.depends_on.is_none()
        {
            tracing::warn!(field = %field.key, "dynamic combo has neither source nor depends_on");
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LoadedExtension {
    pub spec: ExtensionSpec,
    pub sections: Vec<Section>,
}

/// A base schema plus every extension it can activate, parsed and
/// validated together at dialog construction.
#[derive(Debug, Clone)]
pub struct SchemaBundle {
    pub schema: FormSchema,
    pub base_dir: PathBuf,
    pub extensions: Vec<LoadedExtension>,
}

impl SchemaBundle {
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let schema = parse(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut extensions = Vec::new();
        for spec in &schema.extensions {
            let sections = load_extension_sections(&base_dir, spec)?;
            extensions.push(LoadedExtension {
                spec: spec.clone(),
                sections,
            });
        }
        let bundle = Self::from_parts(schema, base_dir, extensions)?;
        tracing::info!(
            path = %path.display(),
            sections = bundle.schema.sections.len(),
            extensions = bundle.extensions.len(),
            "schema loaded"
        );
        Ok(bundle)
    }

    pub fn from_parts(
        schema: FormSchema,
        base_dir: PathBuf,
        extensions: Vec<LoadedExtension>,
    ) -> Result<Self, SchemaError> {
        let base_keys = schema.leaf_keys();
        let mut extension_keys = HashSet::new();
        for ext in &extensions {
            validate_sections(&ext.sections, &base_keys)?;
            extension_keys.extend(keys_of(&ext.sections));
        }
        validate_sections(&schema.sections, &extension_keys)?;
        for ext in &extensions {
            let trigger = schema.find_field(&ext.spec.trigger).ok_or_else(|| {
                SchemaError::invalid(
                    ext.spec.trigger.clone(),
                    format!("extension '{}' is triggered by an unknown field", ext.spec.name),
                )
            })?;
            if !trigger.kind().is_combo() {
                return Err(SchemaError::invalid(
                    trigger.key.clone(),
                    "extension triggers must be combo fields",
                ));
            }
        }
        Ok(Self {
            schema,
            base_dir,
            extensions,
        })
    }

    pub fn extension(&self, name: &str) -> Option<&LoadedExtension> {
        self.extensions.iter().find(|e| e.spec.name == name)
    }
}

pub fn load_extension_sections(
    base_dir: &Path,
    spec: &ExtensionSpec,
) -> Result<Vec<Section>, SchemaError> {
    let path = if spec.path.is_absolute() {
        spec.path.clone()
    } else {
        base_dir.join(&spec.path)
    };
    let ext = parse(&path)?;
    Ok(ext.sections.into_iter().skip(spec.skip_sections).collect())
}
