use super::{FormState, InputCapability};
use crate::schema::SubResourceSpec;
use crate::services::gateway::Record;
use serde_json::Value as JsonValue;

/// Payload for the main save: every filled field, trimmed, plus explicit
/// nulls for empty `nullable` fields.
pub fn serialize(form: &FormState) -> Record {
    let mut out = Record::new();
    for field in form.fields() {
        match field.input.to_json() {
            Some(v) => {
                out.insert(field.key.clone(), v);
            }
            None if field.nullable => {
                out.insert(field.key.clone(), JsonValue::Null);
            }
            None => {}
        }
    }
    out
}

/// Project the main payload onto a sub-resource's field mapping. Missing
/// form keys are sent as null so the backend can clear them.
pub fn sub_resource_payload(spec: &SubResourceSpec, payload: &Record) -> Record {
    spec.fields
        .iter()
        .map(|(target, source)| {
            (
                target.clone(),
                payload.get(source).cloned().unwrap_or(JsonValue::Null),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::SectionOrigin;
    use crate::schema::{CatalogOption, FieldSpec, FieldType, SaveMethod, Section};
    use serde_json::json;

    fn form() -> FormState {
        let mut form = FormState::default();
        form.add_section(
            &Section {
                title: "S".into(),
                description: String::new(),
                fields: vec![
                    FieldSpec {
                        key: "name".into(),
                        ..Default::default()
                    },
                    FieldSpec {
                        key: "notes".into(),
                        field_type: FieldType::Textarea,
                        nullable: true,
                        ..Default::default()
                    },
                    FieldSpec {
                        key: "tags".into(),
                        field_type: FieldType::ComboMulti,
                        options: vec![CatalogOption::new(1, "a"), CatalogOption::new(2, "b")],
                        ..Default::default()
                    },
                    FieldSpec {
                        key: "owner".into(),
                        field_type: FieldType::ComboStatic,
                        options: vec![CatalogOption::new("u1", "Alice")],
                        ..Default::default()
                    },
                ],
            },
            SectionOrigin::Base,
        );
        form
    }

    #[test]
    fn empty_fields_are_omitted_unless_nullable() {
        let f = form();
        let p = serialize(&f);
        assert_eq!(p.get("notes"), Some(&JsonValue::Null));
        assert!(!p.contains_key("name"));
        assert!(!p.contains_key("tags"));
        assert!(!p.contains_key("owner"));
    }

    #[test]
    fn filled_values_are_trimmed_and_typed() {
        let mut f = form();
        f.set_value("name", &json!("  Acme  "));
        f.set_value("tags", &json!([2]));
        f.set_value("owner", &json!("u1"));
        let p = serialize(&f);
        assert_eq!(p.get("name"), Some(&json!("Acme")));
        assert_eq!(p.get("tags"), Some(&json!([2])));
        assert_eq!(p.get("owner"), Some(&json!("u1")));
    }

    #[test]
    fn sub_resource_payload_maps_keys_and_fills_gaps_with_null() {
        let spec = SubResourceSpec {
            name: "privacy".into(),
            endpoint: "/assets/{id}/privacy".into(),
            method: SaveMethod::Put,
            fields: [
                ("has_pii".to_string(), "pii".to_string()),
                ("label".to_string(), "name".to_string()),
            ]
            .into_iter()
            .collect(),
            extension: None,
        };
        let mut payload = Record::new();
        payload.insert("name".into(), json!("Acme"));
        let out = sub_resource_payload(&spec, &payload);
        assert_eq!(out.get("label"), Some(&json!("Acme")));
        assert_eq!(out.get("has_pii"), Some(&JsonValue::Null));
        assert_eq!(out.len(), 2);
    }
}
