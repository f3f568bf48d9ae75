use std::collections::{BTreeMap, HashSet};
use std::mem::discriminant;

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{CustomSection, FieldTemplate, FieldType, MedicalFieldsConfig, SectionConfig};

pub const BUILTIN_SECTIONS: [&str; 5] = ["vitals", "complaint", "diagnosis", "treatment", "notes"];

const DEFAULT_CUSTOM_TITLE: &str = "Custom section";

pub fn default_config() -> MedicalFieldsConfig {
    let mut sections = BTreeMap::new();

    sections.insert(
        "vitals".to_string(),
        SectionConfig {
            enabled: true,
            label: "Vital signs".to_string(),
            fields: vec![
                FieldTemplate::new("blood_pressure", "Blood pressure", FieldType::Text),
                FieldTemplate::new("pulse", "Pulse", FieldType::Number),
                FieldTemplate::new("temperature", "Temperature", FieldType::Number),
                FieldTemplate::new("weight", "Weight", FieldType::Number),
                FieldTemplate::new("height", "Height", FieldType::Number),
            ],
        },
    );
    sections.insert(
        "complaint".to_string(),
        SectionConfig {
            enabled: true,
            label: "Chief complaint".to_string(),
            fields: vec![
                FieldTemplate::new("complaint", "Complaint", FieldType::Textarea).required(),
                FieldTemplate::new("history_of_illness", "History of present illness", FieldType::Textarea),
            ],
        },
    );
    sections.insert(
        "diagnosis".to_string(),
        SectionConfig {
            enabled: true,
            label: "Diagnosis".to_string(),
            fields: vec![FieldTemplate::new("diagnosis", "Diagnosis", FieldType::Textarea).required()],
        },
    );
    sections.insert(
        "treatment".to_string(),
        SectionConfig {
            enabled: true,
            label: "Treatment".to_string(),
            fields: vec![
                FieldTemplate::new("medications", "Medications", FieldType::Textarea),
                FieldTemplate::new("instructions", "Instructions", FieldType::Textarea),
            ],
        },
    );
    sections.insert(
        "notes".to_string(),
        SectionConfig {
            enabled: true,
            label: "Notes".to_string(),
            fields: vec![FieldTemplate::new("notes", "Notes", FieldType::Textarea)],
        },
    );

    MedicalFieldsConfig {
        sections_order: BUILTIN_SECTIONS.iter().map(|s| s.to_string()).collect(),
        sections,
        custom_sections: Vec::new(),
    }
}

/// Recursively overlay `overlay` on `base`. Object keys merge one by one; any
/// other value replaces the base only when both have the same JSON type, so a
/// stray string cannot clobber a boolean flag. Keys unknown to `base` are kept.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let value = match base_map.get(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        (Value::Null, _) => overlay.clone(),
        _ if discriminant(base) == discriminant(overlay) => overlay.clone(),
        _ => base.clone(),
    }
}

/// Normalize a stored or user-submitted configuration. Never fails: anything
/// unusable falls back to the defaults.
pub fn normalize(raw: &Value) -> MedicalFieldsConfig {
    let defaults = default_config();
    let Some(raw_map) = raw.as_object() else {
        debug!("Medical fields config is not an object, using defaults");
        return defaults;
    };

    let user_sections = raw_map.get("sections").and_then(Value::as_object);

    let sections: BTreeMap<String, SectionConfig> = defaults
        .sections
        .iter()
        .map(|(id, default_section)| {
            let user_section = user_sections.and_then(|s| s.get(id));
            (id.clone(), merge_section(default_section, user_section))
        })
        .collect();

    let custom_sections = normalize_custom_sections(raw_map.get("custom_sections"));
    let sections_order = reconcile_order(raw_map.get("sections_order"), &custom_sections);

    MedicalFieldsConfig {
        sections_order,
        sections,
        custom_sections,
    }
}

fn merge_section(default_section: &SectionConfig, user: Option<&Value>) -> SectionConfig {
    let Some(user_map) = user.and_then(Value::as_object) else {
        return default_section.clone();
    };

    let enabled = deep_merge(&Value::Bool(default_section.enabled), user_map.get("enabled").unwrap_or(&Value::Null))
        .as_bool()
        .unwrap_or(default_section.enabled);
    let label = user_map
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_section.label.clone());

    SectionConfig {
        enabled,
        label,
        fields: merge_fields(&default_section.fields, user_map.get("fields")),
    }
}

/// Merge user field entries over template defaults, matched by id. User order
/// wins; defaults the user did not mention are appended in their own order.
fn merge_fields(defaults: &[FieldTemplate], user: Option<&Value>) -> Vec<FieldTemplate> {
    let Some(entries) = user.and_then(Value::as_array) else {
        return defaults.to_vec();
    };

    let default_ids: HashSet<&str> = defaults.iter().map(|f| f.id.as_str()).collect();
    let mut taken: HashSet<String> = HashSet::new();
    let mut fields = Vec::with_capacity(entries.len().max(defaults.len()));

    for entry in entries {
        let Some(entry_map) = entry.as_object() else {
            continue;
        };

        let explicit_id = entry_map
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let candidate = match explicit_id.filter(|id| default_ids.contains(id)) {
            Some(id) => {
                let Some(template) = defaults.iter().find(|f| f.id == id) else {
                    continue;
                };
                let template_value = serde_json::to_value(template).unwrap_or(Value::Null);
                normalize_field(&deep_merge(&template_value, entry), &taken)
            }
            None => normalize_field(entry, &taken),
        };

        if let Some(field) = candidate {
            taken.insert(field.id.clone());
            fields.push(field);
        }
    }

    for template in defaults {
        if !taken.contains(&template.id) {
            taken.insert(template.id.clone());
            fields.push(template.clone());
        }
    }

    fields
}

/// Lowercase ASCII slug joined by `_`, used to derive field ids from labels.
fn slug(label: &str) -> String {
    let mut out = String::new();
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

fn first_unused(prefix: &str, taken: &HashSet<String>) -> String {
    (1..)
        .map(|n| format!("{}_{}", prefix, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| prefix.to_string())
}

/// Build one field from a JSON entry. Explicit ids that are already taken
/// drop the entry; generated ids are made unique instead.
fn normalize_field(value: &Value, taken: &HashSet<String>) -> Option<FieldTemplate> {
    let map = value.as_object()?;

    let label = map
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let explicit_id = map
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty());

    let id = match explicit_id {
        Some(id) if taken.contains(id) => return None,
        Some(id) => id.to_string(),
        None => {
            let from_label = slug(&label);
            if !from_label.is_empty() && !taken.contains(&from_label) {
                from_label
            } else if from_label.is_empty() {
                first_unused("field", taken)
            } else {
                first_unused(&from_label, taken)
            }
        }
    };

    let field_type = map
        .get("type")
        .and_then(Value::as_str)
        .map(FieldType::parse_lenient)
        .unwrap_or(FieldType::Text);

    let options = if field_type == FieldType::Select {
        map.get("options")
            .and_then(Value::as_array)
            .map(|opts| {
                opts.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Some(FieldTemplate {
        label: if label.is_empty() { id.clone() } else { label },
        id,
        field_type,
        required: map.get("required").and_then(Value::as_bool).unwrap_or(false),
        enabled: map.get("enabled").and_then(Value::as_bool).unwrap_or(true),
        options,
    })
}

fn normalize_custom_sections(raw: Option<&Value>) -> Vec<CustomSection> {
    let Some(entries) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    let objects: Vec<&Map<String, Value>> = entries.iter().filter_map(Value::as_object).collect();

    let explicit_id = |map: &Map<String, Value>| -> Option<String> {
        map.get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    };

    // Generated ids must not collide with explicit ids appearing later in the list.
    let mut reserved: HashSet<String> = objects.iter().filter_map(|m| explicit_id(m)).collect();
    reserved.extend(BUILTIN_SECTIONS.iter().map(|s| s.to_string()));

    let mut seen: HashSet<String> = HashSet::new();
    let mut sections = Vec::with_capacity(objects.len());

    for map in objects {
        let id = match explicit_id(map) {
            Some(id) => {
                if BUILTIN_SECTIONS.contains(&id.as_str()) || seen.contains(&id) {
                    debug!("Dropping custom section with duplicate id {}", id);
                    continue;
                }
                id
            }
            None => {
                let generated = first_unused("custom", &reserved);
                reserved.insert(generated.clone());
                generated
            }
        };
        seen.insert(id.clone());

        let title = map
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CUSTOM_TITLE)
            .to_string();

        sections.push(CustomSection {
            id,
            title,
            enabled: map.get("enabled").and_then(Value::as_bool).unwrap_or(true),
            fields: merge_fields(&[], map.get("fields")),
        });
    }

    sections
}

fn reconcile_order(raw: Option<&Value>, custom_sections: &[CustomSection]) -> Vec<String> {
    let known: Vec<&str> = BUILTIN_SECTIONS
        .iter()
        .copied()
        .chain(custom_sections.iter().map(|c| c.id.as_str()))
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(known.len());

    if let Some(entries) = raw.and_then(Value::as_array) {
        for id in entries.iter().filter_map(Value::as_str) {
            if known.contains(&id) && !order.iter().any(|existing| existing == id) {
                order.push(id.to_string());
            }
        }
    }

    for id in known {
        if !order.iter().any(|existing| existing == id) {
            order.push(id.to_string());
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_input_yields_defaults() {
        for raw in [Value::Null, json!("oops"), json!(42), json!([1, 2])] {
            assert_eq!(normalize(&raw), default_config());
        }
    }

    #[test]
    fn empty_object_yields_defaults() {
        assert_eq!(normalize(&json!({})), default_config());
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = json!({
            "sections_order": ["notes", "bogus", "notes", "custom_1"],
            "sections": { "vitals": { "enabled": false } },
            "custom_sections": [{ "title": "Dental chart", "fields": [{ "label": "Tooth" }] }]
        });
        let once = normalize(&raw);
        let twice = normalize(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn deep_merge_guards_types() {
        let base = json!({ "enabled": true, "label": "Vitals", "nested": { "a": 1 } });
        let overlay = json!({ "enabled": "no", "label": "Signs", "nested": { "b": 2 }, "extra": [1] });
        let merged = deep_merge(&base, &overlay);

        assert_eq!(merged["enabled"], true);
        assert_eq!(merged["label"], "Signs");
        assert_eq!(merged["nested"], json!({ "a": 1, "b": 2 }));
        assert_eq!(merged["extra"], json!([1]));
    }

    #[test]
    fn builtin_section_overrides_merge_over_defaults() {
        let config = normalize(&json!({
            "sections": {
                "vitals": {
                    "enabled": false,
                    "label": "  ",
                    "fields": [
                        { "id": "pulse", "enabled": false },
                        { "id": "spo2", "label": "SpO2", "type": "number" }
                    ]
                },
                "diagnosis": { "enabled": "yes" }
            }
        }));

        let vitals = &config.sections["vitals"];
        assert!(!vitals.enabled);
        assert_eq!(vitals.label, "Vital signs");

        let ids: Vec<&str> = vitals.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["pulse", "spo2", "blood_pressure", "temperature", "weight", "height"]);

        let pulse = &vitals.fields[0];
        assert!(!pulse.enabled);
        assert_eq!(pulse.label, "Pulse");
        assert_eq!(pulse.field_type, FieldType::Number);

        assert!(config.sections["diagnosis"].enabled);
    }

    #[test]
    fn sections_order_is_deduplicated_and_completed() {
        let config = normalize(&json!({
            "sections_order": ["diagnosis", 7, "diagnosis", "ghost", "my_labs", "vitals"],
            "custom_sections": [{ "id": "my_labs", "title": "Labs" }, { "id": "imaging" }]
        }));

        assert_eq!(
            config.sections_order,
            ["diagnosis", "my_labs", "vitals", "complaint", "treatment", "notes", "imaging"]
        );
    }

    #[test]
    fn custom_section_ids_are_reconciled() {
        let config = normalize(&json!({
            "custom_sections": [
                { "title": "First" },
                "not an object",
                { "id": "custom_1", "title": "Explicit" },
                { "id": "vitals", "title": "Shadowing builtin" },
                { "id": "custom_1", "title": "Duplicate" },
                { "id": "  ", "fields": [] }
            ]
        }));

        let ids: Vec<(&str, &str)> = config
            .custom_sections
            .iter()
            .map(|c| (c.id.as_str(), c.title.as_str()))
            .collect();
        assert_eq!(
            ids,
            [("custom_2", "First"), ("custom_1", "Explicit"), ("custom_3", "Custom section")]
        );
        assert!(config.sections_order.ends_with(&[
            "custom_2".to_string(),
            "custom_1".to_string(),
            "custom_3".to_string()
        ]));
    }

    #[test]
    fn custom_fields_are_normalized() {
        let config = normalize(&json!({
            "custom_sections": [{
                "id": "dental",
                "title": "Dental",
                "fields": [
                    { "label": "Tooth Number", "type": "number" },
                    { "label": "Tooth Number" },
                    { "id": "surface", "type": "select", "options": ["mesial", 3, "distal"] },
                    { "id": "surface", "label": "Duplicate" },
                    { "label": "Notes", "type": "hologram", "options": ["x"] },
                    { "required": true },
                    42
                ]
            }]
        }));

        let fields = &config.custom_sections[0].fields;
        let summary: Vec<(&str, FieldType)> = fields.iter().map(|f| (f.id.as_str(), f.field_type)).collect();
        assert_eq!(
            summary,
            [
                ("tooth_number", FieldType::Number),
                ("tooth_number_1", FieldType::Text),
                ("surface", FieldType::Select),
                ("notes", FieldType::Text),
                ("field_1", FieldType::Text),
            ]
        );
        assert_eq!(fields[2].options, ["mesial", "distal"]);
        assert!(fields[3].options.is_empty());
        assert!(fields[4].required);
        assert_eq!(fields[4].label, "field_1");
    }

    #[test]
    fn enabled_sections_follow_order() {
        let config = normalize(&json!({
            "sections_order": ["notes", "vitals"],
            "sections": { "treatment": { "enabled": false } },
            "custom_sections": [{ "id": "labs", "enabled": false }, { "id": "imaging" }]
        }));

        let enabled: Vec<&str> = config.enabled_sections().iter().map(|s| s.id).collect();
        assert_eq!(enabled, ["notes", "vitals", "complaint", "diagnosis", "imaging"]);
    }
}
