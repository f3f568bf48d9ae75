use chrono::NaiveDate;
use serde_json::Value;

use crate::models::{FieldTemplate, FieldType, MedicalFieldsConfig};

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn check_type(field: &FieldTemplate, value: &Value) -> Option<String> {
    let ok = match field.field_type {
        FieldType::Text | FieldType::Textarea => value.is_string(),
        FieldType::Number => match value {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        },
        FieldType::Checkbox => value.is_boolean(),
        FieldType::Select => value
            .as_str()
            .map(|choice| field.options.iter().any(|option| option == choice))
            .unwrap_or(false),
        FieldType::Date => value
            .as_str()
            .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
            .unwrap_or(false),
    };

    if ok {
        None
    } else {
        Some(match field.field_type {
            FieldType::Select => format!("{} must be one of: {}", field.label, field.options.join(", ")),
            FieldType::Date => format!("{} must be a date in YYYY-MM-DD format", field.label),
            FieldType::Number => format!("{} must be a number", field.label),
            FieldType::Checkbox => format!("{} must be true or false", field.label),
            FieldType::Text | FieldType::Textarea => format!("{} must be text", field.label),
        })
    }
}

/// Check a visit's `medical_data` against the clinic's normalized layout.
/// Collects every problem instead of stopping at the first.
pub fn validate_record(config: &MedicalFieldsConfig, data: &Value) -> Result<(), Vec<String>> {
    let empty = serde_json::Map::new();
    let record = match data {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(vec!["medical_data must be an object".to_string()]),
    };

    let mut errors = Vec::new();

    for (section_id, section_value) in record {
        match config.section(section_id) {
            None => errors.push(format!("Unknown section: {}", section_id)),
            Some(section) if !section.enabled => {
                errors.push(format!("Section is disabled: {}", section.label))
            }
            Some(_) if !section_value.is_object() && !section_value.is_null() => {
                errors.push(format!("Section {} must be an object", section_id))
            }
            Some(_) => {}
        }
    }

    for section in config.enabled_sections() {
        let values = record.get(section.id).and_then(Value::as_object);

        for field in section.fields.iter().filter(|f| f.enabled) {
            let value = values.and_then(|v| v.get(&field.id));
            match value {
                Some(v) if !is_blank(v) => {
                    if let Some(problem) = check_type(field, v) {
                        errors.push(problem);
                    }
                }
                _ if field.required => errors.push(format!("{} is required", field.label)),
                _ => {}
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
