use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Checkbox,
}

impl FieldType {
    /// Unknown type names fall back to plain text.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "textarea" => FieldType::Textarea,
            "number" => FieldType::Number,
            "date" => FieldType::Date,
            "select" => FieldType::Select,
            "checkbox" => FieldType::Checkbox,
            _ => FieldType::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldTemplate {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldTemplate {
    pub fn new(id: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            field_type,
            required: false,
            enabled: true,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionConfig {
    pub enabled: bool,
    pub label: String,
    pub fields: Vec<FieldTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomSection {
    pub id: String,
    pub title: String,
    pub enabled: bool,
    pub fields: Vec<FieldTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalFieldsConfig {
    pub sections_order: Vec<String>,
    pub sections: BTreeMap<String, SectionConfig>,
    pub custom_sections: Vec<CustomSection>,
}

/// Borrowed view over either a built-in or a custom section.
#[derive(Debug, Clone, Copy)]
pub struct SectionRef<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub enabled: bool,
    pub fields: &'a [FieldTemplate],
}

impl MedicalFieldsConfig {
    pub fn section(&self, id: &str) -> Option<SectionRef<'_>> {
        if let Some((key, section)) = self.sections.get_key_value(id) {
            return Some(SectionRef {
                id: key,
                label: &section.label,
                enabled: section.enabled,
                fields: &section.fields,
            });
        }
        self.custom_sections
            .iter()
            .find(|custom| custom.id == id)
            .map(|custom| SectionRef {
                id: &custom.id,
                label: &custom.title,
                enabled: custom.enabled,
                fields: &custom.fields,
            })
    }

    /// Enabled sections in display order.
    pub fn enabled_sections(&self) -> Vec<SectionRef<'_>> {
        self.sections_order
            .iter()
            .filter_map(|id| self.section(id))
            .filter(|section| section.enabled)
            .collect()
    }
}
