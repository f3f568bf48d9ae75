//! Per-clinic configuration of the medical record form: which built-in
//! sections are shown, in what order, and any clinic-defined custom sections.
//!
//! Stored configurations are user-edited JSON and may be partial or stale;
//! everything read from storage goes through [`normalize`] first.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{CustomSection, FieldTemplate, FieldType, MedicalFieldsConfig, SectionConfig};
pub use router::medical_fields_routes;
pub use services::normalizer::{default_config, normalize};
pub use services::validation::validate_record;
