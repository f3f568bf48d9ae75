use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use clinic_cell::ClinicError;
use shared_database::SupabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub medical_history: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth
            .and_then(|dob| today.years_since(dob))
    }
}

/// Gender stays a string here so an unknown value is a 400 with a message
/// rather than a body-deserialization rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub full_name: String,
    pub phone: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientSearchQuery {
    /// Matched against name and phone.
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

impl PatientSearchQuery {
    pub fn page(&self) -> (u32, u32) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (limit, self.offset.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub visit_date: NaiveDate,
    #[serde(default)]
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVisitRequest {
    pub appointment_id: Option<Uuid>,
    /// Defaults to today.
    pub visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid medical record: {}", .0.join("; "))]
    InvalidRecord(Vec<String>),

    #[error(transparent)]
    Access(#[from] ClinicError),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

impl From<PatientError> for AppError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::NotFound => AppError::NotFound(error.to_string()),
            PatientError::Validation(msg) => AppError::ValidationError(msg),
            PatientError::InvalidRecord(_) => AppError::ValidationError(error.to_string()),
            PatientError::Access(inner) => inner.into(),
            PatientError::Database(SupabaseError::Conflict(msg)) => AppError::Conflict(msg),
            PatientError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
