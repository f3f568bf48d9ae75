use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use clinic_cell::ClinicError;
use patient_cell::PatientError;
use shared_database::SupabaseError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Active appointments occupy their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentSource {
    Clinic,
    Online,
}

impl AppointmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentSource::Clinic => "clinic",
            AppointmentSource::Online => "online",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "clock")]
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub source: AppointmentSource,
    pub reason: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn interval(&self) -> MinuteRange {
        MinuteRange::starting_at(self.appointment_time, self.duration_minutes)
    }
}

/// Half-open `[start, end)` range in minutes since midnight. May extend past
/// 24:00 for slots that end after midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteRange {
    pub start: i64,
    pub end: i64,
}

impl MinuteRange {
    pub fn starting_at(time: NaiveTime, duration_minutes: i32) -> Self {
        let start = i64::from(time.num_seconds_from_midnight() / 60);
        Self {
            start,
            end: start + i64::from(duration_minutes.max(0)),
        }
    }

    pub fn overlaps(&self, other: &MinuteRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "clock")]
    pub appointment_time: NaiveTime,
    /// Defaults to the clinic's slot duration.
    pub duration_minutes: Option<i32>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleRequest {
    pub appointment_date: NaiveDate,
    #[serde(with = "clock")]
    pub appointment_time: NaiveTime,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub patient_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicBookingRequest {
    pub full_name: String,
    pub phone: String,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub clinic_name: String,
    pub appointment_date: NaiveDate,
    #[serde(with = "clock")]
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
}

/// Times go out as `HH:MM`; `HH:MM:SS` from Postgres `time` columns is
/// accepted on the way in.
pub mod clock {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn format(time: &NaiveTime) -> String {
        time.format("%H:%M").to_string()
    }

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid time: {}", raw)))
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment slot not available")]
    SlotNotAvailable,

    #[error("Cannot change appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment cannot be modified in current status: {0}")]
    NotModifiable(AppointmentStatus),

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Online booking is not available for this clinic")]
    BookingUnavailable,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Clinic(#[from] ClinicError),

    #[error(transparent)]
    Patient(PatientError),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

impl From<PatientError> for AppointmentError {
    fn from(error: PatientError) -> Self {
        match error {
            PatientError::NotFound => AppointmentError::PatientNotFound,
            PatientError::Access(inner) => AppointmentError::Clinic(inner),
            other => AppointmentError::Patient(other),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::BookingUnavailable => AppError::NotFound(error.to_string()),
            AppointmentError::SlotNotAvailable => AppError::Conflict(error.to_string()),
            AppointmentError::InvalidStatusTransition { .. } | AppointmentError::NotModifiable(_) => {
                AppError::Conflict(error.to_string())
            }
            AppointmentError::InvalidTime(_) => AppError::BadRequest(error.to_string()),
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Clinic(inner) => inner.into(),
            AppointmentError::Patient(inner) => inner.into(),
            AppointmentError::Database(SupabaseError::Conflict(msg)) => AppError::Conflict(msg),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn ranges_are_half_open() {
        let first = MinuteRange::starting_at(at(9, 0), 30);
        let second = MinuteRange::starting_at(at(9, 30), 30);
        let overlapping = MinuteRange::starting_at(at(9, 15), 30);

        assert!(!first.overlaps(&second));
        assert!(first.overlaps(&overlapping));
        assert!(overlapping.overlaps(&second));
    }

    #[test]
    fn clock_accepts_both_postgres_and_form_formats() {
        assert_eq!(clock::parse("09:30"), Some(at(9, 30)));
        assert_eq!(clock::parse("09:30:00"), Some(at(9, 30)));
        assert_eq!(clock::parse("9.30"), None);
        assert_eq!(clock::format(&at(14, 5)), "14:05");
    }

    #[test]
    fn late_slot_extends_past_midnight() {
        let range = MinuteRange::starting_at(at(23, 45), 30);
        assert_eq!(range.end, 24 * 60 + 15);
    }

    #[test]
    fn status_round_trips_through_serde_names() {
        let status: AppointmentStatus = serde_json::from_str("\"no_show\"").unwrap();
        assert_eq!(status, AppointmentStatus::NoShow);
        assert_eq!(status.to_string(), "no_show");
        assert!(!status.is_active());
        assert!(AppointmentStatus::Pending.is_active());
    }

    #[test]
    fn patient_errors_are_translated() {
        assert_matches!(
            AppointmentError::from(PatientError::NotFound),
            AppointmentError::PatientNotFound
        );
        assert_matches!(
            AppointmentError::from(PatientError::Access(ClinicError::NoClinicAccess)),
            AppointmentError::Clinic(ClinicError::NoClinicAccess)
        );
    }

    #[test]
    fn slot_conflict_maps_to_409() {
        let app_error: AppError = AppointmentError::SlotNotAvailable.into();
        assert_matches!(app_error, AppError::Conflict(_));
    }
}
