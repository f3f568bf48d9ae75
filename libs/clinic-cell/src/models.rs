use std::fmt;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::error::AppError;

// ==============================================================================
// CLINIC
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub booking_slug: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialty: Option<String>,
    pub booking_enabled: bool,
    pub slot_duration_minutes: i32,
    #[serde(default)]
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub medical_fields_config: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection shown on the online booking page.
#[derive(Debug, Clone, Serialize)]
pub struct PublicClinicProfile {
    pub name: String,
    pub booking_slug: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialty: Option<String>,
    pub slot_duration_minutes: i32,
    pub working_hours: WorkingHours,
}

impl From<&Clinic> for PublicClinicProfile {
    fn from(clinic: &Clinic) -> Self {
        Self {
            name: clinic.name.clone(),
            booking_slug: clinic.booking_slug.clone(),
            phone: clinic.phone.clone(),
            address: clinic.address.clone(),
            specialty: clinic.specialty.clone(),
            slot_duration_minutes: clinic.slot_duration_minutes,
            working_hours: clinic.working_hours.clone(),
        }
    }
}

pub const MIN_SLOT_MINUTES: i32 = 5;
pub const MAX_SLOT_MINUTES: i32 = 240;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClinicRequest {
    pub name: String,
    pub booking_slug: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialty: Option<String>,
    pub slot_duration_minutes: Option<i32>,
    pub working_hours: Option<WorkingHours>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateClinicRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialty: Option<String>,
    pub booking_enabled: Option<bool>,
    pub slot_duration_minutes: Option<i32>,
    pub working_hours: Option<WorkingHours>,
}

// ==============================================================================
// WORKING HOURS
// ==============================================================================

/// Times are stored as `HH:MM`; `HH:MM:SS` is accepted on input.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayHours {
    pub enabled: bool,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl DayHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { enabled: true, start, end }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkingHours {
    #[serde(default)]
    pub saturday: Option<DayHours>,
    #[serde(default)]
    pub sunday: Option<DayHours>,
    #[serde(default)]
    pub monday: Option<DayHours>,
    #[serde(default)]
    pub tuesday: Option<DayHours>,
    #[serde(default)]
    pub wednesday: Option<DayHours>,
    #[serde(default)]
    pub thursday: Option<DayHours>,
    #[serde(default)]
    pub friday: Option<DayHours>,
}

impl WorkingHours {
    /// Saturday to Thursday, 09:00-17:00. Friday off.
    pub fn standard() -> Self {
        let day = || {
            Some(DayHours::new(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            ))
        };
        Self {
            saturday: day(),
            sunday: day(),
            monday: day(),
            tuesday: day(),
            wednesday: day(),
            thursday: day(),
            friday: None,
        }
    }

    fn slot(&self, day: Weekday) -> Option<&DayHours> {
        match day {
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
        }
    }

    /// Opening hours for a weekday, `None` when the clinic is closed.
    pub fn for_weekday(&self, day: Weekday) -> Option<&DayHours> {
        self.slot(day).filter(|hours| hours.enabled)
    }

    pub fn validate(&self) -> Result<(), String> {
        const DAYS: [Weekday; 7] = [
            Weekday::Sat,
            Weekday::Sun,
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ];
        for day in DAYS {
            if let Some(hours) = self.for_weekday(day) {
                if hours.start >= hours.end {
                    return Err(format!("Working hours for {} must start before they end", day));
                }
            }
        }
        Ok(())
    }
}

// ==============================================================================
// STAFF & PERMISSIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewPatients,
    ManagePatients,
    ViewAppointments,
    ManageAppointments,
    ViewFinance,
    ManageSettings,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::ViewPatients,
        Permission::ManagePatients,
        Permission::ViewAppointments,
        Permission::ManageAppointments,
        Permission::ViewFinance,
        Permission::ManageSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewPatients => "view_patients",
            Permission::ManagePatients => "manage_patients",
            Permission::ViewAppointments => "view_appointments",
            Permission::ManageAppointments => "manage_appointments",
            Permission::ViewFinance => "view_finance",
            Permission::ManageSettings => "manage_settings",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == raw)
    }

    /// A manage permission also grants the matching view permission.
    fn implies(&self, other: Permission) -> bool {
        *self == other
            || matches!(
                (self, other),
                (Permission::ManagePatients, Permission::ViewPatients)
                    | (Permission::ManageAppointments, Permission::ViewAppointments)
            )
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown permission strings stored in the database are ignored.
fn lenient_permissions<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Permission>, D::Error> {
    let raw = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.iter().filter_map(|p| Permission::parse(p)).collect())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secretary {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_permissions", default)]
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSecretaryRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSecretaryRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub permissions: Option<Vec<Permission>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum StaffRole {
    Owner,
    Secretary { secretary_id: Uuid, permissions: Vec<Permission> },
}

/// The caller's membership in a clinic, resolved once per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicAccess {
    pub clinic_id: Uuid,
    pub user_id: String,
    #[serde(flatten)]
    pub role: StaffRole,
}

impl ClinicAccess {
    pub fn owner(clinic_id: Uuid, user_id: &str) -> Self {
        Self {
            clinic_id,
            user_id: user_id.to_string(),
            role: StaffRole::Owner,
        }
    }

    pub fn secretary(clinic_id: Uuid, user_id: &str, secretary_id: Uuid, permissions: Vec<Permission>) -> Self {
        Self {
            clinic_id,
            user_id: user_id.to_string(),
            role: StaffRole::Secretary { secretary_id, permissions },
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self.role, StaffRole::Owner)
    }

    pub fn has(&self, permission: Permission) -> bool {
        match &self.role {
            StaffRole::Owner => true,
            StaffRole::Secretary { permissions, .. } => {
                permissions.iter().any(|held| held.implies(permission))
            }
        }
    }

    pub fn require(&self, permission: Permission) -> Result<(), ClinicError> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(ClinicError::PermissionDenied(permission))
        }
    }

    pub fn require_owner(&self) -> Result<(), ClinicError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(ClinicError::OwnerOnly)
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("Clinic not found")]
    NotFound,

    #[error("You are not a member of any clinic")]
    NoClinicAccess,

    #[error("Missing permission: {0}")]
    PermissionDenied(Permission),

    #[error("Only the clinic owner can do this")]
    OwnerOnly,

    #[error("You already own a clinic")]
    AlreadyExists,

    #[error("Secretary not found")]
    SecretaryNotFound,

    #[error("No account exists for {0}")]
    UnknownAccount(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

impl From<ClinicError> for AppError {
    fn from(error: ClinicError) -> Self {
        match error {
            ClinicError::NotFound | ClinicError::SecretaryNotFound | ClinicError::UnknownAccount(_) => {
                AppError::NotFound(error.to_string())
            }
            ClinicError::NoClinicAccess | ClinicError::PermissionDenied(_) | ClinicError::OwnerOnly => {
                AppError::Forbidden(error.to_string())
            }
            ClinicError::AlreadyExists => AppError::Conflict(error.to_string()),
            ClinicError::Validation(msg) => AppError::ValidationError(msg),
            ClinicError::Database(SupabaseError::Conflict(msg)) => AppError::Conflict(msg),
            ClinicError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn owner_holds_every_permission() {
        let access = ClinicAccess::owner(Uuid::new_v4(), "u1");
        for permission in Permission::ALL {
            assert!(access.has(permission));
        }
        assert!(access.require_owner().is_ok());
    }

    #[test]
    fn secretary_holds_only_granted_permissions() {
        let access = ClinicAccess::secretary(
            Uuid::new_v4(),
            "u2",
            Uuid::new_v4(),
            vec![Permission::ManageAppointments],
        );

        assert!(access.has(Permission::ManageAppointments));
        assert!(access.has(Permission::ViewAppointments));
        assert!(!access.has(Permission::ViewPatients));
        assert!(!access.has(Permission::ViewFinance));
        assert_matches!(
            access.require(Permission::ManageSettings),
            Err(ClinicError::PermissionDenied(Permission::ManageSettings))
        );
        assert_matches!(access.require_owner(), Err(ClinicError::OwnerOnly));
    }

    #[test]
    fn working_hours_accept_short_and_long_times() {
        let hours: WorkingHours = serde_json::from_value(json!({
            "sunday": { "enabled": true, "start": "09:00", "end": "17:30:00" },
            "friday": { "enabled": false, "start": "09:00", "end": "12:00" }
        }))
        .unwrap();

        let sunday = hours.for_weekday(Weekday::Sun).unwrap();
        assert_eq!(sunday.end, NaiveTime::from_hms_opt(17, 30, 0).unwrap());
        assert!(hours.for_weekday(Weekday::Fri).is_none());
        assert!(hours.for_weekday(Weekday::Mon).is_none());
        assert!(hours.validate().is_ok());

        let serialized = serde_json::to_value(&hours).unwrap();
        assert_eq!(serialized["sunday"]["end"], "17:30");
    }

    #[test]
    fn inverted_working_hours_are_rejected() {
        let mut hours = WorkingHours::standard();
        hours.monday = Some(DayHours::new(
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        ));
        assert!(hours.validate().is_err());
    }

    #[test]
    fn unknown_permission_strings_are_dropped() {
        let secretary: Secretary = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "clinic_id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "name": "Sara",
            "email": "sara@example.com",
            "phone": null,
            "permissions": ["view_patients", "launch_rockets"],
            "is_active": true,
            "created_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(secretary.permissions, vec![Permission::ViewPatients]);
    }
}
