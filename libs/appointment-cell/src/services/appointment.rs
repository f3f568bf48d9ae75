use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use clinic_cell::models::{MAX_SLOT_MINUTES, MIN_SLOT_MINUTES};
use clinic_cell::{ClinicService, WorkingHours};
use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{
    clock, Appointment, AppointmentError, AppointmentQuery, AppointmentSource, AppointmentStatus,
    CreateAppointmentRequest, MinuteRange, RescheduleRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::slots::within_working_hours;

const DEFAULT_LIST_LIMIT: u32 = 100;

/// Row shape for inserts; shared by staff and online bookings.
#[derive(Debug, Serialize)]
pub struct NewAppointment {
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
}

#[derive(Debug, Deserialize)]
struct BookedRow {
    id: Uuid,
    #[serde(with = "clock")]
    appointment_time: NaiveTime,
    duration_minutes: i32,
}

fn decode_appointment(row: Value) -> Result<Appointment, AppointmentError> {
    serde_json::from_value(row).map_err(|e| AppointmentError::Validation(e.to_string()))
}

fn validate_duration(minutes: i32) -> Result<(), AppointmentError> {
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&minutes) {
        return Err(AppointmentError::Validation(format!(
            "Duration must be between {} and {} minutes",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
        )));
    }
    Ok(())
}

fn ensure_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), AppointmentError> {
    if date < today {
        return Err(AppointmentError::InvalidTime(
            "Appointment date is in the past".to_string(),
        ));
    }
    Ok(())
}

fn ensure_within_hours(
    working_hours: &WorkingHours,
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: i32,
) -> Result<(), AppointmentError> {
    if !within_working_hours(working_hours, date, time, duration_minutes) {
        return Err(AppointmentError::InvalidTime(
            "Appointment is outside clinic working hours".to_string(),
        ));
    }
    Ok(())
}

pub struct AppointmentService {
    supabase: SupabaseClient,
    clinics: ClinicService,
    patients: PatientService,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clinics: ClinicService::new(config),
            patients: PatientService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Intervals held by active appointments on `date`, optionally ignoring one.
    pub async fn booked_ranges(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<Vec<MinuteRange>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?clinic_id=eq.{}&appointment_date=eq.{}&status=in.(pending,confirmed)&select=id,appointment_time,duration_minutes",
            clinic_id, date
        );
        let rows = self.supabase.select(&path, auth_token).await?;

        let mut ranges = Vec::with_capacity(rows.len());
        for row in rows {
            let booked: BookedRow =
                serde_json::from_value(row).map_err(|e| AppointmentError::Validation(e.to_string()))?;
            if Some(booked.id) == exclude {
                continue;
            }
            ranges.push(MinuteRange::starting_at(booked.appointment_time, booked.duration_minutes));
        }
        Ok(ranges)
    }

    pub async fn ensure_slot_free(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i32,
        exclude: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<(), AppointmentError> {
        let requested = MinuteRange::starting_at(time, duration_minutes);
        let booked = self.booked_ranges(clinic_id, date, exclude, auth_token).await?;
        if booked.iter().any(|range| range.overlaps(&requested)) {
            warn!("Slot {} {} is taken in clinic {}", date, clock::format(&time), clinic_id);
            return Err(AppointmentError::SlotNotAvailable);
        }
        Ok(())
    }

    /// Raw insert. Callers are responsible for the overlap check.
    pub async fn insert_appointment(
        &self,
        appointment: NewAppointment,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now().to_rfc3339();
        let mut row = json!(appointment);
        if let Some(map) = row.as_object_mut() {
            map.insert("reminder_sent".to_string(), json!(false));
            map.insert("created_at".to_string(), json!(now));
            map.insert("updated_at".to_string(), json!(now));
        }

        let created = self.supabase.insert_returning("appointments", row, auth_token).await?;
        decode_appointment(created)
    }

    /// Staff booking. `today` is the clinic's local date.
    #[instrument(skip(self, request, auth_token))]
    pub async fn create_appointment(
        &self,
        clinic_id: Uuid,
        request: CreateAppointmentRequest,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        ensure_not_past(request.appointment_date, today)?;

        self.patients
            .get_patient(clinic_id, request.patient_id, Some(auth_token))
            .await?;

        let clinic = self.clinics.get_clinic(clinic_id, auth_token).await?;
        let duration = request
            .duration_minutes
            .unwrap_or(clinic.slot_duration_minutes);
        validate_duration(duration)?;
        ensure_within_hours(
            &clinic.working_hours,
            request.appointment_date,
            request.appointment_time,
            duration,
        )?;

        self.ensure_slot_free(
            clinic_id,
            request.appointment_date,
            request.appointment_time,
            duration,
            None,
            Some(auth_token),
        )
        .await?;

        let appointment = self
            .insert_appointment(
                NewAppointment {
                    clinic_id,
                    patient_id: request.patient_id,
                    appointment_date: request.appointment_date,
                    appointment_time: request.appointment_time,
                    duration_minutes: duration,
                    status: AppointmentStatus::Confirmed,
                    source: AppointmentSource::Clinic,
                    reason: request.reason,
                    notes: request.notes,
                },
                Some(auth_token),
            )
            .await?;

        info!("Appointment {} created for patient {}", appointment.id, appointment.patient_id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        clinic_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&clinic_id=eq.{}",
            appointment_id, clinic_id
        );
        let row = self
            .supabase
            .select_one(&path, Some(auth_token))
            .await?
            .ok_or(AppointmentError::NotFound)?;
        decode_appointment(row)
    }

    pub async fn list_appointments(
        &self,
        clinic_id: Uuid,
        query: &AppointmentQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!("/rest/v1/appointments?clinic_id=eq.{}", clinic_id);
        if let Some(date) = query.date {
            path.push_str(&format!("&appointment_date=eq.{}", date));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        if let Some(patient_id) = query.patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }
        path.push_str(&format!(
            "&order=appointment_date.asc,appointment_time.asc&limit={}&offset={}",
            query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
            query.offset.unwrap_or(0)
        ));
        debug!("Listing appointments: {}", path);

        let rows = self.supabase.select(&path, Some(auth_token)).await?;
        rows.into_iter().map(decode_appointment).collect()
    }

    pub async fn today(
        &self,
        clinic_id: Uuid,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query = AppointmentQuery {
            date: Some(today),
            ..Default::default()
        };
        self.list_appointments(clinic_id, &query, auth_token).await
    }

    async fn patch(
        &self,
        clinic_id: Uuid,
        appointment_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let filter = format!("id=eq.{}&clinic_id=eq.{}", appointment_id, clinic_id);
        let row = self
            .supabase
            .patch_returning("appointments", &filter, body, Some(auth_token))
            .await
            .map_err(|e| match e {
                SupabaseError::Empty(_) => AppointmentError::NotFound,
                other => other.into(),
            })?;
        decode_appointment(row)
    }

    #[instrument(skip(self, auth_token))]
    pub async fn update_status(
        &self,
        clinic_id: Uuid,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(clinic_id, appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(current.status, new_status)?;

        let updated = self
            .patch(
                clinic_id,
                appointment_id,
                json!({
                    "status": new_status,
                    "updated_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        info!("Appointment {} moved {} -> {}", appointment_id, current.status, new_status);
        Ok(updated)
    }

    /// Move an active appointment. The new slot is checked against every
    /// other active appointment and the reminder flag is cleared.
    #[instrument(skip(self, request, auth_token))]
    pub async fn reschedule(
        &self,
        clinic_id: Uuid,
        appointment_id: Uuid,
        request: RescheduleRequest,
        today: NaiveDate,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(clinic_id, appointment_id, auth_token).await?;
        self.lifecycle.ensure_reschedulable(current.status)?;
        ensure_not_past(request.appointment_date, today)?;

        let duration = request.duration_minutes.unwrap_or(current.duration_minutes);
        validate_duration(duration)?;
        let clinic = self.clinics.get_clinic(clinic_id, auth_token).await?;
        ensure_within_hours(
            &clinic.working_hours,
            request.appointment_date,
            request.appointment_time,
            duration,
        )?;

        self.ensure_slot_free(
            clinic_id,
            request.appointment_date,
            request.appointment_time,
            duration,
            Some(appointment_id),
            Some(auth_token),
        )
        .await?;

        let updated = self
            .patch(
                clinic_id,
                appointment_id,
                json!({
                    "appointment_date": request.appointment_date,
                    "appointment_time": clock::format(&request.appointment_time),
                    "duration_minutes": duration,
                    "reminder_sent": false,
                    "updated_at": Utc::now().to_rfc3339()
                }),
                auth_token,
            )
            .await?;

        info!(
            "Appointment {} rescheduled to {} {}",
            appointment_id,
            request.appointment_date,
            clock::format(&request.appointment_time)
        );
        Ok(updated)
    }
}
