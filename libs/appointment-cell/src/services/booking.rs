use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, instrument};

use clinic_cell::{Clinic, ClinicError, ClinicService, PublicClinicProfile};
use patient_cell::models::CreatePatientRequest;
use patient_cell::services::validation::{validate_full_name, validate_phone};
use patient_cell::PatientService;
use shared_config::AppConfig;

use crate::models::{
    clock, AppointmentError, AppointmentSource, AppointmentStatus, BookingConfirmation,
    PublicBookingRequest,
};
use crate::services::appointment::{AppointmentService, NewAppointment};
use crate::services::slots::{available_slots, future_slots};

#[derive(Debug, Serialize)]
pub struct Availability {
    pub clinic: PublicClinicProfile,
    pub date: NaiveDate,
    pub slots: Vec<String>,
}

/// Unauthenticated booking page. Every database call uses the service-role
/// key, scoped by the clinic resolved from its booking slug.
pub struct PublicBookingService {
    clinics: ClinicService,
    patients: PatientService,
    appointments: AppointmentService,
}

impl PublicBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            clinics: ClinicService::new(config),
            patients: PatientService::new(config),
            appointments: AppointmentService::new(config),
        }
    }

    async fn bookable_clinic(&self, slug: &str) -> Result<Clinic, AppointmentError> {
        self.clinics
            .get_by_booking_slug(slug)
            .await
            .map_err(|e| match e {
                ClinicError::NotFound => AppointmentError::BookingUnavailable,
                other => other.into(),
            })
    }

    async fn free_slots(
        &self,
        clinic: &Clinic,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<chrono::NaiveTime>, AppointmentError> {
        let booked = self
            .appointments
            .booked_ranges(clinic.id, date, None, None)
            .await?;
        let slots = available_slots(&clinic.working_hours, clinic.slot_duration_minutes, date, &booked);
        Ok(future_slots(slots, date, now))
    }

    pub async fn availability(
        &self,
        slug: &str,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Availability, AppointmentError> {
        let clinic = self.bookable_clinic(slug).await?;

        let slots = if date < now.date() {
            Vec::new()
        } else {
            self.free_slots(&clinic, date, now).await?
        };

        Ok(Availability {
            clinic: PublicClinicProfile::from(&clinic),
            date,
            slots: slots.iter().map(clock::format).collect(),
        })
    }

    #[instrument(skip(self, request, now), fields(date = %request.date))]
    pub async fn book(
        &self,
        slug: &str,
        request: PublicBookingRequest,
        now: NaiveDateTime,
    ) -> Result<BookingConfirmation, AppointmentError> {
        let problems: Vec<String> = [validate_full_name(&request.full_name), validate_phone(&request.phone)]
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if !problems.is_empty() {
            return Err(AppointmentError::Validation(problems.join("; ")));
        }
        if request.date < now.date() {
            return Err(AppointmentError::InvalidTime(
                "Cannot book a date in the past".to_string(),
            ));
        }

        let clinic = self.bookable_clinic(slug).await?;

        let free = self.free_slots(&clinic, request.date, now).await?;
        if !free.contains(&request.time) {
            return Err(AppointmentError::SlotNotAvailable);
        }

        let patient = match self
            .patients
            .find_by_phone(clinic.id, &request.phone, None)
            .await?
        {
            Some(existing) => existing,
            None => {
                self.patients
                    .create_patient(
                        clinic.id,
                        CreatePatientRequest {
                            full_name: request.full_name.clone(),
                            phone: request.phone.clone(),
                            gender: None,
                            date_of_birth: None,
                            address: None,
                            notes: None,
                            medical_history: None,
                        },
                        None,
                    )
                    .await?
            }
        };

        let appointment = self
            .appointments
            .insert_appointment(
                NewAppointment {
                    clinic_id: clinic.id,
                    patient_id: patient.id,
                    appointment_date: request.date,
                    appointment_time: request.time,
                    duration_minutes: clinic.slot_duration_minutes,
                    status: AppointmentStatus::Pending,
                    source: AppointmentSource::Online,
                    reason: request.reason,
                    notes: None,
                },
                None,
            )
            .await?;

        info!(
            "Online booking {} for clinic {} on {} {}",
            appointment.id,
            clinic.id,
            appointment.appointment_date,
            clock::format(&appointment.appointment_time)
        );

        Ok(BookingConfirmation {
            appointment_id: appointment.id,
            clinic_name: clinic.name,
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
            status: appointment.status,
        })
    }
}
