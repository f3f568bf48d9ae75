//! Appointment scheduling: the status lifecycle, the slot engine and the
//! public online-booking page.
//!
//! Dates and times are clinic-local wall-clock values (`appointment_date`,
//! `appointment_time`); "now" is taken from the server's local clock.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Appointment, AppointmentError, AppointmentSource, AppointmentStatus, MinuteRange};
pub use router::{appointment_routes, booking_routes};
pub use services::slots::available_slots;
pub use services::{AppointmentLifecycleService, AppointmentService, PublicBookingService};
