pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Gender, Patient, PatientError, Visit};
pub use router::patient_routes;
pub use services::{PatientService, VisitService};
