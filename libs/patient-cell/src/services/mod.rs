pub mod patient;
pub mod validation;
pub mod visit;

pub use patient::PatientService;
pub use visit::VisitService;
