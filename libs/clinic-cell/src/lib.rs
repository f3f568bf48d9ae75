//! Clinics are the tenants of the system. This cell owns clinic profiles,
//! secretary accounts and the permission model every other cell checks
//! through [`ClinicAccess`].

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Clinic, ClinicAccess, ClinicError, DayHours, Permission, PublicClinicProfile, Secretary, StaffRole,
    WorkingHours,
};
pub use router::clinic_routes;
pub use services::access::ClinicAccessService;
pub use services::clinic::ClinicService;
pub use services::staff::StaffService;
