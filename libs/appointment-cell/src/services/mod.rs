pub mod appointment;
pub mod booking;
pub mod lifecycle;
pub mod slots;

pub use appointment::AppointmentService;
pub use booking::PublicBookingService;
pub use lifecycle::AppointmentLifecycleService;
