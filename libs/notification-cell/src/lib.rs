//! Push notifications, WhatsApp appointment reminders and WhatsApp
//! instance management.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{NotificationError, PushOutcome, ReminderReport, WhatsAppInstance};
pub use router::notification_routes;
pub use services::{InstanceService, PushService, ReminderService};
