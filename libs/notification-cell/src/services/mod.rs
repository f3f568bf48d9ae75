pub mod instance;
pub mod onesignal;
pub mod phone;
pub mod push;
pub mod reminders;
pub mod whatsapp;

pub use instance::InstanceService;
pub use push::PushService;
pub use reminders::ReminderService;
