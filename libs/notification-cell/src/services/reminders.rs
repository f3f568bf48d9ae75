use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{NotificationError, ReminderCandidate, ReminderReport, STATUS_CONNECTED};
use crate::services::phone::normalize_phone;
use crate::services::whatsapp::WhatsAppClient;

const MAX_CONCURRENT_SENDS: usize = 5;

#[derive(Debug, Deserialize)]
struct ConnectedInstance {
    clinic_id: Uuid,
    instance_name: String,
}

/// Bilingual reminder text.
pub fn reminder_message(patient: &str, clinic: &str, date: NaiveDate, time: &str) -> String {
    let date = date.format("%Y-%m-%d");
    format!(
        "مرحباً {patient}، نذكرك بموعدك في {clinic} يوم {date} الساعة {time}.\n\
         Hello {patient}, this is a reminder of your appointment at {clinic} on {date} at {time}."
    )
}

fn display_time(raw: &str) -> String {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[derive(Debug)]
struct Delivery {
    appointment_id: Uuid,
    instance_name: String,
    number: String,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Unflagged,
    Failed,
}

#[derive(Debug)]
enum Prepared {
    Ready(Delivery),
    Skip,
}

pub struct ReminderService {
    supabase: SupabaseClient,
    config: AppConfig,
}

impl ReminderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            config: config.clone(),
        }
    }

    async fn candidates(&self, date: NaiveDate) -> Result<Vec<ReminderCandidate>, NotificationError> {
        let path = format!(
            "/rest/v1/appointments?appointment_date=eq.{}&status=in.(pending,confirmed)&reminder_sent=eq.false\
             &select=id,clinic_id,appointment_date,appointment_time,patients(full_name,phone),clinics(name)",
            date
        );
        self.supabase
            .select(&path, None)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| NotificationError::Decode(e.to_string())))
            .collect()
    }

    async fn connected_instances(&self) -> Result<HashMap<Uuid, String>, NotificationError> {
        let path = format!(
            "/rest/v1/whatsapp_instances?status=eq.{}&select=clinic_id,instance_name",
            STATUS_CONNECTED
        );
        let rows = self.supabase.select(&path, None).await?;
        let mut instances = HashMap::new();
        for row in rows {
            let instance: ConnectedInstance =
                serde_json::from_value(row).map_err(|e| NotificationError::Decode(e.to_string()))?;
            instances.insert(instance.clinic_id, instance.instance_name);
        }
        Ok(instances)
    }

    fn prepare(candidate: ReminderCandidate, instances: &HashMap<Uuid, String>) -> Prepared {
        let Some(instance_name) = instances.get(&candidate.clinic_id) else {
            return Prepared::Skip;
        };
        let Some(patient) = candidate.patients else {
            return Prepared::Skip;
        };
        let Some(number) = patient.phone.as_deref().and_then(normalize_phone) else {
            return Prepared::Skip;
        };
        let clinic_name = candidate
            .clinics
            .map(|c| c.name)
            .unwrap_or_else(|| "the clinic".to_string());

        Prepared::Ready(Delivery {
            appointment_id: candidate.id,
            instance_name: instance_name.clone(),
            number,
            text: reminder_message(
                &patient.full_name,
                &clinic_name,
                candidate.appointment_date,
                &display_time(&candidate.appointment_time),
            ),
        })
    }

    async fn deliver(&self, client: &WhatsAppClient, delivery: Delivery) -> Outcome {
        if let Err(e) = client
            .send_text(&delivery.instance_name, &delivery.number, &delivery.text)
            .await
        {
            warn!(appointment_id = %delivery.appointment_id, "Reminder not sent: {}", e);
            return Outcome::Failed;
        }

        let filter = format!("id=eq.{}", delivery.appointment_id);
        if let Err(e) = self
            .supabase
            .patch_returning("appointments", &filter, json!({ "reminder_sent": true }), None)
            .await
        {
            warn!(appointment_id = %delivery.appointment_id, "Reminder sent but flag not stored: {}", e);
            return Outcome::Unflagged;
        }
        Outcome::Sent
    }

    /// Send reminders for every active appointment on `date` that has not had one.
    #[instrument(skip(self))]
    pub async fn send_reminders(&self, date: NaiveDate) -> Result<ReminderReport, NotificationError> {
        let client = WhatsAppClient::new(&self.config)?;
        let candidates = self.candidates(date).await?;
        let instances = self.connected_instances().await?;

        let mut report = ReminderReport {
            date: Some(date),
            ..ReminderReport::default()
        };

        let mut deliveries = Vec::new();
        for candidate in candidates {
            match Self::prepare(candidate, &instances) {
                Prepared::Ready(delivery) => deliveries.push(delivery),
                Prepared::Skip => report.skipped += 1,
            }
        }

        let results: Vec<Outcome> = stream::iter(deliveries)
            .map(|delivery| self.deliver(&client, delivery))
            .buffer_unordered(MAX_CONCURRENT_SENDS)
            .collect()
            .await;

        for outcome in results {
            match outcome {
                Outcome::Sent => report.sent += 1,
                Outcome::Unflagged => report.unflagged += 1,
                Outcome::Failed => report.failed += 1,
            }
        }

        info!(
            date = %date,
            sent = report.sent,
            unflagged = report.unflagged,
            failed = report.failed,
            skipped = report.skipped,
            "WhatsApp reminders dispatched"
        );
        Ok(report)
    }
}
