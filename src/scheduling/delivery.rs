use async_trait::async_trait;

use crate::reminder::Reminder;

#[async_trait]
pub trait ReminderDeliveryChannel: Send + Sync + 'static {
    async fn send_reminder_notification(&self, reminder: &Reminder);
}

/// Announces due reminders through the log.
pub struct LogDeliveryChannel;

#[async_trait]
impl ReminderDeliveryChannel for LogDeliveryChannel {
    async fn send_reminder_notification(&self, reminder: &Reminder) {
        log::info!("Reminder due: {}", reminder.text);
    }
}
