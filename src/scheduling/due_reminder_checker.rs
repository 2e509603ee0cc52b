use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    common::Clock,
    storage::{ReminderStorage, StorageError},
};

use super::ReminderDeliveryChannel;


/// Periodically marks due reminders as completed and delivers them.
pub struct DueReminderChecker {
    storage: Arc<dyn ReminderStorage>,
    delivery_channel: Arc<dyn ReminderDeliveryChannel>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl DueReminderChecker {
    pub fn new(
        storage: Arc<dyn ReminderStorage>,
        delivery_channel: Arc<dyn ReminderDeliveryChannel>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            storage,
            delivery_channel,
            clock,
            interval,
        }
    }

    /// Delivers every reminder that became due since the last check and
    /// returns how many there were.
    pub async fn check(&self) -> Result<usize, StorageError> {
        let due = self.storage.take_due(self.clock.now()).await?;
        for reminder in &due {
            self.delivery_channel.send_reminder_notification(reminder).await;
        }

        Ok(due.len())
    }

    pub fn spawn(self, cancellation_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancellation_token).await })
    }

    pub async fn run(&self, cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    log::info!("Due reminder checker stopped");
                    break;
                }
                _ = interval.tick() => {
                    match self.check().await {
                        Ok(0) => {}
                        Ok(count) => log::info!("Delivered {} due reminders", count),
                        Err(err) => log::error!("Reminder checker error: {}", err),
                    }
                }
            }
        }
    }
}
