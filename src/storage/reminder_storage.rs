use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::reminder::{Reminder, ReminderId};

use super::{NewReminder, model::UpdateReminder, reminder_list::ReminderList};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Reminder {0} does not exist")]
    NotFound(ReminderId),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ReminderStorage: Send + Sync {
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StorageError>;
    async fn update(&self, reminder: UpdateReminder) -> Result<Reminder, StorageError>;
    async fn delete(&self, id: ReminderId) -> Result<Reminder, StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError>;
    /// Reminders that are not completed and not yet due, earliest first.
    async fn get_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, StorageError>;
    /// Returns reminders whose time has come and marks them completed.
    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, StorageError>;
}

pub struct InMemoryReminderStorage {
    store: RwLock<ReminderList>,
}

impl InMemoryReminderStorage {
    pub fn new() -> Self {
        InMemoryReminderStorage {
            store: RwLock::new(ReminderList::default()),
        }
    }
}

impl Default for InMemoryReminderStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderStorage for InMemoryReminderStorage {
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StorageError> {
        let mut store = self.store.write().await;
        let reminder = store.insert(reminder);
        log::info!("Stored reminder with id {}", reminder.id);
        Ok(reminder)
    }

    async fn update(&self, reminder: UpdateReminder) -> Result<Reminder, StorageError> {
        self.store.write().await.update(reminder)
    }

    async fn delete(&self, id: ReminderId) -> Result<Reminder, StorageError> {
        self.store.write().await.delete(id)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.store.write().await.clear();
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError> {
        Ok(self.store.read().await.all())
    }

    async fn get_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, StorageError> {
        Ok(self.store.read().await.upcoming(now))
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, StorageError> {
        Ok(self.store.write().await.take_due(now))
    }
}
