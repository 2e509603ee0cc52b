use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::reminder::{Reminder, ReminderId};

use super::{
    NewReminder, ReminderStorage, StorageError, UpdateReminder, reminder_list::ReminderList,
};

/// Keeps reminders as a pretty printed JSON list on disk.
///
/// Every change is applied to a copy of the list, written out, and only then
/// made visible, all under the same write guard. A failed write leaves both
/// the file and the in-memory list untouched.
pub struct JsonFileReminderStorage {
    path: PathBuf,
    store: RwLock<ReminderList>,
}

impl JsonFileReminderStorage {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let list = load(&path).await?;

        Ok(Self {
            path,
            store: RwLock::new(list),
        })
    }

    async fn modify<T>(
        &self,
        change: impl FnOnce(&mut ReminderList) -> Result<T, StorageError> + Send,
    ) -> Result<T, StorageError>
    where
        T: Send,
    {
        let mut store = self.store.write().await;
        let mut updated = store.clone();
        let result = change(&mut updated)?;

        save(&self.path, &updated).await?;
        *store = updated;
        Ok(result)
    }
}

async fn load(path: &Path) -> Result<ReminderList, StorageError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ReminderList::default()),
        Err(err) => return Err(err.into()),
    };

    match serde_json::from_slice(&content) {
        Ok(list) => Ok(list),
        Err(err) => {
            log::warn!(
                "Could not read reminders from {}, starting with an empty list: {}",
                path.display(),
                err
            );
            Ok(ReminderList::default())
        }
    }
}

async fn save(path: &Path, list: &ReminderList) -> Result<(), StorageError> {
    let content = serde_json::to_vec_pretty(list)?;
    let temp_path = path.with_extension("json.tmp");

    tokio::fs::write(&temp_path, content).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

#[async_trait]
impl ReminderStorage for JsonFileReminderStorage {
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StorageError> {
        let reminder = self.modify(|list| Ok(list.insert(reminder))).await?;
        log::info!("Stored reminder with id {}", reminder.id);
        Ok(reminder)
    }

    async fn update(&self, reminder: UpdateReminder) -> Result<Reminder, StorageError> {
        self.modify(|list| list.update(reminder)).await
    }

    async fn delete(&self, id: ReminderId) -> Result<Reminder, StorageError> {
        self.modify(|list| list.delete(id)).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.modify(|list| {
            list.clear();
            Ok(())
        })
        .await
    }

    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError> {
        Ok(self.store.read().await.all())
    }

    async fn get_upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, StorageError> {
        Ok(self.store.read().await.upcoming(now))
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, StorageError> {
        if !self.store.read().await.has_due(now) {
            return Ok(Vec::new());
        }

        self.modify(|list| Ok(list.take_due(now))).await
    }
}
