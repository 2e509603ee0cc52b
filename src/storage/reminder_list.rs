use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reminder::{Reminder, ReminderId};

use super::{NewReminder, StorageError, UpdateReminder};

/// The reminder collection shared by every storage backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub(super) struct ReminderList(Vec<Reminder>);

impl ReminderList {
    fn next_id(&self) -> ReminderId {
        self.0.iter().map(|reminder| reminder.id).max().unwrap_or(0) + 1
    }

    pub fn insert(&mut self, reminder: NewReminder) -> Reminder {
        let reminder = Reminder {
            id: self.next_id(),
            text: reminder.text,
            time: reminder.time,
            completed: false,
            created: reminder.created_at,
        };

        self.0.push(reminder.clone());
        reminder
    }

    pub fn update(&mut self, update: UpdateReminder) -> Result<Reminder, StorageError> {
        let reminder = self
            .0
            .iter_mut()
            .find(|reminder| reminder.id == update.id)
            .ok_or(StorageError::NotFound(update.id))?;

        if let Some(text) = update.text {
            reminder.text = text;
        }
        if let Some(time) = update.time {
            reminder.time = time;
        }

        Ok(reminder.clone())
    }

    pub fn delete(&mut self, id: ReminderId) -> Result<Reminder, StorageError> {
        let index = self
            .0
            .iter()
            .position(|reminder| reminder.id == id)
            .ok_or(StorageError::NotFound(id))?;

        Ok(self.0.remove(index))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn all(&self) -> Vec<Reminder> {
        self.0.clone()
    }

    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let mut upcoming: Vec<Reminder> = self
            .0
            .iter()
            .filter(|reminder| reminder.is_upcoming(now))
            .cloned()
            .collect();
        upcoming.sort_by_key(|reminder| (reminder.time, reminder.id));
        upcoming
    }

    pub fn has_due(&self, now: DateTime<Utc>) -> bool {
        self.0.iter().any(|reminder| reminder.is_due(now))
    }

    /// Marks every due reminder completed and returns them.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<Reminder> {
        self.0
            .iter_mut()
            .filter(|reminder| reminder.is_due(now))
            .map(|reminder| {
                reminder.completed = true;
                reminder.clone()
            })
            .collect()
    }
}
