mod json_reminder_storage;
mod model;
mod reminder_list;
mod reminder_storage;

pub use json_reminder_storage::JsonFileReminderStorage;
pub use model::{NewReminder, UpdateReminder};
pub use reminder_storage::{InMemoryReminderStorage, ReminderStorage, StorageError};
