use chrono::{DateTime, Utc};

use crate::reminder::{ReminderId, ReminderTime};

pub struct NewReminder {
    pub text: String,
    pub time: ReminderTime,
    pub created_at: DateTime<Utc>,
}

pub struct UpdateReminder {
    pub id: ReminderId,
    pub text: Option<String>,
    pub time: Option<ReminderTime>,
}
