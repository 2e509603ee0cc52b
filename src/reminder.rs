use chrono::{DateTime, SubsecRound, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub type ReminderId = u64;

const DISPLAY_FORMAT: &str = "%I:%M %p on %B %d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderTime(DateTime<Utc>);

impl ReminderTime {
    pub fn new(inner: DateTime<Utc>) -> Self {
        Self(inner.trunc_subsecs(0))
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// Human readable form shown back to the user, e.g. `03:30 PM on June 01`.
    pub fn formatted(&self, tz: Tz) -> String {
        self.0.with_timezone(&tz).format(DISPLAY_FORMAT).to_string()
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub text: String,
    pub time: ReminderTime,
    pub completed: bool,
    pub created: DateTime<Utc>,
}

impl Reminder {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.time.instant() <= now
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.time.instant() > now
    }
}
