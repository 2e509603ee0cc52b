mod delivery;
mod due_reminder_checker;

pub use delivery::{LogDeliveryChannel, ReminderDeliveryChannel};
pub use due_reminder_checker::DueReminderChecker;
