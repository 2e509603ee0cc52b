mod command_parser;
mod time_expression;

pub use command_parser::{CommandParser, ReminderDraft};
pub use time_expression::{ParsedTime, Provenance, TimeExpressionParser, TimeParseError};
