pub mod appsettings;
pub mod classifier;
pub mod common;
pub mod dialogue;
pub mod intent;
pub mod parsing;
pub mod processor;
pub mod reminder;
pub mod scheduling;
pub mod services;
pub mod storage;
