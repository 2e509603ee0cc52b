use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{common::SessionId, parsing::ParsedTime};

/// What a conversation is waiting for between two commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DialogueState {
    #[default]
    Empty,
    AwaitingReminderText {
        pending_time: ParsedTime,
    },
}

impl DialogueState {
    /// Reads the state once, leaving `Empty` behind.
    pub fn take(&mut self) -> DialogueState {
        std::mem::take(self)
    }

    /// Remembers a reminder time until its text arrives. A time that was
    /// already pending is replaced and returned.
    pub fn await_text(&mut self, pending_time: ParsedTime) -> Option<ParsedTime> {
        match std::mem::replace(self, DialogueState::AwaitingReminderText { pending_time }) {
            DialogueState::AwaitingReminderText { pending_time } => Some(pending_time),
            DialogueState::Empty => None,
        }
    }
}

pub type SessionDialogue = Arc<Mutex<DialogueState>>;

/// Dialogue states keyed by session. Holding a session's lock serialises the
/// commands of that session.
#[derive(Default)]
pub struct DialogueStorage {
    sessions: Mutex<HashMap<SessionId, SessionDialogue>>,
}

impl DialogueStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn dialogue(&self, session: &str) -> SessionDialogue {
        self.sessions
            .lock()
            .await
            .entry(session.to_string())
            .or_default()
            .clone()
    }

    /// Hands a session's dialogue back after a command. Sessions with nothing
    /// pending are forgotten unless another command of the same session still
    /// holds the dialogue.
    pub async fn release(&self, session: &str, dialogue: SessionDialogue) {
        let mut sessions = self.sessions.lock().await;
        // Clones are only handed out under the map lock: ours plus the map's.
        let idle = Arc::strong_count(&dialogue) == 2
            && dialogue
                .try_lock()
                .is_ok_and(|state| *state == DialogueState::Empty);

        if idle {
            sessions.remove(session);
        }
    }

    #[cfg(test)]
    pub(crate) async fn state(&self, session: &str) -> DialogueState {
        let dialogue = self.sessions.lock().await.get(session).cloned();
        match dialogue {
            Some(dialogue) => *dialogue.lock().await,
            None => DialogueState::Empty,
        }
    }

    #[cfg(test)]
    pub(crate) async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
