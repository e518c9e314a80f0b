use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Per-user transcript of user and assistant turns.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Mutex<HashMap<String, Vec<ConversationTurn>>>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<ConversationTurn>>> {
        match self.turns.lock() {
            Ok(turns) => turns,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record(&self, user_id: &str, role: Role, content: impl Into<String>) {
        self.lock().entry(user_id.to_string()).or_default().push(ConversationTurn::new(role, content));
    }

    /// The last `window` turns, oldest first.
    pub fn recent(&self, user_id: &str, window: usize) -> Vec<ConversationTurn> {
        self.lock()
            .get(user_id)
            .map(|turns| turns[turns.len().saturating_sub(window)..].to_vec())
            .unwrap_or_default()
    }

    pub fn all(&self, user_id: &str) -> Vec<ConversationTurn> {
        self.lock().get(user_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationHistory, Role};

    #[test]
    fn recent_returns_the_tail_in_order() {
        let history = ConversationHistory::new();
        for index in 0..6 {
            let role = if index % 2 == 0 { Role::User } else { Role::Assistant };
            history.record("1", role, format!("turn {index}"));
        }

        let recent = history.recent("1", 4);
        let contents: Vec<_> = recent.iter().map(|turn| turn.content.as_str()).collect();
        assert_eq!(contents, vec!["turn 2", "turn 3", "turn 4", "turn 5"]);
        assert_eq!(history.all("1").len(), 6);
    }

    #[test]
    fn short_and_missing_histories() {
        let history = ConversationHistory::new();
        history.record("1", Role::User, "only one");

        assert_eq!(history.recent("1", 4).len(), 1);
        assert!(history.recent("2", 4).is_empty());
        assert!(history.recent("1", 0).is_empty());
    }
}
