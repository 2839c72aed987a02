// ABOUTME: Conversation state tracking across independent CLI process launches.
// ABOUTME: Derives conversation keys, resolves new/continue/resume, owns the session map.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation, supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A value counts as present for optional flags only if it is non-empty
/// and not the literal string "0".
pub fn is_present(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !v.is_empty() && v != "0")
}

/// True iff an assistant message appears anywhere in the sequence.
pub fn is_continuation(messages: &[Message]) -> bool {
    messages.iter().any(|m| m.role == Role::Assistant)
}

/// Content of the last user message, or "" if there is none.
pub fn last_user_message(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

fn first_user_message(messages: &[Message]) -> &str {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

/// Key under which a conversation's session id is stored.
///
/// Hashes `instructions + first user message` with plain concatenation, so
/// later turns never change the key. Pairs that concatenate to the same
/// string share a key: `("ab", "c")` and `("a", "bc")` collide.
pub fn conversation_key(instructions: Option<&str>, messages: &[Message]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(instructions.unwrap_or("").as_bytes());
    hasher.update(first_user_message(messages).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Instructions (when present) followed by every message's content, joined
/// by a blank line. Returns "" when there is nothing to join.
pub fn format_all_messages(instructions: Option<&str>, messages: &[Message]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(messages.len() + 1);
    if let Some(instructions) = instructions.filter(|i| is_present(Some(*i))) {
        parts.push(instructions);
    }
    parts.extend(messages.iter().map(|m| m.content.as_str()));
    parts.join("\n\n")
}

/// Which of the three invocation shapes a call takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedState {
    /// No assistant turn yet: fresh conversation
    New,
    /// Prior assistant turns but no stored session: replay the history
    ContinuationFresh,
    /// Prior assistant turns and a stored session: resume it
    Resume(String),
}

/// What a command builder needs to know about the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPlan {
    pub state: ResolvedState,
    /// Value for the system-prompt flag, if it should be passed
    pub system_prompt: Option<String>,
    /// Text written to the child's stdin
    pub stdin: String,
}

impl PromptPlan {
    /// Resolve the plan for one call, given any session stored for its key.
    pub fn resolve(
        instructions: Option<&str>,
        messages: &[Message],
        stored_session: Option<String>,
    ) -> Self {
        let system_prompt = instructions
            .filter(|i| is_present(Some(*i)))
            .map(str::to_string);

        if !is_continuation(messages) {
            return Self {
                state: ResolvedState::New,
                system_prompt,
                stdin: last_user_message(messages).to_string(),
            };
        }

        match stored_session {
            Some(session_id) => Self {
                state: ResolvedState::Resume(session_id),
                system_prompt: None,
                stdin: last_user_message(messages).to_string(),
            },
            None => Self {
                state: ResolvedState::ContinuationFresh,
                system_prompt,
                stdin: format_all_messages(None, messages),
            },
        }
    }

    /// Session id to resume, if any
    pub fn resume_id(&self) -> Option<&str> {
        match &self.state {
            ResolvedState::Resume(id) => Some(id),
            _ => None,
        }
    }
}

/// Conversation key -> agent-issued session id.
///
/// Owned by a single gateway; never shared or persisted.
#[derive(Debug, Default)]
pub struct SessionMap {
    sessions: Mutex<HashMap<String, String>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn store(&self, key: &str, session_id: &str) {
        self.lock().insert(key.to_string(), session_id.to_string());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}
