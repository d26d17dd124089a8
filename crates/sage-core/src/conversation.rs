//! UI-agnostic conversation state
//!
//! The conversation is append-only except for the in-place replacement of a
//! placeholder turn once its request resolves. Display state drives the
//! simulated streaming reveal; the remote API always answers in one piece.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// How much of a turn is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// In-flight placeholder, rendered as a loading indicator
    Pending,
    /// Characters are being revealed one at a time
    Revealing { started: Instant, shown: usize },
    /// Full text through the formatted renderer
    Complete,
}

/// A chat message in the conversation
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub display: DisplayState,
    pub thought_open: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            display: DisplayState::Complete,
            thought_open: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            display: DisplayState::Complete,
            thought_open: false,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            role: ChatRole::Assistant,
            content: String::new(),
            display: DisplayState::Pending,
            thought_open: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.display == DisplayState::Pending
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.display, DisplayState::Revealing { .. })
    }

    /// Text visible right now: a char-boundary-safe prefix while revealing
    pub fn visible_text(&self) -> &str {
        match self.display {
            DisplayState::Pending => "",
            DisplayState::Revealing { shown, .. } => {
                let end = self
                    .content
                    .char_indices()
                    .nth(shown)
                    .map(|(i, _)| i)
                    .unwrap_or(self.content.len());
                &self.content[..end]
            }
            DisplayState::Complete => &self.content,
        }
    }
}

/// Pacing of the simulated streaming reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    pub char_delay: Duration,
    /// After this the streaming flag clears even if characters remain
    pub window: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            char_delay: Duration::from_millis(15),
            window: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.turns.last()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.turns.get(index)
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> usize {
        self.turns.push(ChatMessage::user(content));
        self.turns.len() - 1
    }

    pub fn push_placeholder(&mut self) -> usize {
        self.turns.push(ChatMessage::placeholder());
        self.turns.len() - 1
    }

    pub fn append_assistant(&mut self, content: impl Into<String>) -> usize {
        self.turns.push(ChatMessage::assistant(content));
        self.turns.len() - 1
    }

    /// Rewrite a user turn in place (the recording label becomes the sent label)
    pub fn replace_user(&mut self, index: usize, content: impl Into<String>) {
        if let Some(turn) = self.turns.get_mut(index) {
            if turn.role == ChatRole::User {
                turn.content = content.into();
            }
        }
    }

    /// Fill a turn with a reply and start revealing it
    pub fn resolve(&mut self, index: usize, content: impl Into<String>, now: Instant) {
        if let Some(turn) = self.turns.get_mut(index) {
            turn.content = content.into();
            turn.display = DisplayState::Revealing {
                started: now,
                shown: 0,
            };
        }
    }

    /// Fill a turn with final text, skipping the reveal
    pub fn resolve_complete(&mut self, index: usize, content: impl Into<String>) {
        if let Some(turn) = self.turns.get_mut(index) {
            turn.content = content.into();
            turn.display = DisplayState::Complete;
        }
    }

    /// Start revealing a turn that was appended complete
    pub fn start_reveal(&mut self, index: usize, now: Instant) {
        if let Some(turn) = self.turns.get_mut(index) {
            turn.display = DisplayState::Revealing {
                started: now,
                shown: 0,
            };
        }
    }

    /// Advance every revealing turn. Returns true if anything changed.
    pub fn tick(&mut self, now: Instant, timing: RevealTiming) -> bool {
        let mut changed = false;

        for turn in &mut self.turns {
            if let DisplayState::Revealing { started, shown } = turn.display {
                let elapsed = now.saturating_duration_since(started);
                let total = turn.content.chars().count();

                let next_shown = if timing.char_delay.is_zero() {
                    total
                } else {
                    (elapsed.as_millis() / timing.char_delay.as_millis().max(1)) as usize
                };

                if next_shown >= total || elapsed >= timing.window {
                    turn.display = DisplayState::Complete;
                    changed = true;
                } else if next_shown != shown {
                    turn.display = DisplayState::Revealing {
                        started,
                        shown: next_shown,
                    };
                    changed = true;
                }
            }
        }

        changed
    }

    pub fn has_pending(&self) -> bool {
        self.turns.iter().any(|t| t.is_pending())
    }

    pub fn has_streaming(&self) -> bool {
        self.turns.iter().any(|t| t.is_streaming())
    }

    pub fn toggle_thought(&mut self, index: usize) {
        if let Some(turn) = self.turns.get_mut(index) {
            if turn.role == ChatRole::Assistant {
                turn.thought_open = !turn.thought_open;
            }
        }
    }

    /// Index of the most recent assistant turn carrying a thought segment
    pub fn last_thought_index(&self) -> Option<usize> {
        self.turns
            .iter()
            .enumerate()
            .rev()
            .find(|(_, t)| {
                t.role == ChatRole::Assistant
                    && !t.is_pending()
                    && crate::thought::split_thought(&t.content).thought.is_some()
            })
            .map(|(i, _)| i)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> RevealTiming {
        RevealTiming {
            char_delay: Duration::from_millis(10),
            window: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_placeholder_replaced_in_place() {
        let mut convo = Conversation::new();
        convo.push_user("hello");
        let idx = convo.push_placeholder();
        assert!(convo.has_pending());

        convo.resolve(idx, "42", Instant::now());
        assert_eq!(convo.len(), 2);
        assert_eq!(convo.turns()[idx].content, "42");
        assert!(!convo.has_pending());
        assert!(convo.turns()[idx].is_streaming());
    }

    #[test]
    fn test_reveal_advances_per_character() {
        let mut convo = Conversation::new();
        let idx = convo.push_placeholder();
        let start = Instant::now();
        convo.resolve(idx, "abcdefghij", start);

        convo.tick(start + Duration::from_millis(35), timing());
        assert_eq!(convo.turns()[idx].visible_text(), "abc");

        convo.tick(start + Duration::from_millis(100), timing());
        assert_eq!(convo.turns()[idx].display, DisplayState::Complete);
        assert_eq!(convo.turns()[idx].visible_text(), "abcdefghij");
    }

    #[test]
    fn test_window_clears_streaming_flag_early() {
        let mut convo = Conversation::new();
        let idx = convo.push_placeholder();
        let start = Instant::now();
        convo.resolve(idx, "x".repeat(500), start);

        convo.tick(start + Duration::from_millis(1000), timing());
        assert_eq!(convo.turns()[idx].display, DisplayState::Complete);
        assert_eq!(convo.turns()[idx].visible_text().len(), 500);
    }

    #[test]
    fn test_visible_text_respects_char_boundaries() {
        let mut msg = ChatMessage::assistant("héllo");
        msg.display = DisplayState::Revealing {
            started: Instant::now(),
            shown: 2,
        };
        assert_eq!(msg.visible_text(), "hé");
    }

    #[test]
    fn test_replace_user_ignores_assistant_turns() {
        let mut convo = Conversation::new();
        let idx = convo.append_assistant("reply");
        convo.replace_user(idx, "changed");
        assert_eq!(convo.turns()[idx].content, "reply");
    }

    #[test]
    fn test_last_thought_index() {
        let mut convo = Conversation::new();
        convo.push_user("<think>user text is not a thought</think>");
        assert_eq!(convo.last_thought_index(), None);

        let first = convo.append_assistant("<think>a</think>one");
        convo.append_assistant("two");
        assert_eq!(convo.last_thought_index(), Some(first));

        convo.toggle_thought(first);
        assert!(convo.turns()[first].thought_open);
    }
}
