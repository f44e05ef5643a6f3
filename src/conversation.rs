//! Conversation state and the per-exchange state machine.
//!
//! A [`Conversation`] owns the ordered message list and moves through
//! [`ExchangeState`] as one exchange progresses:
//!
//! ```text
//! Idle --submit/retry--> AwaitingResponse --first fragment--> Streaming
//!   ^                        |                                   |
//!   +------ finish/fail -----+---------- finish/fail ------------+
//! ```
//!
//! The type does no I/O.  [`crate::chat::ChatSession`] drives it from a transport
//! and a decoded token stream.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{MessageParam, MessageRole};

/// Text of the assistant message recorded when an exchange fails in transport.
pub const ERROR_MESSAGE_TEXT: &str = "Sorry, there was an error processing your request.";

/// A reply that begins with this marker is the backend reporting a fatal failure.
pub const FATAL_ERROR_MARKER: &str = "Error:";

/// Identifier of a message, unique and increasing within one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    /// The raw counter value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier assigned at creation.
    pub id: MessageId,
    /// Who wrote the message.
    pub role: MessageRole,
    /// Text of the message; grows while the message is in flight.
    pub content: String,
    /// Set on assistant messages that stand for a failed exchange.
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    /// The `{role, content}` pair sent to the backend.
    pub fn to_param(&self) -> MessageParam {
        MessageParam::new(self.role, self.content.clone())
    }
}

/// Where the current exchange is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// No exchange in progress.
    Idle,
    /// A request is out and no text has arrived yet.
    AwaitingResponse,
    /// Text is arriving for the given assistant message.
    Streaming(MessageId),
}

/// Why a submission did not start an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The input was empty or whitespace.
    EmptyInput,
    /// Another exchange is still in progress.
    Busy,
    /// There is no failed or unanswered user message to retry.
    NothingToRetry,
    /// The exchange ended before its outcome could be recorded.
    Superseded,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::EmptyInput => write!(f, "empty input"),
            IgnoreReason::Busy => write!(f, "an exchange is already in progress"),
            IgnoreReason::NothingToRetry => write!(f, "nothing to retry"),
            IgnoreReason::Superseded => write!(f, "the exchange was superseded"),
        }
    }
}

/// Result of asking the conversation to start an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The exchange started; send this history to the backend.
    Started(Vec<MessageParam>),
    /// Nothing changed.
    Ignored(IgnoreReason),
}

/// A point-in-time copy of a conversation, for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    /// Messages, oldest first.
    pub messages: Vec<Message>,
    /// True between a submission and the first fragment of the reply.
    pub loading: bool,
    /// Current exchange state.
    pub state: ExchangeState,
}

impl Default for ConversationSnapshot {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            loading: false,
            state: ExchangeState::Idle,
        }
    }
}

/// The ordered messages of one chat plus the state of the exchange in progress.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    state: ExchangeState,
    next_id: u64,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            state: ExchangeState::Idle,
            next_id: 1,
        }
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Current exchange state.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// True between a submission and the first fragment of its reply.
    pub fn is_loading(&self) -> bool {
        self.state == ExchangeState::AwaitingResponse
    }

    /// True while any exchange is in progress, streaming included.
    pub fn is_busy(&self) -> bool {
        self.state != ExchangeState::Idle
    }

    /// The assistant message currently receiving text, if any.
    pub fn in_flight(&self) -> Option<&Message> {
        match self.state {
            ExchangeState::Streaming(id) => self.find(id),
            _ => None,
        }
    }

    /// Copy the conversation for observers.
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.messages.clone(),
            loading: self.is_loading(),
            state: self.state,
        }
    }

    /// Start an exchange for new user input.
    ///
    /// Appends the user message and returns the history to send.  Empty input and
    /// input arriving while an exchange is in progress change nothing.
    pub fn submit(&mut self, input: &str) -> Submission {
        if input.trim().is_empty() {
            return Submission::Ignored(IgnoreReason::EmptyInput);
        }
        if self.is_busy() {
            return Submission::Ignored(IgnoreReason::Busy);
        }
        self.push(MessageRole::User, input.to_string(), false);
        self.state = ExchangeState::AwaitingResponse;
        Submission::Started(self.outgoing_history())
    }

    /// Start the last exchange over.
    ///
    /// A trailing error message is removed and the last user message is sent again
    /// without being appended a second time.  Retrying is only possible when the
    /// conversation ends in an error message or in an unanswered user message.
    pub fn retry(&mut self) -> Submission {
        if self.is_busy() {
            return Submission::Ignored(IgnoreReason::Busy);
        }
        let ends_in_error = matches!(
            self.messages.last(),
            Some(m) if m.role == MessageRole::Assistant && m.is_error
        );
        let user_index = if ends_in_error {
            self.messages.len().checked_sub(2)
        } else {
            self.messages.len().checked_sub(1)
        };
        match user_index.and_then(|i| self.messages.get(i)) {
            Some(m) if m.role == MessageRole::User => {}
            _ => return Submission::Ignored(IgnoreReason::NothingToRetry),
        }
        if ends_in_error {
            self.messages.pop();
        }
        self.state = ExchangeState::AwaitingResponse;
        Submission::Started(self.outgoing_history())
    }

    /// Apply one decoded fragment of the reply.
    ///
    /// The first fragment creates the assistant message and ends the loading phase.
    /// Returns the in-flight message with its full accumulated text, or `None` if no
    /// exchange is in progress.
    pub fn apply_fragment(&mut self, fragment: &str) -> Option<&Message> {
        let id = match self.state {
            ExchangeState::Idle => return None,
            ExchangeState::AwaitingResponse => {
                let id = self.push(MessageRole::Assistant, String::new(), false);
                self.state = ExchangeState::Streaming(id);
                id
            }
            ExchangeState::Streaming(id) => id,
        };
        let message = self.find_mut(id)?;
        message.content.push_str(fragment);
        Some(message)
    }

    /// Finish the exchange after the reply stream ended.
    ///
    /// A reply containing [`FATAL_ERROR_MARKER`] anywhere is flagged as an error; the
    /// backend may report an upstream failure after some text has already streamed.  A reply
    /// that produced no fragments at all is recorded as an empty assistant message.
    pub fn finish(&mut self) -> Option<&Message> {
        let id = match self.state {
            ExchangeState::Idle => return None,
            ExchangeState::AwaitingResponse => {
                self.push(MessageRole::Assistant, String::new(), false)
            }
            ExchangeState::Streaming(id) => id,
        };
        self.state = ExchangeState::Idle;
        let message = self.find_mut(id)?;
        if message.content.contains(FATAL_ERROR_MARKER) {
            message.is_error = true;
        }
        Some(message)
    }

    /// Finish the exchange after a transport failure.
    ///
    /// The failure is recorded as a single assistant error message: the in-flight
    /// message if text had already arrived, otherwise a new one.
    pub fn fail(&mut self) -> Option<&Message> {
        let id = match self.state {
            ExchangeState::Idle => return None,
            ExchangeState::AwaitingResponse => {
                self.push(MessageRole::Assistant, ERROR_MESSAGE_TEXT.to_string(), true)
            }
            ExchangeState::Streaming(id) => id,
        };
        self.state = ExchangeState::Idle;
        let message = self.find_mut(id)?;
        message.content = ERROR_MESSAGE_TEXT.to_string();
        message.is_error = true;
        Some(message)
    }

    /// Give up on the exchange in progress without recording an outcome.
    ///
    /// Text that already arrived stays in place.  An unanswered user message can be
    /// sent again with [`Conversation::retry`].
    pub fn abandon(&mut self) {
        self.state = ExchangeState::Idle;
    }

    /// Remove every message.  Refused while an exchange is in progress.
    pub fn clear(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.messages.clear();
        true
    }

    // Error turns stay in the history so roles keep alternating.  Retry pops the
    // trailing one before calling this.
    fn outgoing_history(&self) -> Vec<MessageParam> {
        self.messages.iter().map(Message::to_param).collect()
    }

    fn push(&mut self, role: MessageRole, content: String, is_error: bool) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            content,
            is_error,
        });
        id
    }

    fn find(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.id == id)
    }

    fn find_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
