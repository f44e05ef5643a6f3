// Public modules
pub mod chat;
pub mod client;
pub mod conversation;
pub mod error;
pub mod models;
pub mod observability;
pub mod preferences;
pub mod render;
pub mod token_stream;
pub mod types;

// Re-exports
pub use client::{ChatClient, Transport};
pub use conversation::{
    Conversation, ConversationSnapshot, ExchangeState, IgnoreReason, Message, MessageId,
    Submission,
};
pub use error::{Error, Result};
pub use models::{AVAILABLE_MODELS, DEFAULT_MODEL, KnownModel, ModelInfo, Provider};
pub use observability::register_biometrics;
pub use preferences::{
    FilePreferenceStore, MemoryPreferenceStore, ModelSelection, PreferenceStore,
};
pub use render::{PlainTextRenderer, Renderer};
pub use token_stream::{TokenStream, decode_tokens, encode_token, parse_token_line};
pub use types::*;
