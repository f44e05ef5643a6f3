use serde::{Deserialize, Serialize};

use crate::models::KnownModel;
use crate::types::MessageParam;

/// Body of `POST /api/chat`.
///
/// `model` is optional on the wire; the backend picks its own default when it
/// is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// Full conversation history, oldest first.
    pub messages: Vec<MessageParam>,

    /// Selected model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<KnownModel>,
}

impl ChatRequest {
    /// Create a request for the given history and model.
    pub fn new(messages: Vec<MessageParam>, model: KnownModel) -> Self {
        Self {
            messages,
            model: Some(model),
        }
    }

    /// Create a request that leaves model choice to the backend.
    pub fn without_model(messages: Vec<MessageParam>) -> Self {
        Self {
            messages,
            model: None,
        }
    }
}
