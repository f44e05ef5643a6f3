//! The registry of models a conversation can be pointed at.
//!
//! The backend routes on the identifier string: ids carrying the `ollama:` prefix
//! go to the local Ollama runtime, everything else goes to Gemini.  The set is
//! closed; anything not listed here is rejected by [`KnownModel::from_str`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Routing prefix the backend uses for local models.
const OLLAMA_PREFIX: &str = "ollama:";

/// The model used when nothing (or nothing valid) has been selected.
pub const DEFAULT_MODEL: KnownModel = KnownModel::OllamaLlama3_2_3b;

/// Who serves a model.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Gemini, hosted by Google.
    Google,
    /// A model served by a local Ollama runtime.
    Ollama,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Google => write!(f, "Google"),
            Provider::Ollama => write!(f, "Ollama"),
        }
    }
}

/// Selectable model identifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// Gemini 2.0 Flash (experimental)
    #[serde(rename = "gemini-2.0-flash-exp")]
    Gemini2_0FlashExp,

    /// Gemini 2.0 Flash Lite
    #[serde(rename = "gemini-2.0-flash-lite")]
    Gemini2_0FlashLite,

    /// Llama 3.2 3B served by Ollama
    #[serde(rename = "ollama:llama3.2:3b")]
    OllamaLlama3_2_3b,

    /// Llama 3.2 1B served by Ollama
    #[serde(rename = "ollama:llama3.2:1b")]
    OllamaLlama3_2_1b,

    /// Qwen 2.5 3B served by Ollama
    #[serde(rename = "ollama:qwen2.5:3b")]
    OllamaQwen2_5_3b,
}

/// Display metadata for one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    /// The identifier sent to the backend.
    pub id: KnownModel,
    /// Human-readable name.
    pub name: &'static str,
    /// Short description shown next to the name.
    pub description: &'static str,
    /// Who serves the model.
    pub provider: Provider,
}

/// Every selectable model, in display order.
pub const AVAILABLE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: KnownModel::Gemini2_0FlashExp,
        name: "Gemini 2.0 Flash",
        description: "Experimental",
        provider: Provider::Google,
    },
    ModelInfo {
        id: KnownModel::Gemini2_0FlashLite,
        name: "Gemini 2.0 Flash Lite",
        description: "Lite",
        provider: Provider::Google,
    },
    ModelInfo {
        id: KnownModel::OllamaLlama3_2_3b,
        name: "Llama 3.2 3B",
        description: "Local, Fast",
        provider: Provider::Ollama,
    },
    ModelInfo {
        id: KnownModel::OllamaLlama3_2_1b,
        name: "Llama 3.2 1B",
        description: "Local, Very Fast",
        provider: Provider::Ollama,
    },
    ModelInfo {
        id: KnownModel::OllamaQwen2_5_3b,
        name: "Qwen 2.5 3B",
        description: "Local, Alternative",
        provider: Provider::Ollama,
    },
];

impl KnownModel {
    /// The identifier string used on the wire and in the preference store.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownModel::Gemini2_0FlashExp => "gemini-2.0-flash-exp",
            KnownModel::Gemini2_0FlashLite => "gemini-2.0-flash-lite",
            KnownModel::OllamaLlama3_2_3b => "ollama:llama3.2:3b",
            KnownModel::OllamaLlama3_2_1b => "ollama:llama3.2:1b",
            KnownModel::OllamaQwen2_5_3b => "ollama:qwen2.5:3b",
        }
    }

    /// The registry entry for this model.
    pub fn info(&self) -> &'static ModelInfo {
        AVAILABLE_MODELS
            .iter()
            .find(|info| info.id == *self)
            .unwrap_or(&AVAILABLE_MODELS[0])
    }

    /// Who serves this model.
    pub fn provider(&self) -> Provider {
        if self.as_str().starts_with(OLLAMA_PREFIX) {
            Provider::Ollama
        } else {
            Provider::Google
        }
    }

    /// The model name the upstream runtime knows, without the routing prefix.
    pub fn upstream_name(&self) -> &'static str {
        let id = self.as_str();
        id.strip_prefix(OLLAMA_PREFIX).unwrap_or(id)
    }

    /// Iterate over every known model in display order.
    pub fn all() -> impl Iterator<Item = KnownModel> {
        AVAILABLE_MODELS.iter().map(|info| info.id)
    }
}

impl Default for KnownModel {
    fn default() -> Self {
        DEFAULT_MODEL
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnownModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        find_model(s).map(|info| info.id).ok_or_else(|| {
            Error::validation(format!("unknown model: {s}"), Some("model".to_string()))
        })
    }
}

/// Returns true iff `id` names a registry entry.
pub fn is_valid_model(id: &str) -> bool {
    find_model(id).is_some()
}

/// Look up the registry entry for `id`.
pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    AVAILABLE_MODELS.iter().find(|info| info.id.as_str() == id)
}
