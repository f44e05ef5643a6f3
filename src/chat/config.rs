//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::models::KnownModel;

/// Default time allowed for connecting to the backend.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Command-line arguments for the chatterbox-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Backend to talk to.
    #[arrrg(optional, "Backend base URL (default: $CHATTERBOX_BASE_URL or http://localhost:8000)", "URL")]
    pub base_url: Option<String>,

    /// Model to use for this run, overriding the saved selection.
    #[arrrg(optional, "Model to use (see /models)", "MODEL")]
    pub model: Option<String>,

    /// Where the selected model is remembered.
    #[arrrg(optional, "Preferences file (default: $CHATTERBOX_PREFERENCES)", "PATH")]
    pub preferences: Option<String>,

    /// Seconds allowed for connecting to the backend.
    #[arrrg(optional, "Connect timeout in seconds (default: 10)", "SECONDS")]
    pub connect_timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Backend base URL; `None` defers to the environment.
    pub base_url: Option<String>,

    /// Model forced for this run; `None` uses the saved selection.
    pub model: Option<KnownModel>,

    /// Preferences file; `None` defers to the environment.
    pub preferences_path: Option<PathBuf>,

    /// Time allowed for connecting to the backend.
    pub connect_timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    pub fn new() -> Self {
        Self {
            base_url: None,
            model: None,
            preferences_path: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            use_color: true,
        }
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Forces the model for this run.
    pub fn with_model(mut self, model: KnownModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the preferences file.
    pub fn with_preferences_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.preferences_path = Some(path.into());
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        // An unknown --model is dropped here; the saved selection applies instead.
        let model = args.model.and_then(|s| match s.parse::<KnownModel>() {
            Ok(model) => Some(model),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring --model");
                None
            }
        });

        ChatConfig {
            base_url: args.base_url,
            model,
            preferences_path: args.preferences.map(PathBuf::from),
            connect_timeout: Duration::from_secs(
                args.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            use_color: !args.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert!(config.base_url.is_none());
        assert!(config.model.is_none());
        assert!(config.preferences_path.is_none());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from(ChatArgs::default());
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            base_url: Some("http://10.0.0.2:8000".to_string()),
            model: Some("ollama:qwen2.5:3b".to_string()),
            preferences: Some("/tmp/prefs.yaml".to_string()),
            connect_timeout: Some(3),
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.base_url.as_deref(), Some("http://10.0.0.2:8000"));
        assert_eq!(config.model, Some(KnownModel::OllamaQwen2_5_3b));
        assert_eq!(config.preferences_path, Some(PathBuf::from("/tmp/prefs.yaml")));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert!(!config.use_color);
    }

    #[test]
    fn config_from_args_drops_unknown_model() {
        let args = ChatArgs {
            model: Some("gpt-4o".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::from(args).model.is_none());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_base_url("http://backend:8000")
            .with_model(KnownModel::Gemini2_0FlashExp)
            .with_preferences_path("prefs.yaml")
            .with_connect_timeout(Duration::from_secs(1))
            .without_color();

        assert_eq!(config.base_url.as_deref(), Some("http://backend:8000"));
        assert_eq!(config.model, Some(KnownModel::Gemini2_0FlashExp));
        assert_eq!(config.preferences_path, Some(PathBuf::from("prefs.yaml")));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert!(!config.use_color);
    }
}
