//! Chat application module for interactive conversations with the backend.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! chatterbox client library. It supports:
//!
//! - Streaming replies with real-time token display
//! - Retrying a failed reply without repeating the question
//! - Slash commands for session control
//! - A remembered model selection
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Exchange orchestration over a transport
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use session::{ChatSession, ExchangeOutcome, SessionStats};
