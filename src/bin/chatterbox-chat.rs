//! Interactive chat client for the chatterbox backend.
//!
//! This binary provides a streaming REPL that sends each message, along with
//! the conversation so far, to the backend's `/api/chat` endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on localhost:8000
//! chatterbox-chat
//!
//! # Another backend, a specific model
//! chatterbox-chat --base-url http://10.0.0.5:8000 --model gemini-2.0-flash-exp
//!
//! # Disable colors (useful for piping output)
//! chatterbox-chat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Clear conversation history
//! - `/retry` - Resend the last message after an error
//! - `/model <id>` - Change (and remember) the model
//! - `/models` - List available models
//! - `/health` - Check the backend
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`.

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatterbox::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, ExchangeOutcome, PlainTextRenderer, Renderer,
    help_text, parse_command,
};
use chatterbox::{AVAILABLE_MODELS, ChatClient};

/// Main entry point for the chatterbox-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatterbox=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("chatterbox-chat [OPTIONS]");
    let config = ChatConfig::from(args);
    let session = ChatSession::from_config(&config)?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    println!(
        "Chatterbox (backend: {}, model: {})",
        session.transport().base_url(),
        session.model()
    );
    println!("Type /help for commands, /quit to exit\n");

    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            if session.clear() {
                                renderer.print_info("Conversation cleared.");
                            } else {
                                renderer.print_error("Cannot clear while a reply is streaming.");
                            }
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Retry => {
                            let outcome = interruptible(session.retry(&mut renderer)).await;
                            match outcome {
                                Some(ExchangeOutcome::Ignored(reason)) => {
                                    renderer.print_info(&format!("Nothing to do: {reason}."));
                                }
                                Some(outcome) => suggest_retry(&outcome, &mut renderer),
                                None => renderer.print_info("[interrupted]"),
                            }
                        }
                        ChatCommand::Model(id) => match session.set_model_by_id(&id) {
                            Ok(model) => renderer.print_info(&format!(
                                "Model changed to: {} ({})",
                                model.info().name,
                                model
                            )),
                            Err(err) if err.is_validation() => renderer
                                .print_error(&format!("Unknown model {id}; see /models")),
                            Err(err) => renderer.print_error(&format!(
                                "Model changed for this session but not saved: {err}"
                            )),
                        },
                        ChatCommand::Models => print_models(&session),
                        ChatCommand::Health => match session.transport().health().await {
                            Ok(status) => renderer.print_info(&format!(
                                "Backend {}: {}",
                                status.service.as_deref().unwrap_or("service"),
                                status.status
                            )),
                            Err(err) => renderer.print_error(&format!("Health check failed: {err}")),
                        },
                        ChatCommand::Stats => print_stats(&session),
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                match interruptible(session.send(line, &mut renderer)).await {
                    Some(outcome) => suggest_retry(&outcome, &mut renderer),
                    None => renderer.print_info("[interrupted]"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

/// Runs an exchange until it settles or Ctrl+C is pressed.
///
/// An interrupted exchange is dropped; the session returns to idle and the
/// unanswered message can be sent again with /retry.
async fn interruptible<F>(exchange: F) -> Option<ExchangeOutcome>
where
    F: std::future::Future<Output = ExchangeOutcome>,
{
    tokio::select! {
        outcome = exchange => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    }
}

fn suggest_retry(outcome: &ExchangeOutcome, renderer: &mut dyn Renderer) {
    if outcome.can_retry() {
        renderer.print_info("Type /retry to send it again.");
    }
}

fn print_models(session: &ChatSession<ChatClient>) {
    let current = session.model();
    println!("    Available models:");
    for info in AVAILABLE_MODELS {
        let marker = if info.id == current { "*" } else { " " };
        println!(
            "    {marker} {:<24} {} ({}, {})",
            info.id.as_str(),
            info.name,
            info.description,
            info.provider
        );
    }
}

fn print_stats(session: &ChatSession<ChatClient>) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {} ({})", stats.model.info().name, stats.model);
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Exchanges: {} ({} failed, {} retries)",
        stats.exchanges, stats.failed_exchanges, stats.retries
    );
}
