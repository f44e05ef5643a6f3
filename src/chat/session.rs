//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation,
//! drives exchanges through a [`Transport`], and publishes every change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::watch;

use crate::chat::config::ChatConfig;
use crate::client::{ChatClient, Transport};
use crate::conversation::{
    Conversation, ConversationSnapshot, ERROR_MESSAGE_TEXT, IgnoreReason, Message, Submission,
};
use crate::error::{Error, Result};
use crate::models::KnownModel;
use crate::observability::{
    EXCHANGE_DURATION, EXCHANGE_RETRIES, EXCHANGES_FAILED, EXCHANGES_IGNORED, EXCHANGES_STARTED,
    STREAM_TTFT,
};
use crate::preferences::{FilePreferenceStore, ModelSelection, PreferenceStore};
use crate::render::Renderer;
use crate::token_stream::decode_tokens;
use crate::types::{ChatRequest, MessageParam};

/// How one call to [`ChatSession::send`] or [`ChatSession::retry`] ended.
#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    /// No exchange was started and nothing changed.
    Ignored(IgnoreReason),
    /// The reply streamed to completion.
    Completed(Message),
    /// The exchange failed; `message` is the error message now in the conversation.
    Failed {
        /// The assistant message recording the failure.
        message: Message,
        /// What went wrong.
        error: Error,
    },
}

impl ExchangeOutcome {
    /// The assistant message this exchange produced, if it started.
    pub fn message(&self) -> Option<&Message> {
        match self {
            ExchangeOutcome::Ignored(_) => None,
            ExchangeOutcome::Completed(message) => Some(message),
            ExchangeOutcome::Failed { message, .. } => Some(message),
        }
    }

    /// True if the exchange ended in an error message.
    pub fn is_failed(&self) -> bool {
        matches!(self, ExchangeOutcome::Failed { .. })
    }

    /// True if the exchange failed in a way a retry may fix.
    pub fn can_retry(&self) -> bool {
        matches!(self, ExchangeOutcome::Failed { error, .. } if error.is_retryable())
    }
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The model used for the next exchange.
    pub model: KnownModel,
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// Exchanges started, retries included.
    pub exchanges: u64,
    /// Exchanges that ended in an error message.
    pub failed_exchanges: u64,
    /// Exchanges started by a retry.
    pub retries: u64,
}

/// A chat session that manages conversation state and backend interactions.
///
/// All methods take `&self`.  State lives behind mutexes that are never held
/// across an await, so a second `send` made while one is in flight sees the
/// busy conversation and is ignored.
pub struct ChatSession<T: Transport> {
    transport: T,
    conversation: Mutex<Conversation>,
    selection: Mutex<ModelSelection>,
    updates: watch::Sender<ConversationSnapshot>,
    exchanges: AtomicU64,
    failed_exchanges: AtomicU64,
    retries: AtomicU64,
}

impl ChatSession<ChatClient> {
    /// Creates a session talking HTTP to the configured backend.
    ///
    /// A model forced by `config` applies to this session only and is not saved.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let client = ChatClient::with_options(config.base_url.clone(), Some(config.connect_timeout))?;
        let store: Box<dyn PreferenceStore> = match &config.preferences_path {
            Some(path) => Box::new(FilePreferenceStore::new(path)),
            None => Box::new(FilePreferenceStore::from_env()),
        };
        let selection = match config.model {
            Some(model) => ModelSelection::with_model(model, store),
            None => ModelSelection::load(store),
        };
        Ok(Self::new(client, selection))
    }
}

impl<T: Transport> ChatSession<T> {
    /// Creates a new chat session over `transport`.
    pub fn new(transport: T, selection: ModelSelection) -> Self {
        let (updates, _) = watch::channel(ConversationSnapshot::default());
        Self {
            transport,
            conversation: Mutex::new(Conversation::new()),
            selection: Mutex::new(selection),
            updates,
            exchanges: AtomicU64::new(0),
            failed_exchanges: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// The transport this session sends through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a user message and streams the reply to `renderer`.
    ///
    /// Empty input, and input arriving while another exchange is in progress, are
    /// ignored without touching the conversation.  Failures are recorded in the
    /// conversation and reported through the outcome, never as a panic or `Err`.
    pub async fn send(&self, input: &str, renderer: &mut dyn Renderer) -> ExchangeOutcome {
        let submission = self.update(|c| c.submit(input));
        match submission {
            Submission::Started(history) => self.run_exchange(history, renderer).await,
            Submission::Ignored(reason) => {
                EXCHANGES_IGNORED.click();
                tracing::debug!(%reason, "submission ignored");
                ExchangeOutcome::Ignored(reason)
            }
        }
    }

    /// Resends the last user message after a failed exchange.
    ///
    /// The trailing error message is replaced by the new reply; the user message is
    /// not duplicated.
    pub async fn retry(&self, renderer: &mut dyn Renderer) -> ExchangeOutcome {
        let submission = self.update(|c| c.retry());
        match submission {
            Submission::Started(history) => {
                EXCHANGE_RETRIES.click();
                self.retries.fetch_add(1, Ordering::Relaxed);
                self.run_exchange(history, renderer).await
            }
            Submission::Ignored(reason) => {
                EXCHANGES_IGNORED.click();
                tracing::debug!(%reason, "retry ignored");
                ExchangeOutcome::Ignored(reason)
            }
        }
    }

    async fn run_exchange(
        &self,
        history: Vec<MessageParam>,
        renderer: &mut dyn Renderer,
    ) -> ExchangeOutcome {
        let mut guard = ExchangeGuard::new(self);
        let model = self.model();
        let request = ChatRequest::new(history, model);
        let start = Instant::now();
        EXCHANGES_STARTED.click();
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            model = %model,
            messages = request.messages.len(),
            "starting exchange"
        );
        renderer.start_reply(model);

        let body = match self.transport.open(&request).await {
            Ok(body) => body,
            Err(err) => return guard.fail(err, renderer),
        };
        let mut tokens = decode_tokens(body);
        let mut first_token = true;
        while let Some(token) = tokens.next().await {
            match token {
                Ok(text) => {
                    if first_token {
                        STREAM_TTFT.add(start.elapsed().as_secs_f64());
                        first_token = false;
                    }
                    self.update(|c| {
                        c.apply_fragment(&text);
                    });
                    renderer.print_text(&text);
                }
                Err(err) => return guard.fail(err, renderer),
            }
        }

        EXCHANGE_DURATION.add(start.elapsed().as_secs_f64());
        guard.finish(renderer)
    }

    /// Subscribe to conversation changes.
    ///
    /// Every transition, each streamed fragment included, publishes a fresh snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.updates.subscribe()
    }

    /// The current state of the conversation.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.lock_conversation().snapshot()
    }

    /// A copy of the messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.lock_conversation().messages().to_vec()
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.lock_conversation().len()
    }

    /// True between a submission and the first fragment of its reply.
    pub fn is_loading(&self) -> bool {
        self.lock_conversation().is_loading()
    }

    /// True while an exchange is in progress.
    pub fn is_busy(&self) -> bool {
        self.lock_conversation().is_busy()
    }

    /// Clears the conversation history.  Refused while an exchange is in progress.
    pub fn clear(&self) -> bool {
        self.update(|c| c.clear())
    }

    /// Returns the current model.
    pub fn model(&self) -> KnownModel {
        self.lock_selection().model()
    }

    /// Changes and saves the model used for the next exchange.
    pub fn set_model(&self, model: KnownModel) -> Result<()> {
        self.lock_selection().set(model)
    }

    /// Changes and saves the model by id; unknown ids are rejected.
    pub fn set_model_by_id(&self, id: &str) -> Result<KnownModel> {
        self.lock_selection().set_by_id(id)
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.model(),
            message_count: self.message_count(),
            exchanges: self.exchanges.load(Ordering::Relaxed),
            failed_exchanges: self.failed_exchanges.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    fn lock_conversation(&self) -> std::sync::MutexGuard<'_, Conversation> {
        self.conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_selection(&self) -> std::sync::MutexGuard<'_, ModelSelection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, f: impl FnOnce(&mut Conversation) -> R) -> R {
        let mut conversation = self.lock_conversation();
        let result = f(&mut conversation);
        self.updates.send_replace(conversation.snapshot());
        result
    }
}

/// Settles the exchange in progress.
///
/// Dropping the guard before the exchange settles (the caller stopped polling)
/// returns the conversation to idle so it does not stay busy forever.
struct ExchangeGuard<'a, T: Transport> {
    session: &'a ChatSession<T>,
    settled: bool,
}

impl<'a, T: Transport> ExchangeGuard<'a, T> {
    fn new(session: &'a ChatSession<T>) -> Self {
        Self {
            session,
            settled: false,
        }
    }

    fn finish(&mut self, renderer: &mut dyn Renderer) -> ExchangeOutcome {
        self.settled = true;
        let Some(message) = self.session.update(|c| c.finish().cloned()) else {
            return ExchangeOutcome::Ignored(IgnoreReason::Superseded);
        };
        renderer.finish_reply(&message);
        if message.is_error {
            self.session.failed_exchanges.fetch_add(1, Ordering::Relaxed);
            EXCHANGES_FAILED.click();
            tracing::warn!(content = %message.content, "backend reported an error");
            let error = Error::upstream(message.content.trim());
            ExchangeOutcome::Failed { message, error }
        } else {
            tracing::debug!(chars = message.content.len(), "exchange complete");
            ExchangeOutcome::Completed(message)
        }
    }

    fn fail(&mut self, error: Error, renderer: &mut dyn Renderer) -> ExchangeOutcome {
        self.settled = true;
        self.session.failed_exchanges.fetch_add(1, Ordering::Relaxed);
        EXCHANGES_FAILED.click();
        tracing::warn!(error = %error, "exchange failed");
        renderer.print_error(&format!("{ERROR_MESSAGE_TEXT} ({error})"));
        match self.session.update(|c| c.fail().cloned()) {
            Some(message) => ExchangeOutcome::Failed { message, error },
            None => ExchangeOutcome::Ignored(IgnoreReason::Superseded),
        }
    }
}

impl<T: Transport> Drop for ExchangeGuard<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!("exchange abandoned");
            self.session.update(|c| c.abandon());
        }
    }
}
