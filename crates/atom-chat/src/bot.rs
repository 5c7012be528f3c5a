//! The chat bot and the per-conversation controller around it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::engine::{EngineError, ModelEngine, Session};
use crate::history::ConversationHistory;
use crate::negotiator::{BusyPolicy, CompletionAttempt, NegotiationReport, Negotiator};
use crate::sanitizer::sanitize;
use crate::template::Template;

/// Text shown when no template produced anything.
pub const NO_RESPONSE: &str = "(No response)";

/// Errors from the chat layer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("failed to start chat session: {0}")]
    Startup(#[source] EngineError),
    #[error("a response is already being generated")]
    Busy,
    #[error("prompt is empty")]
    EmptyPrompt,
}

/// Owns the primary session and negotiates completions against it.
pub struct ChatBot {
    engine: Arc<dyn ModelEngine>,
    model: PathBuf,
    templates: Vec<Template>,
    busy_policy: BusyPolicy,
    history_limit: usize,
    primary: Mutex<Box<dyn Session>>,
}

impl ChatBot {
    /// Load the primary session under the first default template.
    ///
    /// Failing here is fatal: without the primary session there is nothing
    /// to chat with.
    pub async fn new(engine: Arc<dyn ModelEngine>, config: &ChatConfig) -> Result<Self, ChatError> {
        let templates = Template::defaults(&config.system_prompt);
        Self::with_templates(engine, config, templates).await
    }

    /// Like [`ChatBot::new`] with an explicit candidate list. The first
    /// template is the primary one.
    pub async fn with_templates(
        engine: Arc<dyn ModelEngine>,
        config: &ChatConfig,
        templates: Vec<Template>,
    ) -> Result<Self, ChatError> {
        let model = config.model_path();
        let primary_template = templates.first().ok_or_else(|| {
            ChatError::Startup(EngineError::Load("no templates configured".to_string()))
        })?;
        if !model.exists() {
            return Err(ChatError::Startup(EngineError::ModelNotFound(model)));
        }

        let primary = engine
            .load(&model, primary_template)
            .await
            .map_err(ChatError::Startup)?;
        info!("Model loaded successfully from {}", model.display());

        Ok(Self {
            engine,
            model,
            templates,
            busy_policy: config.busy_policy.clone(),
            history_limit: config.history_limit,
            primary: Mutex::new(primary),
        })
    }

    /// Run one negotiation for `prompt`.
    pub async fn negotiate(&self, prompt: &str) -> NegotiationReport {
        let mut primary = self.primary.lock().await;
        Negotiator::new(self.engine.as_ref(), &self.model, &self.templates)
            .with_busy_policy(self.busy_policy.clone())
            .negotiate(primary.as_mut(), prompt)
            .await
    }

    /// Negotiate on a background task. The handle resolves to the accepted
    /// raw completion, or an empty string when every template was rejected.
    /// Once started, the task runs to completion.
    pub fn generate_response(self: &Arc<Self>, prompt: impl Into<String>) -> JoinHandle<String> {
        let bot = Arc::clone(self);
        let prompt = prompt.into();
        tokio::spawn(async move { bot.negotiate(&prompt).await.response })
    }

    /// Add an accepted exchange to the primary session's history, dropping
    /// the oldest exchanges past the configured limit.
    pub async fn record_exchange(&self, user: &str, assistant: &str) {
        self.primary
            .lock()
            .await
            .record_exchange(user, assistant, self.history_limit);
    }
}

/// Text to show for a negotiated completion: the placeholder when nothing
/// was accepted, otherwise the sanitized completion. `history` must already
/// end with the user's prompt.
pub fn display_text(raw: &str, history: &ConversationHistory) -> String {
    let raw = if raw.is_empty() { NO_RESPONSE } else { raw };
    sanitize(raw, history)
}

/// One user turn as displayed.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Sanitized text to show.
    pub text: String,
    /// Whether a template produced a completion.
    pub accepted: bool,
    pub attempts: Vec<CompletionAttempt>,
}

/// Drives one conversation: keeps the transcript and refuses a new prompt
/// while the previous one is still being answered.
pub struct ChatController {
    bot: Arc<ChatBot>,
    transcript: Mutex<ConversationHistory>,
    busy: AtomicBool,
}

impl ChatController {
    pub fn new(bot: Arc<ChatBot>) -> Self {
        Self {
            bot,
            transcript: Mutex::new(ConversationHistory::new()),
            busy: AtomicBool::new(false),
        }
    }

    /// Send one user message and wait for the displayed reply.
    pub async fn send(&self, input: &str) -> Result<Reply, ChatError> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Err(ChatError::EmptyPrompt);
        }
        let _busy = BusyGuard::acquire(&self.busy).ok_or(ChatError::Busy)?;

        self.transcript.lock().await.push_user(prompt);

        let report = self.bot.negotiate(prompt).await;
        let accepted = report.accepted().is_some();
        if !accepted {
            warn!("No template produced a response for this prompt");
        }
        let text = {
            let mut transcript = self.transcript.lock().await;
            let text = display_text(&report.response, &transcript);
            transcript.push_assistant(text.clone());
            text
        };

        if accepted {
            self.bot.record_exchange(prompt, &text).await;
        }

        Ok(Reply {
            text,
            accepted,
            attempts: report.attempts,
        })
    }

    /// Whether a reply is currently being generated.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Snapshot of the conversation so far.
    pub async fn transcript(&self) -> ConversationHistory {
        self.transcript.lock().await.clone()
    }
}

/// Holds the busy flag for the duration of one `send`.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
