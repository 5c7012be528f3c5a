//! Template negotiation.
//!
//! The bundled model does not say which chat format it was tuned on, so each
//! prompt is tried under the candidate templates in priority order until one
//! of them produces a usable completion.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::{ModelEngine, Session, BUSY_SENTINEL};
use crate::template::Template;

/// What to do when the engine answers with [`BUSY_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Reject the template and move on to the next one.
    #[default]
    Advance,
    /// Ask the same template again up to `attempts` more times, sleeping
    /// `delay` in between, before moving on.
    Retry { attempts: u32, delay: Duration },
}

/// How one candidate template fared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    Empty,
    Busy,
    /// No session could be loaded for the template.
    Skipped(String),
}

/// One try of one template within a negotiation.
#[derive(Debug, Clone)]
pub struct CompletionAttempt {
    pub template: &'static str,
    pub raw: String,
    pub outcome: AttemptOutcome,
}

/// Result of a negotiation: the accepted completion (empty when every
/// candidate was rejected) and the attempts that led to it.
#[derive(Debug, Clone, Default)]
pub struct NegotiationReport {
    pub response: String,
    pub attempts: Vec<CompletionAttempt>,
}

impl NegotiationReport {
    /// The accepted attempt, if any.
    pub fn accepted(&self) -> Option<&CompletionAttempt> {
        self.attempts
            .iter()
            .find(|a| a.outcome == AttemptOutcome::Accepted)
    }
}

/// Ordered, short-circuiting search over prompt templates.
pub struct Negotiator<'a> {
    engine: &'a dyn ModelEngine,
    model: &'a Path,
    templates: &'a [Template],
    busy_policy: BusyPolicy,
}

impl<'a> Negotiator<'a> {
    pub fn new(engine: &'a dyn ModelEngine, model: &'a Path, templates: &'a [Template]) -> Self {
        Self {
            engine,
            model,
            templates,
            busy_policy: BusyPolicy::Advance,
        }
    }

    pub fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }

    /// Find the first template that yields a non-empty, non-busy completion
    /// for `prompt`.
    ///
    /// `primary` answers for its own template; every other candidate gets a
    /// session loaded just for this attempt and dropped right after it.
    /// Neither history is modified.
    pub async fn negotiate(&self, primary: &mut dyn Session, prompt: &str) -> NegotiationReport {
        let mut report = NegotiationReport::default();

        for template in self.templates {
            info!("Trying template: {}", template.name());

            let mut transient: Option<Box<dyn Session>> = None;
            let session: &mut dyn Session = if primary.template() == template {
                &mut *primary
            } else {
                match self.engine.load(self.model, template).await {
                    Ok(session) => transient.insert(session).as_mut(),
                    Err(e) => {
                        warn!(
                            "Failed to load {} with template {}: {}",
                            self.model.display(),
                            template.name(),
                            e
                        );
                        report.attempts.push(CompletionAttempt {
                            template: template.name(),
                            raw: String::new(),
                            outcome: AttemptOutcome::Skipped(e.to_string()),
                        });
                        continue;
                    }
                }
            };

            debug!(
                "Prompt sent to model ({}):\n{}",
                template.name(),
                session.render(prompt)
            );

            let raw = self.complete(session, prompt).await;
            let outcome = classify(&raw);
            let accepted = outcome == AttemptOutcome::Accepted;
            if accepted {
                info!("LLM response ({}): {}", template.name(), raw);
                report.response = raw.clone();
            } else {
                warn!("LLM returned empty or busy for template {}", template.name());
            }
            report.attempts.push(CompletionAttempt {
                template: template.name(),
                raw,
                outcome,
            });
            if accepted {
                break;
            }
        }

        report
    }

    async fn complete(&self, session: &mut dyn Session, prompt: &str) -> String {
        let mut raw = session.complete(prompt).await;
        if let BusyPolicy::Retry { attempts, delay } = &self.busy_policy {
            let mut left = *attempts;
            while raw == BUSY_SENTINEL && left > 0 {
                debug!(
                    "Engine busy, retrying {} in {:?}",
                    session.template().name(),
                    delay
                );
                tokio::time::sleep(*delay).await;
                raw = session.complete(prompt).await;
                left -= 1;
            }
        }
        raw
    }
}

fn classify(raw: &str) -> AttemptOutcome {
    if raw.is_empty() {
        AttemptOutcome::Empty
    } else if raw == BUSY_SENTINEL {
        AttemptOutcome::Busy
    } else {
        AttemptOutcome::Accepted
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::history::ConversationHistory;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    /// Calls observed by the scripted engine, in order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Load(&'static str),
        Complete(&'static str, String),
        Drop(&'static str),
    }

    /// Engine whose sessions answer from a per-template script.
    #[derive(Default)]
    pub(crate) struct ScriptedEngine {
        replies: Mutex<HashMap<&'static str, VecDeque<String>>>,
        unloadable: Vec<&'static str>,
        pub(crate) calls: Arc<Mutex<Vec<Call>>>,
        pub(crate) delay: Option<Duration>,
    }

    impl ScriptedEngine {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(self, template: &'static str, text: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(template)
                .or_default()
                .push_back(text.to_string());
            self
        }

        pub(crate) fn unloadable(mut self, template: &'static str) -> Self {
            self.unloadable.push(template);
            self
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn session(&self, template: &Template) -> Box<dyn Session> {
            let replies = self
                .replies
                .lock()
                .unwrap()
                .remove(template.name())
                .unwrap_or_default();
            Box::new(ScriptedSession {
                template: template.clone(),
                history: ConversationHistory::new(),
                replies,
                calls: Arc::clone(&self.calls),
                delay: self.delay,
            })
        }
    }

    #[async_trait]
    impl ModelEngine for ScriptedEngine {
        async fn load(
            &self,
            model: &Path,
            template: &Template,
        ) -> Result<Box<dyn Session>, EngineError> {
            self.calls.lock().unwrap().push(Call::Load(template.name()));
            if self.unloadable.contains(&template.name()) {
                return Err(EngineError::ModelNotFound(model.to_path_buf()));
            }
            Ok(self.session(template))
        }
    }

    pub(crate) struct ScriptedSession {
        template: Template,
        history: ConversationHistory,
        replies: VecDeque<String>,
        calls: Arc<Mutex<Vec<Call>>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Session for ScriptedSession {
        fn template(&self) -> &Template {
            &self.template
        }

        fn history(&self) -> &ConversationHistory {
            &self.history
        }

        async fn complete(&mut self, prompt: &str) -> String {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Complete(self.template.name(), prompt.to_string()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.replies.pop_front().unwrap_or_default()
        }

        fn history_mut(&mut self) -> &mut ConversationHistory {
            &mut self.history
        }
    }

    impl Drop for ScriptedSession {
        fn drop(&mut self) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(Call::Drop(self.template.name()));
            }
        }
    }

    fn templates() -> Vec<Template> {
        Template::defaults("You are a helpful assistant.")
    }

    /// Negotiate with a primary chatML session. The primary is handed back
    /// so its drop does not show up in the recorded calls.
    async fn run(engine: &ScriptedEngine, prompt: &str) -> (NegotiationReport, Box<dyn Session>) {
        let templates = templates();
        let mut primary = engine.session(&templates[0]);
        let report = Negotiator::new(engine, Path::new("model.gguf"), &templates)
            .negotiate(primary.as_mut(), prompt)
            .await;
        (report, primary)
    }

    #[tokio::test]
    async fn test_first_template_short_circuits() {
        let engine = ScriptedEngine::new()
            .reply("chatML", "Hello!")
            .reply("llama", "never")
            .reply("alpaca", "never");

        let (report, _primary) = run(&engine, "Hi").await;

        assert_eq!(report.response, "Hello!");
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(
            engine.calls(),
            vec![Call::Complete("chatML", "Hi".to_string())]
        );
    }

    #[tokio::test]
    async fn test_falls_back_in_order_and_drops_transient_sessions() {
        let engine = ScriptedEngine::new()
            .reply("chatML", "")
            .reply("llama", BUSY_SENTINEL)
            .reply("alpaca", "From alpaca");

        let (report, _primary) = run(&engine, "Hi").await;

        assert_eq!(report.response, "From alpaca");
        assert_eq!(report.accepted().map(|a| a.template), Some("alpaca"));
        assert_eq!(
            engine.calls(),
            vec![
                Call::Complete("chatML", "Hi".to_string()),
                Call::Load("llama"),
                Call::Complete("llama", "Hi".to_string()),
                Call::Drop("llama"),
                Call::Load("alpaca"),
                Call::Complete("alpaca", "Hi".to_string()),
                Call::Drop("alpaca"),
            ]
        );
    }

    #[tokio::test]
    async fn test_all_busy_returns_empty() {
        let engine = ScriptedEngine::new()
            .reply("chatML", BUSY_SENTINEL)
            .reply("llama", BUSY_SENTINEL)
            .reply("alpaca", BUSY_SENTINEL);

        let (report, _primary) = run(&engine, "Hi").await;

        assert_eq!(report.response, "");
        assert!(report.accepted().is_none());
        assert!(report
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::Busy));
    }

    #[tokio::test]
    async fn test_all_empty_returns_empty() {
        let engine = ScriptedEngine::new();
        let (report, _primary) = run(&engine, "Hi").await;

        assert_eq!(report.response, "");
        assert_eq!(report.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_load_failure_skips_candidate() {
        let engine = ScriptedEngine::new()
            .unloadable("llama")
            .reply("alpaca", "ok");

        let (report, _primary) = run(&engine, "Hi").await;

        assert_eq!(report.response, "ok");
        assert!(matches!(
            report.attempts[1].outcome,
            AttemptOutcome::Skipped(_)
        ));
        assert!(!engine
            .calls()
            .contains(&Call::Complete("llama", "Hi".to_string())));
    }

    #[tokio::test]
    async fn test_primary_history_untouched() {
        let engine = ScriptedEngine::new().reply("chatML", "Hello!");
        let templates = templates();
        let mut primary = engine.session(&templates[0]);

        Negotiator::new(&engine, Path::new("model.gguf"), &templates)
            .negotiate(primary.as_mut(), "Hi")
            .await;

        assert!(primary.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_asks_same_template_again() {
        let engine = ScriptedEngine::new()
            .reply("chatML", BUSY_SENTINEL)
            .reply("chatML", "second try");
        let templates = templates();
        let mut primary = engine.session(&templates[0]);

        let report = Negotiator::new(&engine, Path::new("model.gguf"), &templates)
            .with_busy_policy(BusyPolicy::Retry {
                attempts: 2,
                delay: Duration::from_millis(100),
            })
            .negotiate(primary.as_mut(), "Hi")
            .await;

        assert_eq!(report.response, "second try");
        assert!(!engine.calls().contains(&Call::Load("llama")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_advances_after_attempts_exhausted() {
        let engine = ScriptedEngine::new()
            .reply("chatML", BUSY_SENTINEL)
            .reply("chatML", BUSY_SENTINEL)
            .reply("chatML", BUSY_SENTINEL)
            .reply("chatML", "too late")
            .reply("llama", "from llama");
        let templates = templates();
        let mut primary = engine.session(&templates[0]);

        let report = Negotiator::new(&engine, Path::new("model.gguf"), &templates)
            .with_busy_policy(BusyPolicy::Retry {
                attempts: 2,
                delay: Duration::from_millis(100),
            })
            .negotiate(primary.as_mut(), "Hi")
            .await;

        assert_eq!(report.response, "from llama");
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::Busy);
        let chat_ml_calls = engine
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Complete("chatML", _)))
            .count();
        assert_eq!(chat_ml_calls, 3);
        assert!(engine.calls().contains(&Call::Load("llama")));
    }
}
