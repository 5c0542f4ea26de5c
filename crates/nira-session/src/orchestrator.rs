//! Session orchestration: model loading, chat turns and resets

use std::sync::Arc;

use futures::StreamExt;
use nira_engine::{
    ChatMessage, Engine, ModelCatalog, ModelDescriptor, ProgressSink, RawProgress,
    SamplingOptions, StreamChunk, Usage,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    assembler::{Generation, StreamAssembler},
    error::{Error, Result},
    events::SessionEvent,
    progress::ProgressReporter,
    state::SessionState,
    transcript::ChatTranscript,
    usage::UsageTally,
};

/// System prompt used when the configuration sets none
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Nira, a friendly assistant running entirely on this device. \
Explain things in simple words and keep answers short unless asked for detail.";

/// Notice shown in place of a failed assistant reply
pub const DEFAULT_FAILURE_NOTICE: &str =
    "Sorry, something went wrong while thinking. Please try again.";

const PREPARING_MESSAGE: &str = "Preparing to download the model…";
const READY_MESSAGE: &str = "Model ready. Ask your question!";
const LOAD_FAILED_MESSAGE: &str =
    "Could not download or load the model. Try again, or pick a smaller model.";

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// System prompt for new conversations
    pub system_prompt: String,
    /// Sampling options sent with every turn
    pub sampling: SamplingOptions,
    /// Text shown when a turn fails mid-generation
    pub failure_notice: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            sampling: SamplingOptions::default(),
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
        }
    }
}

/// How a `send_message` call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was appended to the transcript
    Completed {
        generation: Generation,
        text: String,
        usage: Option<Usage>,
    },
    /// A reset, reload or newer message superseded this turn
    Discarded { generation: Generation },
}

struct Inner {
    state: SessionState,
    transcript: ChatTranscript,
    system_prompt: String,
    assembler: StreamAssembler,
    reporter: ProgressReporter,
    usage: UsageTally,
    current_model: Option<ModelDescriptor>,
    load_seq: u64,
    active_load: Option<u64>,
}

/// Owns the engine, the transcript and the lifecycle of one chat session.
///
/// Cloning is cheap and every clone drives the same session, so a reset
/// issued from one task makes a stream draining in another task stale.
/// The shared state is only locked between suspension points.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Mutex<Inner>>,
    engine: Arc<dyn Engine>,
    catalog: Arc<ModelCatalog>,
    config: Arc<SessionConfig>,
    event_tx: broadcast::Sender<SessionEvent>,
    session_id: Uuid,
}

impl SessionOrchestrator {
    /// Create a new orchestrator in the `Unstarted` state
    pub fn new(config: SessionConfig, catalog: ModelCatalog, engine: Arc<dyn Engine>) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let inner = Inner {
            state: SessionState::default(),
            transcript: ChatTranscript::new(config.system_prompt.clone()),
            system_prompt: config.system_prompt.clone(),
            assembler: StreamAssembler::new(),
            reporter: ProgressReporter::new(),
            usage: UsageTally::default(),
            current_model: None,
            load_seq: 0,
            active_load: None,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            engine,
            catalog: Arc::new(catalog),
            config: Arc::new(config),
            event_tx,
            session_id: Uuid::new_v4(),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Copy of the current transcript
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.inner.lock().transcript.snapshot()
    }

    pub fn usage(&self) -> UsageTally {
        self.inner.lock().usage
    }

    /// The model loaded by the last successful `load_model`
    pub fn current_model(&self) -> Option<ModelDescriptor> {
        self.inner.lock().current_model.clone()
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Footer text: `"Tokens: 42 · Model: SmolLM 360M – Ultra Lite"`
    pub fn status_line(&self) -> String {
        let inner = self.inner.lock();
        let label = inner
            .current_model
            .as_ref()
            .map(|m| m.label.as_str())
            .unwrap_or("–");
        format!("Tokens: {} · Model: {}", inner.usage.total(), label)
    }

    /// Load (or reload) a catalog model.
    ///
    /// On success the conversation starts over. On failure the transcript
    /// is left as it was and the session moves to `Error`, from where the
    /// load can be retried.
    pub async fn load_model(&self, id: &str) -> Result<ModelDescriptor> {
        let (descriptor, load_seq) = {
            let mut inner = self.inner.lock();
            if !inner.state.can_start_load() && !inner.state.can_reload() {
                return Err(self.reject(Error::InvalidTransition {
                    from: inner.state,
                    action: "load a model",
                }));
            }
            let descriptor = match self.catalog.find(id) {
                Ok(descriptor) => descriptor.clone(),
                Err(_) => return Err(self.reject(Error::UnknownModel(id.to_string()))),
            };
            if let Err(e) = inner.state.begin_load() {
                return Err(self.reject(e));
            }

            // The engine is about to swap models; nothing in flight survives
            inner.assembler.invalidate();
            inner.reporter.begin_load();
            inner.load_seq += 1;
            let load_seq = inner.load_seq;
            inner.active_load = Some(load_seq);

            self.emit(SessionEvent::StateChanged {
                state: SessionState::Loading,
            });
            self.emit(SessionEvent::Progress {
                percent: 0,
                message: PREPARING_MESSAGE.to_string(),
            });
            (descriptor, load_seq)
        };

        tracing::info!(
            session = %self.session_id,
            "Loading model {} ({})",
            descriptor.id,
            descriptor.size_label()
        );
        let result = self
            .engine
            .load(&descriptor.id, self.progress_sink(load_seq))
            .await;

        let mut inner = self.inner.lock();
        inner.active_load = None;
        if let Err(e) = inner.state.complete_load(result.is_ok()) {
            return Err(self.reject(e));
        }

        match result {
            Ok(()) => {
                let system_prompt = inner.system_prompt.clone();
                inner.transcript.reset(system_prompt.clone());
                inner.assembler.invalidate();
                inner.usage.reset();
                inner.current_model = Some(descriptor.clone());
                let progress = inner.reporter.finish(READY_MESSAGE);

                self.emit(SessionEvent::Progress {
                    percent: progress.percent,
                    message: progress.message,
                });
                self.emit(SessionEvent::StateChanged {
                    state: SessionState::Ready,
                });
                self.emit(SessionEvent::TranscriptReset { system_prompt });
                self.emit(SessionEvent::UsageUpdated { tally: inner.usage });
                tracing::info!(session = %self.session_id, "Model {} ready", descriptor.id);
                Ok(descriptor)
            }
            Err(e) => {
                tracing::warn!(
                    session = %self.session_id,
                    "Failed to load model {}: {}",
                    descriptor.id,
                    e
                );
                inner.reporter.begin_load();
                self.emit(SessionEvent::Progress {
                    percent: 0,
                    message: LOAD_FAILED_MESSAGE.to_string(),
                });
                self.emit(SessionEvent::StateChanged {
                    state: SessionState::Error,
                });
                Err(self.reject(Error::ModelLoadFailed(e.diagnostic())))
            }
        }
    }

    /// Send a user message and stream the reply into the transcript.
    pub async fn send_message(&self, text: &str) -> Result<TurnOutcome> {
        let (generation, messages, cancel) = {
            let mut inner = self.inner.lock();
            if !inner.state.can_send() {
                return Err(self.reject(Error::NotReady { state: inner.state }));
            }
            let message = inner.transcript.append_user(text)?.clone();
            self.emit(SessionEvent::TranscriptAppended { message });

            let generation = inner.assembler.begin_turn();
            let cancel = inner.assembler.cancellation(generation);
            (generation, inner.transcript.snapshot(), cancel)
        };

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(self.discard(generation)),
            opened = self.engine.stream_chat(messages, &self.config.sampling) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return self.fail_turn(generation, e),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.discard(generation)),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    if !self.apply_chunk(generation, chunk) {
                        return Ok(self.discard(generation));
                    }
                }
                Some(Err(e)) => return self.fail_turn(generation, e),
                None => break,
            }
        }

        self.complete_turn(generation)
    }

    /// Start the conversation over with `system_prompt`.
    ///
    /// Always permitted. Any turn still streaming becomes stale. During a
    /// load the new prompt is also the one the loaded model starts with.
    pub fn reset_conversation(&self, system_prompt: impl Into<String>) {
        let system_prompt = system_prompt.into();
        let mut inner = self.inner.lock();
        inner.system_prompt = system_prompt.clone();
        inner.transcript.reset(system_prompt.clone());
        inner.assembler.invalidate();
        inner.usage.reset();

        tracing::debug!(session = %self.session_id, "Conversation reset");
        self.emit(SessionEvent::TranscriptReset { system_prompt });
        self.emit(SessionEvent::UsageUpdated { tally: inner.usage });
    }

    /// Start over with the current system prompt
    pub fn new_chat(&self) {
        let system_prompt = self.inner.lock().system_prompt.clone();
        self.reset_conversation(system_prompt);
    }

    // ---- Private helpers ----

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Log an error, surface it if the user should see it, and hand it back.
    fn reject(&self, error: Error) -> Error {
        match &error {
            Error::InvalidTransition { .. } => {
                tracing::error!(session = %self.session_id, "{}", error);
            }
            _ => tracing::debug!(session = %self.session_id, "{}", error),
        }
        if error.is_user_facing() {
            self.emit(SessionEvent::Error {
                kind: error.kind(),
                message: error.to_string(),
            });
        }
        error
    }

    fn progress_sink(&self, load_seq: u64) -> ProgressSink {
        let inner = Arc::clone(&self.inner);
        let event_tx = self.event_tx.clone();
        Arc::new(move |raw: RawProgress| {
            let mut inner = inner.lock();
            if inner.active_load != Some(load_seq) {
                tracing::debug!("Ignoring progress from finished load {}", load_seq);
                return;
            }
            let progress = inner.reporter.normalize(&raw);
            let _ = event_tx.send(SessionEvent::Progress {
                percent: progress.percent,
                message: progress.message,
            });
        })
    }

    /// Apply one chunk. Returns `false` if the turn went stale.
    fn apply_chunk(&self, generation: Generation, chunk: StreamChunk) -> bool {
        let mut inner = self.inner.lock();
        if !inner.assembler.is_current(generation) {
            return false;
        }
        if chunk.has_text() {
            if let Some(text) = inner.assembler.consume(&chunk.delta, generation) {
                let text = text.to_string();
                self.emit(SessionEvent::StreamingUpdate { generation, text });
            }
        }
        if let Some(usage) = chunk.usage {
            inner.assembler.apply_usage(usage, generation);
        }
        true
    }

    fn complete_turn(&self, generation: Generation) -> Result<TurnOutcome> {
        let mut inner = self.inner.lock();
        let turn = match inner.assembler.finalize(generation) {
            Ok(turn) => turn,
            Err(_) => return Ok(self.discard(generation)),
        };

        let message = inner.transcript.append_assistant(turn.text.clone()).clone();
        self.emit(SessionEvent::TranscriptAppended { message });
        if let Some(usage) = &turn.usage {
            inner.usage.add(usage);
            self.emit(SessionEvent::UsageUpdated { tally: inner.usage });
        }

        tracing::debug!(
            session = %self.session_id,
            "Turn {} complete ({} chars)",
            generation,
            turn.text.len()
        );
        Ok(TurnOutcome::Completed {
            generation,
            text: turn.text,
            usage: turn.usage,
        })
    }

    /// Finish a turn whose stream failed, keeping what already arrived.
    fn fail_turn(&self, generation: Generation, error: nira_engine::Error) -> Result<TurnOutcome> {
        let mut inner = self.inner.lock();
        let turn = match inner.assembler.finalize(generation) {
            Ok(turn) => turn,
            Err(_) => {
                tracing::debug!("Stale turn {} failed: {}", generation, error);
                return Ok(self.discard(generation));
            }
        };
        tracing::warn!(session = %self.session_id, "Turn {} failed: {}", generation, error);

        if !turn.text.is_empty() {
            let message = inner.transcript.append_assistant(turn.text.clone()).clone();
            self.emit(SessionEvent::TranscriptAppended { message });
        }
        if let Some(usage) = &turn.usage {
            inner.usage.add(usage);
            self.emit(SessionEvent::UsageUpdated { tally: inner.usage });
        }
        self.emit(SessionEvent::TurnFailed {
            generation,
            partial_text: turn.text.clone(),
            notice: self.config.failure_notice.clone(),
        });

        Err(self.reject(Error::StreamFailed {
            reason: error.diagnostic(),
            partial: turn.text,
        }))
    }

    fn discard(&self, generation: Generation) -> TurnOutcome {
        tracing::debug!(session = %self.session_id, "Turn {} superseded", generation);
        TurnOutcome::Discarded { generation }
    }
}
