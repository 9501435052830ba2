//! Assistant Orchestrator
//!
//! The host-side hub that ties the pieces together. All shared state (the
//! registry, the coalescer, the current completion batch) is owned here and
//! mutated only from [`Assistant::poll`], which the embedding editor calls
//! from its idle tick. Worker tasks run the network calls and communicate
//! exclusively through an event channel; they never touch a sink.
//!
//! ```text
//!   editor idle tick ──> poll() ──┬─ apply completion batch
//!                                 ├─ append chat delta to sink
//!                                 └─ close exchange, persist history
//!           ▲                               ▲
//!           │ events (mpsc)                 │
//!   completion worker ──────────── chat stream worker
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiError, CompletionBackend};
use crate::chat::{ChatEvent, ChatStreamSession, WrappedTextDecoder};
use crate::completion::{hint, CompletionCoalescer, CompletionItem, DocumentSnapshot, Generation};
use crate::config::ClientConfig;
use crate::protocol::ChatTurn;
use crate::registry::{ConversationId, SessionRegistry, SinkId};
use crate::sink::{OutputSink, SinkFactory};
use crate::supervisor::{ConnectionSupervisor, SupervisorError};

/// Event channel depth; workers block (briefly) when the host falls behind
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Delay between attempts to take over the single answering slot
const ANSWER_TAKEOVER_INTERVAL: Duration = Duration::from_millis(50);

/// Attempts before a new question gives up waiting for the previous one
const ANSWER_TAKEOVER_LIMIT: u32 = 200;

/// Errors from orchestrator operations
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Chat was requested before [`Assistant::connect`]
    #[error("not connected to the service")]
    NotConnected,

    /// A service call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The local bridge could not be supervised
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Worker-to-host events
#[derive(Debug)]
enum AssistantEvent {
    /// A completion request finished, successfully or not
    CompletionsReady {
        generation: Generation,
        outcome: Option<Vec<CompletionItem>>,
    },
    /// Progress on a chat exchange
    Chat(ChatEvent),
}

/// What one [`Assistant::poll`] call applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Polled {
    /// A completion round drained; `applied` is false when every request in
    /// the round failed
    Completions {
        /// Whether a new batch replaced the stored one
        applied: bool,
    },
    /// A chat delta was written to its conversation's sink
    ChatDelta,
    /// A chat exchange ended
    ChatClosed {
        /// Conversation the exchange belonged to
        conversation_id: ConversationId,
        /// Whether the exchange was cancelled
        cancelled: bool,
        /// Failure description when the exchange ended in error
        error: Option<String>,
    },
}

/// Releases the single answering slot when the worker exits, on every path
struct AnsweringGuard(Arc<AtomicBool>);

impl Drop for AnsweringGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The host-side orchestrator
///
/// Generic over the completion backend so tests can script one; production
/// code uses [`ApiClient`] for both completions and chat.
pub struct Assistant<B: CompletionBackend + 'static> {
    config: ClientConfig,
    backend: Arc<B>,
    api: Option<ApiClient>,
    supervisor: Option<ConnectionSupervisor>,
    registry: SessionRegistry,
    sink_factory: Box<dyn SinkFactory>,
    coalescer: CompletionCoalescer,
    /// Caret-line indentation per in-flight generation, for hint layout
    hint_indents: HashMap<Generation, String>,
    answering: Arc<AtomicBool>,
    cancel_current: Arc<AtomicBool>,
    events_tx: mpsc::Sender<AssistantEvent>,
    events_rx: mpsc::Receiver<AssistantEvent>,
    completions: Vec<CompletionItem>,
    hint_lines: Vec<String>,
    last_answer: Option<String>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Assistant<ApiClient> {
    /// Connect to the service and return a ready orchestrator
    ///
    /// Spawns and supervises the local bridge when the config names a
    /// binary, registers for an API key when only an auth token is present,
    /// and starts the background heartbeat.
    ///
    /// # Errors
    ///
    /// Fails when the bridge cannot be spawned or never announces a port,
    /// or when registration fails.
    pub async fn connect(
        mut config: ClientConfig,
        sink_factory: Box<dyn SinkFactory>,
    ) -> Result<Self, AssistantError> {
        let mut supervisor = None;
        let mut base_url = config.api_server_url.clone();

        if let Some(binary) = config.server_binary.clone() {
            let mut s = ConnectionSupervisor::spawn(&binary, &config.api_server_url)?;
            let port = s
                .wait_for_port(config.port_retry_limit, config.port_retry_interval())
                .await?;
            base_url = format!("http://127.0.0.1:{port}");
            supervisor = Some(s);
        }

        if config.api_key.is_empty() && !config.auth_token.is_empty() {
            // Registration is served by the remote API server, not the bridge.
            let registrar = ApiClient::new(
                config.api_server_url.clone(),
                config.metadata(),
                config.unary_timeout(),
            )?;
            config.api_key = registrar.register_user(&config.auth_token).await?;
            tracing::info!("registered for api key");
            if let Some(path) = crate::config::default_config_path() {
                if let Err(e) = crate::config::save_config_to_path(&config, &path) {
                    tracing::warn!(error = %e, "could not persist api key");
                }
            }
        }

        let api = ApiClient::new(base_url, config.metadata(), config.unary_timeout())?;
        let heartbeat = spawn_heartbeat(api.clone(), config.heartbeat_interval());

        let mut assistant = Self::new(config, Arc::new(api.clone()), sink_factory);
        assistant.api = Some(api);
        assistant.supervisor = supervisor;
        assistant.heartbeat = Some(heartbeat);
        Ok(assistant)
    }
}

impl<B: CompletionBackend + 'static> Assistant<B> {
    /// Build an orchestrator around an existing backend
    ///
    /// Chat requires [`Assistant::connect`]; this constructor alone serves
    /// completion-only embedding and tests.
    #[must_use]
    pub fn new(config: ClientConfig, backend: Arc<B>, sink_factory: Box<dyn SinkFactory>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            backend,
            api: None,
            supervisor: None,
            registry: SessionRegistry::new(),
            sink_factory,
            coalescer: CompletionCoalescer::new(),
            hint_indents: HashMap::new(),
            answering: Arc::new(AtomicBool::new(false)),
            cancel_current: Arc::new(AtomicBool::new(false)),
            events_tx,
            events_rx,
            completions: Vec::new(),
            hint_lines: Vec::new(),
            last_answer: None,
            heartbeat: None,
        }
    }

    /// Issue a completion request for a document snapshot
    ///
    /// Overlapping requests coalesce: only the newest-issued round survives,
    /// applied on a later [`Assistant::poll`] once all in-flight requests
    /// drain. Returns the request's generation.
    pub fn request_completions(&mut self, snapshot: DocumentSnapshot) -> Generation {
        let generation = self.coalescer.begin();
        self.hint_indents
            .insert(generation, snapshot.cursor_line_indent());

        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = match backend.completions(&snapshot).await {
                Ok(items) => Some(items),
                Err(e) => {
                    tracing::warn!(generation, error = %e, "completion request failed");
                    None
                }
            };
            let _ = events
                .send(AssistantEvent::CompletionsReady {
                    generation,
                    outcome,
                })
                .await;
        });
        generation
    }

    /// Ask a question, starting or continuing a conversation
    ///
    /// Any answer already streaming is cancelled first; the new exchange
    /// waits for the old one to let go before opening its stream. The
    /// question is echoed into the conversation's sink immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::NotConnected`] before a successful
    /// [`Assistant::connect`].
    pub fn ask(
        &mut self,
        prompt: &str,
        conversation: Option<ConversationId>,
    ) -> Result<ConversationId, AssistantError> {
        let api = self.api.clone().ok_or(AssistantError::NotConnected)?;
        let id = conversation.unwrap_or_else(ConversationId::next);

        self.registry.resolve(&id, self.sink_factory.as_mut());
        let history = self.registry.history(&id).to_vec();
        self.registry.push_history(&id, ChatTurn::user(prompt));
        if let Some(sink) = self.registry.sink_mut(&id) {
            let lead = if sink.end_position() == crate::sink::Position::default() {
                String::new()
            } else {
                "\n\n".to_string()
            };
            sink.append(&format!("{lead}> {prompt}\n\n"));
            sink.set_busy(true);
        }

        let worker = ChatWorker {
            api,
            prompt: prompt.to_string(),
            conversation_id: id.clone(),
            history,
            answering: Arc::clone(&self.answering),
            cancel: Arc::clone(&self.cancel_current),
            events: self.events_tx.clone(),
            chunk_timeout: self.config.chat_chunk_timeout(),
        };
        tokio::spawn(worker.run());
        Ok(id)
    }

    /// Apply at most one pending worker event
    ///
    /// Called from the editor's idle tick. Never blocks; returns `None`
    /// when no event is waiting.
    pub fn poll(&mut self) -> Option<Polled> {
        let event = self.events_rx.try_recv().ok()?;
        Some(self.apply_event(event))
    }

    fn apply_event(&mut self, event: AssistantEvent) -> Polled {
        match event {
            AssistantEvent::CompletionsReady {
                generation,
                outcome,
            } => {
                let winner = self.coalescer.finish(generation, outcome);
                if self.coalescer.in_flight() == 0 {
                    let applied = if let Some((generation, items)) = winner {
                        let indent = self.hint_indents.remove(&generation).unwrap_or_default();
                        self.hint_lines =
                            hint::hint_lines(&items, &indent, self.config.hint_width);
                        self.completions = items;
                        true
                    } else {
                        false
                    };
                    self.hint_indents.clear();
                    Polled::Completions { applied }
                } else {
                    Polled::Completions { applied: false }
                }
            }
            AssistantEvent::Chat(ChatEvent::Delta {
                conversation_id,
                text,
            }) => {
                // ask() bound the sink; a missing binding means the user
                // released it while this delta sat in the queue. Never
                // re-create it here.
                match self.registry.sink_id(&conversation_id) {
                    None => {
                        tracing::debug!(
                            conversation = %conversation_id,
                            "sink released mid-stream, cancelling"
                        );
                        self.cancel_current.store(true, Ordering::Release);
                    }
                    Some(sink_id) => {
                        let valid = self
                            .registry
                            .sink_mut(&conversation_id)
                            .is_some_and(|sink| sink.is_valid());
                        if valid {
                            if let Some(sink) = self.registry.sink_mut(&conversation_id) {
                                sink.append(&text);
                            }
                        } else {
                            self.invalidate(&conversation_id, sink_id);
                        }
                    }
                }
                Polled::ChatDelta
            }
            AssistantEvent::Chat(ChatEvent::Closed {
                conversation_id,
                final_text,
                cancelled,
                error,
            }) => {
                if let Some(text) = &final_text {
                    self.registry
                        .push_history(&conversation_id, ChatTurn::assistant(text.clone()));
                }
                if let Some(sink) = self.registry.sink_mut(&conversation_id) {
                    sink.set_busy(false);
                    sink.mark_unmodified();
                    let end = sink.end_position();
                    sink.set_caret(end);
                }
                if let Some(error) = &error {
                    tracing::warn!(conversation = %conversation_id, error, "chat exchange failed");
                }
                self.last_answer = final_text;
                Polled::ChatClosed {
                    conversation_id,
                    cancelled,
                    error,
                }
            }
        }
    }

    /// Cancel the stream writing into a dead sink and drop the binding
    fn invalidate(&mut self, id: &ConversationId, sink: SinkId) {
        tracing::debug!(conversation = %id, "sink closed mid-stream, cancelling");
        self.cancel_current.store(true, Ordering::Release);
        self.registry.release(sink);
    }

    /// Insert a stored completion into a sink
    ///
    /// Replaces the item's document span with its full text and applies the
    /// service's caret adjustment. Returns false for an out-of-range index.
    pub fn apply_completion(&self, index: usize, sink: &mut dyn OutputSink) -> bool {
        let Some(item) = self.completions.get(index) else {
            return false;
        };

        let caret = sink.replace_range(item.range_start, item.range_end, &item.full_text());
        if item.cursor_offset_delta != 0 {
            let offset = sink.offset_at(caret) as i64 + item.cursor_offset_delta;
            let offset = usize::try_from(offset.max(0)).unwrap_or(0);
            let adjusted = sink.position_at(offset);
            sink.set_caret(adjusted);
        }
        true
    }

    /// Cancel the currently streaming answer, if any
    pub fn cancel(&self) {
        self.cancel_current.store(true, Ordering::Release);
    }

    /// Whether an answer is currently streaming
    #[must_use]
    pub fn is_answering(&self) -> bool {
        self.answering.load(Ordering::Acquire)
    }

    /// The most recently applied completion batch
    #[must_use]
    pub fn completions(&self) -> &[CompletionItem] {
        &self.completions
    }

    /// Display lines for the current batch's first item
    #[must_use]
    pub fn hint_lines(&self) -> &[String] {
        &self.hint_lines
    }

    /// Final text of the last closed exchange
    #[must_use]
    pub fn last_answer(&self) -> Option<&str> {
        self.last_answer.as_deref()
    }

    /// Host-owned conversation and sink state
    pub fn registry_mut(&mut self) -> &mut SessionRegistry {
        &mut self.registry
    }

    /// Stop background work: the heartbeat, any streaming answer, and the
    /// supervised bridge
    pub async fn shutdown(&mut self) {
        self.cancel();
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        if let Some(supervisor) = self.supervisor.as_mut() {
            if let Err(e) = supervisor.stop().await {
                tracing::warn!(error = %e, "bridge did not stop cleanly");
            }
        }
    }
}

fn spawn_heartbeat(api: ApiClient, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = api.heartbeat().await {
                tracing::warn!(error = %e, "heartbeat failed");
            }
        }
    })
}

/// Wait for the single answering slot
///
/// The cancel request is re-asserted on every failed attempt: a competing
/// exchange that wins the slot first clears the shared cancel flag, so a
/// one-shot request can be lost under contention.
async fn acquire_answering_slot(answering: &AtomicBool, cancel: &AtomicBool) -> bool {
    for _ in 0..ANSWER_TAKEOVER_LIMIT {
        if answering
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return true;
        }
        cancel.store(true, Ordering::Release);
        tokio::time::sleep(ANSWER_TAKEOVER_INTERVAL).await;
    }
    false
}

/// One chat exchange's streaming worker
struct ChatWorker {
    api: ApiClient,
    prompt: String,
    conversation_id: ConversationId,
    history: Vec<ChatTurn>,
    answering: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    events: mpsc::Sender<AssistantEvent>,
    chunk_timeout: Duration,
}

impl ChatWorker {
    async fn run(self) {
        // Kick out whoever is answering, then wait for the slot.
        self.cancel.store(true, Ordering::Release);
        if !acquire_answering_slot(&self.answering, &self.cancel).await {
            self.close(None, false, Some("previous answer did not stop".to_string()))
                .await;
            return;
        }
        let _guard = AnsweringGuard(Arc::clone(&self.answering));
        self.cancel.store(false, Ordering::Release);

        let mut session = ChatStreamSession::new(WrappedTextDecoder);
        let mut cancelled = false;
        let mut error = None;

        match self
            .api
            .open_chat_stream(
                &self.prompt,
                self.conversation_id.as_str(),
                self.history.clone(),
            )
            .await
        {
            Err(e) => error = Some(e.to_string()),
            Ok(stream) => {
                futures::pin_mut!(stream);
                loop {
                    // Cancellation is only observed at chunk boundaries.
                    if self.cancel.load(Ordering::Acquire) {
                        cancelled = true;
                        break;
                    }
                    match tokio::time::timeout(self.chunk_timeout, stream.next()).await {
                        Err(_) => {
                            error = Some("chat stream stalled".to_string());
                            break;
                        }
                        Ok(None) => break,
                        Ok(Some(Err(e))) => {
                            error = Some(e.to_string());
                            break;
                        }
                        Ok(Some(Ok(chunk))) => match session.process_chunk(&chunk) {
                            Err(e) => {
                                error = Some(e.to_string());
                                break;
                            }
                            Ok(outcome) => {
                                for text in outcome.deltas {
                                    let _ = self
                                        .events
                                        .send(AssistantEvent::Chat(ChatEvent::Delta {
                                            conversation_id: self.conversation_id.clone(),
                                            text,
                                        }))
                                        .await;
                                }
                                if outcome.finished {
                                    break;
                                }
                            }
                        },
                    }
                }
            }
        }

        let final_text = session.last_text().map(str::to_string);
        self.close(final_text, cancelled, error).await;
    }

    /// Post the exchange's single `Closed` event
    async fn close(&self, final_text: Option<String>, cancelled: bool, error: Option<String>) {
        let _ = self
            .events
            .send(AssistantEvent::Chat(ChatEvent::Closed {
                conversation_id: self.conversation_id.clone(),
                final_text,
                cancelled,
                error,
            }))
            .await;
    }
}
