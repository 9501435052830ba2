//! Session Registry
//!
//! Host-owned bookkeeping that ties conversations to the output sinks their
//! replies are written into. The registry lives inside the host loop and is
//! never shared with worker tasks; workers identify conversations by id and
//! the host resolves ids to sinks when it applies their events.
//!
//! A conversation's sink is created lazily, on the first event that needs
//! it, and exactly once. When the user closes a sink, `release` drops the
//! sink and every conversation bound to it in one step, so a stale id can
//! never resolve to a dead surface.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::ChatTurn;
use crate::sink::{OutputSink, SinkFactory};

static NEXT_CONVERSATION: AtomicU64 = AtomicU64::new(0);
static NEXT_SINK: AtomicU64 = AtomicU64::new(0);

/// Opaque identifier for one conversation
///
/// Process-unique; also sent to the service as the `conversation_id` field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    /// Mint a fresh process-unique id
    #[must_use]
    pub fn next() -> Self {
        Self(format!(
            "conv_{}",
            NEXT_CONVERSATION.fetch_add(1, Ordering::Relaxed)
        ))
    }

    /// The wire form of the id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier for one registered sink
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

impl SinkId {
    fn next() -> Self {
        Self(NEXT_SINK.fetch_add(1, Ordering::Relaxed))
    }
}

/// One conversation's host-side state
struct Conversation {
    /// Prior turns, oldest first
    history: Vec<ChatTurn>,
    sink: SinkId,
}

/// Maps conversations to sinks and holds their histories
#[derive(Default)]
pub struct SessionRegistry {
    sinks: HashMap<SinkId, Box<dyn OutputSink>>,
    conversations: HashMap<ConversationId, Conversation>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a conversation to its sink id, creating both on first use
    ///
    /// The factory is consulted at most once per conversation; subsequent
    /// calls return the stored binding without touching it.
    pub fn resolve(&mut self, id: &ConversationId, factory: &mut dyn SinkFactory) -> SinkId {
        if let Some(conversation) = self.conversations.get(id) {
            return conversation.sink;
        }

        let sink_id = SinkId::next();
        let sink = factory.create(id.as_str());
        self.sinks.insert(sink_id, sink);
        self.conversations.insert(
            id.clone(),
            Conversation {
                history: Vec::new(),
                sink: sink_id,
            },
        );
        tracing::debug!(conversation = %id, "bound conversation to new sink");
        sink_id
    }

    /// The sink a conversation is bound to, if it still exists
    pub fn sink_mut(&mut self, id: &ConversationId) -> Option<&mut (dyn OutputSink + 'static)> {
        let sink = self.conversations.get(id)?.sink;
        self.sinks.get_mut(&sink).map(AsMut::as_mut)
    }

    /// The sink handle a conversation is bound to
    #[must_use]
    pub fn sink_id(&self, id: &ConversationId) -> Option<SinkId> {
        self.conversations.get(id).map(|c| c.sink)
    }

    /// Whether a conversation is registered
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.contains_key(id)
    }

    /// Append a turn to a conversation's history
    ///
    /// No-op for unknown conversations; an exchange that raced with a
    /// release has nowhere to persist to.
    pub fn push_history(&mut self, id: &ConversationId, turn: ChatTurn) {
        if let Some(conversation) = self.conversations.get_mut(id) {
            conversation.history.push(turn);
        }
    }

    /// A conversation's history, oldest first
    #[must_use]
    pub fn history(&self, id: &ConversationId) -> &[ChatTurn] {
        self.conversations
            .get(id)
            .map_or(&[], |c| c.history.as_slice())
    }

    /// Drop a sink and every conversation bound to it
    ///
    /// Idempotent: releasing an unknown or already-released sink does
    /// nothing.
    pub fn release(&mut self, sink: SinkId) {
        if self.sinks.remove(&sink).is_none() {
            return;
        }
        let before = self.conversations.len();
        self.conversations.retain(|_, c| c.sink != sink);
        tracing::debug!(
            released = before - self.conversations.len(),
            "released sink and its conversations"
        );
    }

    /// Number of live sinks
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}
