//! # Sidekick Core
//!
//! Editor-integrated client for a remote code-assistance service. The crate
//! is the editor-agnostic core: an embedding editor supplies an
//! [`sink::OutputSink`] implementation and an idle tick, and gets inline
//! completions and streamed chat answers back.
//!
//! ## Architecture
//!
//! ```text
//!   ┌────────────────────── host (editor thread) ──────────────────────┐
//!   │  Assistant ── CompletionCoalescer ── SessionRegistry ── sinks    │
//!   └───────────────▲──────────────────────────────────────────────────┘
//!                   │ events (mpsc)
//!   ┌───────────────┴──────────── workers (tokio) ─────────────────────┐
//!   │  completion calls        chat stream ── FrameDecoder ── deltas   │
//!   └───────────────▲──────────────────────────────────────────────────┘
//!                   │ HTTP
//!            ConnectionSupervisor ── local bridge ── remote service
//! ```
//!
//! Everything shared is owned by the host side and mutated only from
//! [`assistant::Assistant::poll`]. Workers hold clones of the API client
//! and two atomic flags; they never touch a sink or the registry.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

pub mod api;
pub mod assistant;
pub mod chat;
pub mod completion;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod sink;
pub mod supervisor;
pub mod transport;

pub use api::{ApiClient, ApiError, CompletionBackend};
pub use assistant::{Assistant, AssistantError, Polled};
pub use chat::{ChatError, ChatStreamSession};
pub use completion::{CompletionCoalescer, CompletionItem, DocumentSnapshot};
pub use config::{load_config, ClientConfig, ConfigError};
pub use registry::{ConversationId, SessionRegistry, SinkId};
pub use sink::{BufferSink, BufferSinkFactory, OutputSink, Position, SinkFactory};
pub use supervisor::{ConnectionSupervisor, SupervisorError};
pub use transport::{FrameDecoder, FrameEvent, TransportError};
