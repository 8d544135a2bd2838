//! # Convoke Core
//!
//! Domain types, traits, and error definitions for the Convoke agent
//! conversation runtime. This crate performs no I/O: it defines the model
//! that the runtime, the built-in tools, and the storage backends implement
//! against.
//!
//! ## Seams
//!
//! Every external collaborator of a conversation is a trait here:
//! - [`ModelClient`] streams completions from a language model
//! - [`Tool`] is a capability the model can invoke by name
//! - [`MemoryStore`] / [`VectorStore`] hold an agent's history and recall
//! - [`Tracer`] receives observability events
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted or in-memory versions.

pub mod agent;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod model;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::ErrorHandlingConfig;
pub use error::{Error, MemoryError, ModelError, Result, SessionError, ToolError, ValidationError};
pub use event::{BroadcastTracer, NoopTracer, TraceEvent, TraceEventKind, Tracer};
pub use memory::{MemoryStore, Step, VectorHit, VectorStore};
pub use message::{ChatMessage, Role, ToolCall};
pub use model::{ChunkReceiver, Completion, ModelClient, StreamChunk, ToolSpec, Usage};
pub use tool::{Tool, ToolRegistry};
