//! Built-in tool implementations for Convoke.
//!
//! A small, dependency-free set: arithmetic, echo, semantic recall over the
//! agent's vector store, and a terminal `final_answer` tool that lets a
//! model finish a session through a tool call.

pub mod calculator;
pub mod echo;
pub mod final_answer;
pub mod recall;

use convoke_core::memory::VectorStore;
use convoke_core::tool::ToolRegistry;
use std::sync::Arc;

pub use calculator::CalculatorTool;
pub use echo::EchoTool;
pub use final_answer::FinalAnswerTool;
pub use recall::RecallTool;

/// Create a registry with the built-in tools.
///
/// `recall` is only registered when a vector store is supplied.
pub fn default_registry(vectors: Option<Arc<dyn VectorStore>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalculatorTool));
    registry.register(Arc::new(EchoTool));
    registry.register(Arc::new(FinalAnswerTool));
    if let Some(store) = vectors {
        registry.register(Arc::new(RecallTool::new(store)));
    }
    registry
}
