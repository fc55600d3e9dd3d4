//! Retrieval-augmented chatbot over course materials.

pub mod core;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod tools;
pub mod vector_math;
