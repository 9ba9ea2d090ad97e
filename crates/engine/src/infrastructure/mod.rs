//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod image_gen;
pub mod neo4j;
pub mod openai_compat;
pub mod ports;
pub mod resilient_graph;
pub mod resilient_llm;
pub mod run_files;
pub mod settings;
