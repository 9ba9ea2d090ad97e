//! Use cases - User story orchestration.
//!
//! Use cases depend on port traits only; `app` wires the concrete adapters.

pub mod generation;

pub use generation::GenerationUseCases;
