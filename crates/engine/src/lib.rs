//! Storyloom Engine library.
//!
//! Generates branching game stories with a generative model and stores them
//! as a navigable graph.
//!
//! ## Structure
//!
//! - `use_cases/` - Plot and frontier generation, resumable runs
//! - `infrastructure/` - External dependency implementations (ports + adapters)
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
