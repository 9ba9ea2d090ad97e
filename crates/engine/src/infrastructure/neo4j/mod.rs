//! Neo4j database implementations.

mod helpers;
mod schema;
mod story_repo;

pub use schema::ensure_schema;
pub use story_repo::Neo4jStoryGraphRepo;
