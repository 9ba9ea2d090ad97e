//! Neo4j schema initialization - constraints and indexes.

use neo4rs::{query, Graph};

/// Initialize Neo4j schema with required constraints and indexes.
///
/// Called once on startup. Constraints are created with IF NOT EXISTS to be
/// idempotent; they also make every `MERGE` on `id` an index lookup.
pub async fn ensure_schema(graph: &Graph) -> Result<(), neo4rs::Error> {
    graph
        .run(query(
            "CREATE CONSTRAINT story_data_id_unique IF NOT EXISTS
             FOR (s:StoryData) REQUIRE s.id IS UNIQUE",
        ))
        .await?;

    graph
        .run(query(
            "CREATE CONSTRAINT story_chunk_id_unique IF NOT EXISTS
             FOR (c:StoryChunk) REQUIRE c.id IS UNIQUE",
        ))
        .await?;

    // Plot members are keyed by (story_id, member id)
    graph
        .run(query(
            "CREATE INDEX story_character_key IF NOT EXISTS
             FOR (c:StoryCharacter) ON (c.story_id, c.character_id)",
        ))
        .await?;

    graph
        .run(query(
            "CREATE INDEX story_chunk_story_id IF NOT EXISTS
             FOR (c:StoryChunk) ON (c.story_id)",
        ))
        .await?;

    tracing::info!("Neo4j schema initialized (constraints and indexes ensured)");
    Ok(())
}
