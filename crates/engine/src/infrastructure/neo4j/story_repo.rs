//! Neo4j story graph repository implementation.
//!
//! Stories are stored as a forward-only graph:
//! - `(StoryData)-[:HAS_CHARACTER]->(StoryCharacter)`
//! - `(StoryData)-[:HAS_SCENE]->(StoryScene)`
//! - `(StoryData)-[:HAS_ENDING]->(StoryEnding)`
//! - `(StoryData)-[:STARTED_AT]->(StoryChunk)`
//! - `(StoryChunk)-[:BRANCHED_TO {choice_id, choice, description}]->(StoryChunk)`
//!
//! Narrative lines, choices and the producing history are JSON strings on the
//! chunk node.

use async_trait::async_trait;
use neo4rs::{query, Graph, Row};
use storyloom_domain::{
    ChunkDraft, ConversationHistory, StoryChoice, StoryChunk, StoryChunkId, StoryData,
    StoryNarrative, StoryId,
};

use super::helpers::{repo_error, to_json_param, GraphExt, NodeExt};
use crate::infrastructure::ports::{RepoError, StoryGraphRepo};

/// Repository for the generated story graph.
pub struct Neo4jStoryGraphRepo {
    graph: Graph,
}

impl Neo4jStoryGraphRepo {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Run an edge write ending in `RETURN count(*) AS linked`.
    async fn link(&self, operation: &'static str, q: neo4rs::Query) -> Result<i64, RepoError> {
        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| repo_error(operation, e))?;
        match result.next().await.map_err(|e| repo_error(operation, e))? {
            Some(row) => row
                .get::<i64>("linked")
                .map_err(|e| RepoError::database(operation, e)),
            None => Ok(0),
        }
    }

    fn row_to_chunk(row: Row) -> Result<StoryChunk, RepoError> {
        let node: neo4rs::Node = row.get("c").map_err(|e| RepoError::database("query", e))?;

        let id: StoryChunkId = node.get_typed_id("id")?;
        let story_id: StoryId = node.get_typed_id("story_id")?;
        let story: Vec<StoryNarrative> = node.get_json_strict("story")?;
        let choices: Vec<StoryChoice> = node.get_json_strict("choices")?;
        let history: ConversationHistory = node.get_json_strict("history")?;

        let draft = ChunkDraft {
            story_so_far: node.get_string_strict("story_so_far")?,
            story,
            choices,
        };

        StoryChunk::new(
            id,
            story_id,
            node.get_u32_or("chapter", 1),
            node.get_u32_or("num_opportunities", 0),
            draft,
            history,
        )
        .map_err(|e| RepoError::serialization(format!("Stored chunk {} is invalid: {}", id, e)))
    }
}

/// An edge query matched no endpoints when it returned a zero count.
fn ensure_linked(linked: i64, entity_type: &'static str, edge: String) -> Result<(), RepoError> {
    if linked == 0 {
        return Err(RepoError::not_found(entity_type, edge));
    }
    Ok(())
}

#[async_trait]
impl StoryGraphRepo for Neo4jStoryGraphRepo {
    async fn save_story_data(&self, story: &StoryData) -> Result<(), RepoError> {
        let q = query(
            "MERGE (s:StoryData {id: $id})
            SET s.title = $title,
                s.genre = $genre,
                s.themes = $themes,
                s.synopsis = $synopsis,
                s.chapter_synopses = $chapter_synopses,
                s.beginning = $beginning,
                s.generated_by = $generated_by",
        )
        .param("id", story.id.to_string())
        .param("title", story.title.clone())
        .param("genre", story.genre.clone())
        .param("themes", story.themes.clone())
        .param("synopsis", story.synopsis.clone())
        .param("chapter_synopses", to_json_param(&story.chapter_synopses)?)
        .param("beginning", story.beginning.clone())
        .param("generated_by", story.generated_by.clone());
        self.graph.run_or_err("save_story_data", q).await?;

        for character in &story.main_characters {
            let q = query(
                "MATCH (s:StoryData {id: $story_id})
                MERGE (c:StoryCharacter {story_id: $story_id, character_id: $character_id})
                SET c.first_name = $first_name,
                    c.last_name = $last_name,
                    c.species = $species,
                    c.age = $age,
                    c.gender = $gender,
                    c.role = $role,
                    c.background = $background,
                    c.place_of_birth = $place_of_birth,
                    c.physical_appearance = $physical_appearance,
                    c.image = $image,
                    c.original_image = $original_image
                MERGE (s)-[:HAS_CHARACTER]->(c)",
            )
            .param("story_id", story.id.to_string())
            .param("character_id", i64::from(character.id))
            .param("first_name", character.first_name.clone())
            .param("last_name", character.last_name.clone())
            .param("species", character.species.clone())
            .param("age", character.age.clone())
            .param("gender", character.gender.clone())
            .param("role", character.role.clone())
            .param("background", character.background.clone())
            .param("place_of_birth", character.place_of_birth.clone())
            .param("physical_appearance", character.physical_appearance.clone())
            .param("image", character.image.clone().unwrap_or_default())
            .param(
                "original_image",
                character.original_image.clone().unwrap_or_default(),
            );
            self.graph.run_or_err("save_story_character", q).await?;
        }

        for scene in &story.main_scenes {
            let q = query(
                "MATCH (s:StoryData {id: $story_id})
                MERGE (sc:StoryScene {story_id: $story_id, scene_id: $scene_id})
                SET sc.title = $title,
                    sc.location = $location,
                    sc.description = $description,
                    sc.image = $image
                MERGE (s)-[:HAS_SCENE]->(sc)",
            )
            .param("story_id", story.id.to_string())
            .param("scene_id", i64::from(scene.id))
            .param("title", scene.title.clone())
            .param("location", scene.location.clone())
            .param("description", scene.description.clone())
            .param("image", scene.image.clone().unwrap_or_default());
            self.graph.run_or_err("save_story_scene", q).await?;
        }

        for ending in &story.endings {
            let q = query(
                "MATCH (s:StoryData {id: $story_id})
                MERGE (e:StoryEnding {story_id: $story_id, ending_id: $ending_id})
                SET e.ending = $ending
                MERGE (s)-[:HAS_ENDING]->(e)",
            )
            .param("story_id", story.id.to_string())
            .param("ending_id", i64::from(ending.id))
            .param("ending", ending.ending.clone());
            self.graph.run_or_err("save_story_ending", q).await?;
        }

        tracing::debug!(story_id = %story.id, title = %story.title, "Saved story data");
        Ok(())
    }

    async fn save_story_chunk(&self, chunk: &StoryChunk) -> Result<(), RepoError> {
        let q = query(
            "MERGE (c:StoryChunk {id: $id})
            SET c.story_id = $story_id,
                c.chapter = $chapter,
                c.num_opportunities = $num_opportunities,
                c.story_so_far = $story_so_far,
                c.story = $story,
                c.choices = $choices,
                c.history = $history",
        )
        .param("id", chunk.id().to_string())
        .param("story_id", chunk.story_id().to_string())
        .param("chapter", i64::from(chunk.chapter()))
        .param("num_opportunities", i64::from(chunk.num_opportunities()))
        .param("story_so_far", chunk.story_so_far().to_string())
        .param("story", to_json_param(&chunk.story())?)
        .param("choices", to_json_param(&chunk.choices())?)
        .param("history", to_json_param(chunk.history())?);

        self.graph.run_or_err("save_story_chunk", q).await?;

        tracing::debug!(chunk_id = %chunk.id(), chapter = chunk.chapter(), "Saved story chunk");
        Ok(())
    }

    async fn link_start(
        &self,
        story_id: StoryId,
        chunk_id: StoryChunkId,
    ) -> Result<(), RepoError> {
        let q = query(
            "MATCH (s:StoryData {id: $story_id}), (c:StoryChunk {id: $chunk_id})
            MERGE (s)-[:STARTED_AT]->(c)
            RETURN count(*) AS linked",
        )
        .param("story_id", story_id.to_string())
        .param("chunk_id", chunk_id.to_string());

        let linked = self.link("link_start", q).await?;
        ensure_linked(linked, "StoryData or StoryChunk", format!("{} -> {}", story_id, chunk_id))
    }

    async fn link_branch(
        &self,
        parent: StoryChunkId,
        child: StoryChunkId,
        choice: Option<StoryChoice>,
    ) -> Result<(), RepoError> {
        let (choice_id, label, description) = match choice {
            Some(choice) => (i64::from(choice.id), choice.choice, choice.description),
            None => (-1, String::new(), String::new()),
        };

        let q = query(
            "MATCH (p:StoryChunk {id: $parent_id}), (c:StoryChunk {id: $child_id})
            MERGE (p)-[r:BRANCHED_TO]->(c)
            SET r.choice_id = $choice_id,
                r.choice = $choice,
                r.description = $description
            RETURN count(*) AS linked",
        )
        .param("parent_id", parent.to_string())
        .param("child_id", child.to_string())
        .param("choice_id", choice_id)
        .param("choice", label)
        .param("description", description);

        let linked = self.link("link_branch", q).await?;
        ensure_linked(linked, "StoryChunk", format!("{} -> {}", parent, child))
    }

    async fn get_story_chunk(&self, id: StoryChunkId) -> Result<Option<StoryChunk>, RepoError> {
        let q = query("MATCH (c:StoryChunk {id: $id}) RETURN c").param("id", id.to_string());

        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| repo_error("get_story_chunk", e))?;

        if let Some(row) = result
            .next()
            .await
            .map_err(|e| repo_error("get_story_chunk", e))?
        {
            Ok(Some(Self::row_to_chunk(row)?))
        } else {
            Ok(None)
        }
    }
}
