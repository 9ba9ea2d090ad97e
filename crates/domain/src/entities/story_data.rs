//! StoryData entity - the plot root of a generated game
//!
//! Created once per run, either from the model's plot output or from an
//! existing `plot.json`, and never changed afterwards except for the image
//! fields filled by the optional image pass.
//!
//! # Graph Relationships
//!
//! - `STARTED_AT` → StoryChunk: the first generated chunk of the story
//! - `HAS_CHARACTER` / `HAS_SCENE` / `HAS_ENDING`: plot members stored as nodes

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DomainError;
use crate::ids::StoryId;
use crate::value_objects::GenerationConfig;

/// A main character of the plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterData {
    pub id: u32,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub species: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub age: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub place_of_birth: String,
    #[serde(default)]
    pub physical_appearance: Vec<String>,
    /// Base64 PNG with the background removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Base64 PNG as generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_image: Option<String>,
}

impl CharacterData {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A main location of the plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndingData {
    pub id: u32,
    pub ending: String,
}

/// Synopsis of one chapter and the characters/scenes appearing in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSynopsis {
    pub chapter: u32,
    pub synopsis: String,
    #[serde(default)]
    pub character_ids: Vec<u32>,
    #[serde(default)]
    pub scene_ids: Vec<u32>,
}

/// The plot exactly as the model is asked to return it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotDraft {
    pub title: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub themes: Vec<String>,
    pub main_scenes: Vec<SceneData>,
    pub main_characters: Vec<CharacterData>,
    pub synopsis: String,
    pub chapter_synopses: Vec<ChapterSynopsis>,
    #[serde(default)]
    pub beginning: String,
    pub endings: Vec<EndingData>,
}

impl PlotDraft {
    /// Reject plots that under-deliver relative to `config`.
    ///
    /// The error message is written for the model: it is sent back verbatim in
    /// the repair prompt.
    pub fn validate_against(&self, config: &GenerationConfig) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }
        if self.synopsis.trim().is_empty() {
            return Err(DomainError::validation("synopsis must not be empty"));
        }

        let minimums = [
            ("endings", self.endings.len(), config.num_endings),
            (
                "main_characters",
                self.main_characters.len(),
                config.num_main_characters,
            ),
            ("main_scenes", self.main_scenes.len(), config.num_main_scenes),
        ];
        for (field, actual, expected) in minimums {
            if actual < expected as usize {
                return Err(DomainError::validation(format!(
                    "expected at least {} {} but got {}",
                    expected, field, actual
                )));
            }
        }

        if self.chapter_synopses.len() != config.num_chapters as usize {
            return Err(DomainError::validation(format!(
                "expected exactly {} chapter_synopses but got {}",
                config.num_chapters,
                self.chapter_synopses.len()
            )));
        }

        let character_ids: HashSet<u32> = self.main_characters.iter().map(|c| c.id).collect();
        let scene_ids: HashSet<u32> = self.main_scenes.iter().map(|s| s.id).collect();
        for (idx, synopsis) in self.chapter_synopses.iter().enumerate() {
            let expected_chapter = idx as u32 + 1;
            if synopsis.chapter != expected_chapter {
                return Err(DomainError::validation(format!(
                    "chapter_synopses[{}] must be chapter {} but is chapter {}",
                    idx, expected_chapter, synopsis.chapter
                )));
            }
            if let Some(unknown) = synopsis
                .character_ids
                .iter()
                .find(|id| !character_ids.contains(id))
            {
                return Err(DomainError::validation(format!(
                    "chapter {} references unknown character id {}",
                    synopsis.chapter, unknown
                )));
            }
            if let Some(unknown) = synopsis.scene_ids.iter().find(|id| !scene_ids.contains(id)) {
                return Err(DomainError::validation(format!(
                    "chapter {} references unknown scene id {}",
                    synopsis.chapter, unknown
                )));
            }
        }

        Ok(())
    }
}

/// The plot root of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryData {
    pub id: StoryId,
    pub title: String,
    pub genre: String,
    pub themes: Vec<String>,
    pub synopsis: String,
    pub chapter_synopses: Vec<ChapterSynopsis>,
    pub beginning: String,
    pub main_characters: Vec<CharacterData>,
    pub main_scenes: Vec<SceneData>,
    pub endings: Vec<EndingData>,
    /// Model that produced the plot
    pub generated_by: String,
}

impl StoryData {
    pub fn from_draft(id: StoryId, generated_by: impl Into<String>, draft: PlotDraft) -> Self {
        Self {
            id,
            title: draft.title,
            genre: draft.genre,
            themes: draft.themes,
            synopsis: draft.synopsis,
            chapter_synopses: draft.chapter_synopses,
            beginning: draft.beginning,
            main_characters: draft.main_characters,
            main_scenes: draft.main_scenes,
            endings: draft.endings,
            generated_by: generated_by.into(),
        }
    }

    /// The plot fields as a draft, for re-validating a loaded plot.
    pub fn to_draft(&self) -> PlotDraft {
        PlotDraft {
            title: self.title.clone(),
            genre: self.genre.clone(),
            themes: self.themes.clone(),
            main_scenes: self.main_scenes.clone(),
            main_characters: self.main_characters.clone(),
            synopsis: self.synopsis.clone(),
            chapter_synopses: self.chapter_synopses.clone(),
            beginning: self.beginning.clone(),
            endings: self.endings.clone(),
        }
    }

    /// Synopsis of a 1-based chapter number.
    pub fn chapter_synopsis(&self, chapter: u32) -> Option<&ChapterSynopsis> {
        self.chapter_synopses.iter().find(|c| c.chapter == chapter)
    }

    pub fn character(&self, id: u32) -> Option<&CharacterData> {
        self.main_characters.iter().find(|c| c.id == id)
    }

    pub fn scene(&self, id: u32) -> Option<&SceneData> {
        self.main_scenes.iter().find(|s| s.id == id)
    }
}

/// Models return ages as `17`, `"17"` or `"ancient"`; keep all of them as text.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
