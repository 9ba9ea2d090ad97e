//! Parameters of one story generation run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Generation parameters. Validate with [`GenerationConfig::validate`] before
/// any generation starts; the engine never works from an unvalidated config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub min_num_choices: u32,
    pub max_num_choices: u32,
    pub min_num_choices_opportunity: u32,
    pub max_num_choices_opportunity: u32,
    pub game_genre: String,
    /// Ordered, duplicate-free
    pub themes: Vec<String>,
    pub num_chapters: u32,
    pub num_endings: u32,
    pub num_main_characters: u32,
    pub num_main_scenes: u32,
    pub enable_image_generation: bool,
    /// A `plot.json` from an earlier run; skips plot generation when set
    #[serde(default)]
    pub existing_plot: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_num_choices: 2,
            max_num_choices: 3,
            min_num_choices_opportunity: 2,
            max_num_choices_opportunity: 3,
            game_genre: "visual novel".to_string(),
            themes: Vec::new(),
            num_chapters: 3,
            num_endings: 3,
            num_main_characters: 5,
            num_main_scenes: 5,
            enable_image_generation: false,
            existing_plot: None,
        }
    }
}

impl GenerationConfig {
    /// Replace the themes, dropping blanks and repeated entries while keeping order.
    pub fn with_themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for theme in themes {
            let theme = theme.into().trim().to_string();
            if !theme.is_empty() && !unique.contains(&theme) {
                unique.push(theme);
            }
        }
        self.themes = unique;
        self
    }

    pub fn themes_str(&self) -> String {
        self.themes.join(", ")
    }

    /// All counts must be at least 1 and every `min_*` must not exceed its `max_*`.
    pub fn validate(&self) -> Result<(), DomainError> {
        let counts = [
            ("min_num_choices", self.min_num_choices),
            ("max_num_choices", self.max_num_choices),
            ("min_num_choices_opportunity", self.min_num_choices_opportunity),
            ("max_num_choices_opportunity", self.max_num_choices_opportunity),
            ("num_chapters", self.num_chapters),
            ("num_endings", self.num_endings),
            ("num_main_characters", self.num_main_characters),
            ("num_main_scenes", self.num_main_scenes),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value < 1) {
            return Err(DomainError::config(format!("{} must be at least 1", name)));
        }

        if self.min_num_choices > self.max_num_choices {
            return Err(DomainError::config(format!(
                "min_num_choices ({}) must not exceed max_num_choices ({})",
                self.min_num_choices, self.max_num_choices
            )));
        }

        if self.min_num_choices_opportunity > self.max_num_choices_opportunity {
            return Err(DomainError::config(format!(
                "min_num_choices_opportunity ({}) must not exceed max_num_choices_opportunity ({})",
                self.min_num_choices_opportunity, self.max_num_choices_opportunity
            )));
        }

        if self.game_genre.trim().is_empty() {
            return Err(DomainError::config("game_genre must not be empty"));
        }

        if let Some(path) = &self.existing_plot {
            if path.as_os_str().is_empty() {
                return Err(DomainError::config("existing_plot path must not be empty"));
            }
        }

        Ok(())
    }
}
