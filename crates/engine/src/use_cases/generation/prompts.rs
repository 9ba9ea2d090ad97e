//! Prompt text for every generation step.
//!
//! Each narrative prompt names the output shape, the plot information the
//! model must stay consistent with, and the position in the story.

use storyloom_domain::{
    CharacterData, ConversationHistory, FrontierItem, GenerationConfig, PromptKind, SceneData,
    StoryData, JSON_MAGIC_PHRASE,
};

const REPAIR_SYSTEM_MESSAGE: &str = "You are a helpful coding AI assistant.";

const NARRATIVE_LINE_FORMAT: &str = r#"{"id": order of the line, "speaker": speaker name, "speaker_id": character id or -1 for narration, "scene_id": scene id, "scene_title": scene title, "text": dialogue or narration}"#;

pub fn plot_prompt(config: &GenerationConfig) -> String {
    let themes = if config.themes.is_empty() {
        "any".to_string()
    } else {
        config.themes_str()
    };

    format!(
        r#"Write a game story synopsis with {chapters} chapters. Then generate 1 story beginning, {endings} possible endings, {characters} main characters, and {scenes} main scenes. Write one synopsis per chapter and list the ids of the characters and scenes that appear in it. {magic}

# Output format
{{
"title": game title,
"genre": game genre,
"themes": [words],
"main_scenes": [{{"id": id, "title": location name, "location": where is this place, "description": describe location}}],
"main_characters": [{{"id": id, "first_name": first name, "last_name": last name, "species": species, "age": exact age or description, "gender": gender, "role": role of the character, "background": background story, "place_of_birth": location, "physical_appearance": [details]}}],
"synopsis": synopsis,
"chapter_synopses": [{{"chapter": chapter number starting at 1, "synopsis": chapter synopsis, "character_ids": [ids], "scene_ids": [ids]}}],
"beginning": beginning of the story,
"endings": [{{"id": id, "ending": ending}}]
}}

# Game information
Game genre: {genre}
Themes: {themes}"#,
        chapters = config.num_chapters,
        endings = config.num_endings,
        characters = config.num_main_characters,
        scenes = config.num_main_scenes,
        magic = JSON_MAGIC_PHRASE,
        genre = config.game_genre,
        themes = themes,
    )
}

/// Plot facts relevant to one chapter.
fn plot_information(story: &StoryData, chapter: u32) -> String {
    let mut info = format!("Title: {}\nSynopsis: {}\n", story.title, story.synopsis);

    if let Some(synopsis) = story.chapter_synopsis(chapter) {
        info.push_str(&format!("Chapter {} synopsis: {}\n", chapter, synopsis.synopsis));

        let characters: Vec<String> = synopsis
            .character_ids
            .iter()
            .filter_map(|id| story.character(*id))
            .map(|c| format!("- [{}] {} ({})", c.id, c.full_name(), c.role))
            .collect();
        if !characters.is_empty() {
            info.push_str("Characters in this chapter:\n");
            info.push_str(&characters.join("\n"));
            info.push('\n');
        }

        let scenes: Vec<String> = synopsis
            .scene_ids
            .iter()
            .filter_map(|id| story.scene(*id))
            .map(|s| format!("- [{}] {}: {}", s.id, s.title, s.location))
            .collect();
        if !scenes.is_empty() {
            info.push_str("Scenes in this chapter:\n");
            info.push_str(&scenes.join("\n"));
            info.push('\n');
        }
    }

    info
}

fn output_format(num_choices: Option<u32>) -> String {
    match num_choices {
        Some(n) => format!(
            "{{\n\"story_so_far\": summary of the story so far,\n\"story\": [{}],\n\"choices\": [exactly {} items of {{\"id\": id, \"choice\": choice, \"description\": description}}]\n}}",
            NARRATIVE_LINE_FORMAT, n
        ),
        None => format!(
            "{{\n\"story_so_far\": summary of the story so far,\n\"story\": [{}]\n}}",
            NARRATIVE_LINE_FORMAT
        ),
    }
}

/// Prompt for a frontier item. `num_choices` is set when the unit will branch.
pub fn narrative_prompt(
    config: &GenerationConfig,
    story: &StoryData,
    item: &FrontierItem,
    num_choices: Option<u32>,
) -> String {
    let chapter = item.current_chapter;
    let genre = &config.game_genre;
    let position = format!(
        "Chapter {} of {}, choice opportunity {} of {}.",
        chapter,
        config.num_chapters,
        item.used_choice_opportunity + 1,
        config.max_num_choices_opportunity
    );

    let (task, extra) = match item.prompt_kind() {
        PromptKind::ChapterStart => {
            let opening = if chapter == 1 {
                format!("\n\n# Story beginning\n{}", story.beginning)
            } else {
                String::new()
            };
            let task = match num_choices {
                Some(n) => format!(
                    "Generate the narratives and dialogues that open chapter {} of a {} game, culminating in {} choices that the player can make to influence the course of the story.",
                    chapter, genre, n
                ),
                None => format!(
                    "Generate the narratives and dialogues that open chapter {} of a {} game.",
                    chapter, genre
                ),
            };
            (task, opening)
        }
        PromptKind::Continuation(choice) => {
            let task = match num_choices {
                Some(n) => format!(
                    "Generate the narratives and dialogues of a {} game that follow from the selected choice, culminating in {} new choices that the player can make.",
                    genre, n
                ),
                None => format!(
                    "Generate the narratives and dialogues of a {} game that follow from the selected choice.",
                    genre
                ),
            };
            let extra = format!(
                "\n\n# The selected choice\n{}: {}",
                choice.choice, choice.description
            );
            (task, extra)
        }
        PromptKind::ChapterEnd => {
            let next = story
                .chapter_synopsis(chapter + 1)
                .map(|s| format!("\n\n# Next chapter synopsis\n{}", s.synopsis))
                .unwrap_or_default();
            let task = format!(
                "Generate the narratives and dialogues of a {} game, culminating in the end of chapter {} and leading into the next chapter.",
                genre, chapter
            );
            (task, next)
        }
        PromptKind::GameEnd => {
            let endings: Vec<String> = story
                .endings
                .iter()
                .map(|e| format!("- [{}] {}", e.id, e.ending))
                .collect();
            let task = format!(
                "Generate the narratives and dialogues of a {} game, culminating in the end of the game. Resolve the story into the one possible ending below that fits the story so far best.",
                genre
            );
            (task, format!("\n\n# Possible endings\n{}", endings.join("\n")))
        }
    };

    format!(
        "{task} {magic}\n\n# Output format\n{format}\n\n# Plot information\n{info}\n# Position\n{position}{extra}",
        task = task,
        magic = JSON_MAGIC_PHRASE,
        format = output_format(num_choices),
        info = plot_information(story, chapter),
        position = position,
        extra = extra,
    )
}

/// A fresh, short exchange asking the model to fix its own output.
pub fn repair_history(error: &str, original: &str) -> ConversationHistory {
    let prompt = format!(
        "Fix the following incorrect JSON data. Correct the syntax and provide new values if needed. Continue the generation if you found that the original is incomplete. The original message is provided between === and ===. {magic}\n\n# Error message\n{error}\n\n# Original (Invalid JSON)\n===\n{original}\n===\n\n# Fixed (Corrected JSON)",
        magic = JSON_MAGIC_PHRASE,
        error = error,
        original = original,
    );
    ConversationHistory::new()
        .with_system(REPAIR_SYSTEM_MESSAGE)
        .with_user(prompt)
}

pub fn character_image_prompt(character: &CharacterData) -> String {
    format!(
        "A portrait image of a 2D character artwork in classic RPG game in full-body pose on a plain white background. {name} is {species} {gender} who is {age} years old. They are a {role} and their background is {background}. They were born in {place}. They have {appearance}. No text. One image only. Front-facing full body pose. Centered. No drawings. Anime-style asset.",
        name = character.full_name(),
        species = character.species,
        gender = character.gender,
        age = character.age,
        role = character.role,
        background = character.background,
        place = character.place_of_birth,
        appearance = character.physical_appearance.join(" and "),
    )
}

pub fn scene_image_prompt(scene: &SceneData) -> String {
    format!(
        "An image of a 2D scene artwork in classic RPG game in full-body landscape scene background. This is a scene of {} located in {}. The scene is {}. No text. One image only. Centered. No drawings. Anime-style asset.",
        scene.title, scene.location, scene.description
    )
}
