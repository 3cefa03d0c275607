//! Prompt templates for Narrata.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid"))
}

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub segmentation: SegmentationPrompts,
    pub generation: GenerationPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for splitting a transcript into stories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SegmentationPrompts {
    fn default() -> Self {
        Self {
            system: r#"# Role
You are a literary analyst who specializes in taking apart recordings that contain several stories and extracting their key facts. You identify narrative units precisely, follow their time and place logic, and pull out the core elements.

## Task
Analyze the composite text you are given and:
1. Identify and separate every independent narrative unit
2. Extract the elements of each story
3. Output structured data

## Skills
### Skill 1: Splitting stories
1. Read sentence by sentence and look for discontinuous jumps in time, place, or people
2. Use these narrative breaks to decide how many independent stories there are
3. Fix the start and end boundary of each story

### Skill 2: Structured output
1. Create one data object per story
2. Extraction rules:
    - story_title: derived from the core conflict, neutrally phrased
    - story_time: as precise as the text allows, never more precise than the text
    - characters: leave out minor characters (fewer than 3 appearances or no key action)
    - summary: must contain the origin of the conflict, the turning point, and the outcome

### Skill 3: Format
1. Follow this JSON schema exactly and add nothing else:
{
    "stories": [
        {
            "story_id": 1,
            "story_title": "title",
            "story_time": "time description",
            "characters": ["person 1", "person 2"],
            "summary": "summary"
        }
    ]
}
2. Summary length:
    - Chinese: at most 200 characters including punctuation
    - Other languages: at most 400 characters

## Constraints
1. Output valid JSON directly, with no explanation around it
2. Never merge stories separated by a break in time or place
3. Time handling:
    - Keep vague times vague (a text that says "in spring" stays "in spring")
    - Never infer time information that is not in the text
4. De-duplicate the characters list

## Error handling
1. If the text contains no narrative at all (argument, explanation, dialogue only):
    - return {"stories": [], "error": "NON_STORY_CONTENT"}
2. If a time expression cannot be resolved:
    - keep the original wording in story_time
    - add "time_note": "TIME_AMBIGUITY" to that story"#
                .to_string(),

            user: "Please analyze this content:\n{{transcript}}".to_string(),
        }
    }
}

/// Prompts for expanding one story into prose.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for GenerationPrompts {
    fn default() -> Self {
        Self {
            system: r#"Write one complete story based on the information below. Output only the story itself, without any formatting marks.

Title: {{title}}
Time: {{time}}
Characters: {{characters}}
Outline: {{summary}}

Requirements:
1. Keep the story complete and coherent
2. Add fitting descriptions of setting and detail
3. Show the characters' personalities and how their feelings change
4. Keep the story to about 1000 characters
5. Write in the style of long-form narrative journalism"#
                .to_string(),

            user: "You are a professional story writer. Output the story directly.".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let segmentation_path = custom_path.join("segmentation.toml");
            if segmentation_path.exists() {
                let content = std::fs::read_to_string(&segmentation_path)?;
                prompts.segmentation = toml::from_str(&content)?;
            }

            let generation_path = custom_path.join("generation.toml");
            if generation_path.exists() {
                let content = std::fs::read_to_string(&generation_path)?;
                prompts.generation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Substitution is a single pass over the template: inserted values are
    /// never scanned again, and unknown placeholders are left as written.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        placeholder()
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.segmentation.system.contains("\"stories\""));
        assert!(prompts.segmentation.system.contains("NON_STORY_CONTENT"));
        assert!(prompts.generation.system.contains("{{summary}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());

        let result = Prompts::render("{{name}} and {{other}}", &vars);
        assert_eq!(result, "Alice and {{other}}");
    }

    #[test]
    fn test_render_does_not_expand_inserted_values() {
        let mut vars = HashMap::new();
        vars.insert("title".to_string(), "The {{time}} letter".to_string());
        vars.insert("time".to_string(), "spring".to_string());
        vars.insert("summary".to_string(), "He wrote {{title}}".to_string());

        let template = "Title: {{title}} | Time: {{time}} | Outline: {{summary}}";
        let expected = "Title: The {{time}} letter | Time: spring | Outline: He wrote {{title}}";
        for _ in 0..20 {
            assert_eq!(Prompts::render(template, &vars), expected);
        }
    }

    #[test]
    fn test_call_variables_override_custom() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("style".to_string(), "plain".to_string());
        prompts.variables.insert("audience".to_string(), "family".to_string());

        let mut vars = HashMap::new();
        vars.insert("style".to_string(), "lyrical".to_string());

        let result = prompts.render_with_custom("{{style}} for {{audience}}", &vars);
        assert_eq!(result, "lyrical for family");
    }

    #[test]
    fn test_load_custom_generation_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("generation.toml"),
            "system = \"Retell {{title}}\"\nuser = \"Go\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.generation.system, "Retell {{title}}");
        // Untouched prompt files keep their defaults.
        assert!(prompts.segmentation.system.contains("story_id"));
    }
}
