//! Human-readable and JSON renderings of a story batch.

use super::Story;
use crate::error::Result;

/// Line written after every story in the text rendering.
pub const STORY_DELIMITER: &str = "==================================================";

/// Render stories as plain text: a metadata header, then the full content,
/// then the delimiter line.
pub fn render_text(stories: &[Story]) -> String {
    let mut out = String::new();
    for story in stories {
        let info = &story.info;
        out.push_str(&format!("Story ID: {}\n", info.story_id));
        out.push_str(&format!("Title: {}\n", info.story_title));
        out.push_str(&format!("Time: {}\n", info.story_time));
        out.push_str(&format!("Characters: {}\n", info.characters_joined()));
        out.push_str(&format!("Summary: {}\n", info.summary));
        out.push_str("\nFull story:\n");
        out.push_str(&story.content);
        out.push_str("\n\n");
        out.push_str(STORY_DELIMITER);
        out.push_str("\n\n");
    }
    out
}

/// Render stories as an indented JSON array (non-ASCII kept verbatim).
pub fn render_json(stories: &[Story]) -> Result<String> {
    Ok(serde_json::to_string_pretty(stories)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stories::StoryInfo;

    fn story(id: u32, title: &str) -> Story {
        Story::new(
            StoryInfo {
                story_id: id,
                story_title: title.to_string(),
                story_time: "1930年代".to_string(),
                characters: vec!["齐白石".to_string(), "胡沁园".to_string()],
                summary: "拜师学画".to_string(),
            },
            format!("Content of {}", title),
        )
    }

    #[test]
    fn test_render_text_layout() {
        let text = render_text(&[story(1, "First"), story(2, "Second")]);

        let first = text.find("Story ID: 1\nTitle: First\n").unwrap();
        let second = text.find("Story ID: 2\nTitle: Second\n").unwrap();
        let delimiter = format!("\n\n{}\n\n", STORY_DELIMITER);
        let between = &text[first..second];
        assert!(between.ends_with(&delimiter));
        assert!(between.contains("Characters: 齐白石, 胡沁园\n"));
        assert!(between.contains("\nFull story:\nContent of First"));
        assert_eq!(text.matches(STORY_DELIMITER).count(), 2);
    }

    #[test]
    fn test_render_text_empty() {
        assert_eq!(render_text(&[]), "");
    }

    #[test]
    fn test_render_json_keeps_unicode_and_shape() {
        let json = render_json(&[story(1, "First")]).unwrap();
        assert!(json.contains("齐白石"));
        assert!(json.contains("\n  {"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["info"]["story_id"], 1);
        assert_eq!(value[0]["content"], "Content of First");
    }
}
