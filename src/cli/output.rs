//! CLI output formatting utilities.

use crate::project::{ProjectFile, ProjectRecord};
use crate::stories::Story;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a one-line story summary.
    pub fn story(story: &Story) {
        println!(
            "  {} {} {} ({}, {} chars)",
            style(format!("#{}", story.id())).cyan(),
            style(&story.info.story_title).bold(),
            style(&story.info.story_time).dim(),
            story.info.characters_joined(),
            story.content.chars().count()
        );
    }

    /// Print a project row.
    pub fn project(project: &ProjectRecord) {
        let narrator = project.narrator.as_deref().unwrap_or("-");
        let generating = if project.is_generating() {
            format!(" {}", style("[generating]").yellow())
        } else {
            String::new()
        };
        println!(
            "  {} {} ({}, narrator: {}, {} files){}",
            style("*").cyan(),
            style(&project.name).bold(),
            style(&project.id).dim(),
            narrator,
            project.files.len(),
            generating
        );
    }

    /// Print a project file row.
    pub fn project_file(file_id: &str, file: &ProjectFile) {
        println!(
            "  {} {} ({}) {}",
            style("*").cyan(),
            file.name,
            style(file_id).dim(),
            style(file.status).green()
        );
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}
