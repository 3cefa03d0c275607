//! CLI module for Narrata.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Narrata - turn recorded narration into written stories
///
/// Transcribes an audio recording, finds the individual stories the narrator
/// tells, and writes each one up as a standalone piece.
#[derive(Parser, Debug)]
#[command(name = "narrata")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline on an audio file
    Process {
        /// Audio file to process
        audio: String,

        /// Transcribe again even if a transcript already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Find the stories in an existing transcript and print them as JSON
    Segment {
        /// Transcript text file
        transcript: String,

        /// Name of the narrator, prepended to the transcript
        #[arg(short, long)]
        narrator: Option<String>,
    },

    /// Manage projects (groups of recordings from one narrator)
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// Create a project
    Create {
        name: String,

        /// Name of the narrator
        #[arg(short, long)]
        narrator: Option<String>,
    },

    /// List projects
    List,

    /// Show a project's files and status
    Show { id: String },

    /// Rename a project
    Rename {
        id: String,
        name: String,

        /// Name of the narrator
        #[arg(short, long)]
        narrator: Option<String>,
    },

    /// Delete a project and all its files
    Delete { id: String },

    /// Copy an audio file into a project
    AddFile { id: String, path: String },

    /// Remove a file and its transcript from a project
    RemoveFile { id: String, file_id: String },

    /// Transcribe one file of a project
    Transcribe { id: String, file_id: String },

    /// Generate the project memo from all transcribed files
    Memo { id: String },

    /// Clear a stuck generation flag and mark all files ready
    Reset { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let cli = Cli::parse_from(["narrata", "-vv", "process", "talk.mp3", "--force"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Process { audio, force } => {
                assert_eq!(audio, "talk.mp3");
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_project_actions() {
        let cli = Cli::parse_from(["narrata", "project", "create", "Family", "--narrator", "Grandma"]);
        assert!(matches!(
            cli.command,
            Commands::Project {
                action: ProjectAction::Create { ref name, narrator: Some(ref n) }
            } if name == "Family" && n == "Grandma"
        ));

        let cli = Cli::parse_from(["narrata", "-c", "x.toml", "project", "add-file", "ab12cd34", "a.mp3"]);
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
        assert!(matches!(
            cli.command,
            Commands::Project { action: ProjectAction::AddFile { .. } }
        ));
    }
}
