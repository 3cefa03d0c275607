//! Process command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use anyhow::Result;

/// Run the process command.
pub async fn run_process(audio: &str, force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Process, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let audio_path = Settings::expand_path(audio);
    Output::info(&format!("Processing: {}", audio_path.display()));

    let pipeline = Pipeline::new(&settings)?;
    let spinner = Output::spinner("Transcribing, segmenting and writing stories...");
    let result = pipeline.process_audio(&audio_path, force).await;
    spinner.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            Output::error(&format!("Processing failed: {}", e));
            return Err(e.into());
        }
    };

    if outcome.transcript_cached {
        Output::info("Reused existing transcript. Use --force to transcribe again.");
    }

    Output::header(&format!("Stories ({})", outcome.stories.len()));
    for story in &outcome.stories {
        Output::story(story);
    }
    println!();

    if !outcome.is_complete() {
        Output::warning(&format!(
            "{} stories could not be generated and were left out: {:?}",
            outcome.dropped.len(),
            outcome.dropped
        ));
    }

    Output::success(&format!("Saved results for '{}'", outcome.name));
    for path in outcome.artifacts.all() {
        Output::list_item(&path.display().to_string());
    }

    Ok(())
}
