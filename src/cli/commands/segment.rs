//! Segment command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use anyhow::{Context, Result};

/// Run the segment command.
pub async fn run_segment(transcript: &str, narrator: Option<&str>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Segment, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(transcript);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;

    let pipeline = Pipeline::new(&settings)?;
    let spinner = Output::spinner("Analyzing story structure...");
    let result = pipeline.segmenter().segment(&text, narrator).await;
    spinner.finish_and_clear();

    let infos = match result {
        Ok(infos) => infos,
        Err(e) => {
            Output::error(&format!("Segmentation failed: {}", e));
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&infos)?);
    Ok(())
}
