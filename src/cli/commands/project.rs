//! Project command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, ProjectAction};
use crate::config::Settings;
use crate::orchestrator::{Pipeline, RunHandle};
use crate::project::{FsProjectStore, ProjectStore, STATUS_LAST_RUN};
use anyhow::{Context, Result};

/// Run a project subcommand.
pub async fn run_project(action: &ProjectAction, settings: Settings) -> Result<()> {
    match action {
        ProjectAction::Transcribe { id, file_id } => {
            preflight::check(Operation::Transcribe, &settings)?;
            let pipeline = Pipeline::new(&settings)?;
            let handle = pipeline.spawn_transcription(id, file_id);
            let text = wait_for(handle, "Transcribing...").await?;
            Output::success(&format!(
                "Transcribed {} ({} characters)",
                file_id,
                text.chars().count()
            ));
            return Ok(());
        }
        ProjectAction::Memo { id } => {
            preflight::check(Operation::Segment, &settings)?;
            let pipeline = Pipeline::new(&settings)?;
            let handle = pipeline.spawn_memo_generation(id);
            let report = wait_for(handle, "Generating memo...").await?;

            Output::header(&format!("Stories ({})", report.stories.len()));
            for story in &report.stories {
                Output::story(story);
            }
            println!();
            if !report.is_complete() {
                Output::warning(&format!("Stories left out: {:?}", report.dropped));
            }
            Output::success(&format!("Memo written for project {}", id));
            return Ok(());
        }
        _ => {}
    }

    let store = FsProjectStore::new(settings.projects_dir())?;
    match action {
        ProjectAction::Create { name, narrator } => {
            let project = store.create(name, narrator.as_deref())?;
            Output::success(&format!("Created project '{}' ({})", project.name, project.id));
        }

        ProjectAction::List => {
            let projects = store.list_all()?;
            if projects.is_empty() {
                Output::info("No projects yet. Use 'narrata project create <name>' to start one.");
            } else {
                Output::header(&format!("Projects ({})", projects.len()));
                println!();
                for project in &projects {
                    Output::project(project);
                }
            }
        }

        ProjectAction::Show { id } => {
            let project = store.load(id)?;
            Output::header(&project.name);
            Output::kv("Id", &project.id);
            Output::kv("Narrator", project.narrator.as_deref().unwrap_or("-"));
            Output::kv("Created", &project.created_at.format("%Y-%m-%d %H:%M").to_string());
            Output::kv("Generating", if project.is_generating() { "yes" } else { "no" });
            if let Some(last) = project.status.get(STATUS_LAST_RUN) {
                Output::kv("Last memo run", last);
            }
            Output::kv("Path", &project.path.display().to_string());

            println!();
            for file_id in project.file_ids_in_order() {
                Output::project_file(&file_id, &project.files[&file_id]);
            }
            if store.read_memo(id)?.is_some() {
                println!();
                Output::info("Memo available in memo.txt");
            }
        }

        ProjectAction::Rename { id, name, narrator } => {
            let project = store.rename(id, name, narrator.as_deref())?;
            Output::success(&format!("Renamed project {} to '{}'", project.id, project.name));
        }

        ProjectAction::Delete { id } => {
            store.delete(id)?;
            Output::success(&format!("Deleted project {}", id));
        }

        ProjectAction::AddFile { id, path } => {
            let path = Settings::expand_path(path);
            let data = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("File path has no name")?;
            let file_id = store.add_file(id, file_name, &data)?;
            Output::success(&format!("Added {} as {}", file_name, file_id));
        }

        ProjectAction::RemoveFile { id, file_id } => {
            store.delete_file(id, file_id)?;
            Output::success(&format!("Removed {} from project {}", file_id, id));
        }

        ProjectAction::Reset { id } => {
            store.reset(id)?;
            Output::success(&format!("Reset project {}", id));
        }

        ProjectAction::Transcribe { .. } | ProjectAction::Memo { .. } => {}
    }

    Ok(())
}

/// Wait for a background run, aborting it on Ctrl-C.
async fn wait_for<T>(handle: RunHandle<T>, message: &str) -> Result<T> {
    let spinner = Output::spinner(message);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !handle.is_finished() {
        tokio::select! {
            _ = &mut ctrl_c => {
                handle.abort();
                Output::warning("Interrupted, run cancelled.");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }
    spinner.finish_and_clear();

    handle.join().await.map_err(|e| {
        Output::error(&format!("{}", e));
        e.into()
    })
}
