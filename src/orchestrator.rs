//! Pipeline orchestrator for Narrata.
//!
//! Sequences transcription, segmentation, generation and persistence for a
//! single recording, and runs the same stages over the recordings of a
//! project to produce its memo.

use crate::artifacts::{ArtifactPaths, ArtifactStore};
use crate::config::{Prompts, Settings};
use crate::error::{NarrataError, Result};
use crate::llm::{ChatModel, OpenAIChatModel};
use crate::project::{
    FileStatus, FsProjectStore, ProjectRecord, ProjectStore, STATUS_GENERATING, STATUS_LAST_RUN,
};
use crate::stories::{render_text, GenerationReport, Generator, Segmenter, Story};
use crate::transcription::{create_transcriber, Transcriber, TranscriptionAdapter};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Stages of one pipeline run.
///
/// Runs move strictly forward and may skip stages (`Transcribing` when a
/// transcript already exists). `Failed` can be entered from any stage and is
/// never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Start,
    Transcribing,
    Segmenting,
    Generating,
    Saving,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Start => "START",
            PipelineStage::Transcribing => "TRANSCRIBING",
            PipelineStage::Segmenting => "SEGMENTING",
            PipelineStage::Generating => "GENERATING",
            PipelineStage::Saving => "SAVING",
            PipelineStage::Done => "DONE",
            PipelineStage::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// State of one run, created per invocation and threaded through the stages.
#[derive(Debug)]
pub struct RunContext {
    name: String,
    history: Vec<PipelineStage>,
}

impl RunContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history: vec![PipelineStage::Start],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> PipelineStage {
        self.history.last().copied().unwrap_or(PipelineStage::Start)
    }

    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    /// Move to the next stage. Backward or post-terminal moves are rejected.
    pub fn advance(&mut self, next: PipelineStage) -> Result<()> {
        let current = self.stage();
        if current.is_terminal() || next <= current || next == PipelineStage::Failed {
            return Err(NarrataError::InvalidInput(format!(
                "Illegal stage transition {} -> {} for {}",
                current, next, self.name
            )));
        }
        info!("[{}] {} -> {}", self.name, current, next);
        self.history.push(next);
        Ok(())
    }

    /// Enter the absorbing failure state.
    pub fn fail(&mut self, cause: &NarrataError) {
        let current = self.stage();
        if current == PipelineStage::Failed {
            return;
        }
        error!("[{}] {} -> FAILED: {}", self.name, current, cause);
        self.history.push(PipelineStage::Failed);
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Base name the artifacts are keyed by.
    pub name: String,
    /// Generated stories, ascending by id.
    pub stories: Vec<Story>,
    /// Ids whose generation was given up on.
    pub dropped: Vec<u32>,
    pub artifacts: ArtifactPaths,
    /// Whether transcription was skipped in favor of an existing transcript.
    pub transcript_cached: bool,
    /// Every stage the run passed through.
    pub stages: Vec<PipelineStage>,
}

impl PipelineOutcome {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// The main orchestrator for the Narrata pipeline.
///
/// Cheap to clone; clones share the transcription permit and the LLM client.
#[derive(Clone)]
pub struct Pipeline {
    transcriber: TranscriptionAdapter,
    segmenter: Arc<Segmenter>,
    generator: Arc<Generator>,
    artifacts: ArtifactStore,
    projects: Arc<dyn ProjectStore>,
    memo_start: Arc<Mutex<()>>,
}

impl Pipeline {
    /// Create a pipeline from configuration.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let transcriber = create_transcriber(&settings.transcription)?;
        let model: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::new(&settings.llm)?);
        let projects: Arc<dyn ProjectStore> = Arc::new(FsProjectStore::new(settings.projects_dir())?);

        info!(
            "Using {} transcription and {} for stories",
            transcriber.name(),
            model.model_name()
        );

        Ok(Self::with_components(settings, prompts, transcriber, model, projects))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        settings: &Settings,
        prompts: Prompts,
        transcriber: Arc<dyn Transcriber>,
        model: Arc<dyn ChatModel>,
        projects: Arc<dyn ProjectStore>,
    ) -> Self {
        let prompts = Arc::new(prompts);
        Self {
            transcriber: TranscriptionAdapter::new(transcriber),
            segmenter: Arc::new(Segmenter::new(
                model.clone(),
                prompts.clone(),
                settings.segmentation.clone(),
            )),
            generator: Arc::new(Generator::new(model, prompts, settings.generation.clone())),
            artifacts: ArtifactStore::new(settings.output_dir(), settings.cache_dir()),
            projects,
            memo_start: Arc::new(Mutex::new(())),
        }
    }

    pub fn projects(&self) -> Arc<dyn ProjectStore> {
        self.projects.clone()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// Run the full pipeline for one audio file.
    ///
    /// Either every artifact is written and an outcome returned, or the run
    /// ends in `FAILED` and the error is returned with no artifacts saved.
    #[instrument(skip(self), fields(audio = %audio_path.display()))]
    pub async fn process_audio(&self, audio_path: &Path, force: bool) -> Result<PipelineOutcome> {
        let name = ArtifactStore::base_name(audio_path)?;
        let mut run = RunContext::new(&name);

        match self.run_audio(&mut run, audio_path, force).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                run.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_audio(&self, run: &mut RunContext, audio_path: &Path, force: bool) -> Result<PipelineOutcome> {
        let name = run.name().to_string();

        let cached = if force {
            None
        } else {
            self.artifacts.cached_transcript(&name)?
        };
        let transcript_cached = cached.is_some();
        let transcript = match cached {
            Some(text) => {
                info!("Using existing transcript for {}, skipping transcription", name);
                text
            }
            None => {
                run.advance(PipelineStage::Transcribing)?;
                if !audio_path.exists() {
                    return Err(NarrataError::InvalidInput(format!(
                        "Audio file not found: {}",
                        audio_path.display()
                    )));
                }
                let text = self.transcriber.transcribe(audio_path).await?;
                self.artifacts.cache_transcript(&name, &text);
                text
            }
        };
        if transcript.trim().is_empty() {
            return Err(NarrataError::Transcription(format!("Transcript for {} is empty", name)));
        }

        run.advance(PipelineStage::Segmenting)?;
        let infos = self.segmenter.segment(&transcript, None).await?;

        run.advance(PipelineStage::Generating)?;
        let GenerationReport { stories, dropped } = self.generator.generate(infos).await;

        run.advance(PipelineStage::Saving)?;
        let artifacts = self.artifacts.save(&name, &transcript, &stories)?;

        run.advance(PipelineStage::Done)?;
        Ok(PipelineOutcome {
            name,
            stories,
            dropped,
            artifacts,
            transcript_cached,
            stages: run.history().to_vec(),
        })
    }

    /// Transcribe one uploaded project file and store its transcript.
    #[instrument(skip(self))]
    pub async fn transcribe_project_file(&self, project_id: &str, file_id: &str) -> Result<String> {
        let audio_path = self.projects.audio_path(project_id, file_id)?;
        self.projects
            .set_file_status(project_id, file_id, FileStatus::Transcribing)?;

        let mut marker = TranscribingMarker::new(self.projects.clone(), project_id, file_id);
        let result = match self.transcriber.transcribe(&audio_path).await {
            Ok(text) => self
                .projects
                .write_transcript(project_id, file_id, &text)
                .map(|_| text),
            Err(e) => Err(e),
        };

        marker.finish(if result.is_ok() {
            FileStatus::Transcribed
        } else {
            FileStatus::Failed
        });
        result
    }

    /// Build the memo of a project from its transcribed files.
    ///
    /// Refuses to start while another memo generation for the same project
    /// is marked as running.
    #[instrument(skip(self))]
    pub async fn generate_memo(&self, project_id: &str) -> Result<GenerationReport> {
        let record = {
            let _start = self.memo_start.lock().unwrap_or_else(|e| e.into_inner());
            let record = self.projects.load(project_id)?;
            if record.is_generating() {
                return Err(NarrataError::AlreadyRunning(project_id.to_string()));
            }
            self.projects.set_status(project_id, STATUS_GENERATING, "1")?;
            record
        };

        let mut marker = GeneratingMarker::new(self.projects.clone(), project_id);
        let result = self.run_memo(&record).await;
        marker.finish(if result.is_ok() { "done" } else { "failed" });

        if let Err(e) = &result {
            error!("Memo generation for project {} failed: {}", project_id, e);
        }
        result
    }

    async fn run_memo(&self, record: &ProjectRecord) -> Result<GenerationReport> {
        let transcript = self.project_transcript(record)?;

        let infos = self
            .segmenter
            .segment(&transcript, record.narrator.as_deref())
            .await?;
        let report = self.generator.generate(infos).await;

        self.projects.write_memo(&record.id, &render_text(&report.stories))?;
        info!(
            "Memo for project {} written with {} stories",
            record.id,
            report.stories.len()
        );
        Ok(report)
    }

    /// Transcripts of every transcribed file, labelled by upload position.
    fn project_transcript(&self, record: &ProjectRecord) -> Result<String> {
        let mut combined = String::new();
        for (position, file_id) in record.file_ids_in_order().iter().enumerate() {
            if let Some(text) = self.projects.read_transcript(&record.id, file_id)? {
                combined.push_str(&format!("clip{}\n{}\n\n", position + 1, text));
            }
        }

        if combined.is_empty() {
            return Err(NarrataError::InvalidInput(format!(
                "Project {} has no transcribed files",
                record.id
            )));
        }
        Ok(combined)
    }

    /// Run [`Pipeline::generate_memo`] as a background task.
    pub fn spawn_memo_generation(&self, project_id: &str) -> RunHandle<GenerationReport> {
        let pipeline = self.clone();
        let id = project_id.to_string();
        let handle = tokio::spawn(async move { pipeline.generate_memo(&id).await });
        RunHandle::new(project_id, handle)
    }

    /// Run [`Pipeline::transcribe_project_file`] as a background task.
    pub fn spawn_transcription(&self, project_id: &str, file_id: &str) -> RunHandle<String> {
        let pipeline = self.clone();
        let (id, file) = (project_id.to_string(), file_id.to_string());
        let handle = tokio::spawn(async move { pipeline.transcribe_project_file(&id, &file).await });
        RunHandle::new(project_id, handle)
    }
}

/// Clears the project's generating flag when the run ends, however it ends.
///
/// A run dropped before [`GeneratingMarker::finish`] (an aborted task) is
/// recorded as cancelled.
struct GeneratingMarker {
    projects: Arc<dyn ProjectStore>,
    project_id: String,
    finished: bool,
}

impl GeneratingMarker {
    fn new(projects: Arc<dyn ProjectStore>, project_id: &str) -> Self {
        Self {
            projects,
            project_id: project_id.to_string(),
            finished: false,
        }
    }

    fn finish(&mut self, outcome: &str) {
        self.record(outcome);
        self.finished = true;
    }

    fn record(&self, outcome: &str) {
        for (key, value) in [(STATUS_GENERATING, ""), (STATUS_LAST_RUN, outcome)] {
            if let Err(e) = self.projects.set_status(&self.project_id, key, value) {
                warn!("Failed to update status of project {}: {}", self.project_id, e);
            }
        }
    }
}

impl Drop for GeneratingMarker {
    fn drop(&mut self) {
        if !self.finished {
            self.record("cancelled");
        }
    }
}

/// Moves a file out of `Transcribing` when its run ends.
///
/// Dropped without [`TranscribingMarker::finish`], the file is marked failed.
struct TranscribingMarker {
    projects: Arc<dyn ProjectStore>,
    project_id: String,
    file_id: String,
    finished: bool,
}

impl TranscribingMarker {
    fn new(projects: Arc<dyn ProjectStore>, project_id: &str, file_id: &str) -> Self {
        Self {
            projects,
            project_id: project_id.to_string(),
            file_id: file_id.to_string(),
            finished: false,
        }
    }

    fn finish(&mut self, status: FileStatus) {
        self.record(status);
        self.finished = true;
    }

    fn record(&self, status: FileStatus) {
        if let Err(e) = self
            .projects
            .set_file_status(&self.project_id, &self.file_id, status)
        {
            warn!("Failed to record status of file {}: {}", self.file_id, e);
        }
    }
}

impl Drop for TranscribingMarker {
    fn drop(&mut self) {
        if !self.finished {
            self.record(FileStatus::Failed);
        }
    }
}

/// Handle to a background project run.
pub struct RunHandle<T> {
    project_id: String,
    handle: JoinHandle<Result<T>>,
}

impl<T> RunHandle<T> {
    fn new(project_id: &str, handle: JoinHandle<Result<T>>) -> Self {
        Self {
            project_id: project_id.to_string(),
            handle,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the run to end.
    pub async fn join(self) -> Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(NarrataError::Project(format!(
                "Run for project {} was cancelled",
                self.project_id
            ))),
            Err(e) => Err(NarrataError::Project(format!(
                "Run for project {} panicked: {}",
                self.project_id, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stories::STORY_DELIMITER;
    use crate::testing::{segmentation_response, FixedTranscriber, PipelineChat, StoryChat};
    use std::path::PathBuf;

    struct Fixture {
        dir: tempfile::TempDir,
        settings: Settings,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut settings = Settings::default();
            settings.general.output_dir = dir.path().join("out").display().to_string();
            settings.general.cache_dir = dir.path().join("cache").display().to_string();
            settings.general.projects_dir = dir.path().join("projects").display().to_string();
            settings.segmentation.retry_delay_seconds = 0;
            settings.generation.retry_delay_seconds = 0;
            Self { dir, settings }
        }

        fn audio(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"fake audio").unwrap();
            path
        }

        fn pipeline(&self, transcriber: Arc<FixedTranscriber>, chat: Arc<PipelineChat>) -> Pipeline {
            let projects = Arc::new(FsProjectStore::new(self.settings.projects_dir()).unwrap());
            Pipeline::with_components(&self.settings, Prompts::default(), transcriber, chat, projects)
        }

        fn output_files(&self) -> usize {
            std::fs::read_dir(self.settings.output_dir())
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    #[test]
    fn test_run_context_transitions() {
        let mut run = RunContext::new("talk");
        run.advance(PipelineStage::Transcribing).unwrap();
        assert!(run.advance(PipelineStage::Start).is_err());
        run.advance(PipelineStage::Segmenting).unwrap();

        run.fail(&NarrataError::NonStoryContent);
        assert_eq!(run.stage(), PipelineStage::Failed);
        assert!(run.advance(PipelineStage::Generating).is_err());

        run.fail(&NarrataError::NonStoryContent);
        assert_eq!(run.history().iter().filter(|s| **s == PipelineStage::Failed).count(), 1);
    }

    #[tokio::test]
    async fn test_process_end_to_end() {
        let fx = Fixture::new();
        let transcriber = Arc::new(FixedTranscriber::new("Once upon a time..."));
        let chat = Arc::new(PipelineChat::new(
            vec![Ok(segmentation_response(&[(2, "The Flood"), (1, "The Move")]))],
            StoryChat::new().delay("The Move", 30),
        ));
        let pipeline = fx.pipeline(transcriber.clone(), chat);

        let outcome = pipeline.process_audio(&fx.audio("talk.mp3"), false).await.unwrap();

        assert_eq!(outcome.name, "talk");
        assert!(outcome.is_complete());
        assert!(!outcome.transcript_cached);
        assert_eq!(outcome.stories.iter().map(Story::id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            outcome.stages,
            vec![
                PipelineStage::Start,
                PipelineStage::Transcribing,
                PipelineStage::Segmenting,
                PipelineStage::Generating,
                PipelineStage::Saving,
                PipelineStage::Done,
            ]
        );

        let text = std::fs::read_to_string(&outcome.artifacts.stories_text).unwrap();
        let first = text.find("Story ID: 1").unwrap();
        let second = text.find("Story ID: 2").unwrap();
        assert!(first < second);
        assert!(text.contains(&format!("{}\n\nStory ID: 2", STORY_DELIMITER)));
        assert!(text.contains(&StoryChat::content_for("The Move")));
        assert_eq!(
            std::fs::read_to_string(&outcome.artifacts.transcript).unwrap(),
            "Once upon a time..."
        );
    }

    #[tokio::test]
    async fn test_one_failing_story_still_succeeds() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(
            vec![Ok(segmentation_response(&[(1, "A"), (2, "B"), (3, "C")]))],
            StoryChat::new().failing("B"),
        ));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("words")), chat.clone());

        let outcome = pipeline.process_audio(&fx.audio("talk.mp3"), false).await.unwrap();

        assert_eq!(outcome.stories.len(), 2);
        assert_eq!(outcome.dropped, vec![2]);
        assert_eq!(outcome.stages.last(), Some(&PipelineStage::Done));
        assert_eq!(chat.generation.attempts("B"), 3);
        assert_eq!(fx.output_files(), 3);
    }

    #[tokio::test]
    async fn test_segmentation_failure_writes_no_artifacts() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(
            vec![
                Ok("not json".to_string()),
                Ok("```json\n{\"story\": []}\n```".to_string()),
                Ok("{\"stories\": [{\"story_id\": 1}]}".to_string()),
            ],
            StoryChat::new(),
        ));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("words")), chat.clone());

        let err = pipeline.process_audio(&fx.audio("talk.mp3"), false).await.unwrap_err();

        assert!(matches!(err, NarrataError::Segmentation { attempts: 3, .. }));
        assert_eq!(chat.segmentation.calls(), 3);
        assert_eq!(chat.generation.total_calls(), 0);
        assert_eq!(fx.output_files(), 0);
    }

    #[tokio::test]
    async fn test_rerun_skips_transcription() {
        let fx = Fixture::new();
        let response = segmentation_response(&[(1, "A"), (2, "B")]);
        let audio = fx.audio("talk.mp3");

        let first_chat = Arc::new(PipelineChat::new(vec![Ok(response.clone())], StoryChat::new()));
        let first = fx
            .pipeline(Arc::new(FixedTranscriber::new("words")), first_chat)
            .process_audio(&audio, false)
            .await
            .unwrap();

        let transcriber = Arc::new(FixedTranscriber::new("different words"));
        let second_chat = Arc::new(PipelineChat::new(vec![Ok(response)], StoryChat::new()));
        let second = fx
            .pipeline(transcriber.clone(), second_chat.clone())
            .process_audio(&audio, false)
            .await
            .unwrap();

        assert_eq!(transcriber.calls(), 0);
        assert!(second.transcript_cached);
        assert_eq!(second.stages[..2], [PipelineStage::Start, PipelineStage::Segmenting]);
        let infos = |o: &PipelineOutcome| o.stories.iter().map(|s| s.info.clone()).collect::<Vec<_>>();
        assert_eq!(infos(&first), infos(&second));
        assert_eq!(
            second_chat.segmentation.request(0).user_prompt(),
            Some("Please analyze this content:\nwords")
        );
    }

    #[tokio::test]
    async fn test_cached_transcript_survives_failed_run() {
        let fx = Fixture::new();
        let audio = fx.audio("talk.mp3");
        let failing = Arc::new(PipelineChat::new(vec![], StoryChat::new()));
        assert!(fx
            .pipeline(Arc::new(FixedTranscriber::new("words")), failing)
            .process_audio(&audio, false)
            .await
            .is_err());

        let transcriber = Arc::new(FixedTranscriber::new("words"));
        let chat = Arc::new(PipelineChat::new(
            vec![Ok(segmentation_response(&[(1, "A")]))],
            StoryChat::new(),
        ));
        let outcome = fx
            .pipeline(transcriber.clone(), chat)
            .process_audio(&audio, false)
            .await
            .unwrap();
        assert!(outcome.transcript_cached);
        assert_eq!(transcriber.calls(), 0);
    }

    #[tokio::test]
    async fn test_force_transcribes_again() {
        let fx = Fixture::new();
        let audio = fx.audio("talk.mp3");
        let response = segmentation_response(&[(1, "A")]);
        let first = Arc::new(PipelineChat::new(vec![Ok(response.clone())], StoryChat::new()));
        fx.pipeline(Arc::new(FixedTranscriber::new("old")), first)
            .process_audio(&audio, false)
            .await
            .unwrap();

        let transcriber = Arc::new(FixedTranscriber::new("new"));
        let chat = Arc::new(PipelineChat::new(vec![Ok(response)], StoryChat::new()));
        let outcome = fx
            .pipeline(transcriber.clone(), chat)
            .process_audio(&audio, true)
            .await
            .unwrap();

        assert_eq!(transcriber.calls(), 1);
        assert_eq!(std::fs::read_to_string(&outcome.artifacts.transcript).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_missing_audio_fails() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(vec![], StoryChat::new()));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("words")), chat);

        let err = pipeline
            .process_audio(&fx.dir.path().join("missing.mp3"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, NarrataError::InvalidInput(_)));
    }

    async fn project_with_clips(pipeline: &Pipeline, narrator: Option<&str>) -> String {
        let projects = pipeline.projects();
        let project = projects.create("family", narrator).unwrap();
        let first = projects.add_file(&project.id, "one.mp3", b"1").unwrap();
        // Distinct upload timestamps keep the clip order stable.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = projects.add_file(&project.id, "two.mp3", b"2").unwrap();
        pipeline.transcribe_project_file(&project.id, &first).await.unwrap();
        pipeline.transcribe_project_file(&project.id, &second).await.unwrap();
        project.id
    }

    #[tokio::test]
    async fn test_transcribe_project_file() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(vec![], StoryChat::new()));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("clip words")), chat);
        let projects = pipeline.projects();
        let project = projects.create("p", None).unwrap();
        let file_id = projects.add_file(&project.id, "a.mp3", b"x").unwrap();

        let text = pipeline
            .spawn_transcription(&project.id, &file_id)
            .join()
            .await
            .unwrap();

        assert_eq!(text, "clip words");
        assert_eq!(
            projects.read_transcript(&project.id, &file_id).unwrap().as_deref(),
            Some("clip words")
        );
        assert_eq!(
            projects.load(&project.id).unwrap().files[&file_id].status,
            FileStatus::Transcribed
        );
    }

    #[tokio::test]
    async fn test_aborted_transcription_marks_file_failed() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(vec![], StoryChat::new()));
        let transcriber = Arc::new(FixedTranscriber::new("clip words").delay(5_000));
        let pipeline = fx.pipeline(transcriber.clone(), chat);
        let projects = pipeline.projects();
        let project = projects.create("p", None).unwrap();
        let file_id = projects.add_file(&project.id, "a.mp3", b"x").unwrap();

        let handle = pipeline.spawn_transcription(&project.id, &file_id);
        while transcriber.calls() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(
            projects.load(&project.id).unwrap().files[&file_id].status,
            FileStatus::Transcribing
        );
        handle.abort();
        assert!(handle.join().await.is_err());

        assert_eq!(
            projects.load(&project.id).unwrap().files[&file_id].status,
            FileStatus::Failed
        );
        assert_eq!(projects.read_transcript(&project.id, &file_id).unwrap(), None);
    }

    #[tokio::test]
    async fn test_generate_memo() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(
            vec![Ok(segmentation_response(&[(1, "A"), (2, "B")]))],
            StoryChat::new(),
        ));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("words")), chat.clone());
        let id = project_with_clips(&pipeline, Some("Grandma")).await;

        let report = pipeline.spawn_memo_generation(&id).join().await.unwrap();
        assert_eq!(report.stories.len(), 2);

        let projects = pipeline.projects();
        let memo = projects.read_memo(&id).unwrap().unwrap();
        assert!(memo.contains("Story ID: 1") && memo.contains("Story ID: 2"));
        assert_eq!(projects.status(&id, STATUS_LAST_RUN).unwrap().as_deref(), Some("done"));
        assert!(!projects.load(&id).unwrap().is_generating());

        let user = chat.segmentation.request(0).user_prompt().unwrap().to_string();
        assert!(user.contains("Narrator: Grandma\nclip1\nwords\n\nclip2\nwords\n\n"));
    }

    #[tokio::test]
    async fn test_memo_refuses_concurrent_run() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(vec![], StoryChat::new()));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("words")), chat.clone());
        let id = project_with_clips(&pipeline, None).await;
        pipeline.projects().set_status(&id, STATUS_GENERATING, "1").unwrap();

        let err = pipeline.generate_memo(&id).await.unwrap_err();
        assert!(matches!(err, NarrataError::AlreadyRunning(_)));
        assert_eq!(chat.segmentation.calls(), 0);
        // The flag belongs to the other run and is left alone.
        assert!(pipeline.projects().load(&id).unwrap().is_generating());
    }

    #[tokio::test]
    async fn test_failed_memo_clears_flag() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(
            vec![Ok("```json\n{\"stories\": [], \"error\": \"NON_STORY_CONTENT\"}\n```".to_string())],
            StoryChat::new(),
        ));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("words")), chat);
        let id = project_with_clips(&pipeline, None).await;

        let err = pipeline.generate_memo(&id).await.unwrap_err();
        assert!(matches!(err, NarrataError::NonStoryContent));

        let projects = pipeline.projects();
        assert!(!projects.load(&id).unwrap().is_generating());
        assert_eq!(projects.status(&id, STATUS_LAST_RUN).unwrap().as_deref(), Some("failed"));
        assert_eq!(projects.read_memo(&id).unwrap(), None);
    }

    #[tokio::test]
    async fn test_aborted_memo_is_recorded() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(
            vec![Ok(segmentation_response(&[(1, "Slow")]))],
            StoryChat::new().delay("Slow", 5_000),
        ));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("words")), chat.clone());
        let id = project_with_clips(&pipeline, None).await;

        let handle = pipeline.spawn_memo_generation(&id);
        while chat.generation.total_calls() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!handle.is_finished());
        handle.abort();
        assert!(matches!(handle.join().await.unwrap_err(), NarrataError::Project(_)));

        let projects = pipeline.projects();
        assert!(!projects.load(&id).unwrap().is_generating());
        assert_eq!(projects.status(&id, STATUS_LAST_RUN).unwrap().as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_memo_without_transcripts() {
        let fx = Fixture::new();
        let chat = Arc::new(PipelineChat::new(vec![], StoryChat::new()));
        let pipeline = fx.pipeline(Arc::new(FixedTranscriber::new("words")), chat);
        let project = pipeline.projects().create("empty", None).unwrap();

        let err = pipeline.generate_memo(&project.id).await.unwrap_err();
        assert!(matches!(err, NarrataError::InvalidInput(_)));
        assert!(!pipeline.projects().load(&project.id).unwrap().is_generating());
    }
}
