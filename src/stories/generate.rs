//! Story generation stage.
//!
//! Fans out one request per story, tolerates per-story failure, and restores
//! a deterministic order once every request has settled.

use super::{GenerationReport, Story, StoryInfo};
use crate::config::{GenerationSettings, Prompts};
use crate::error::{NarrataError, Result};
use crate::llm::{ChatModel, ChatRequest};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::{error, info, instrument, warn};

/// Expands story metadata into full prose.
pub struct Generator {
    model: Arc<dyn ChatModel>,
    prompts: Arc<Prompts>,
    settings: GenerationSettings,
}

impl Generator {
    pub fn new(model: Arc<dyn ChatModel>, prompts: Arc<Prompts>, settings: GenerationSettings) -> Self {
        Self {
            model,
            prompts,
            settings,
        }
    }

    /// Generate every story concurrently.
    ///
    /// Never fails as a whole: a story whose retries are exhausted is logged
    /// and reported in [`GenerationReport::dropped`]. The returned stories are
    /// sorted ascending by id regardless of completion order.
    #[instrument(skip(self, infos), fields(count = infos.len()))]
    pub async fn generate(&self, infos: Vec<StoryInfo>) -> GenerationReport {
        info!("Generating {} stories in parallel...", infos.len());

        let mut stories: Vec<Story> = Vec::with_capacity(infos.len());
        let mut dropped: Vec<u32> = Vec::new();

        let mut completions = stream::iter(infos)
            .map(|info| async move {
                let story_id = info.story_id;
                (story_id, self.generate_one(info).await)
            })
            .buffer_unordered(self.settings.max_concurrent.max(1));

        while let Some((story_id, result)) = completions.next().await {
            match result {
                Ok(story) => {
                    info!("Story {} generated", story_id);
                    stories.push(story);
                }
                Err(e) => {
                    error!("{}", e);
                    dropped.push(story_id);
                }
            }
        }

        stories.sort_by_key(Story::id);
        dropped.sort_unstable();

        if !dropped.is_empty() {
            warn!(
                "{} of {} stories were dropped: {:?}",
                dropped.len(),
                stories.len() + dropped.len(),
                dropped
            );
        }

        GenerationReport { stories, dropped }
    }

    /// Generate a single story with its own retry budget.
    async fn generate_one(&self, info: StoryInfo) -> Result<Story> {
        let request = self.build_request(&info);
        let story_id = info.story_id;
        let attempts = self.settings.max_retries.max(1);
        let strategy = FixedInterval::from_millis(self.settings.retry_delay().as_millis() as u64)
            .take(attempts as usize - 1);
        let mut tries = 0u32;

        let result = Retry::spawn(strategy, || {
            tries += 1;
            let current = tries;
            let request = request.clone();
            async move {
                let error = match self.model.complete(request).await {
                    Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                    Ok(_) => NarrataError::OpenAI("empty response".to_string()),
                    Err(e) => e,
                };
                warn!("Story {} attempt {}/{} failed: {}", story_id, current, attempts, error);
                Err(RetryError::Transient {
                    err: error,
                    retry_after: None,
                })
            }
        })
        .await;

        match result {
            Ok(content) => Ok(Story::new(info, content)),
            Err(e) => Err(NarrataError::Generation {
                story_id,
                reason: e.to_string(),
            }),
        }
    }

    fn build_request(&self, info: &StoryInfo) -> ChatRequest {
        let mut vars = HashMap::new();
        vars.insert("title".to_string(), info.story_title.clone());
        vars.insert("time".to_string(), info.story_time.clone());
        vars.insert("characters".to_string(), info.characters_joined());
        vars.insert("summary".to_string(), info.summary.clone());

        let system = self.prompts.render_with_custom(&self.prompts.generation.system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.generation.user, &vars);

        ChatRequest::new(system, user, self.settings.temperature)
    }
}
