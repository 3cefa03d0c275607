//! Story segmentation stage.
//!
//! Sends a bounded prefix of the transcript to the model together with the
//! segmentation contract and parses the answer into [`StoryInfo`] records.

use super::parser::{self, ParseError};
use super::StoryInfo;
use crate::config::{Prompts, SegmentationSettings};
use crate::error::{NarrataError, Result};
use crate::llm::{ChatModel, ChatRequest};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, instrument, warn};

/// Splits a transcript into story metadata records.
pub struct Segmenter {
    model: Arc<dyn ChatModel>,
    prompts: Arc<Prompts>,
    settings: SegmentationSettings,
}

impl Segmenter {
    pub fn new(model: Arc<dyn ChatModel>, prompts: Arc<Prompts>, settings: SegmentationSettings) -> Self {
        Self {
            model,
            prompts,
            settings,
        }
    }

    /// Segment a transcript, retrying the whole model call on parse failures.
    ///
    /// Records come back in the order the model produced them. After
    /// `max_retries` failed attempts the error is a
    /// [`NarrataError::Segmentation`]; a non-narrative verdict fails at once.
    #[instrument(skip(self, transcript), fields(chars = transcript.chars().count()))]
    pub async fn segment(&self, transcript: &str, narrator: Option<&str>) -> Result<Vec<StoryInfo>> {
        let input = match narrator.filter(|n| !n.trim().is_empty()) {
            Some(name) => format!("Narrator: {}\n{}", name.trim(), transcript),
            None => transcript.to_string(),
        };
        let bounded = truncate_chars(&input, self.settings.max_text_length);
        if bounded.len() < input.len() {
            warn!(
                "Transcript truncated for segmentation: keeping {} of {} characters",
                self.settings.max_text_length,
                input.chars().count()
            );
        }

        let request = self.build_request(bounded);
        let attempts = self.settings.max_retries.max(1);
        let strategy = FixedInterval::from_millis(self.settings.retry_delay().as_millis() as u64)
            .take(attempts as usize - 1);
        let mut tries = 0u32;

        info!("Analyzing story structure...");
        let result = Retry::spawn(strategy, || {
            tries += 1;
            let current = tries;
            let request = request.clone();
            async move {
                match self.attempt(request).await {
                    Ok(stories) => Ok(stories),
                    Err(NarrataError::NonStoryContent) => {
                        warn!("Model reported the transcript contains no narrative content");
                        Err(RetryError::Permanent(NarrataError::NonStoryContent))
                    }
                    Err(e) => {
                        warn!("Segmentation attempt {}/{} failed: {}", current, attempts, e);
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                }
            }
        })
        .await;

        match result {
            Ok(stories) => {
                info!("Identified {} stories", stories.len());
                Ok(stories)
            }
            Err(NarrataError::NonStoryContent) => Err(NarrataError::NonStoryContent),
            Err(e) => Err(NarrataError::Segmentation {
                attempts,
                reason: e.to_string(),
            }),
        }
    }

    async fn attempt(&self, request: ChatRequest) -> Result<Vec<StoryInfo>> {
        let response = self.model.complete(request).await?;
        debug!("Raw segmentation response:\n{}", response);
        parser::parse_story_infos(&response).map_err(|e: ParseError| e.into())
    }

    fn build_request(&self, transcript: &str) -> ChatRequest {
        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), transcript.to_string());

        let system = self.prompts.render_with_custom(&self.prompts.segmentation.system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.segmentation.user, &vars);

        ChatRequest::new(system, user, self.settings.temperature)
    }
}

/// Keep at most `max_chars` characters, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
