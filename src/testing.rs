//! Test doubles shared by the unit tests.

use crate::error::{NarrataError, Result};
use crate::llm::{ChatModel, ChatRequest};
use crate::transcription::Transcriber;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// JSON for one well-formed story record.
pub fn story_json(id: u32, title: &str) -> String {
    serde_json::json!({
        "story_id": id,
        "story_title": title,
        "story_time": format!("year {}", 1900 + id),
        "characters": ["Narrator", format!("Friend {}", id)],
        "summary": format!("Summary of {}", title),
    })
    .to_string()
}

/// A segmentation response listing the given (id, title) pairs.
pub fn segmentation_response(stories: &[(u32, &str)]) -> String {
    let items: Vec<String> = stories.iter().map(|(id, title)| story_json(*id, title)).collect();
    format!("```json\n{{\"stories\": [{}]}}\n```", items.join(", "))
}

/// Chat model that replays a fixed script of responses, one per call.
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> ChatRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(NarrataError::OpenAI("script exhausted".to_string())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Chat model that writes a story for whichever title appears in the prompt.
///
/// Titles can be made to fail on every call, and can be given a latency so
/// completions arrive in a chosen order.
#[derive(Default)]
pub struct StoryChat {
    failing: HashSet<String>,
    delays_ms: HashMap<String, u64>,
    attempts: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl StoryChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, title: &str) -> Self {
        self.failing.insert(title.to_string());
        self
    }

    pub fn delay(mut self, title: &str, ms: u64) -> Self {
        self.delays_ms.insert(title.to_string(), ms);
        self
    }

    pub fn attempts(&self, title: &str) -> usize {
        self.attempts.lock().unwrap().get(title).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn content_for(title: &str) -> String {
        format!("The full story of {}.", title)
    }

    fn title_of(request: &ChatRequest) -> String {
        request
            .system_prompt()
            .and_then(|p| p.lines().find_map(|l| l.strip_prefix("Title: ")))
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl ChatModel for StoryChat {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let title = Self::title_of(&request);
        *self.attempts.lock().unwrap().entry(title.clone()).or_insert(0) += 1;

        if let Some(ms) = self.delays_ms.get(&title) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }

        if self.failing.contains(&title) {
            return Err(NarrataError::OpenAI(format!("refusing to write {}", title)));
        }
        Ok(format!("  {}\n", Self::content_for(&title)))
    }

    fn model_name(&self) -> &str {
        "story"
    }
}

/// Chat model that answers segmentation requests from a script and
/// generation requests like [`StoryChat`].
pub struct PipelineChat {
    pub segmentation: ScriptedChat,
    pub generation: StoryChat,
}

impl PipelineChat {
    pub fn new(segmentation: Vec<Result<String>>, generation: StoryChat) -> Self {
        Self {
            segmentation: ScriptedChat::new(segmentation),
            generation,
        }
    }
}

#[async_trait]
impl ChatModel for PipelineChat {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let is_segmentation = request
            .system_prompt()
            .is_some_and(|p| p.contains("\"stories\""));
        if is_segmentation {
            self.segmentation.complete(request).await
        } else {
            self.generation.complete(request).await
        }
    }

    fn model_name(&self) -> &str {
        "pipeline"
    }
}

/// Transcriber that returns fixed text and counts calls.
pub struct FixedTranscriber {
    text: String,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering.
    pub fn delay(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
