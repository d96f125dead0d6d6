use crate::chunk::{self, Decoded, Source, StreamChunk, UiElement};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 256;

/// How a result reached completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    #[default]
    Pending,
    /// An `is_last` chunk said so.
    Marker,
    /// The endpoint answered with a single non-chunk payload.
    Opaque,
    /// The body ended (or hit `[DONE]`) without an `is_last` chunk.
    EndOfStream,
}

/// Effect of feeding one span to [`SearchResult::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Malformed; the result is unchanged.
    Skipped,
    Folded,
    /// The span completed the result.
    Completed,
}

/// The progressively assembled answer for one search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub general_answer: String,
    /// Indexed by the `N` of `recommendation_<N>`; holes stay `None`.
    pub recommendations: Vec<Option<Value>>,
    pub followup_questions: Vec<String>,
    pub sources: Vec<Source>,
    pub is_complete: bool,
    pub completion: Completion,
    /// Whole response when the endpoint did not stream chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(skip)]
    request_id: Option<String>,
    #[serde(skip)]
    chunks: BTreeMap<i64, StreamChunk>,
    #[serde(skip)]
    max_recommendations: usize,
}

impl Default for SearchResult {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchResult {
    pub fn new() -> Self {
        Self::with_max_recommendations(DEFAULT_MAX_RECOMMENDATIONS)
    }

    pub fn with_max_recommendations(max_recommendations: usize) -> Self {
        Self {
            general_answer: String::new(),
            recommendations: Vec::new(),
            followup_questions: Vec::new(),
            sources: Vec::new(),
            is_complete: false,
            completion: Completion::Pending,
            payload: None,
            request_id: None,
            chunks: BTreeMap::new(),
            max_recommendations,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Chunks seen so far, keyed by `chunk_id`.
    pub fn chunks(&self) -> &BTreeMap<i64, StreamChunk> {
        &self.chunks
    }

    pub fn recommendation(&self, index: usize) -> Option<&Value> {
        self.recommendations.get(index).and_then(Option::as_ref)
    }

    /// Parse one extracted span and fold it in.
    pub fn apply(&mut self, text: &str) -> Applied {
        match chunk::decode(text) {
            Ok(Decoded::Chunk(chunk)) => self.fold(chunk),
            Ok(Decoded::Opaque(value)) => {
                tracing::debug!("received non-chunk payload; treating it as the whole result");
                self.payload = Some(value);
                self.complete(Completion::Opaque);
                Applied::Completed
            }
            Err(e) => {
                tracing::warn!(error = %e, fragment = %preview(text), "skipping malformed chunk");
                Applied::Skipped
            }
        }
    }

    pub fn fold(&mut self, chunk: StreamChunk) -> Applied {
        match &self.request_id {
            Some(id) if *id != chunk.request_id => {
                tracing::warn!(
                    expected = %id,
                    got = %chunk.request_id,
                    chunk_id = chunk.chunk_id,
                    "chunk carries a different request_id"
                );
            }
            Some(_) => {}
            None => self.request_id = Some(chunk.request_id.clone()),
        }

        tracing::trace!(chunk_id = chunk.chunk_id, ui_element = %chunk.ui_element.tag(), "folding chunk");

        let mut applied = Applied::Folded;
        match &chunk.ui_element {
            UiElement::GeneralAnswer => self.general_answer = text_of(&chunk.content),
            UiElement::Recommendation(index) => self.set_recommendation(*index, chunk.content.clone()),
            UiElement::FollowupQuestions => {
                self.followup_questions = list_of(&chunk.content).iter().map(text_of).collect();
            }
            UiElement::Sources => {
                self.sources = list_of(&chunk.content)
                    .iter()
                    .filter_map(|v| match serde_json::from_value::<Source>(v.clone()) {
                        Ok(s) if v.is_object() => Some(s),
                        _ => {
                            tracing::warn!(entry = %v, "dropping malformed source entry");
                            None
                        }
                    })
                    .collect();
            }
            UiElement::IsLast => {
                if chunk.content.as_str() == Some("true") {
                    self.complete(Completion::Marker);
                    applied = Applied::Completed;
                }
            }
            UiElement::Unknown(tag) => tracing::debug!(%tag, "ignoring unknown ui_element"),
            UiElement::Missing => tracing::debug!(chunk_id = chunk.chunk_id, "chunk has no ui_element"),
        }

        self.chunks.insert(chunk.chunk_id, chunk);
        applied
    }

    /// The body ended without an explicit completion signal.
    pub fn mark_end_of_stream(&mut self) {
        if !self.is_complete {
            self.complete(Completion::EndOfStream);
        }
    }

    fn complete(&mut self, how: Completion) {
        self.is_complete = true;
        self.completion = how;
    }

    fn set_recommendation(&mut self, index: usize, content: Value) {
        if index >= self.max_recommendations {
            tracing::warn!(index, max = self.max_recommendations, "recommendation index out of range");
            return;
        }
        if self.recommendations.len() <= index {
            self.recommendations.resize(index + 1, None);
        }
        self.recommendations[index] = Some(content);
    }
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn list_of(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(120) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
