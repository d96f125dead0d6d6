use super::{BodyStream, SearchBackend};
use crate::error::SearchError;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Replays a canned body instead of calling the endpoint.
///
/// Without a script it answers every query with a short demo stream.
#[derive(Debug, Default, Clone)]
pub struct StubBackend {
    script: Option<Vec<Bytes>>,
    delay: Duration,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: None,
            delay: Duration::from_millis(120),
        }
    }

    /// Serve exactly these reads, in order.
    pub fn scripted(reads: Vec<Bytes>) -> Self {
        Self {
            script: Some(reads),
            delay: Duration::ZERO,
        }
    }

    /// Serve a captured body cut into reads of `slice` bytes.
    pub fn from_body(body: impl Into<Bytes>, slice: usize) -> Self {
        let body = body.into();
        let slice = slice.max(1);
        let reads = (0..body.len())
            .step_by(slice)
            .map(|start| body.slice(start..(start + slice).min(body.len())))
            .collect();
        Self::scripted(reads)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// The four-chunk answer used when no script is given.
pub fn demo_body(query: &str) -> String {
    let lines = [
        serde_json::json!({
            "request_id": "stub",
            "chunk_id": 0,
            "ui_element": "general_answer",
            "content": format!("You asked: {query}"),
        }),
        serde_json::json!({
            "request_id": "stub",
            "chunk_id": 1,
            "ui_element": "recommendation_0",
            "content": { "name": "Cafe Onion Anguk", "area": "Jongno-gu, Seoul" },
        }),
        serde_json::json!({
            "request_id": "stub",
            "chunk_id": 2,
            "ui_element": "followup_questions",
            "content": ["How do I get there by subway?", "Is it open on Mondays?"],
        }),
        serde_json::json!({
            "request_id": "stub",
            "chunk_id": 3,
            "ui_element": "sources",
            "content": [{ "name": "Visit Seoul", "link": "https://english.visitseoul.net" }],
        }),
        serde_json::json!({
            "request_id": "stub",
            "chunk_id": 4,
            "ui_element": "is_last",
            "content": "true",
        }),
    ];
    lines.iter().map(|l| format!("{l}\n")).collect()
}

impl SearchBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn open(
        &self,
        query: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<BodyStream, SearchError>> + Send>> {
        let reads = match &self.script {
            Some(reads) => reads.clone(),
            None => demo_body(query)
                .lines()
                .map(|l| Bytes::from(format!("{l}\n")))
                .collect(),
        };
        let delay = self.delay;

        Box::pin(async move {
            let (tx, rx) = mpsc::channel::<Result<Bytes, SearchError>>(32);

            tokio::spawn(async move {
                for read in reads {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if tx.send(Ok(read)).await.is_err() {
                        tracing::trace!("stub body dropped by reader");
                        break;
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as BodyStream)
        })
    }
}
