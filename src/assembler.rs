//! Orchestration of one search: read, extract, fold, notify.
//!
//! A [`StreamAssembler`] is `Idle` until [`StreamAssembler::run`] starts
//! pulling the body, and ends in exactly one terminal [`Outcome`]. Observers
//! see zero or more `on_chunk` calls followed by at most one `on_complete` or
//! `on_error`; an aborted search gets no terminal callback at all.

use crate::backend::SearchBackend;
use crate::decode::Utf8Decoder;
use crate::error::SearchError;
use crate::extract;
use crate::result::{Applied, Completion, SearchResult, DEFAULT_MAX_RECOMMENDATIONS};
use crate::session::SearchTicket;
use bytes::Bytes;
use futures_core::Stream;
use tokio_stream::StreamExt;

/// Receives progress for one search.
pub trait SearchObserver {
    /// Called after every folded chunk with the current snapshot.
    fn on_chunk(&mut self, result: &SearchResult, is_complete: bool);

    /// Called once, after the final `on_chunk`.
    fn on_complete(&mut self);

    /// Called once on transport failure; never followed by `on_complete`.
    fn on_error(&mut self, error: SearchError);
}

/// Terminal state of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed(Completion),
    Errored,
    /// Cancelled or superseded; reported to nobody.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Streaming,
    Terminal(Outcome),
}

enum Read {
    Cancelled,
    Next(Option<Result<Bytes, SearchError>>),
}

pub struct StreamAssembler {
    ticket: SearchTicket,
    state: State,
    decoder: Utf8Decoder,
    buffer: String,
    result: SearchResult,
}

impl StreamAssembler {
    pub fn new(ticket: SearchTicket) -> Self {
        Self {
            ticket,
            state: State::Idle,
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            result: SearchResult::with_max_recommendations(DEFAULT_MAX_RECOMMENDATIONS),
        }
    }

    pub fn with_max_recommendations(mut self, max: usize) -> Self {
        self.result = SearchResult::with_max_recommendations(max);
        self
    }

    pub fn result(&self) -> &SearchResult {
        &self.result
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            State::Terminal(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Open `query` on `backend` and consume the answer.
    pub async fn search(
        &mut self,
        backend: &dyn SearchBackend,
        query: &str,
        observer: &mut dyn SearchObserver,
    ) -> Outcome {
        if let Some(outcome) = self.outcome() {
            return outcome;
        }
        let token = self.ticket.token().clone();
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            res = backend.open(query) => Some(res),
        };

        match opened {
            Some(Ok(body)) => self.run(body, observer).await,
            Some(Err(err)) if self.ticket.is_current() => {
                tracing::warn!(backend = backend.name(), error = %err, "search request failed");
                observer.on_error(err);
                self.finish(Outcome::Errored)
            }
            _ => self.finish(self.abort()),
        }
    }

    /// Consume `body` to a terminal state.
    ///
    /// The body is dropped before this returns, whichever way the search ends.
    pub async fn run<S>(&mut self, body: S, observer: &mut dyn SearchObserver) -> Outcome
    where
        S: Stream<Item = Result<Bytes, SearchError>> + Unpin,
    {
        if let State::Terminal(outcome) = self.state {
            tracing::warn!(generation = self.ticket.generation(), "search already finished");
            return outcome;
        }
        self.state = State::Streaming;
        tracing::debug!(generation = self.ticket.generation(), "search stream started");

        let mut body = body;
        let outcome = self.pump(&mut body, observer).await;
        drop(body);
        tracing::debug!(generation = self.ticket.generation(), ?outcome, "response body released");

        self.finish(outcome)
    }

    async fn pump<S>(&mut self, body: &mut S, observer: &mut dyn SearchObserver) -> Outcome
    where
        S: Stream<Item = Result<Bytes, SearchError>> + Unpin,
    {
        let token = self.ticket.token().clone();
        loop {
            if !self.ticket.is_current() {
                return self.abort();
            }

            let read = tokio::select! {
                biased;
                _ = token.cancelled() => Read::Cancelled,
                item = body.next() => Read::Next(item),
            };

            match read {
                Read::Cancelled => return self.abort(),
                Read::Next(Some(Ok(bytes))) => {
                    self.decoder.decode(&bytes, &mut self.buffer);
                    if let Some(outcome) = self.drain(observer) {
                        return outcome;
                    }
                }
                Read::Next(Some(Err(err))) => {
                    if !self.ticket.is_current() {
                        return self.abort();
                    }
                    tracing::warn!(error = %err, "response body failed");
                    observer.on_error(err);
                    return Outcome::Errored;
                }
                Read::Next(None) => {
                    if self.decoder.has_pending() {
                        tracing::debug!("body ended inside a UTF-8 sequence");
                    }
                    self.decoder.finish(&mut self.buffer);
                    if let Some(outcome) = self.drain(observer) {
                        return outcome;
                    }
                    if !self.buffer.trim().is_empty() {
                        tracing::debug!(leftover = self.buffer.len(), "discarding incomplete trailing data");
                    }
                    return self.finish_implicitly(observer);
                }
            }
        }
    }

    /// Fold every complete object in the buffer. `Some` means the search ended.
    fn drain(&mut self, observer: &mut dyn SearchObserver) -> Option<Outcome> {
        let extraction = extract::extract(&self.buffer);
        let (consumed, done) = (extraction.consumed, extraction.done);

        let mut ended = None;
        for text in &extraction.objects {
            if !self.ticket.is_current() {
                ended = Some(Outcome::Aborted);
                break;
            }
            match self.result.apply(text) {
                Applied::Skipped => {}
                Applied::Folded => observer.on_chunk(&self.result, false),
                Applied::Completed => {
                    observer.on_chunk(&self.result, true);
                    ended = Some(Outcome::Completed(self.result.completion));
                    break;
                }
            }
        }
        self.buffer.drain(..consumed);

        match ended {
            Some(Outcome::Aborted) => Some(self.abort()),
            Some(_) => Some(self.complete(observer)),
            None if done => {
                tracing::debug!("received [DONE] sentinel");
                Some(self.finish_implicitly(observer))
            }
            None => None,
        }
    }

    fn finish_implicitly(&mut self, observer: &mut dyn SearchObserver) -> Outcome {
        if !self.result.is_complete {
            tracing::debug!("stream ended without a completion marker");
        }
        self.result.mark_end_of_stream();
        if !self.ticket.is_current() {
            return self.abort();
        }
        observer.on_chunk(&self.result, true);
        self.complete(observer)
    }

    fn complete(&mut self, observer: &mut dyn SearchObserver) -> Outcome {
        if !self.ticket.is_current() {
            return self.abort();
        }
        observer.on_complete();
        Outcome::Completed(self.result.completion)
    }

    fn abort(&self) -> Outcome {
        tracing::debug!(generation = self.ticket.generation(), "search aborted");
        Outcome::Aborted
    }

    fn finish(&mut self, outcome: Outcome) -> Outcome {
        self.state = State::Terminal(outcome);
        outcome
    }
}

/// Run one search for `query`, reporting to `observer`.
pub async fn start_search(
    backend: &dyn SearchBackend,
    query: &str,
    ticket: SearchTicket,
    observer: &mut dyn SearchObserver,
) -> Outcome {
    StreamAssembler::new(ticket).search(backend, query, observer).await
}
