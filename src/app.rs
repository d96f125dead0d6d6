use crate::config;
use anyhow::Context;
use konnect_search::backend::stub::StubBackend;
use konnect_search::{Completion, Outcome, SearchBackend, SearchError, SearchObserver, SearchResult, SearchSession};
use std::io::Write;
use std::time::Duration;

pub fn build_backend(
    http: &reqwest::Client,
    cfg: Option<&config::Config>,
    backend_name: &str,
    endpoint: Option<String>,
) -> anyhow::Result<Box<dyn SearchBackend + Send + Sync>> {
    match backend_name {
        "http" => {
            #[cfg(feature = "http")]
            {
                let endpoint = endpoint
                    .or_else(|| std::env::var("KONNECT_SEARCH_ENDPOINT").ok())
                    .or_else(|| cfg.and_then(|c| c.endpoint.clone()))
                    .context("no search endpoint configured (pass --endpoint, set KONNECT_SEARCH_ENDPOINT or config.toml endpoint)")?;
                let url = reqwest::Url::parse(&endpoint)
                    .with_context(|| format!("invalid search endpoint: {endpoint}"))?;

                let b = konnect_search::backend::http::HttpBackend::new(http.clone(), url);
                tracing::debug!(endpoint = %b.endpoint(), "using http backend");
                Ok(Box::new(b))
            }
            #[cfg(not(feature = "http"))]
            {
                let _ = (http, cfg, endpoint);
                anyhow::bail!("http backend is not enabled in this build")
            }
        }
        "stub" => Ok(Box::new(StubBackend::new())),
        other => anyhow::bail!("unknown backend: {other}"),
    }
}

/// Cancel the session's in-flight search on Ctrl-C or when `timeout` elapses.
pub fn arm_cancellation(session: &SearchSession, timeout: Option<Duration>) {
    let on_interrupt = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            on_interrupt.cancel_current();
        }
    });

    if let Some(limit) = timeout {
        let on_timeout = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            tracing::info!(?limit, "search timed out");
            on_timeout.cancel_current();
        });
    }
}

/// Prints the answer as it grows, and the rest of the result at the end.
pub struct TerminalObserver<W> {
    out: W,
    json: bool,
    printed_answer: String,
    latest: Option<SearchResult>,
    error: Option<SearchError>,
}

impl<W: Write> TerminalObserver<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out,
            json,
            printed_answer: String::new(),
            latest: None,
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Option<SearchError> {
        self.error.take()
    }

    fn render(&mut self, r: &SearchResult) -> std::io::Result<()> {
        if self.json {
            let s = serde_json::to_string_pretty(r).map_err(std::io::Error::other)?;
            return writeln!(self.out, "{s}");
        }

        if !self.printed_answer.is_empty() {
            writeln!(self.out)?;
        }
        if let Some(payload) = &r.payload {
            writeln!(self.out, "{payload:#}")?;
        }

        let recs: Vec<_> = r.recommendations.iter().flatten().collect();
        if !recs.is_empty() {
            writeln!(self.out, "\nRecommendations:")?;
            for rec in recs {
                match rec.get("name").and_then(|n| n.as_str()) {
                    Some(name) => writeln!(self.out, "  - {name}")?,
                    None => writeln!(self.out, "  - {rec}")?,
                }
            }
        }

        if !r.followup_questions.is_empty() {
            writeln!(self.out, "\nYou could also ask:")?;
            for q in &r.followup_questions {
                writeln!(self.out, "  - {q}")?;
            }
        }

        if !r.sources.is_empty() {
            writeln!(self.out, "\nSources:")?;
            for s in &r.sources {
                writeln!(self.out, "  - {} <{}>", s.name, s.link)?;
            }
        }
        self.out.flush()
    }
}

impl<W: Write> SearchObserver for TerminalObserver<W> {
    fn on_chunk(&mut self, result: &SearchResult, is_complete: bool) {
        tracing::debug!(is_complete, chunks = result.chunks().len(), "result updated");

        if !self.json && result.general_answer != self.printed_answer {
            let written = match result.general_answer.strip_prefix(self.printed_answer.as_str()) {
                Some(suffix) => write!(self.out, "{suffix}"),
                None => write!(self.out, "\n{}", result.general_answer),
            }
            .and_then(|()| self.out.flush());
            if let Err(e) = written {
                tracing::warn!(error = %e, "failed to print answer");
            }
            self.printed_answer = result.general_answer.clone();
        }
        self.latest = Some(result.clone());
    }

    fn on_complete(&mut self) {
        if let Some(r) = self.latest.take() {
            if let Err(e) = self.render(&r) {
                tracing::warn!(error = %e, "failed to print result");
            }
        }
    }

    fn on_error(&mut self, error: SearchError) {
        self.error = Some(error);
    }
}

pub fn report<W: Write>(outcome: Outcome, mut observer: TerminalObserver<W>) -> anyhow::Result<()> {
    match outcome {
        Outcome::Completed(Completion::EndOfStream) => {
            tracing::warn!("answer ended without a completion marker; it may be truncated");
            Ok(())
        }
        Outcome::Completed(_) => Ok(()),
        Outcome::Aborted => {
            eprintln!("search cancelled");
            Ok(())
        }
        Outcome::Errored => {
            let err = observer
                .take_error()
                .context("search failed without an error")?;
            let hint = if err.is_retryable() {
                "search failed; try again"
            } else {
                "search failed"
            };
            Err(anyhow::Error::new(err).context(hint))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use konnect_search::{SearchTicket, StreamAssembler};

    fn scenario() -> &'static str {
        concat!(
            r#"{"request_id":"r","chunk_id":0,"ui_element":"general_answer","content":"Try"}"#, "\n",
            r#"{"request_id":"r","chunk_id":1,"ui_element":"general_answer","content":"Try Gwangjang Market."}"#, "\n",
            r#"{"request_id":"r","chunk_id":2,"ui_element":"recommendation_1","content":{"name":"Mayak gimbap"}}"#, "\n",
            r#"{"request_id":"r","chunk_id":3,"ui_element":"followup_questions","content":"Opening hours?"}"#, "\n",
            r#"{"request_id":"r","chunk_id":4,"ui_element":"sources","content":[{"name":"Guide","link":"https://guide.test"}]}"#, "\n",
            r#"{"request_id":"r","chunk_id":5,"ui_element":"is_last","content":"true"}"#, "\n",
        )
    }

    #[tokio::test]
    async fn prints_progress_then_summary() {
        let stub = StubBackend::from_body(scenario(), 16);
        let mut obs = TerminalObserver::new(Vec::new(), false);
        let outcome = StreamAssembler::new(SearchTicket::detached())
            .search(&stub, "street food", &mut obs)
            .await;
        assert_eq!(outcome, Outcome::Completed(Completion::Marker));

        let text = String::from_utf8(obs.out.clone()).unwrap();
        assert!(text.starts_with("Try Gwangjang Market.\n"));
        assert!(text.contains("Recommendations:\n  - Mayak gimbap"));
        assert!(text.contains("You could also ask:\n  - Opening hours?"));
        assert!(text.contains("  - Guide <https://guide.test>"));
        assert!(report(outcome, obs).is_ok());
    }

    #[tokio::test]
    async fn json_mode_prints_final_result() {
        let stub = StubBackend::from_body(scenario(), 1024);
        let mut obs = TerminalObserver::new(Vec::new(), true);
        StreamAssembler::new(SearchTicket::detached())
            .search(&stub, "street food", &mut obs)
            .await;

        let v: serde_json::Value = serde_json::from_slice(&obs.out).unwrap();
        assert_eq!(v["general_answer"], "Try Gwangjang Market.");
        assert_eq!(v["recommendations"][0], serde_json::Value::Null);
        assert_eq!(v["is_complete"], true);
    }

    /// Refuses every write.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[tokio::test]
    async fn write_failures_do_not_stop_the_search() {
        let stub = StubBackend::from_body(scenario(), 32);
        let mut obs = TerminalObserver::new(ClosedPipe, false);
        let outcome = StreamAssembler::new(SearchTicket::detached())
            .search(&stub, "street food", &mut obs)
            .await;
        assert_eq!(outcome, Outcome::Completed(Completion::Marker));
        assert_eq!(obs.printed_answer, "Try Gwangjang Market.");
        assert!(report(outcome, obs).is_ok());
    }

    #[tokio::test]
    async fn session_cancel_aborts_the_current_search() {
        let session = SearchSession::new();
        let ticket = session.begin();
        session.cancel_current();

        let stub = StubBackend::from_body(scenario(), 16);
        let mut obs = TerminalObserver::new(Vec::new(), false);
        let outcome = StreamAssembler::new(ticket)
            .search(&stub, "street food", &mut obs)
            .await;
        assert_eq!(outcome, Outcome::Aborted);
        assert!(obs.out.is_empty());
        assert!(report(outcome, obs).is_ok());
    }

    #[test]
    fn errors_become_anyhow() {
        let mut obs = TerminalObserver::new(Vec::new(), false);
        obs.on_error(SearchError::Status { status: 502, body: "bad gateway".into() });
        let err = report(Outcome::Errored, obs).unwrap_err();
        assert_eq!(err.to_string(), "search failed; try again");
        assert!(format!("{err:#}").contains("HTTP 502"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let http = reqwest::Client::new();
        let err = build_backend(&http, None, "carrier-pigeon", None).err().unwrap();
        assert_eq!(err.to_string(), "unknown backend: carrier-pigeon");
        assert!(build_backend(&http, None, "stub", None).is_ok());
    }
}
