mod app;
mod cli;
mod config;
mod paths;

use anyhow::Context;
use clap::Parser;
use konnect_search::backend::stub::StubBackend;
use konnect_search::result::DEFAULT_MAX_RECOMMENDATIONS;
use konnect_search::{SearchBackend, SearchSession, StreamAssembler};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let config_path = paths::config_file()?;
    let cfg = config::Config::load_optional(&config_path)?;
    tracing::debug!(?config_path, ?cfg, "resolved config");

    let (backend, query) = match &args.cmd {
        Some(cli::Command::Replay { path, slice }) => {
            let body = std::fs::read(path)
                .with_context(|| format!("failed to read capture: {}", path.display()))?;
            let backend = Box::new(StubBackend::from_body(body, *slice))
                as Box<dyn SearchBackend + Send + Sync>;
            (backend, path.display().to_string())
        }
        None => {
            let query = args.query.join(" ");
            if query.trim().is_empty() {
                anyhow::bail!("No query provided. Try: konnect-search \"late-night food near Hongdae\"");
            }

            let http = reqwest::Client::builder()
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("failed to build HTTP client")?;

            let backend_name = args
                .backend
                .clone()
                .or_else(|| cfg.as_ref().and_then(|c| c.backend.clone()))
                .unwrap_or_else(|| "http".to_string());

            let backend = app::build_backend(&http, cfg.as_ref(), &backend_name, args.endpoint.clone())?;
            (backend, query)
        }
    };

    let timeout = args
        .timeout
        .or_else(|| cfg.as_ref().and_then(|c| c.timeout_secs))
        .map(Duration::from_secs);
    let max_recommendations = cfg
        .as_ref()
        .and_then(|c| c.max_recommendations)
        .unwrap_or(DEFAULT_MAX_RECOMMENDATIONS);

    let session = SearchSession::new();
    let ticket = session.begin();
    app::arm_cancellation(&session, timeout);

    let mut observer = app::TerminalObserver::new(std::io::stdout(), args.json);
    let mut assembler = StreamAssembler::new(ticket).with_max_recommendations(max_recommendations);
    let outcome = assembler
        .search(backend.as_ref(), &query, &mut observer)
        .await;
    tracing::debug!(
        ?outcome,
        backend = backend.name(),
        generation = session.latest(),
        request_id = assembler.result().request_id().unwrap_or("-"),
        chunks = assembler.result().chunks().len(),
        "search finished"
    );

    app::report(outcome, observer)
}
