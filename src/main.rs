//! vidgrab - grab videos through a vidgrab backend from your terminal
//!
//! Fetches metadata for a URL, lets you pick a format, starts the backend
//! job and follows it until the file lands in your download directory.

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use vidgrab::core::backend::HttpBackend;
use vidgrab::core::downloader::HttpFileSink;
use vidgrab::core::session::SessionController;
use vidgrab::storage::config::{self, Overrides};
use vidgrab::types::{AppState, SessionEvent};
use vidgrab::ui::render::Renderer;
use vidgrab::ui::selector::{self, format_items};
use vidgrab::utils::logging::init_tracing;

/// Grab videos through a vidgrab backend from your terminal.
#[derive(Parser, Debug)]
#[command(name = "vidgrab")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Video URL to fetch
    url: Option<String>,

    /// Format to download, numbered as listed (starting at 1)
    #[arg(short, long)]
    format: Option<usize>,

    /// Backend API root, e.g. http://localhost:8000/api
    #[arg(long)]
    server: Option<String>,

    /// Status poll interval in milliseconds
    #[arg(long)]
    interval: Option<u64>,

    /// Directory to save downloads in
    #[arg(short, long)]
    output: Option<String>,

    /// Skip the start-up server check
    #[arg(long)]
    skip_health_check: bool,

    /// Exit after the first download
    #[arg(long)]
    once: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Edit the configuration file
    #[arg(short, long)]
    edit: bool,
}

/// Render everything the session has reported so far
fn flush(renderer: &mut Renderer, events: &mut UnboundedReceiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        renderer.handle(&event);
    }
}

/// Render events until the poll for `job_id` stops. Returns true if the
/// user interrupted it.
async fn follow(
    session: &mut SessionController,
    renderer: &mut Renderer,
    events: &mut UnboundedReceiver<SessionEvent>,
    job_id: &str,
) -> bool {
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                renderer.handle(&event);
                if let SessionEvent::PollStopped { job_id: stopped, .. } = &event {
                    if stopped == job_id {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if interrupted {
                    // Second press while the cancelled poll winds down
                    eprintln!("{}", "Aborted".red());
                    std::process::exit(130);
                }
                println!("\n{}", "Cancelling...".yellow());
                session.reset();
                interrupted = true;
            }
        }
    }

    if let Some(outcome) = session.wait_for_download().await {
        tracing::debug!(?outcome, "download finished");
    }
    flush(renderer, events);
    interrupted
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Handle --edit flag
    if cli.edit {
        let cfg = config::load_config().await?;
        config::edit_config(&cfg.editor).await?;
        return Ok(());
    }

    let cfg = config::finalize(
        config::load_config().await?,
        Overrides {
            api_base_url: cli.server.clone(),
            poll_interval_ms: cli.interval,
            download_dir: cli.output.clone(),
        },
    )?;
    tracing::debug!(?cfg, "configuration loaded");

    let backend = Arc::new(HttpBackend::new(&cfg.api_base_url, cfg.request_timeout())?);
    let sink = Arc::new(HttpFileSink::new(&cfg.download_dir, cfg.request_timeout())?);
    let (tx, mut events) = mpsc::unbounded_channel();
    let mut session = SessionController::new(backend, sink, cfg.poll_interval(), tx);
    let mut renderer = Renderer::new(cfg.notification_timeout());

    // Keep offering new rounds only in a fully interactive run
    let repeat = !cli.once && cli.url.is_none();
    let mut pending_url = cli.url.clone();
    let mut pending_format = cli.format;

    // State machine
    let mut state = AppState::Init;

    while state != AppState::Exit {
        match state {
            AppState::Init => {
                if !cli.skip_health_check {
                    // Reported through a notification; a down server is not fatal
                    let _ = session.health_check().await;
                }
                flush(&mut renderer, &mut events);
                state = AppState::Prompt;
            }

            AppState::Prompt => {
                renderer.tick();
                pending_url = pending_url.take().or_else(selector::prompt_url);
                state = if pending_url.is_some() {
                    AppState::Fetch
                } else {
                    AppState::Exit
                };
            }

            AppState::Fetch => {
                let url = pending_url.take().unwrap_or_default();
                println!("{}", "Fetching...".dimmed());
                let fetched = session.fetch_metadata(&url).await.is_ok();
                flush(&mut renderer, &mut events);

                state = if fetched {
                    AppState::Select
                } else if repeat {
                    AppState::Prompt
                } else {
                    AppState::Exit
                };
            }

            AppState::Select => {
                let Some(video) = session.current_video() else {
                    state = AppState::Prompt;
                    continue;
                };

                let count = video.formats.len();
                let choice = match pending_format.take() {
                    Some(n) if (1..=count).contains(&n) => Some(n - 1),
                    Some(n) => {
                        eprintln!(
                            "{} format {} does not exist ({} available)",
                            "Error:".red(),
                            n,
                            count
                        );
                        None
                    }
                    None => selector::select(&format_items(video), "Select format"),
                };

                match choice {
                    Some(index) => {
                        session.select_format(index);
                        flush(&mut renderer, &mut events);
                        state = AppState::Download;
                    }
                    None => state = AppState::Done,
                }
            }

            AppState::Download => {
                let started = session.start_download().await;
                flush(&mut renderer, &mut events);

                state = match started {
                    Ok(job_id) => {
                        if follow(&mut session, &mut renderer, &mut events, &job_id).await {
                            AppState::Exit
                        } else {
                            AppState::Done
                        }
                    }
                    Err(_) => AppState::Done,
                };
            }

            AppState::Done => {
                state = if repeat && selector::confirm("Fetch another video?", true) {
                    session.reset();
                    flush(&mut renderer, &mut events);
                    AppState::Prompt
                } else {
                    AppState::Exit
                };
            }

            AppState::Exit => break,
        }
    }

    session.reset();
    flush(&mut renderer, &mut events);
    Ok(())
}
