use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use speakeasy_coach::analysis::AnalysisResult;
use speakeasy_coach::catalog::format_duration;
use speakeasy_coach::{
    create_router, AnalysisService, AnalysisStatus, AppState, CaptureController, Catalog, Config,
    FileStore, HttpAnalysisClient, KeyValueStore, Orchestrator, SessionId, WavCaptureDevice,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "speakeasy-coach", version, about = "Record a speech and get it scored")]
struct Cli {
    /// Config file, with or without extension
    #[arg(long, default_value = "config/speakeasy-coach")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the local control API
    Serve,
    /// Record one take, analyze it and print the report
    Record {
        /// Seconds to record before stopping
        #[arg(long, default_value_t = 30)]
        seconds: u64,
        /// WAV file replayed in place of a microphone
        #[arg(long)]
        input: Option<PathBuf>,
        /// Automatic retries if the analysis fails
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
    /// List past sessions, newest first
    History {
        /// Only sessions with a completed analysis
        #[arg(long)]
        analyzed: bool,
    },
    /// Delete a session from the history. While `serve` runs, use
    /// `DELETE /sessions/:id` instead; the server rewrites the whole history.
    Delete { id: String },
    /// Check whether the analysis service is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Analysis service: {}", cfg.analysis.base_url);
    info!("Data directory: {}", cfg.storage.data_path);

    match cli.command {
        Command::Serve => serve(&cfg).await,
        Command::Record {
            seconds,
            input,
            retries,
        } => {
            if let Some(input) = input {
                cfg.capture.replay_source = Some(input.display().to_string());
            }
            record(&cfg, Duration::from_secs(seconds), retries).await
        }
        Command::History { analyzed } => history(&cfg, analyzed).await,
        Command::Delete { id } => delete(&cfg, SessionId::from(id)).await,
        Command::Health => health(&cfg).await,
    }
}

async fn open_catalog(cfg: &Config) -> Catalog {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&cfg.storage.data_path));
    Catalog::open(store).await
}

async fn build(cfg: &Config) -> Result<(Orchestrator, Arc<dyn AnalysisService>)> {
    let catalog = open_catalog(cfg).await;

    let analysis: Arc<dyn AnalysisService> =
        Arc::new(HttpAnalysisClient::new(cfg.analysis.client_config())?);

    let device = Arc::new(WavCaptureDevice::new(
        cfg.capture.audio_source(),
        &cfg.capture.recordings_path,
    ));
    let capture = CaptureController::new(device, cfg.capture.capture_config())
        .with_tick(cfg.capture.tick_interval());

    let orchestrator = Orchestrator::new(capture, Arc::clone(&analysis), catalog).await;
    Ok((orchestrator, analysis))
}

async fn serve(cfg: &Config) -> Result<()> {
    let (orchestrator, analysis) = build(cfg).await?;
    let state = AppState::new(orchestrator, analysis);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Control API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    state.orchestrator.lock().await.shutdown().await;
    Ok(())
}

async fn record(cfg: &Config, length: Duration, retries: u32) -> Result<()> {
    let (mut orchestrator, _) = build(cfg).await?;

    orchestrator
        .start()
        .await
        .context("Could not start recording")?;

    if let Some(updates) = orchestrator.duration_updates() {
        tokio::spawn(async move {
            let mut updates = Box::pin(updates.into_stream());
            while let Some(ms) = updates.next().await {
                print!("\rRecording {}", format_duration(ms));
                std::io::stdout().flush().ok();
            }
            println!();
        });
    }

    tokio::select! {
        _ = tokio::time::sleep(length) => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; discarding take");
            orchestrator.cancel().await?;
            orchestrator.shutdown().await;
            return Ok(());
        }
    }

    let mut outcome = orchestrator.stop().await;
    let mut attempts = 0;

    let result = loop {
        match outcome {
            Ok(Some(result)) => break Some(result),
            Ok(None) => {
                println!("Nothing was captured.");
                break None;
            }
            Err(e) if e.is_retryable() && attempts < retries => {
                attempts += 1;
                warn!("{} (retry {}/{})", e, attempts, retries);
                outcome = orchestrator.retry().await.map(Some);
            }
            Err(e) if e.is_retryable() => {
                println!("Analysis failed: {}", e);
                orchestrator.dismiss().await?;
                break None;
            }
            Err(e) => {
                orchestrator.shutdown().await;
                return Err(e.into());
            }
        }
    };

    if let Some(result) = result {
        print_report(&result);
    }

    orchestrator.shutdown().await;
    Ok(())
}

/// Read-only: nothing is written back to the store
async fn history(cfg: &Config, analyzed_only: bool) -> Result<()> {
    let catalog = open_catalog(cfg).await;

    let sessions = if analyzed_only {
        catalog.analyzed().await
    } else {
        catalog.all().await
    };

    for session in &sessions {
        let status = match session.analysis() {
            AnalysisStatus::Completed(result) => format!(
                "confidence {}/10, clarity {}/10",
                result.scores.confidence, result.scores.clarity
            ),
            AnalysisStatus::Pending => "pending".to_string(),
            AnalysisStatus::Abandoned => "not analyzed".to_string(),
        };
        println!(
            "{}  {}  {:>6}  {}",
            session.id(),
            session.created_at().format("%Y-%m-%d %H:%M"),
            format_duration(session.duration_millis()),
            status
        );
    }

    let summary = catalog.summary().await;
    println!(
        "{} sessions ({} analyzed, {} not analyzed)",
        summary.total,
        summary.analyzed,
        summary.abandoned + summary.pending
    );
    if let Some(avg) = summary.average_scores {
        println!(
            "Averages: confidence {:.1}, clarity {:.1}, pacing {:.1}, nervousness {:.1}",
            avg.confidence, avg.clarity, avg.pacing, avg.nervousness
        );
    }

    Ok(())
}

/// Removes one entry and leaves every other session as stored
async fn delete(cfg: &Config, id: SessionId) -> Result<()> {
    let catalog = open_catalog(cfg).await;

    if catalog.remove(&id).await {
        catalog.flush().await;
        println!("Deleted {}", id);
    } else {
        println!("No session {}", id);
    }

    Ok(())
}

async fn health(cfg: &Config) -> Result<()> {
    let client = HttpAnalysisClient::new(cfg.analysis.client_config())?;
    if client.health_check().await {
        println!("Analysis service at {} is reachable", cfg.analysis.base_url);
    } else {
        println!("Analysis service at {} is NOT reachable", cfg.analysis.base_url);
    }
    Ok(())
}

fn print_report(result: &AnalysisResult) {
    let scores = &result.scores;
    println!("Duration: {:.1}s", result.duration_seconds);
    println!("Confidence:  {}/10", scores.confidence);
    println!("Clarity:     {}/10", scores.clarity);
    println!("Pacing:      {}/10", scores.pacing);
    println!("Calm:        {}/10", 10.0 - scores.nervousness);
    println!(
        "Speech rate: {} wpm, {} pauses, {} filler words",
        result.prosody_metrics.speech_rate_wpm,
        result.prosody_metrics.pause_count,
        result.filler_words.len()
    );

    for marker in &result.timeline_markers {
        println!(
            "  [{:>6.1}s - {:>6.1}s] {:?}/{:?} {}",
            marker.start, marker.end, marker.category, marker.severity, marker.label
        );
    }

    for recommendation in &result.recommendations {
        println!("  * {}", recommendation);
    }

    if let Some(transcription) = &result.transcription {
        println!("Transcript: {}", transcription);
    }
}
