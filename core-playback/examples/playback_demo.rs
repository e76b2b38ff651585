//! # Load Orchestrator Usage Example
//!
//! Registers two in-memory connections, loads a song through the fallback
//! chain and drives playback while printing the canonical event stream.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`
//!
//! Pass `json` as the first argument for JSON logs.

use async_trait::async_trait;
use bridge_traits::time::LogLevel;
use core_playback::{
    Connection, CreateSound, LoadOrchestrator, LoadOutcome, PlaybackError, Result, SoundBackend,
    SoundOptions, SoundReporter, SoundUrl,
};
use core_runtime::config::{ConnectionSettings, CoreConfig};
use core_runtime::events::CoreEvent;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// ============================================================================
// In-Memory Connections
// ============================================================================

/// Plays the listed extensions and fails for any path containing "missing".
struct MemoryConnection {
    name: &'static str,
    extensions: &'static [&'static str],
}

#[async_trait]
impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        self.name
    }

    fn can_play(&self, url: &SoundUrl) -> bool {
        url.extension()
            .map_or(false, |ext| self.extensions.contains(&ext.as_str()))
    }

    async fn create(&self, request: CreateSound) -> Result<Box<dyn SoundBackend>> {
        tokio::time::sleep(Duration::from_millis(20)).await;

        if request.url.path().contains("missing") {
            request.reporter.errored("404 Not Found");
        } else {
            request.reporter.duration_changed(Some(Duration::from_secs(215)));
            request.reporter.ready();
        }
        Ok(Box::new(MemoryBackend {
            reporter: request.reporter,
        }))
    }
}

struct MemoryBackend {
    reporter: SoundReporter,
}

impl SoundBackend for MemoryBackend {
    fn play(&self, position: Option<Duration>) {
        if let Some(position) = position {
            self.reporter.position_changed(position);
        }
        self.reporter.played();
    }

    fn pause(&self) {
        self.reporter.paused();
    }

    fn stop(&self) {
        self.reporter.position_changed(Duration::ZERO);
        self.reporter.paused();
    }

    fn seek(&self, position: Duration) {
        self.reporter.position_changed(position);
    }

    fn set_volume(&self, _volume: u8) {}

    fn current_position(&self) -> Result<Duration> {
        Err(PlaybackError::SourceUnavailable(
            "memory backend has no clock".into(),
        ))
    }
}

// ============================================================================
// Demo
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let format = match std::env::args().nth(1).as_deref() {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Compact,
    };
    init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(LogLevel::Debug),
    )?;

    let config = CoreConfig::builder()
        .connections(vec![
            ConnectionSettings::new("WebAudio"),
            ConnectionSettings::new("NativeAudio"),
        ])
        .initial_volume(70)
        .build()?;

    let orchestrator = LoadOrchestrator::builder(config)
        .connection(Arc::new(MemoryConnection {
            name: "NativeAudio",
            extensions: &["mp3", "ogg"],
        }))
        .connection(Arc::new(MemoryConnection {
            name: "WebAudio",
            extensions: &["ogg"],
        }))
        .build()?;

    let mut events = orchestrator.events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                CoreEvent::Audio(audio) => println!("  event {:<28} {}", event.name(), audio.sound().url),
                CoreEvent::Service(_) => println!("  event {}", event.name()),
            }
        }
    });

    info!("playing with a broken first candidate");
    let outcome = orchestrator
        .play(
            vec!["/missing.ogg", "/song.ogg", "/song.mp3"],
            SoundOptions::default(),
        )
        .await?;

    match &outcome {
        LoadOutcome::Ready { sound, failures } => {
            println!(
                "playing {} via {} after {} failed attempt(s)",
                sound.url(),
                sound.connection(),
                failures.len()
            );
        }
        LoadOutcome::Failed(failure) => println!("load failed: {:?}", failure.message),
        LoadOutcome::Cancelled => println!("superseded"),
    }

    orchestrator.fast_forward(Duration::from_secs(30))?;
    orchestrator.toggle_pause()?;
    orchestrator.toggle_mute();

    for record in orchestrator
        .error_cache()
        .errors_for(&SoundUrl::parse("/missing.ogg", &orchestrator.settings().base()?)?)
    {
        println!(
            "recorded failure: {} on {} at {}: {}",
            record.url, record.connection, record.recorded_at, record.message
        );
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator.shutdown();
    printer.abort();
    Ok(())
}
