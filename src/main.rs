//! Application entry point: terminal captions with pinyin ruby.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the pronunciation converter from the configured dictionary.
//! 4. Load the transcript history.
//! 5. Spawn the session controller over the stdin console engine.
//! 6. Print session events until stdin closes or Ctrl-C is pressed.
//! 7. Destroy the controller and save the history.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use anyhow::Result;
use ruby_captions::{
    config::{AppConfig, AppPaths, PronunciationConfig},
    engine::{stdin_feed, ConsoleEngineFactory, EngineFactory},
    history::{new_shared_history, TranscriptHistory},
    pronunciation::{DictionaryConverter, PronunciationConverter},
    session::{ControllerHandle, SessionController, SessionEvent},
};

// ---------------------------------------------------------------------------
// Pronunciation converter
// ---------------------------------------------------------------------------

fn dictionary_path(config: &PronunciationConfig, paths: &AppPaths) -> PathBuf {
    config
        .dictionary_path
        .clone()
        .unwrap_or_else(|| paths.dictionary_file.clone())
}

/// Load the dictionary converter, or `None` when disabled or unreadable.
fn build_converter(
    config: &PronunciationConfig,
    paths: &AppPaths,
) -> Option<Arc<dyn PronunciationConverter>> {
    if !config.enabled {
        log::info!("pronunciation annotation disabled");
        return None;
    }

    let path = dictionary_path(config, paths);
    match DictionaryConverter::load_from(&path, config.cache_size) {
        Ok(converter) => {
            log::info!(
                "Pronunciation dictionary loaded: {} ({} entries)",
                path.display(),
                converter.len()
            );
            Some(Arc::new(converter))
        }
        Err(e) => {
            log::warn!(
                "Could not load pronunciation dictionary ({}): {e}. Captions stay unannotated.",
                path.display()
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Event printer
// ---------------------------------------------------------------------------

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::InterimUpdated(text) => println!("… {text}"),
        SessionEvent::FinalRecognized {
            original,
            annotated,
        } => {
            println!("» {original}");
            if annotated != original {
                println!("  {annotated}");
            }
        }
        SessionEvent::ClearInterim => {}
        SessionEvent::ErrorCount(n) if *n > 0 => println!("! consecutive errors: {n}"),
        SessionEvent::ErrorCount(_) => {}
        SessionEvent::Fatal(message) => eprintln!("✖ {message}"),
    }
}

/// Let the console engine consume lines still buffered after stdin closed.
///
/// The engine reports `End` once its feed is drained, which leaves the
/// session neither active nor starting.
async fn wait_until_drained(handle: &ControllerHandle) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        match handle.status().await {
            Ok(status) if status.active || status.starting => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            _ => break,
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("ruby-captions starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();

    // 3. Pronunciation converter
    let converter = build_converter(&config.pronunciation, &paths);

    // 4. Transcript history
    let history = TranscriptHistory::load_from(&paths.history_file).unwrap_or_else(|e| {
        log::warn!("Failed to load transcript history ({e}); starting empty");
        TranscriptHistory::new()
    });
    let history = new_shared_history(history);

    // 5. Controller over the console engine
    let (lines, eof) = stdin_feed();
    let factory: Arc<dyn EngineFactory> = Arc::new(ConsoleEngineFactory::new(lines));
    let (controller, handle, mut events) = SessionController::new(
        factory,
        config.session.clone(),
        config.engine.clone(),
        Arc::clone(&history),
    );
    let controller_task = tokio::spawn(controller.run());

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    handle.set_pronunciation_converter(converter).await?;
    handle.start().await?;
    log::info!(
        "Listening ({}); type a line per utterance, Ctrl-D to finish",
        config.engine.language
    );

    // 6. Run until input ends or the user interrupts
    tokio::select! {
        _ = eof => {
            log::info!("Input closed");
            wait_until_drained(&handle).await;
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::warn!("Ctrl-C handler failed: {e}");
            }
            log::info!("Interrupted");
        }
    }

    // 7. Shutdown
    if let Ok(status) = handle.status().await {
        log::debug!("final status: {status:?}");
    }
    handle.destroy().await?;
    drop(handle);
    controller_task.await?;
    printer.await?;

    let history = history.lock().unwrap_or_else(PoisonError::into_inner);
    history.save_to(&paths.history_file)?;
    log::info!(
        "Saved {} transcripts to {}",
        history.len(),
        paths.history_file.display()
    );
    Ok(())
}
