use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parlo::{
    ConfigManager, DEFAULT_LOG_LEVEL, GeminiClient, GeminiConfig, Origin, Recorder, RecorderState,
    RetryPolicy, SessionController, SessionEvent, VERSION,
};
use tokio::io::AsyncBufReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 1)]
async fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PARLO_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .init();

    // Load config
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;
    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;

    // Translation client. A missing credential is fatal here rather than on
    // the first utterance.
    let gemini = GeminiConfig::from_config(&config)
        .with_context(|| format!("set api_key in {}", config_manager.config_path().display()))?;
    let policy = RetryPolicy::new(config.retries as u32, Duration::from_millis(1000));
    let translator = Arc::new(GeminiClient::with_policy(gemini, policy));

    // Microphone and session
    let recorder = Arc::new(Recorder::new());
    let (controller, mut events) = SessionController::new(recorder, translator);

    info!(version = VERSION, "Parlo ready");
    println!("press Enter to start/stop recording, type to translate, /clear to reset, /quit to exit");

    // Minimal renderer: print conversation lines as they settle.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged(state) => match state {
                    RecorderState::Recording => println!("[recording]"),
                    RecorderState::Processing => println!("[translating]"),
                    RecorderState::Idle => {}
                    RecorderState::Error => println!("[mic error, press Enter to retry]"),
                },
                SessionEvent::ItemAdded(item) => {
                    if item.origin == Origin::Source {
                        println!("  you> {}", item.text);
                    }
                }
                SessionEvent::ItemResolved { text, .. } => println!("  out> {}", text),
                SessionEvent::TranscriptCleared => println!("[history cleared]"),
            }
        }
    });

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        match line.as_str() {
            // Enter toggles the recording cycle; the toggle is ignored while
            // a previous cycle is still translating.
            "" => match controller.state() {
                RecorderState::Recording => {
                    let controller = controller.clone();
                    tokio::spawn(async move { controller.stop_recording().await });
                }
                _ => controller.start_recording(),
            },
            "/clear" => controller.clear(),
            "/quit" => break,
            _ => {
                let controller = controller.clone();
                tokio::spawn(async move { controller.submit_text(line).await });
            }
        }
    }

    Ok(())
}
