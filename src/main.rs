// src/main.rs

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- Module Declarations ---
mod config;
mod console;
mod error;
mod quiz;
mod trivia;

// --- Imports ---
use crate::config::load_settings;
use crate::console::Console;
use crate::error::Result as AppResult;
use crate::quiz::SessionControllerHandle;
use crate::trivia::{HttpTransport, RetryPolicy};

#[tokio::main]
async fn main() -> AppResult<()> {
    // stdout belongs to the quiz screen, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_PKG_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let app_settings = load_settings()?;
    tracing::info!("Configuration loaded: {:?}", app_settings);

    let transport = Arc::new(HttpTransport::new(&app_settings.trivia_api)?);
    let policy = RetryPolicy::from(&app_settings.retry);

    let mut console = Console::new();
    if !console.start_screen().await? {
        return Ok(());
    }

    let session = SessionControllerHandle::spawn(
        transport,
        policy,
        app_settings.trivia_api.question_amount(),
        32,
    );
    console.run(session).await?;

    tracing::info!("Goodbye");
    Ok(())
}
