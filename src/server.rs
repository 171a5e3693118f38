//! Service bootstrap: load models, wire state, serve

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{build_router, AppState};
use crate::classifier::{NaiveBayesTextClassifier, TextClassifier};
use crate::config::Config;
use crate::conversation::ConversationAccumulator;
use crate::vision::{
    spawn_model_loader, BackgroundRemovalClient, ImageModelLoader, ImageModelSlot,
    ImageTriageRouter, ModelSlot, TriageVocabulary, ZeroShotLoader,
};

/// Application state plus the handle of the background model loader
pub struct Bootstrapped {
    pub state: AppState,
    pub image_loader: Option<JoinHandle<()>>,
}

/// Build the application state.
///
/// Text artifacts are loaded synchronously and a failure aborts start-up.
/// The image model, when enabled, loads on a background task.
pub fn bootstrap(config: &Config) -> anyhow::Result<Bootstrapped> {
    let text_classifier = NaiveBayesTextClassifier::load(
        &config.text.model_path,
        &config.text.vectorizer_path,
    )
    .with_context(|| {
        format!(
            "loading text model {} / vectorizer {}",
            config.text.model_path, config.text.vectorizer_path
        )
    })?;
    let text_classifier: Arc<dyn TextClassifier> = Arc::new(text_classifier);

    let conversation = Arc::new(ConversationAccumulator::from_config(
        text_classifier,
        &config.text,
    )?);
    let gate = conversation.gate();
    info!(
        "Symptom gate: accept above {}, advise below {}",
        gate.accept_above(),
        gate.advise_below()
    );

    if !config.image.enabled {
        info!("Image pipeline disabled, serving text only");
        return Ok(Bootstrapped {
            state: AppState {
                conversation,
                triage: None,
            },
            image_loader: None,
        });
    }

    let slot: Arc<ImageModelSlot> = Arc::new(ModelSlot::empty());
    let loader: Arc<dyn ImageModelLoader> = Arc::new(ZeroShotLoader::from_config(&config.image));
    let remover = Arc::new(
        BackgroundRemovalClient::from_config(&config.image)
            .context("building background removal client")?,
    );
    let vocabulary = TriageVocabulary::from_config(&config.image)?;
    let triage = Arc::new(ImageTriageRouter::new(slot.clone(), remover, vocabulary));

    let image_loader = spawn_model_loader(slot, loader);

    Ok(Bootstrapped {
        state: AppState {
            conversation,
            triage: Some(triage),
        },
        image_loader: Some(image_loader),
    })
}

/// Run the HTTP server until Ctrl+C
pub async fn start(config: Config) -> anyhow::Result<()> {
    let Bootstrapped { state, .. } = bootstrap(&config)?;
    let app = build_router(state, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolves when Ctrl+C is pressed
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
