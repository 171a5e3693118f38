use symptom_triage::{server, telemetry, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine, configuration has defaults
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    telemetry::init_tracing(&config.logging)?;

    tracing::info!(
        "Starting symptom-triage (image pipeline {})",
        if config.image.enabled { "enabled" } else { "disabled" }
    );

    server::start(config).await
}
