use anyhow::Context;
use drafting::config::DraftingConfig;
use drafting::replay::{run_script, ReplayScript};
use drafting::saver::{HttpVerseSaver, MemoryVerseSaver, VerseSaver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn load_env_file() {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine current directory for .env lookup");
            return;
        }
    };

    let mut current = cwd.clone();
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            match dotenvy::from_path(&candidate) {
                Ok(_) => {
                    tracing::info!(path = %candidate.display(), "Loaded environment from .env");
                }
                Err(e) => {
                    tracing::warn!(
                        path = %candidate.display(),
                        error = %e,
                        "Failed to load .env file"
                    );
                }
            }
            return;
        }

        if !current.pop() {
            break;
        }
    }

    tracing::debug!(
        cwd = %cwd.display(),
        "No .env file found in current directory or ancestors; using process environment only"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "drafting=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    load_env_file();

    let script_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: drafting <replay-script.json>")?;
    let script = ReplayScript::from_path(&script_path)
        .with_context(|| format!("failed to load replay script {}", script_path.display()))?;
    let config = DraftingConfig::load()?;

    tracing::info!(
        chapter_id = %script.chapter_id,
        steps = script.steps.len(),
        debounce_ms = config.autosave.debounce_ms,
        retry_delay_ms = config.autosave.retry_delay_ms,
        "Starting drafting replay"
    );

    let memory = Arc::new(MemoryVerseSaver::new());
    let http_saver = HttpVerseSaver::from_config(&config.backend, &script.chapter_id);
    let saver: Arc<dyn VerseSaver> = match http_saver {
        Some(http) => {
            let http = http?;
            tracing::info!(base_url = ?config.backend.base_url, "Saving verses over HTTP");
            Arc::new(http)
        }
        None => {
            tracing::info!("No DRAFTING_API_BASE_URL configured; saving verses in memory");
            memory.clone()
        }
    };

    let outcome = run_script(script, config.autosave.clone(), saver).await?;

    let report = serde_json::json!({
        "snapshot": outcome.snapshot,
        "failed_steps": outcome.failed_steps,
        "saved_in_memory": memory.saved(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !outcome.failed_steps.is_empty() {
        tracing::warn!(failed = outcome.failed_steps.len(), "Replay finished with failed steps");
    }
    Ok(())
}
