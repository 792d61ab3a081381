use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heltblank::{llm, state::AppState, types::GameConfig, words::WordBank, ws};

#[tokio::main]
async fn main() {
    // A missing .env is fine; any other load failure deserves a warning.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: could not read .env: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heltblank=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Helt Blank...");

    let config = GameConfig::from_env();

    // An empty or unreadable word list is the one fatal startup condition
    let words_file = std::env::var("WORDS_FILE").unwrap_or_else(|_| "words.json".to_string());
    let word_bank = match WordBank::load(&words_file) {
        Ok(bank) => {
            tracing::info!("Loaded {} prompt words from {}", bank.len(), words_file);
            bank
        }
        Err(e) => {
            tracing::error!("Failed to load word list from {}: {}", words_file, e);
            std::process::exit(1);
        }
    };

    let llm_config = llm::LlmConfig::from_env();
    let llm_manager = match llm_config.build_manager() {
        Ok(manager) => {
            tracing::info!(
                "Text generation enabled with {} provider(s)",
                manager.providers.len()
            );
            Some(manager)
        }
        Err(e) => {
            tracing::warn!("{}. Fillers will answer with random words.", e);
            None
        }
    };

    let state = Arc::new(AppState::new_with_llm(
        word_bank,
        config,
        llm_manager,
        llm_config,
    ));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Helt Blank listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
