use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use inventory_pos_server::analysis::HostedVisionModel;
use inventory_pos_server::capture::CameraSessions;
use inventory_pos_server::cart::CartStore;
use inventory_pos_server::form::DraftSessions;
use inventory_pos_server::storage::MediaStore;
use inventory_pos_server::{build_router, db, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env();

    tokio::fs::create_dir_all(&config.data_dir).await?;
    let pool = db::init_db(&config.db_path).await?;

    let vision = HostedVisionModel::new(
        config.ai_base_url.clone(),
        config.ai_model.clone(),
        config.ai_api_key.clone(),
    );

    let state = Arc::new(AppState {
        db: pool,
        store: MediaStore::new(config.data_dir.clone(), config.public_base_url.clone()),
        vision: Arc::new(vision),
        cart: CartStore::new(),
        drafts: DraftSessions::new(),
        camera: CameraSessions::new(),
    });

    let app = build_router(state);

    info!("Inventory POS API Server listening on {}", config.bind_addr);
    info!("Public base URL: {}", config.public_base_url);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
