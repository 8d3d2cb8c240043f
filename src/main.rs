//! Garage - course sharing backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use garage::{config::Args, db::MongoClient, server, AppState, Stores};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("garage={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Garage - course sharing backend");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db {})", args.mongodb_uri, args.mongodb_db);
    info!("Store timeout: {}ms", args.store_timeout_ms);
    info!("======================================");

    let jwt = args.jwt_validator()?;

    // MongoDB is optional in dev mode
    let stores = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Stores::mongo(&client).await?
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                Stores::memory()
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let visit_log_path = args.visit_log_path.clone();
    let state = AppState::new(args, stores, jwt);

    if let Some(path) = visit_log_path {
        match state.visits.init_file(&path).await {
            Ok(()) => info!("Visit log: {}", path.display()),
            Err(e) => warn!("Visit log disabled, cannot open {}: {}", path.display(), e),
        }
    }

    server::run(Arc::new(state)).await?;

    Ok(())
}
