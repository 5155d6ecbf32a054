use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rentguy_state::{load_config, AppContext, FileStorage, StorageChannel};
use tracing::{debug, info, warn};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: rentguy-session [status | check | login <email> <password> | logout | clear]";

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "rentguy_state=debug,rentguy_session=debug,warn".into()
            } else {
                "rentguy_state=info,rentguy_session=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("status");

    let config = load_config().context("Failed to load configuration")?;
    let storage = FileStorage::open(&config.storage.path)
        .with_context(|| format!("Failed to open storage at {}", config.storage.path.display()))?;
    let channel = StorageChannel::new(config.broadcast.capacity);
    let ctx = AppContext::new(config, Arc::new(storage), channel);

    match command {
        "status" => {}
        "check" => {
            if let Err(e) = ctx.session().check_session().await {
                warn!(code = %e.code, "Session check failed: {}", e.user_message());
            }
        }
        "login" => {
            let (Some(email), Some(password)) = (args.get(1), args.get(2)) else {
                return Err(anyhow!(USAGE));
            };
            ctx.session()
                .login(email, password)
                .await
                .map_err(|e| anyhow!("Login failed: {}", e.user_message()))?;
        }
        "logout" => ctx.session().logout(),
        "clear" => {
            ctx.auth().reset();
            info!("Persisted session cleared");
        }
        other => return Err(anyhow!("Unknown command '{}'\n{}", other, USAGE)),
    }

    println!("{}", serde_json::to_string_pretty(&ctx.summary())?);

    ctx.shutdown().await;
    Ok(())
}
