use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smartdashboard::api::router;
use smartdashboard::config::AppConfig;
use smartdashboard::messaging::{HttpMessenger, Messenger, NoopMessenger};
use smartdashboard::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = AppConfig::new_from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = config
        .database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let messenger: Arc<dyn Messenger> = match config.messaging.clone() {
        Some(messaging) => {
            info!(endpoint = %messaging.endpoint, "messaging endpoint configured");
            Arc::new(HttpMessenger::new(messaging)?)
        }
        None => {
            warn!("MESSAGING_URL not set, bulk messages will be dropped");
            Arc::new(NoopMessenger)
        }
    };

    let state = AppState { db: pool, messenger };
    let app = router(state);

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
