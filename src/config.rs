use std::env;
use std::net::SocketAddr;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct MessagingConfig {
    pub endpoint: String,
    pub api_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    /// `None` when `MESSAGING_URL` is unset; bulk messages are then dropped.
    pub messaging: Option<MessagingConfig>,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://smartdashboard.db".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR is invalid: {}", e)))?;

        let log_filter = env::var("RUST_LOG")
            .unwrap_or_else(|_| "smartdashboard=debug".to_string());

        let messaging = match env::var("MESSAGING_URL") {
            Ok(endpoint) if !endpoint.trim().is_empty() => Some(MessagingConfig {
                endpoint,
                api_token: env::var("MESSAGING_TOKEN").ok(),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            log_filter,
            messaging,
        })
    }
}
