use std::sync::Arc;

use sqlx::SqlitePool;

use crate::messaging::Messenger;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub messenger: Arc<dyn Messenger>,
}
