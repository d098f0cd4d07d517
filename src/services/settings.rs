use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::models::{DashboardSettings, PaymentMode, SaveSettingsRequest};

const PAYMENT_MODE_KEY: &str = "payment_mode";
const HIDE_CURRENCY_KEY: &str = "hide_currency";

pub struct SettingsService {
    db: SqlitePool,
}

impl SettingsService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Saved settings, with defaults for anything never saved or unreadable.
    pub async fn get(&self) -> Result<DashboardSettings, AppError> {
        let payment_mode = match repository::get_setting(&self.db, PAYMENT_MODE_KEY).await? {
            Some(raw) => raw.parse::<PaymentMode>().unwrap_or_else(|e| {
                warn!("ignoring stored setting: {}", e);
                PaymentMode::default()
            }),
            None => PaymentMode::default(),
        };
        let hide_currency = repository::get_setting(&self.db, HIDE_CURRENCY_KEY)
            .await?
            .map(|raw| raw == "1")
            .unwrap_or(false);

        Ok(DashboardSettings {
            payment_mode,
            hide_currency,
        })
    }

    /// Both keys are written together or not at all. Last writer wins.
    pub async fn save(&self, req: SaveSettingsRequest) -> Result<DashboardSettings, AppError> {
        let mut tx = self.db.begin().await?;
        repository::set_setting(&mut *tx, PAYMENT_MODE_KEY, req.payment_mode.as_str()).await?;
        repository::set_setting(
            &mut *tx,
            HIDE_CURRENCY_KEY,
            if req.hide_currency { "1" } else { "0" },
        )
        .await?;
        tx.commit().await?;

        info!(payment_mode = %req.payment_mode, hide_currency = req.hide_currency, "dashboard settings saved");
        self.get().await
    }
}
