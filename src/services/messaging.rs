use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::repository;
use crate::error::AppError;
use crate::messaging::Messenger;
use crate::models::{BulkMessageRequest, BulkMessageResult, OutgoingMessage};

/// HTML body format on the messaging endpoint.
const TEXT_FORMAT_HTML: u8 = 1;

pub struct MessagingService {
    db: SqlitePool,
    messenger: Arc<dyn Messenger>,
}

impl MessagingService {
    pub fn new(db: SqlitePool, messenger: Arc<dyn Messenger>) -> Self {
        Self { db, messenger }
    }

    /// Sends `req.text` to every recipient as one batch. Recipients must be
    /// students in a course the caller teaches.
    pub async fn send_bulk(
        &self,
        actor: &Actor,
        req: BulkMessageRequest,
    ) -> Result<BulkMessageResult, AppError> {
        let text = req.text.trim();
        if text.is_empty() {
            return Err(AppError::BadRequest("Message text must not be empty".into()));
        }
        let recipients: BTreeSet<i64> = req.recipient_ids.iter().copied().collect();
        if recipients.is_empty() {
            return Err(AppError::BadRequest("No recipients selected".into()));
        }

        let taught = actor.teaching_course_ids(&self.db).await?;
        let reachable: HashSet<i64> = repository::enrolled_students(&self.db, &taught, actor.user_id)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        if let Some(stranger) = recipients.iter().find(|id| !reachable.contains(id)) {
            return Err(AppError::Forbidden(format!(
                "User {} is not a student in your courses",
                stranger
            )));
        }

        let messages: Vec<OutgoingMessage> = recipients
            .iter()
            .map(|id| OutgoingMessage {
                touserid: *id,
                text: text.to_string(),
                textformat: TEXT_FORMAT_HTML,
            })
            .collect();

        let batch_id = Uuid::new_v4();
        self.messenger.send_messages(&messages).await?;
        info!(
            user_id = actor.user_id,
            %batch_id,
            sent = messages.len(),
            "bulk message sent"
        );

        Ok(BulkMessageResult {
            batch_id,
            sent: messages.len(),
        })
    }
}
