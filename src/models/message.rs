use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct BulkMessageRequest {
    pub recipient_ids: Vec<i64>,
    pub text: String,
}

/// Wire shape expected by the messaging endpoint; `textformat` 1 is HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub touserid: i64,
    pub text: String,
    pub textformat: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMessageResult {
    pub batch_id: Uuid,
    pub sent: usize,
}
