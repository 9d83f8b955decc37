use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::point::{Point, PointSequence};

pub mod http;
pub mod memory;
pub mod sqlite;

pub use http::HttpGateway;
pub use memory::MemoryGateway;
pub use sqlite::SqliteGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Nothing stored for this user yet. Callers treat it as an empty route.
    #[error("no drawing stored for user {0:?}")]
    NotFound(String),
    #[error("stored drawing for user {user_id:?} is malformed: {reason}")]
    Malformed { user_id: String, reason: String },
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Key-value store of markers keyed by user id.
///
/// Calls are blocking, the controller runs them off the interaction path.
pub trait PersistenceGateway: Send + Sync {
    /// Upsert, the last write for a user wins.
    fn save(&self, user_id: &str, markers: &[Point]) -> Result<(), GatewayError>;

    /// All points stored for the user. If the store keeps more than one record
    /// for a user their points are concatenated in storage order.
    fn load(&self, user_id: &str) -> Result<PointSequence, GatewayError>;
}

/// Unit of storage, also the body of `POST /saveDrawing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    pub user_id: String,
    pub markers: PointSequence,
}

/// Body of a successful `GET /loadDrawing/{userId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResponse {
    pub markers: PointSequence,
}

pub(crate) fn parse_markers(user_id: &str, blob: &str) -> Result<PointSequence, GatewayError> {
    serde_json::from_str(blob).map_err(|e| GatewayError::Malformed {
        user_id: user_id.to_string(),
        reason: e.to_string(),
    })
}
