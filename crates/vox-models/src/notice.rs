//! Completion notices handed to the delivery collaborator.

use serde::{Deserialize, Serialize};

use crate::BlobId;

/// Payload emitted once a derived audio blob is durably stored.
///
/// Delivery (mail, push, webhook) happens outside this system; only the
/// payload shape is fixed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    /// Id of the freshly stored audio blob.
    pub derived_blob_id: BlobId,
    /// Id of the source video blob.
    pub original_blob_id: BlobId,
    /// Where the requester asked to be notified.
    pub requester_contact: String,
}
