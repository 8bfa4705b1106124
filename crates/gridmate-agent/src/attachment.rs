//! File attachments staged for a single request

use gridmate_ai::Content;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of file an attachment holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Document,
}

/// A user-supplied image or PDF staged for one request.
///
/// Embedded into the outgoing message's content blocks at send time and
/// discarded from the stored message once the model's reply for that turn
/// completes successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: Uuid,
    /// Base64-encoded file contents (no data-URL prefix)
    pub data: String,
    pub media_type: String,
    pub name: Option<String>,
    pub kind: AttachmentKind,
}

impl FileAttachment {
    pub fn image(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: data.into(),
            media_type: media_type.into(),
            name: None,
            kind: AttachmentKind::Image,
        }
    }

    pub fn document(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: data.into(),
            media_type: media_type.into(),
            name: None,
            kind: AttachmentKind::Document,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Convert to a content block for the outgoing message
    pub fn to_content(&self) -> Content {
        match self.kind {
            AttachmentKind::Image => Content::image(self.data.clone(), self.media_type.clone()),
            AttachmentKind::Document => {
                Content::document(self.data.clone(), self.media_type.clone())
            }
        }
    }
}
