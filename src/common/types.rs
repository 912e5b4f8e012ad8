use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Staff role tag attached to every chat-eligible user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Cashier,
    Receptionist,
    #[default]
    #[serde(other)]
    Other,
}

/// A user that can take part in a staff conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(alias = "fullName", default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(alias = "profileImage", default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Minimal user shape the backend embeds when it populates a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Sender/receiver reference: either a bare id or a populated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Populated(UserSummary),
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Id(id) => id,
            UserRef::Populated(user) => &user.id,
        }
    }
}

impl From<&str> for UserRef {
    fn from(id: &str) -> Self {
        UserRef::Id(id.to_string())
    }
}

/// Quoted message shown above a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPreview {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<UserRef>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyRef {
    Id(String),
    Message(Box<ReplyPreview>),
}

impl ReplyRef {
    pub fn id(&self) -> &str {
        match self {
            ReplyRef::Id(id) => id,
            ReplyRef::Message(preview) => &preview.id,
        }
    }
}

/// Uploaded file as served back by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "fileUrl")]
    pub url: String,
    #[serde(rename = "fileType", default)]
    pub mime_type: String,
    #[serde(rename = "fileName", default)]
    pub name: String,
}

/// Domain model of one direct message between two staff members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub sender: UserRef,
    pub receiver: UserRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub file: Option<Attachment>,
    #[serde(rename = "replyTo", default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyRef>,
    #[serde(rename = "isRead", default)]
    pub is_read: bool,
    #[serde(rename = "isEdited", default)]
    pub is_edited: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn sender_id(&self) -> &str {
        self.sender.id()
    }

    pub fn receiver_id(&self) -> &str {
        self.receiver.id()
    }

    /// True when the message belongs to the unordered pair `{a, b}`.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        let (sender, receiver) = (self.sender_id(), self.receiver_id());
        (sender == a && receiver == b) || (sender == b && receiver == a)
    }

    /// Text body, if present and not blank.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Server report of unread messages per sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreadCount {
    #[serde(alias = "_id")]
    pub sender: String,
    pub count: u32,
}

/// File queued in the composer, not yet uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }
}

/// Payload of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub receiver: String,
    pub text: String,
    pub file: Option<FileUpload>,
    pub reply_to: Option<String>,
}
