use std::collections::HashMap;

use super::types::{Message, OutgoingMessage, User};

/// Events pushed by the chat server over the realtime connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Full list of connected user ids (`onlineUsers`).
    OnlineUsers(Vec<String>),
    /// Echo of a freshly created message (`newMessage`).
    MessageCreated(Message),
    MessageEdited(Message),
    MessageDeleted { message_id: String },
    /// The messages sent by `sender_id` were read by their receiver (`messagesRead`).
    MessagesRead { sender_id: String },
}

/// Notifications from the session loop to the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    UsersLoaded(Vec<User>),
    PresenceChanged(Vec<String>),
    UnreadChanged(HashMap<String, u32>),
    ConversationChanged {
        peer: Option<String>,
        messages: Vec<Message>,
        /// History for `peer` is still being fetched.
        loading: bool,
    },
    /// The send request succeeded; the message itself arrives via `newMessage`.
    MessageSent {
        message_id: String,
        outgoing: OutgoingMessage,
    },
    RequestFailed { action: &'static str, reason: String },
    Alert(String),
    Disconnected,
}
