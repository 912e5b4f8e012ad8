use super::types::OutgoingMessage;

/// Events the client emits on the realtime connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Announce identity right after connecting (`join`).
    Join(String),
    /// Messages from `sender_id` to `receiver_id` have been seen (`markAsRead`).
    MarkAsRead {
        receiver_id: String,
        sender_id: String,
    },
}

/// Lệnh front end gửi xuống session loop.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    SelectPeer(String),
    ClearSelection,
    SendMessage(OutgoingMessage),
    EditMessage { message_id: String, text: String },
    DeleteMessage { message_id: String },
    RefreshUsers,
}
