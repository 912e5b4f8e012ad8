pub mod commands;
pub mod events;
pub mod types;

pub use commands::{ClientEvent, SessionCommand};
pub use events::{ServerEvent, SessionEvent};
pub use types::{
    Attachment, FileUpload, Message, OutgoingMessage, ReplyRef, Role, UnreadCount, User, UserRef,
};
