pub mod composer;
pub mod conversation;
pub mod grouping;
pub mod presence;
pub mod state;
pub mod unread;

pub use composer::{Composer, ComposeError, can_delete, can_edit};
pub use conversation::{Conversation, OpenTicket};
pub use grouping::{DayGroup, group_by_day};
pub use presence::PresenceSet;
pub use state::{ChatState, Routed};
pub use unread::UnreadCounters;
