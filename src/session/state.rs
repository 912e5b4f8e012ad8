use crate::common::{Message, ServerEvent, UnreadCount, User};

use super::conversation::{Conversation, OpenTicket};
use super::presence::PresenceSet;
use super::unread::UnreadCounters;

/// What a pushed event touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Presence,
    /// The open conversation changed.
    Conversation,
    /// The active peer sent a message that is now visible.
    Incoming { peer: String },
    /// A message for another peer bumped that peer's counter.
    Unread { peer: String },
    Ignored,
}

/// Chat state of one authenticated session.
#[derive(Debug, Clone)]
pub struct ChatState {
    me: String,
    users: Vec<User>,
    presence: PresenceSet,
    unread: UnreadCounters,
    conversation: Conversation,
}

impl ChatState {
    pub fn new(me: impl Into<String>) -> Self {
        let me = me.into();
        Self {
            conversation: Conversation::new(me.clone()),
            me,
            users: Vec::new(),
            presence: PresenceSet::new(),
            unread: UnreadCounters::new(),
        }
    }

    pub fn me(&self) -> &str {
        &self.me
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn set_users(&mut self, users: Vec<User>) {
        self.users = users;
    }

    pub fn presence(&self) -> &PresenceSet {
        &self.presence
    }

    pub fn unread(&self) -> &UnreadCounters {
        &self.unread
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn active_peer(&self) -> Option<&str> {
        self.conversation.peer()
    }

    pub fn find_message(&self, message_id: &str) -> Option<&Message> {
        self.conversation
            .messages()
            .iter()
            .find(|message| message.id == message_id)
    }

    pub fn load_unread(&mut self, report: Vec<UnreadCount>) {
        self.unread.load(report);
        if let Some(peer) = self.conversation.peer() {
            self.unread.clear(peer);
        }
    }

    /// Make `peer` the active conversation and zero its counter.
    pub fn open(&mut self, peer: &str) -> OpenTicket {
        self.unread.clear(peer);
        self.conversation.open(peer)
    }

    pub fn close(&mut self) {
        self.conversation.close();
    }

    pub fn complete_open(&mut self, ticket: &OpenTicket, history: Vec<Message>) -> bool {
        self.conversation.complete_open(ticket, history)
    }

    pub fn fail_open(&mut self, ticket: &OpenTicket) -> bool {
        self.conversation.fail_open(ticket)
    }

    /// Route one pushed event to presence, the open conversation or the counters.
    pub fn apply(&mut self, event: ServerEvent) -> Routed {
        match event {
            ServerEvent::OnlineUsers(ids) => {
                self.presence.replace(ids);
                Routed::Presence
            }
            ServerEvent::MessageCreated(message) => self.route_created(message),
            ServerEvent::MessageEdited(message) => {
                if self.conversation.on_message_edited(message) {
                    Routed::Conversation
                } else {
                    Routed::Ignored
                }
            }
            ServerEvent::MessageDeleted { message_id } => {
                if self.conversation.on_message_deleted(&message_id) {
                    Routed::Conversation
                } else {
                    Routed::Ignored
                }
            }
            ServerEvent::MessagesRead { sender_id } => {
                if sender_id == self.me && self.conversation.on_messages_read() {
                    Routed::Conversation
                } else {
                    Routed::Ignored
                }
            }
        }
    }

    fn route_created(&mut self, message: Message) -> Routed {
        let sender = message.sender_id().to_string();

        if self.conversation.belongs(&message) {
            self.conversation.on_message_created(message);
            if sender == self.me {
                Routed::Conversation
            } else {
                Routed::Incoming { peer: sender }
            }
        } else if sender != self.me {
            self.unread.increment(&sender);
            Routed::Unread { peer: sender }
        } else {
            // Echo of my own message to a peer that is not open.
            Routed::Ignored
        }
    }
}
