use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::common::{Message, SessionEvent, User};
use crate::session::Composer;

const MAX_NOTICES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Alert,
}

/// Status line shown under the chat area.
#[derive(Debug, Clone)]
pub struct Notice {
    pub timestamp: DateTime<Utc>,
    pub kind: NoticeKind,
    pub text: String,
}

/// Trạng thái cục bộ của UI, dựng lại từ các SessionEvent.
pub struct AppState {
    pub me: String,
    pub users: Vec<User>,
    pub online: HashSet<String>,
    pub unread: HashMap<String, u32>,
    pub active_peer: Option<String>,
    pub messages: Vec<Message>,
    pub loading: bool,
    pub composer: Composer,
    pub notices: Vec<Notice>,
    pub connected: bool,
}

impl AppState {
    pub fn new(me: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            users: Vec::new(),
            online: HashSet::new(),
            unread: HashMap::new(),
            active_peer: None,
            messages: Vec::new(),
            loading: false,
            composer: Composer::new(),
            notices: Vec::new(),
            connected: true,
        }
    }

    /// Apply a session event. Returns true when the conversation view changed.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::UsersLoaded(users) => {
                self.users = users;
                false
            }
            SessionEvent::PresenceChanged(online) => {
                self.online = online.into_iter().collect();
                false
            }
            SessionEvent::UnreadChanged(unread) => {
                self.unread = unread;
                false
            }
            SessionEvent::ConversationChanged {
                peer,
                messages,
                loading,
            } => {
                if peer != self.active_peer {
                    self.composer.cancel_reply();
                }
                self.active_peer = peer;
                self.messages = messages;
                self.loading = loading;
                true
            }
            SessionEvent::MessageSent { outgoing, .. } => {
                self.composer.on_sent(&outgoing);
                false
            }
            SessionEvent::RequestFailed { action, reason } => {
                self.add_notice(NoticeKind::Warning, format!("Could not {action}: {reason}"));
                false
            }
            SessionEvent::Alert(text) => {
                self.add_notice(NoticeKind::Alert, text);
                false
            }
            SessionEvent::Disconnected => {
                self.connected = false;
                self.add_notice(
                    NoticeKind::Alert,
                    "Realtime connection lost. New messages will not arrive until restart."
                        .to_string(),
                );
                false
            }
        }
    }

    pub fn add_notice(&mut self, kind: NoticeKind, text: String) {
        self.notices.push(Notice {
            timestamp: Utc::now(),
            kind,
            text,
        });

        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
    }

    /// Chat partners in sidebar order (everyone but me, by name).
    pub fn contacts(&self) -> Vec<&User> {
        let mut contacts: Vec<&User> = self.users.iter().filter(|u| u.id != self.me).collect();
        contacts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        contacts
    }

    pub fn display_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        if user_id == self.me {
            return "You";
        }
        self.users
            .iter()
            .find(|user| user.id == user_id)
            .map(|user| user.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(user_id)
    }

    /// Find a contact by sidebar number, id, or name prefix.
    pub fn resolve_peer(&self, query: &str) -> Option<String> {
        let contacts = self.contacts();
        if let Ok(index) = query.parse::<usize>() {
            return contacts.get(index.checked_sub(1)?).map(|user| user.id.clone());
        }

        let lowered = query.to_lowercase();
        contacts
            .iter()
            .find(|user| user.id == query)
            .or_else(|| {
                contacts
                    .iter()
                    .find(|user| user.name.to_lowercase().starts_with(&lowered))
            })
            .map(|user| user.id.clone())
    }

    /// Find a loaded message by `#n` (position in the chat area) or id.
    pub fn resolve_message(&self, reference: &str) -> Option<&Message> {
        match reference.strip_prefix('#') {
            Some(number) => {
                let index = number.parse::<usize>().ok()?.checked_sub(1)?;
                self.messages.get(index)
            }
            None => self.messages.iter().find(|message| message.id == reference),
        }
    }
}
