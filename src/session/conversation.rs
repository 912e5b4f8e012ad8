use std::mem;

use crate::common::Message;

/// Proof that a conversation fetch was started for a given selection.
///
/// Only the ticket from the most recent `open`/`close` is accepted back; any
/// older ticket belongs to a selection the user already left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTicket {
    pub peer: String,
    pub generation: u64,
}

/// Mutation that arrived while the fetch for the active peer was in flight.
#[derive(Debug, Clone)]
enum PendingOp {
    Created(Message),
    Edited(Message),
    Deleted(String),
    AllRead,
}

/// Message list of the currently open conversation.
#[derive(Debug, Clone)]
pub struct Conversation {
    me: String,
    peer: Option<String>,
    messages: Vec<Message>,
    generation: u64,
    loading: bool,
    pending: Vec<PendingOp>,
}

impl Conversation {
    pub fn new(me: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            peer: None,
            messages: Vec::new(),
            generation: 0,
            loading: false,
            pending: Vec::new(),
        }
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Select `peer` and start a new load generation.
    pub fn open(&mut self, peer: &str) -> OpenTicket {
        self.generation += 1;
        self.peer = Some(peer.to_string());
        self.messages.clear();
        self.pending.clear();
        self.loading = true;

        OpenTicket {
            peer: peer.to_string(),
            generation: self.generation,
        }
    }

    pub fn close(&mut self) {
        self.generation += 1;
        self.peer = None;
        self.messages.clear();
        self.pending.clear();
        self.loading = false;
    }

    pub fn is_current(&self, ticket: &OpenTicket) -> bool {
        ticket.generation == self.generation && self.peer.as_deref() == Some(ticket.peer.as_str())
    }

    /// Install the fetched history. Returns false for a stale ticket.
    pub fn complete_open(&mut self, ticket: &OpenTicket, history: Vec<Message>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.messages = history;
        self.finish_loading();
        true
    }

    /// The fetch failed; keep whatever arrived meanwhile. Returns false for a stale ticket.
    pub fn fail_open(&mut self, ticket: &OpenTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.finish_loading();
        true
    }

    fn finish_loading(&mut self) {
        self.loading = false;
        for op in mem::take(&mut self.pending) {
            match op {
                PendingOp::Created(message) => self.append(message),
                PendingOp::Edited(message) => {
                    self.replace(message);
                }
                PendingOp::Deleted(id) => {
                    self.remove(&id);
                }
                PendingOp::AllRead => {
                    self.flag_all_read();
                }
            }
        }
    }

    /// True when `message` is part of the open conversation `{me, peer}`.
    pub fn belongs(&self, message: &Message) -> bool {
        self.peer
            .as_deref()
            .is_some_and(|peer| message.is_between(&self.me, peer))
    }

    /// Append a message of the open conversation. Returns false if it belongs elsewhere.
    pub fn on_message_created(&mut self, message: Message) -> bool {
        if !self.belongs(&message) {
            return false;
        }

        if self.loading {
            self.pending.push(PendingOp::Created(message));
        } else {
            self.append(message);
        }
        true
    }

    /// Replace the matching entry in place. Returns true if the list may have changed.
    pub fn on_message_edited(&mut self, message: Message) -> bool {
        if self.loading && self.belongs(&message) {
            self.pending.push(PendingOp::Edited(message));
            return false;
        }
        self.replace(message)
    }

    pub fn on_message_deleted(&mut self, message_id: &str) -> bool {
        if self.loading {
            self.pending.push(PendingOp::Deleted(message_id.to_string()));
        }
        self.remove(message_id)
    }

    /// Flag every loaded message as read.
    ///
    /// The notification does not say which messages the peer actually saw, so
    /// the whole loaded list is marked.
    pub fn on_messages_read(&mut self) -> bool {
        if self.peer.is_none() {
            return false;
        }
        if self.loading {
            self.pending.push(PendingOp::AllRead);
        }
        self.flag_all_read()
    }

    fn append(&mut self, message: Message) {
        if self.messages.iter().any(|existing| existing.id == message.id) {
            return;
        }
        self.messages.push(message);
    }

    fn replace(&mut self, message: Message) -> bool {
        match self
            .messages
            .iter_mut()
            .find(|existing| existing.id == message.id)
        {
            Some(existing) => {
                *existing = message;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, message_id: &str) -> bool {
        let before = self.messages.len();
        self.messages.retain(|message| message.id != message_id);
        self.messages.len() != before
    }

    fn flag_all_read(&mut self) -> bool {
        let mut changed = false;
        for message in self.messages.iter_mut().filter(|message| !message.is_read) {
            message.is_read = true;
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    pub(crate) fn message(id: &str, sender: &str, receiver: &str, text: &str) -> Message {
        Message {
            id: id.to_string(),
            sender: sender.into(),
            receiver: receiver.into(),
            message: Some(text.to_string()),
            file: None,
            reply_to: None,
            is_read: false,
            is_edited: false,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    fn loaded(me: &str, peer: &str, history: Vec<Message>) -> Conversation {
        let mut conversation = Conversation::new(me);
        let ticket = conversation.open(peer);
        assert!(conversation.complete_open(&ticket, history));
        conversation
    }

    #[test]
    fn appends_only_messages_of_the_open_pair() {
        let mut conversation = loaded("me", "p", Vec::new());

        assert!(conversation.on_message_created(message("1", "p", "me", "hi")));
        assert!(conversation.on_message_created(message("2", "me", "p", "hello")));
        assert!(!conversation.on_message_created(message("3", "x", "me", "psst")));
        assert!(!conversation.on_message_created(message("4", "p", "x", "not us")));

        let ids: Vec<_> = conversation.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn created_keeps_arrival_order_without_resorting() {
        let mut conversation = loaded("me", "p", Vec::new());
        let mut late = message("late", "p", "me", "second");
        late.created_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        conversation.on_message_created(message("early", "p", "me", "first"));
        conversation.on_message_created(late);

        assert_eq!(conversation.messages()[0].id, "early");
        assert_eq!(conversation.messages()[1].id, "late");
    }

    #[test]
    fn edit_is_idempotent() {
        let mut conversation = loaded(
            "me",
            "p",
            vec![message("1", "p", "me", "a"), message("2", "me", "p", "b")],
        );
        let mut edited = message("2", "me", "p", "b (fixed)");
        edited.is_edited = true;

        conversation.on_message_edited(edited.clone());
        let once = conversation.messages().to_vec();
        conversation.on_message_edited(edited);

        assert_eq!(conversation.messages(), once.as_slice());
        assert_eq!(conversation.messages()[1].message.as_deref(), Some("b (fixed)"));
        assert!(!conversation.on_message_edited(message("404", "p", "me", "?")));
    }

    #[test]
    fn second_delete_is_noop() {
        let mut conversation = loaded(
            "me",
            "p",
            vec![message("1", "p", "me", "a"), message("2", "me", "p", "b")],
        );

        assert!(conversation.on_message_deleted("1"));
        assert_eq!(conversation.messages().len(), 1);
        assert!(!conversation.on_message_deleted("1"));
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn read_notification_marks_whole_list() {
        let mut conversation = loaded(
            "me",
            "p",
            vec![message("1", "me", "p", "a"), message("2", "p", "me", "b")],
        );

        assert!(conversation.on_messages_read());
        assert!(conversation.messages().iter().all(|m| m.is_read));
        assert!(!conversation.on_messages_read());
    }

    #[test]
    fn stale_ticket_is_discarded_after_switching_peer() {
        let mut conversation = Conversation::new("me");
        let first = conversation.open("p");
        let second = conversation.open("q");

        assert!(!conversation.complete_open(&first, vec![message("1", "p", "me", "old")]));
        assert!(conversation.messages().is_empty());
        assert!(conversation.is_loading());

        assert!(conversation.complete_open(&second, vec![message("2", "q", "me", "new")]));
        assert_eq!(conversation.messages()[0].id, "2");

        conversation.close();
        assert!(!conversation.complete_open(&second, vec![message("3", "q", "me", "x")]));
        assert!(conversation.peer().is_none());
    }

    #[test]
    fn events_during_fetch_are_replayed_onto_history() {
        let mut conversation = Conversation::new("me");
        let ticket = conversation.open("p");

        let mut edited = message("1", "p", "me", "edited text");
        edited.is_edited = true;
        assert!(conversation.on_message_created(message("3", "p", "me", "live")));
        conversation.on_message_edited(edited);
        conversation.on_message_deleted("2");

        let history = vec![
            message("1", "p", "me", "original text"),
            message("2", "me", "p", "gone"),
            message("3", "p", "me", "live"),
        ];
        assert!(conversation.complete_open(&ticket, history));

        let ids: Vec<_> = conversation.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(conversation.messages()[0].message.as_deref(), Some("edited text"));
        assert!(!conversation.is_loading());
    }

    #[test]
    fn failed_fetch_keeps_live_messages() {
        let mut conversation = Conversation::new("me");
        let ticket = conversation.open("p");
        conversation.on_message_created(message("9", "p", "me", "while loading"));

        assert!(conversation.fail_open(&ticket));
        assert_eq!(conversation.messages().len(), 1);
    }
}
