use std::sync::Arc;

use tokio::sync::mpsc;

use crate::common::{
    ClientEvent, Message, OutgoingMessage, ServerEvent, SessionCommand, SessionEvent,
    UnreadCount, User,
};
use crate::error::{ChatError, ChatResult};
use crate::session::{ChatState, OpenTicket, Routed, can_delete, can_edit};

use super::api::ChatBackend;
use super::transport::{self, ConnectionHandle};

/// Outcome of a request task, reported back to the session loop.
enum TaskResult {
    Users(ChatResult<Vec<User>>),
    Unread(ChatResult<Vec<UnreadCount>>),
    Opened {
        ticket: OpenTicket,
        result: ChatResult<Vec<Message>>,
    },
    Sent {
        outgoing: OutgoingMessage,
        result: ChatResult<Message>,
    },
    Edited(ChatResult<Message>),
    Deleted {
        message_id: String,
        result: ChatResult<()>,
    },
}

/// Session loop of one authenticated user.
///
/// Owns the chat state, the realtime connection and the REST backend. Front-end
/// commands, pushed events and finished requests are applied one at a time.
pub struct ChatClient {
    state: ChatState,
    backend: Arc<dyn ChatBackend>,
    connection: Option<ConnectionHandle>,
    event_sender: mpsc::Sender<SessionEvent>,
    command_receiver: mpsc::Receiver<SessionCommand>,
    task_sender: mpsc::UnboundedSender<TaskResult>,
    task_receiver: mpsc::UnboundedReceiver<TaskResult>,
}

impl ChatClient {
    pub fn new(
        connection: ConnectionHandle,
        backend: Arc<dyn ChatBackend>,
        event_sender: mpsc::Sender<SessionEvent>,
        command_receiver: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        let (task_sender, task_receiver) = mpsc::unbounded_channel();
        Self {
            state: ChatState::new(connection.user_id()),
            backend,
            connection: Some(connection),
            event_sender,
            command_receiver,
            task_sender,
            task_receiver,
        }
    }

    pub async fn run(mut self) -> ChatResult<()> {
        log::info!("Chat session started for {}", self.state.me());
        self.load_directory();

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    if let Some(command) = command {
                        self.handle_command(command).await;
                    } else {
                        break;
                    }
                }
                event = next_event(&mut self.connection) => {
                    match event {
                        Some(event) => self.handle_server_event(event).await,
                        None => {
                            log::warn!("Realtime channel lost; no reconnect is attempted");
                            self.connection = None;
                            self.notify(SessionEvent::Disconnected).await;
                        }
                    }
                }
                Some(result) = self.task_receiver.recv() => {
                    self.handle_task_result(result).await;
                }
            }
        }

        if let Some(connection) = self.connection.take() {
            transport::disconnect(connection).await;
        }
        log::info!("Chat session for {} ended", self.state.me());
        Ok(())
    }

    fn load_directory(&self) {
        let backend = self.backend.clone();
        let tasks = self.task_sender.clone();
        tokio::spawn(async move {
            let _ = tasks.send(TaskResult::Users(backend.chat_users().await));
            let _ = tasks.send(TaskResult::Unread(backend.unread_counts().await));
        });
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SelectPeer(peer) => self.open(peer).await,
            SessionCommand::ClearSelection => {
                self.state.close();
                self.publish_conversation().await;
            }
            SessionCommand::SendMessage(outgoing) => self.send(outgoing),
            SessionCommand::EditMessage { message_id, text } => {
                let permitted = self
                    .state
                    .find_message(&message_id)
                    .is_some_and(|message| can_edit(self.state.me(), message));
                if !permitted || text.trim().is_empty() {
                    let err = ChatError::NotPermitted("only your own text messages can be edited");
                    self.reject("edit", err).await;
                    return;
                }
                let backend = self.backend.clone();
                let tasks = self.task_sender.clone();
                tokio::spawn(async move {
                    let result = backend.edit_message(&message_id, text.trim()).await;
                    let _ = tasks.send(TaskResult::Edited(result));
                });
            }
            SessionCommand::DeleteMessage { message_id } => {
                let permitted = self
                    .state
                    .find_message(&message_id)
                    .is_some_and(|message| can_delete(self.state.me(), message));
                if !permitted {
                    let err = ChatError::NotPermitted("only your own messages can be deleted");
                    self.reject("delete", err).await;
                    return;
                }
                let backend = self.backend.clone();
                let tasks = self.task_sender.clone();
                tokio::spawn(async move {
                    let result = backend.delete_message(&message_id).await;
                    let _ = tasks.send(TaskResult::Deleted { message_id, result });
                });
            }
            SessionCommand::RefreshUsers => self.load_directory(),
        }
    }

    async fn open(&mut self, peer: String) {
        let ticket = self.state.open(&peer);
        log::debug!("Opening conversation with {peer} (generation {})", ticket.generation);

        self.mark_read(&peer).await;
        self.publish_unread().await;
        self.publish_conversation().await;

        let backend = self.backend.clone();
        let tasks = self.task_sender.clone();
        tokio::spawn(async move {
            let result = backend.conversation(&ticket.peer).await;
            let _ = tasks.send(TaskResult::Opened { ticket, result });
        });
    }

    fn send(&self, outgoing: OutgoingMessage) {
        let backend = self.backend.clone();
        let tasks = self.task_sender.clone();
        tokio::spawn(async move {
            let result = backend.send_message(outgoing.clone()).await;
            let _ = tasks.send(TaskResult::Sent { outgoing, result });
        });
    }

    async fn mark_read(&self, peer: &str) {
        let Some(connection) = &self.connection else {
            return;
        };
        let event = ClientEvent::MarkAsRead {
            receiver_id: self.state.me().to_string(),
            sender_id: peer.to_string(),
        };
        if let Err(err) = connection.emit(event).await {
            log::warn!("Failed to emit markAsRead for {peer}: {err}");
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match self.state.apply(event) {
            Routed::Presence => {
                let online = self.state.presence().online_ids();
                self.notify(SessionEvent::PresenceChanged(online)).await;
            }
            Routed::Conversation => self.publish_conversation().await,
            Routed::Incoming { peer } => {
                self.mark_read(&peer).await;
                self.publish_conversation().await;
            }
            Routed::Unread { peer } => {
                let unread = self.state.unread();
                log::debug!("Unread from {peer}: {} ({} total)", unread.get(&peer), unread.total());
                self.publish_unread().await;
            }
            Routed::Ignored => {}
        }
    }

    async fn handle_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Users(Ok(users)) => {
                self.state.set_users(users.clone());
                self.notify(SessionEvent::UsersLoaded(users)).await;
            }
            TaskResult::Users(Err(err)) => self.reject("load users", err).await,
            TaskResult::Unread(Ok(report)) => {
                self.state.load_unread(report);
                self.publish_unread().await;
            }
            TaskResult::Unread(Err(err)) => self.reject("load unread counts", err).await,
            TaskResult::Opened { ticket, result } => match result {
                Ok(history) => {
                    if self.state.complete_open(&ticket, history) {
                        self.publish_conversation().await;
                    } else {
                        log::debug!(
                            "Discarding stale history for {} (generation {})",
                            ticket.peer,
                            ticket.generation
                        );
                    }
                }
                Err(err) => {
                    if !self.state.fail_open(&ticket) {
                        log::debug!("Ignoring failure of abandoned fetch for {}", ticket.peer);
                        return;
                    }
                    if err.is_forbidden() {
                        self.state.close();
                    }
                    self.reject("load conversation", err).await;
                    self.publish_conversation().await;
                }
            },
            TaskResult::Sent { outgoing, result } => match result {
                Ok(message) => {
                    log::debug!("Message {} accepted; waiting for echo", message.id);
                    self.notify(SessionEvent::MessageSent {
                        message_id: message.id,
                        outgoing,
                    })
                    .await;
                }
                Err(err) => self.reject("send", err).await,
            },
            TaskResult::Edited(Ok(message)) => {
                let routed = self.state.apply(ServerEvent::MessageEdited(message));
                if routed != Routed::Ignored {
                    self.publish_conversation().await;
                }
            }
            TaskResult::Edited(Err(err)) => self.reject("edit", err).await,
            TaskResult::Deleted { message_id, result } => match result {
                Ok(()) => {
                    let routed = self.state.apply(ServerEvent::MessageDeleted { message_id });
                    if routed != Routed::Ignored {
                        self.publish_conversation().await;
                    }
                }
                Err(err) => self.reject("delete", err).await,
            },
        }
    }

    async fn reject(&self, action: &'static str, err: ChatError) {
        log::warn!("Failed to {action}: {err}");
        let event = if err.is_forbidden() {
            SessionEvent::Alert(format!("Access denied while trying to {action}"))
        } else {
            SessionEvent::RequestFailed {
                action,
                reason: err.to_string(),
            }
        };
        self.notify(event).await;
    }

    async fn publish_conversation(&self) {
        let conversation = self.state.conversation();
        self.notify(SessionEvent::ConversationChanged {
            peer: conversation.peer().map(str::to_string),
            messages: conversation.messages().to_vec(),
            loading: conversation.is_loading(),
        })
        .await;
    }

    async fn publish_unread(&self) {
        self.notify(SessionEvent::UnreadChanged(self.state.unread().snapshot()))
            .await;
    }

    async fn notify(&self, event: SessionEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::debug!("Front end is gone, dropping event: {err}");
        }
    }
}

async fn next_event(connection: &mut Option<ConnectionHandle>) -> Option<ServerEvent> {
    match connection {
        Some(connection) => connection.next_event().await,
        None => std::future::pending().await,
    }
}
