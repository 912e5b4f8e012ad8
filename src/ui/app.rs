use std::io;

use chrono::FixedOffset;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::common::{FileUpload, OutgoingMessage, SessionCommand, SessionEvent};
use crate::error::{ChatError, ChatResult};
use crate::session::{can_delete, can_edit};

use super::components::input_bar::{self, InputAction};
use super::components::voice::VoiceCapture;
use super::components::{chat_area, sidebar};
use super::state::{AppState, NoticeKind};

/// Terminal front end: reads commands from stdin, prints the session view.
pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<SessionCommand>,
    event_receiver: mpsc::Receiver<SessionEvent>,
    zone: FixedOffset,
    recorder_command: Vec<String>,
    capture: Option<VoiceCapture>,
    audio_sender: mpsc::UnboundedSender<Vec<u8>>,
    audio_receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ChatApp {
    pub fn new(
        me: impl Into<String>,
        command_sender: mpsc::Sender<SessionCommand>,
        event_receiver: mpsc::Receiver<SessionEvent>,
        zone: FixedOffset,
        recorder_command: Vec<String>,
    ) -> Self {
        let (audio_sender, audio_receiver) = mpsc::unbounded_channel();
        Self {
            state: AppState::new(me),
            command_sender,
            event_receiver,
            zone,
            recorder_command,
            capture: None,
            audio_sender,
            audio_receiver,
        }
    }

    pub async fn run(mut self) -> io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", input_bar::HELP);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if !self.handle_input(input_bar::parse(&line)).await {
                        break;
                    }
                }
                event = self.event_receiver.recv() => {
                    let Some(event) = event else {
                        log::warn!("Chat session ended");
                        break;
                    };
                    self.handle_session_event(event);
                }
                Some(chunk) = self.audio_receiver.recv() => {
                    self.state.composer.push_audio(&chunk);
                }
            }
        }

        if let Some(capture) = self.capture.take() {
            capture.stop().await?;
        }
        Ok(())
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        let notices_before = self.state.notices.len();
        let redraw = self.state.apply(event);

        if redraw {
            print!("{}", chat_area::render(&self.state, &self.zone));
        }
        for notice in self.state.notices.iter().skip(notices_before) {
            let prefix = match notice.kind {
                NoticeKind::Info => "",
                NoticeKind::Warning => "! ",
                NoticeKind::Alert => "!! ",
            };
            let time = notice.timestamp.with_timezone(&self.zone).format("%H:%M:%S");
            println!("{prefix}[{time}] {}", notice.text);
        }
    }

    /// Returns false when the user asked to leave.
    async fn handle_input(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::Nothing => {}
            InputAction::Quit => return false,
            InputAction::Help => println!("{}", input_bar::HELP),
            InputAction::Invalid(reason) => self.info(reason),
            InputAction::Text(text) => {
                self.state.composer.set_text(text);
                self.submit();
            }
            InputAction::Send => self.submit(),
            InputAction::Open(query) => match self.state.resolve_peer(&query) {
                Some(peer) => self.send_command(SessionCommand::SelectPeer(peer)),
                None => self.info(format!("No colleague matches `{query}`")),
            },
            InputAction::Close => self.send_command(SessionCommand::ClearSelection),
            InputAction::Reply(reference) => match self.state.resolve_message(&reference) {
                Some(message) => {
                    let id = message.id.clone();
                    self.state.composer.reply_to(id);
                    self.info(format!("Replying to {reference}"));
                }
                None => self.info(format!("No message {reference}")),
            },
            InputAction::CancelReply => self.state.composer.cancel_reply(),
            InputAction::Edit { target, text } => {
                let permitted = self
                    .state
                    .resolve_message(&target)
                    .filter(|message| can_edit(&self.state.me, message))
                    .map(|message| message.id.clone());
                match permitted {
                    Some(message_id) => {
                        self.send_command(SessionCommand::EditMessage { message_id, text })
                    }
                    None => self.info(format!("{target} cannot be edited")),
                }
            }
            InputAction::Delete(target) => {
                let permitted = self
                    .state
                    .resolve_message(&target)
                    .filter(|message| can_delete(&self.state.me, message))
                    .map(|message| message.id.clone());
                match permitted {
                    Some(message_id) => {
                        self.send_command(SessionCommand::DeleteMessage { message_id })
                    }
                    None => self.info(format!("{target} cannot be deleted")),
                }
            }
            InputAction::Attach(path) => match FileUpload::from_path(&path) {
                Ok(file) => {
                    self.info(format!("Attached {} ({})", file.name, file.mime_type));
                    self.state.composer.attach(file);
                }
                Err(err) => self.info(format!("Cannot read {path}: {err}")),
            },
            InputAction::Detach => {
                self.state.composer.detach();
            }
            InputAction::ToggleRecording => self.toggle_recording().await,
            InputAction::RefreshUsers => {
                self.send_command(SessionCommand::RefreshUsers);
                print!("{}", sidebar::render(&self.state));
            }
        }
        true
    }

    fn submit(&mut self) {
        match self.prepare_send() {
            Ok(outgoing) => self.send_command(SessionCommand::SendMessage(outgoing)),
            Err(err) => self.info(err.to_string()),
        }
    }

    fn prepare_send(&self) -> ChatResult<OutgoingMessage> {
        let peer = self
            .state
            .active_peer
            .as_deref()
            .ok_or(ChatError::NotPermitted("open a conversation first"))?;
        Ok(self.state.composer.submit(peer)?)
    }

    async fn toggle_recording(&mut self) {
        if let Some(capture) = self.capture.take() {
            if let Err(err) = capture.stop().await {
                log::warn!("Failed to stop voice capture: {err}");
            }
            while let Ok(chunk) = self.audio_receiver.try_recv() {
                self.state.composer.push_audio(&chunk);
            }
            let previous = self.state.composer.attachment().map(|file| file.name.clone());
            self.state.composer.toggle_recording();
            let recorded = self
                .state
                .composer
                .attachment()
                .filter(|file| Some(&file.name) != previous.as_ref())
                .map(|file| format!("Recorded {} ({} bytes)", file.name, file.bytes.len()));
            self.info(recorded.unwrap_or_else(|| "Nothing was recorded".to_string()));
            return;
        }

        match VoiceCapture::start(&self.recorder_command, self.audio_sender.clone()) {
            Ok(capture) => {
                self.capture = Some(capture);
                self.state.composer.toggle_recording();
                self.info("Recording… /record again to stop".to_string());
            }
            Err(err) => self.info(format!("Cannot start recording: {err}")),
        }
    }

    fn send_command(&mut self, command: SessionCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to session: {err}");
        }
    }

    fn info(&mut self, text: String) {
        println!("{text}");
        self.state.add_notice(NoticeKind::Info, text);
    }
}
