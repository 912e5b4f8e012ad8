use thiserror::Error;
use uuid::Uuid;

use crate::common::{FileUpload, Message, OutgoingMessage};

const VOICE_MIME: &str = "audio/wav";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("message needs text or an attachment")]
    Empty,
    #[error("stop the voice recording before sending")]
    Recording,
}

/// Voice capture: `Idle -> Recording -> Idle`.
#[derive(Debug, Default)]
pub enum Recorder {
    #[default]
    Idle,
    Recording { buffer: Vec<u8> },
}

impl Recorder {
    pub fn is_recording(&self) -> bool {
        matches!(self, Recorder::Recording { .. })
    }

    /// Start when idle, stop when recording. Stopping hands back the captured
    /// audio as a file, unless nothing was captured.
    pub fn toggle(&mut self) -> Option<FileUpload> {
        match std::mem::take(self) {
            Recorder::Idle => {
                *self = Recorder::Recording { buffer: Vec::new() };
                None
            }
            Recorder::Recording { buffer } if buffer.is_empty() => None,
            Recorder::Recording { buffer } => Some(FileUpload {
                name: format!("voice-{}.wav", Uuid::new_v4()),
                mime_type: VOICE_MIME.to_string(),
                bytes: buffer,
            }),
        }
    }

    /// Append captured audio. Chunks arriving while idle are dropped.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> bool {
        match self {
            Recorder::Recording { buffer } => {
                buffer.extend_from_slice(chunk);
                true
            }
            Recorder::Idle => false,
        }
    }
}

/// Outgoing message being written in the input bar.
#[derive(Debug, Default)]
pub struct Composer {
    text: String,
    file: Option<FileUpload>,
    reply_to: Option<String>,
    recorder: Recorder,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn attach(&mut self, file: FileUpload) {
        self.file = Some(file);
    }

    pub fn detach(&mut self) -> Option<FileUpload> {
        self.file.take()
    }

    pub fn attachment(&self) -> Option<&FileUpload> {
        self.file.as_ref()
    }

    pub fn reply_to(&mut self, message_id: impl Into<String>) {
        self.reply_to = Some(message_id.into());
    }

    pub fn cancel_reply(&mut self) {
        self.reply_to = None;
    }

    pub fn reply_target(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Toggle voice capture; a finished recording becomes the attachment.
    pub fn toggle_recording(&mut self) -> bool {
        if let Some(file) = self.recorder.toggle() {
            self.file = Some(file);
        }
        self.recorder.is_recording()
    }

    pub fn push_audio(&mut self, chunk: &[u8]) -> bool {
        self.recorder.push_chunk(chunk)
    }

    /// Build the request payload. Input is kept until `on_sent`.
    pub fn submit(&self, receiver: &str) -> Result<OutgoingMessage, ComposeError> {
        if self.recorder.is_recording() {
            return Err(ComposeError::Recording);
        }
        if self.text.trim().is_empty() && self.file.is_none() {
            return Err(ComposeError::Empty);
        }

        Ok(OutgoingMessage {
            receiver: receiver.to_string(),
            text: self.text.trim().to_string(),
            file: self.file.clone(),
            reply_to: self.reply_to.clone(),
        })
    }

    /// Clear what `sent` carried once the server accepted it. Input changed
    /// since the submit is kept.
    pub fn on_sent(&mut self, sent: &OutgoingMessage) {
        if self.text.trim() == sent.text {
            self.text.clear();
        }
        if self.file.is_some() && self.file == sent.file {
            self.file = None;
        }
        if self.reply_to.is_some() && self.reply_to == sent.reply_to {
            self.reply_to = None;
        }
    }
}

/// Only the sender may edit, and only plain text messages.
pub fn can_edit(me: &str, message: &Message) -> bool {
    message.sender_id() == me && message.file.is_none() && message.text().is_some()
}

pub fn can_delete(me: &str, message: &Message) -> bool {
    message.sender_id() == me
}
