//! Text framing of the realtime channel (Engine.IO v4 carrying Socket.IO v5).
//!
//! Only the subset the chat uses is understood: the open handshake, ping/pong,
//! connect/disconnect on the default namespace and JSON event packets.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::common::{ClientEvent, Message, ServerEvent};
use crate::error::{ChatError, ChatResult};

pub const PONG: &str = "3";
pub const DISCONNECT: &str = "41";

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Handshake {
    pub sid: String,
    #[serde(rename = "pingInterval", default)]
    pub ping_interval: u64,
    #[serde(rename = "pingTimeout", default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Connected,
    Disconnected,
    ConnectError(String),
    Event(ServerEvent),
    /// Well-formed packet the chat does not consume.
    Unhandled(String),
    Noop,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeletedPayload {
    Object {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    Bare(String),
}

#[derive(Deserialize)]
struct ReadPayload {
    #[serde(rename = "senderId")]
    sender_id: String,
}

/// Decode one WebSocket text frame.
pub fn decode(frame: &str) -> ChatResult<Frame> {
    let (kind, rest) = split_kind(frame)?;
    match kind {
        '0' => Ok(Frame::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_packet(rest),
        '6' => Ok(Frame::Noop),
        other => Err(ChatError::Protocol(format!(
            "unknown engine packet type `{other}`"
        ))),
    }
}

fn split_kind(frame: &str) -> ChatResult<(char, &str)> {
    let kind = frame
        .chars()
        .next()
        .ok_or_else(|| ChatError::Protocol("empty frame".to_string()))?;
    Ok((kind, &frame[kind.len_utf8()..]))
}

fn decode_packet(packet: &str) -> ChatResult<Frame> {
    let (kind, mut rest) = split_kind(packet)?;

    if rest.starts_with('/') {
        let (namespace, tail) = rest.split_once(',').unwrap_or((rest, ""));
        if namespace != "/" {
            return Ok(Frame::Unhandled(format!("namespace {namespace}")));
        }
        rest = tail;
    }

    // Acknowledgement id, if any, sits between the header and the JSON body.
    let body_start = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let body = &rest[body_start..];

    match kind {
        '0' => Ok(Frame::Connected),
        '1' => Ok(Frame::Disconnected),
        '2' => decode_event(body),
        '3' => Ok(Frame::Unhandled("ack".to_string())),
        '4' => Ok(Frame::ConnectError(connect_error_reason(body))),
        '5' | '6' => Ok(Frame::Unhandled("binary packet".to_string())),
        other => Err(ChatError::Protocol(format!(
            "unknown socket packet type `{other}`"
        ))),
    }
}

fn connect_error_reason(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("connection refused")
            .to_string(),
        Ok(Value::String(reason)) => reason,
        _ => body.to_string(),
    }
}

fn decode_event(body: &str) -> ChatResult<Frame> {
    let mut args = serde_json::from_str::<Vec<Value>>(body)?.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(ChatError::Protocol("event without a name".to_string())),
    };
    let data = args.next().unwrap_or(Value::Null);

    let event = match name.as_str() {
        "onlineUsers" => ServerEvent::OnlineUsers(serde_json::from_value(data)?),
        "newMessage" => ServerEvent::MessageCreated(serde_json::from_value::<Message>(data)?),
        "messageEdited" => ServerEvent::MessageEdited(serde_json::from_value::<Message>(data)?),
        "messageDeleted" => {
            let message_id = match serde_json::from_value::<DeletedPayload>(data)? {
                DeletedPayload::Object { message_id } | DeletedPayload::Bare(message_id) => {
                    message_id
                }
            };
            ServerEvent::MessageDeleted { message_id }
        }
        "messagesRead" => {
            let payload: ReadPayload = serde_json::from_value(data)?;
            ServerEvent::MessagesRead {
                sender_id: payload.sender_id,
            }
        }
        _ => return Ok(Frame::Unhandled(name)),
    };

    Ok(Frame::Event(event))
}

/// Socket.IO CONNECT for the default namespace, carrying the auth token if any.
pub fn encode_connect(token: Option<&str>) -> String {
    match token {
        Some(token) => format!("40{}", json!({ "token": token })),
        None => "40".to_string(),
    }
}

pub fn encode_event(event: &ClientEvent) -> String {
    let payload = match event {
        ClientEvent::Join(user_id) => json!(["join", user_id]),
        ClientEvent::MarkAsRead {
            receiver_id,
            sender_id,
        } => json!([
            "markAsRead",
            { "receiverId": receiver_id, "senderId": sender_id }
        ]),
    };
    format!("42{payload}")
}
