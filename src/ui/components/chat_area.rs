use std::fmt::Write;

use chrono::FixedOffset;

use crate::common::Message;
use crate::session::group_by_day;
use crate::ui::state::AppState;

pub fn render(state: &AppState, zone: &FixedOffset) -> String {
    let mut out = String::new();

    let Some(peer) = state.active_peer.as_deref() else {
        let _ = writeln!(out, "Select a colleague with /open <number|name>");
        return out;
    };
    let _ = writeln!(out, "── {} ──", state.display_name(peer));

    if state.messages.is_empty() {
        let placeholder = if state.loading {
            "Loading history…"
        } else {
            "No messages yet"
        };
        let _ = writeln!(out, "  {placeholder}");
        return out;
    }

    // Numbers follow list order so `#n` references stay valid across day headers.
    let position = |message: &Message| {
        state
            .messages
            .iter()
            .position(|m| m.id == message.id)
            .map_or(0, |index| index + 1)
    };

    for group in group_by_day(&state.messages, zone) {
        let _ = writeln!(out, "  · {} ·", group.label());
        for message in group.messages {
            render_message(&mut out, state, message, position(message), zone);
        }
    }
    out
}

fn render_message(
    out: &mut String,
    state: &AppState,
    message: &Message,
    number: usize,
    zone: &FixedOffset,
) {
    let time = message.created_at.with_timezone(zone).format("%H:%M");
    let _ = write!(
        out,
        "#{number:<3} [{time}] {}: ",
        state.display_name(message.sender_id())
    );

    if let Some(reply) = &message.reply_to {
        let quoted = state
            .messages
            .iter()
            .find(|m| m.id == reply.id())
            .and_then(|m| m.text())
            .unwrap_or("…");
        let _ = write!(out, "↪ \"{}\" ", shorten(quoted, 30));
    }
    if let Some(text) = message.text() {
        out.push_str(text);
    }
    if let Some(file) = &message.file {
        let _ = write!(out, " [{}: {}]", file.mime_type, file.name);
    }
    if message.is_edited {
        out.push_str(" (edited)");
    }
    if message.sender_id() == state.me {
        out.push_str(if message.is_read { " ✓✓" } else { " ✓" });
    }
    out.push('\n');
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::common::{ReplyRef, SessionEvent};
    use crate::session::conversation::tests::message;

    #[test]
    fn renders_day_headers_replies_and_receipts() {
        let mut state = AppState::new("me");
        let first = message("m1", "p", "me", "Room 204 needs towels");
        let mut reply = message("m2", "me", "p", "On it");
        reply.reply_to = Some(ReplyRef::Id("m1".into()));
        reply.is_read = true;
        reply.created_at = Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap();
        let mut edited = message("m3", "me", "p", "Done");
        edited.is_edited = true;
        edited.created_at = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();

        state.apply(SessionEvent::ConversationChanged {
            peer: Some("p".into()),
            messages: vec![first, reply, edited],
            loading: false,
        });

        let rendered = render(&state, &FixedOffset::east_opt(0).unwrap());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "── p ──");
        assert_eq!(lines[1], "  · Wed May 01 2024 ·");
        assert_eq!(lines[2], "#1   [10:00] p: Room 204 needs towels");
        assert_eq!(lines[3], "  · Thu May 02 2024 ·");
        assert_eq!(lines[4], "#2   [08:30] You: ↪ \"Room 204 needs towels\" On it ✓✓");
        assert_eq!(lines[5], "#3   [09:00] You: Done (edited) ✓");
    }

    #[test]
    fn prompts_when_nothing_is_open() {
        let state = AppState::new("me");
        let rendered = render(&state, &FixedOffset::east_opt(0).unwrap());
        assert!(rendered.starts_with("Select a colleague"));
    }

    #[test]
    fn shows_loading_until_history_arrives() {
        let mut state = AppState::new("me");
        let zone = FixedOffset::east_opt(0).unwrap();
        state.apply(SessionEvent::ConversationChanged {
            peer: Some("p".into()),
            messages: Vec::new(),
            loading: true,
        });
        assert!(render(&state, &zone).contains("Loading history…"));

        state.apply(SessionEvent::ConversationChanged {
            peer: Some("p".into()),
            messages: Vec::new(),
            loading: false,
        });
        assert!(render(&state, &zone).contains("No messages yet"));
    }

    #[test]
    fn shortens_long_quotes() {
        assert_eq!(shorten("abcdef", 3), "abc…");
        assert_eq!(shorten("abc", 3), "abc");
    }
}
