/// What a line typed into the input bar asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Text(String),
    Send,
    Open(String),
    Close,
    Reply(String),
    CancelReply,
    Edit { target: String, text: String },
    Delete(String),
    Attach(String),
    Detach,
    ToggleRecording,
    RefreshUsers,
    Help,
    Quit,
    Invalid(String),
    Nothing,
}

pub const HELP: &str = "\
Commands:
  <text>                      send text (with the pending attachment, if any)
  /send                       send the pending attachment without text
  /open <number|name|id>      open a conversation
  /close                      close the conversation
  /reply <#n|id>              reply to a message, /noreply to cancel
  /edit <#n|id> <text>        edit one of your text messages
  /delete <#n|id>             delete one of your messages
  /attach <path>              attach a file, /detach to drop it
  /record                     start/stop a voice recording
  /users                      reload colleagues and unread counts
  /help                       show this help
  /quit                       leave";

pub fn parse(line: &str) -> InputAction {
    let line = line.trim();
    if line.is_empty() {
        return InputAction::Nothing;
    }
    let Some(command) = line.strip_prefix('/') else {
        return InputAction::Text(line.to_string());
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match (name, rest) {
        ("send", _) => InputAction::Send,
        ("open", "") | ("reply", "") | ("delete", "") | ("attach", "") | ("edit", "") => {
            InputAction::Invalid(format!("/{name} needs an argument"))
        }
        ("open", who) => InputAction::Open(who.to_string()),
        ("close", _) => InputAction::Close,
        ("reply", target) => InputAction::Reply(target.to_string()),
        ("noreply", _) => InputAction::CancelReply,
        ("edit", args) => match args.split_once(char::is_whitespace) {
            Some((target, text)) if !text.trim().is_empty() => InputAction::Edit {
                target: target.to_string(),
                text: text.trim().to_string(),
            },
            _ => InputAction::Invalid("/edit needs a message and the new text".to_string()),
        },
        ("delete", target) => InputAction::Delete(target.to_string()),
        ("attach", path) => InputAction::Attach(path.to_string()),
        ("detach", _) => InputAction::Detach,
        ("record", _) => InputAction::ToggleRecording,
        ("users", _) => InputAction::RefreshUsers,
        ("help", _) => InputAction::Help,
        ("quit", _) | ("exit", _) => InputAction::Quit,
        (other, _) => InputAction::Invalid(format!("unknown command /{other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_text() {
        assert_eq!(parse("  hello there "), InputAction::Text("hello there".into()));
        assert_eq!(parse("   "), InputAction::Nothing);
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("/open 2"), InputAction::Open("2".into()));
        assert_eq!(parse("/reply #3"), InputAction::Reply("#3".into()));
        assert_eq!(
            parse("/edit #1  fixed the typo "),
            InputAction::Edit {
                target: "#1".into(),
                text: "fixed the typo".into()
            }
        );
        assert_eq!(parse("/attach ./bill 12.pdf"), InputAction::Attach("./bill 12.pdf".into()));
        assert_eq!(parse("/record"), InputAction::ToggleRecording);
        assert_eq!(parse("/quit"), InputAction::Quit);
    }

    #[test]
    fn rejects_incomplete_or_unknown_commands() {
        assert!(matches!(parse("/open"), InputAction::Invalid(_)));
        assert!(matches!(parse("/edit #1"), InputAction::Invalid(_)));
        assert_eq!(
            parse("/dance"),
            InputAction::Invalid("unknown command /dance".into())
        );
    }
}
