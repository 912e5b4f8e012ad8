use std::fmt::Write;

use crate::common::Role;
use crate::ui::state::AppState;

/// Badge printed next to a user, resolved from the role at compile time.
pub fn role_badge(role: Role) -> &'static str {
    match role {
        Role::Admin => "[ADM]",
        Role::Manager => "[MGR]",
        Role::Cashier => "[CSH]",
        Role::Receptionist => "[RCP]",
        Role::Other => "[---]",
    }
}

pub fn render(state: &AppState) -> String {
    let mut out = String::new();
    let total: u32 = state.unread.values().sum();
    let _ = writeln!(out, "Staff ({total} unread)");

    let contacts = state.contacts();
    if contacts.is_empty() {
        let _ = writeln!(out, "  No colleagues available yet");
        return out;
    }

    for (index, user) in contacts.iter().enumerate() {
        let marker = if state.online.contains(&user.id) {
            "●"
        } else {
            "○"
        };
        let active = if state.active_peer.as_deref() == Some(user.id.as_str()) {
            ">"
        } else {
            " "
        };
        let _ = write!(
            out,
            "{active}{:>3}. {marker} {} {}",
            index + 1,
            role_badge(user.role),
            user.name
        );
        match state.unread.get(&user.id).copied().unwrap_or(0) {
            0 => {}
            count => {
                let _ = write!(out, " ({count})");
            }
        }
        out.push('\n');
    }
    out
}
