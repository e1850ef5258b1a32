use wavenet_chat::common::{Conversation, Message, UserId, UserRef};

use super::state::{AppState, Update};

pub fn directory(state: &AppState) -> Vec<String> {
    if state.conversations.is_empty() {
        return vec!["No conversations yet".to_string()];
    }
    state
        .conversations
        .iter()
        .map(|c| {
            let online = c
                .other_participant(&state.me)
                .is_some_and(|u| state.online.contains(&u.id));
            conversation_line(c, &state.me, online)
        })
        .collect()
}

pub fn conversation_line(conversation: &Conversation, me: &UserId, online: bool) -> String {
    let badge = if online { "●" } else { "○" };
    let name = conversation
        .other_participant(me)
        .map_or("(unknown)", |u| u.display_name.as_str());
    match conversation.last_message() {
        Some(last) => format!("{badge} {name} [{}]: {}", conversation.id, preview(&last.text)),
        None => format!("{badge} {name} [{}]", conversation.id),
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 40;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{cut}…")
    }
}

pub fn message_line(message: &Message, me: &UserId) -> String {
    let who = if message.is_from(me) {
        "you"
    } else {
        message.sender.display_name.as_str()
    };
    format!("[{}] {who}: {}", message.created_at.format("%H:%M"), message.text)
}

pub fn users(users: &[UserRef]) -> Vec<String> {
    if users.is_empty() {
        return vec!["No matching users".to_string()];
    }
    users
        .iter()
        .map(|u| format!("{} ({})", u.display_name, u.id))
        .collect()
}

/// Lines to print for one applied update.
pub fn update(state: &AppState, update: &Update) -> Vec<String> {
    let counterpart = state
        .counterpart()
        .map_or("the other side", |u| u.display_name.as_str());
    match update {
        Update::Directory => directory(state),
        Update::Opened(id) => vec![format!("-- conversation {id} with {counterpart} --")],
        Update::NewMessages(messages) => messages.iter().map(|m| message_line(m, &state.me)).collect(),
        Update::Seen => vec!["   (seen)".to_string()],
        Update::Typing(true) => vec![format!("{counterpart} is typing...")],
        Update::Typing(false) => vec![format!("{counterpart} stopped typing")],
        Update::Online(online) => {
            let status = if *online { "online" } else { "offline" };
            vec![format!("{counterpart} is {status}")]
        }
        Update::SearchResults => users(&state.search_results),
        Update::Failed(reason) => vec![format!("! failed to load {reason}")],
        Update::Connection(true) => vec!["(live updates connected)".to_string()],
        Update::Connection(false) => vec!["(live updates disconnected)".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_line_shows_digest() {
        let mut conversation = Conversation {
            id: "c1".into(),
            participants: vec![UserRef::new("me", "Me"), UserRef::new("bob", "Bob")],
            messages: Vec::new(),
        };
        assert_eq!(conversation_line(&conversation, &"me".into(), false), "○ Bob [c1]");

        conversation.messages.push(Message {
            id: "m1".into(),
            sender: UserRef::new("bob", "Bob"),
            text: "x".repeat(50),
            is_read: false,
            created_at: chrono::Utc::now(),
            conversation_id: None,
        });
        let line = conversation_line(&conversation, &"me".into(), true);
        assert!(line.starts_with("● Bob [c1]: xxxx"));
        assert!(line.ends_with('…'));
    }

    #[test]
    fn test_typing_start_and_stop_are_both_shown() {
        let mut state = AppState::new("me".into());
        state.open = Some(Conversation {
            id: "c1".into(),
            participants: vec![UserRef::new("me", "Me"), UserRef::new("bob", "Bob")],
            messages: Vec::new(),
        });
        assert_eq!(update(&state, &Update::Typing(true)), vec!["Bob is typing..."]);
        assert_eq!(update(&state, &Update::Typing(false)), vec!["Bob stopped typing"]);
    }
}
