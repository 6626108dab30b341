use serde::Serialize;

/// Who sent a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// One entry in the chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub time: String,
    /// Citation, bot messages only; absent when nothing was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Ordered transcript for one UI session; starts empty and is never persisted
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        ChatSession::default()
    }

    /// Append a question and its answer under the same timestamp
    pub fn record_exchange(&mut self, query: &str, answer: &str, source: Option<String>, time: &str) {
        self.messages.push(ChatMessage {
            role: Role::User,
            text: query.to_string(),
            time: time.to_string(),
            source: None,
        });
        self.messages.push(ChatMessage {
            role: Role::Bot,
            text: answer.to_string(),
            time: time.to_string(),
            source,
        });
    }

    /// Messages oldest first
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// End the session
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exchange_appends_user_then_bot() {
        let mut session = ChatSession::new();
        assert!(session.messages().is_empty());

        session.record_exchange("q1", "a1", Some("a.pdf | Page 1".to_string()), "09:15 AM");
        session.record_exchange("q2", "a2", None, "09:16 AM");

        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Bot, Role::User, Role::Bot]);
        assert_eq!(session.messages()[1].source.as_deref(), Some("a.pdf | Page 1"));
        assert_eq!(session.messages()[3].source, None);
        assert_eq!(session.messages()[2].text, "q2");

        session.clear();
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_message_serialization_keys() {
        let mut session = ChatSession::new();
        session.record_exchange("hi", "hello", Some("b.docx | Page 1".to_string()), "10:00 PM");

        let value = serde_json::to_value(session.messages()).unwrap();
        assert_eq!(
            value,
            json!([
                {"role": "user", "text": "hi", "time": "10:00 PM"},
                {"role": "bot", "text": "hello", "time": "10:00 PM", "source": "b.docx | Page 1"}
            ])
        );
    }
}
