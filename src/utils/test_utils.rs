#[cfg(test)]
use crate::core::message::Message;
#[cfg(test)]
use crate::core::session::ChatSession;
#[cfg(test)]
use crate::utils::logging::LoggingState;

#[cfg(test)]
pub fn create_test_session() -> ChatSession {
    ChatSession::new(LoggingState::new(None).unwrap())
}

#[cfg(test)]
pub fn create_test_messages() -> Vec<Message> {
    vec![
        Message::user("Hello"),
        Message::assistant("Hi there!"),
        Message::user("How are you?"),
        Message::assistant("I'm doing well, thank you for asking!"),
    ]
}
