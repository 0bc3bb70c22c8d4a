use tokio_util::sync::CancellationToken;

use crate::api::Content;
use crate::core::chat_stream::SendError;
use crate::core::history::{ConversationHistory, HistoryError, SavedConversation};
use crate::core::message::{to_api_contents, Message, THINKING_PLACEHOLDER};
use crate::utils::logging::LoggingState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// No active conversation; the front-end shows the starter view.
    Welcome,
    /// A transcript is visible, possibly mid-stream.
    Active,
}

/// A prepared outbound request: the conversation so far plus the new user
/// input, with the stream identity the reply must carry.
pub struct OutboundChat {
    pub prior: Vec<Content>,
    pub user_message: String,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

/// Owns the active transcript, the saved-conversation history, and the view
/// state, and turns front-end events into state transitions.
///
/// All state lives here; the front-end only reads it through the accessors.
/// One stream is in flight at most, guarded by the busy flag and a
/// monotonically increasing stream id so stale chunks are dropped.
pub struct ChatSession {
    transcript: Vec<Message>,
    history: ConversationHistory,
    view: ViewState,
    current_response: String,
    is_streaming: bool,
    current_stream_id: u64,
    stream_cancel_token: Option<CancellationToken>,
    pub logging: LoggingState,
}

impl ChatSession {
    pub fn new(logging: LoggingState) -> Self {
        Self {
            transcript: Vec::new(),
            history: ConversationHistory::new(),
            view: ViewState::Welcome,
            current_response: String::new(),
            is_streaming: false,
            current_stream_id: 0,
            stream_cancel_token: None,
            logging,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn view_state(&self) -> ViewState {
        self.view
    }

    /// Busy flag: true while a response stream is in flight.
    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    /// Accept a user message and prepare the outbound request.
    ///
    /// Returns `None` for blank input, and while a stream is already in
    /// flight (a second send must wait for the first to finish). Otherwise
    /// the user turn and the thinking placeholder are appended, the view
    /// goes active, and the prior turns (everything before the new pair)
    /// are converted for the wire.
    pub fn submit_user_message(&mut self, text: &str) -> Option<OutboundChat> {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.is_streaming {
            return None;
        }

        if let Err(e) = self.logging.log_message(&format!("You: {trimmed}")) {
            eprintln!("Failed to log message: {e}");
        }

        self.transcript.push(Message::user(trimmed));
        self.transcript.push(Message::assistant(THINKING_PLACEHOLDER));
        self.current_response.clear();
        self.view = ViewState::Active;

        let prior_end = self.transcript.len() - 2;
        let prior = to_api_contents(&self.transcript[..prior_end]);

        let (cancel_token, stream_id) = self.begin_stream();

        Some(OutboundChat {
            prior,
            user_message: trimmed.to_string(),
            cancel_token,
            stream_id,
        })
    }

    fn begin_stream(&mut self) -> (CancellationToken, u64) {
        self.cancel_current_stream();

        self.current_stream_id += 1;

        let token = CancellationToken::new();
        self.stream_cancel_token = Some(token.clone());
        self.is_streaming = true;

        (token, self.current_stream_id)
    }

    /// Abandon the in-flight stream, if any. Also invoked when the
    /// transcript is replaced underneath a running stream.
    pub fn cancel_current_stream(&mut self) {
        if let Some(token) = &self.stream_cancel_token {
            token.cancel();
        }
        self.stream_cancel_token = None;
        self.is_streaming = false;
    }

    fn is_current_stream(&self, stream_id: u64) -> bool {
        stream_id == self.current_stream_id
    }

    /// Fold one incremental fragment into the pending response and overwrite
    /// the trailing assistant message with the cumulative text so far.
    pub fn apply_chunk(&mut self, content: &str, stream_id: u64) {
        if !self.is_current_stream(stream_id) {
            return;
        }

        self.current_response.push_str(content);
        if let Some(last) = self.transcript.last_mut() {
            if last.is_assistant() {
                last.content = self.current_response.clone();
            }
        }
    }

    /// Replace the pending response with upstream diagnostic text. The
    /// stream still delivers its end marker afterwards.
    pub fn apply_stream_error(&mut self, message: &str, stream_id: u64) {
        if !self.is_current_stream(stream_id) {
            return;
        }

        self.current_response.clear();
        if let Some(last) = self.transcript.last_mut() {
            if last.is_assistant() {
                last.content = message.to_string();
            }
        }
    }

    pub fn finish_stream(&mut self, stream_id: u64) {
        if !self.is_current_stream(stream_id) {
            return;
        }

        if !self.current_response.is_empty() {
            if let Err(e) = self.logging.log_message(&self.current_response) {
                eprintln!("Failed to log response: {e}");
            }
        }

        self.is_streaming = false;
        self.stream_cancel_token = None;
    }

    /// Record a pre-flight send rejection: the placeholder becomes the
    /// explanation and no stream runs.
    pub fn fail_send(&mut self, error: &SendError) {
        if let Some(last) = self.transcript.last_mut() {
            if last.is_assistant() {
                last.content = error.user_message();
            }
        }
        self.is_streaming = false;
        self.stream_cancel_token = None;
    }

    /// Archive the active conversation (when non-empty and new) and return
    /// to the starter view with an empty transcript.
    pub fn start_new_chat(&mut self) {
        self.cancel_current_stream();

        if !self.transcript.is_empty() {
            self.history.archive(&self.transcript);
        }

        self.transcript.clear();
        self.current_response.clear();
        self.view = ViewState::Welcome;
    }

    /// Replace the active transcript with a saved conversation.
    ///
    /// When the active transcript is non-empty and not yet saved it is
    /// archived first; that insertion shifts every saved entry down by one,
    /// so the requested index is compensated before the lookup.
    pub fn load_chat(&mut self, index: usize) -> Result<(), HistoryError> {
        let mut index = index;
        if !self.transcript.is_empty() && self.history.archive(&self.transcript).is_some() {
            index += 1;
        }

        let messages = self.history.get(index)?.messages.clone();

        self.cancel_current_stream();
        self.transcript = messages;
        self.current_response.clear();
        self.view = ViewState::Active;
        Ok(())
    }

    /// Remove a saved conversation. When the removed snapshot matches the
    /// active transcript, the transcript is reset and the view returns to
    /// the starter state.
    pub fn delete_chat(&mut self, index: usize) -> Result<SavedConversation, HistoryError> {
        let removed = self.history.remove(index)?;

        if !self.transcript.is_empty() && removed.messages == self.transcript {
            self.cancel_current_stream();
            self.transcript.clear();
            self.current_response.clear();
            self.view = ViewState::Welcome;
        }

        Ok(removed)
    }

    /// Drop every saved conversation. The active transcript and view state
    /// are unaffected.
    pub fn clear_all_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat_stream::MAX_MESSAGE_CHARS;
    use crate::core::history::HISTORY_CAPACITY;
    use crate::utils::test_utils::create_test_session;

    fn finished_exchange(session: &mut ChatSession, question: &str, answer: &str) {
        let outbound = session
            .submit_user_message(question)
            .expect("message accepted");
        session.apply_chunk(answer, outbound.stream_id);
        session.finish_stream(outbound.stream_id);
    }

    #[test]
    fn submit_appends_user_and_placeholder() {
        let mut session = create_test_session();

        let outbound = session.submit_user_message("Hello").expect("accepted");

        assert_eq!(session.view_state(), ViewState::Active);
        assert!(session.is_streaming());
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[0].content, "Hello");
        assert!(session.transcript()[0].is_user());
        assert_eq!(session.transcript()[1].content, THINKING_PLACEHOLDER);
        assert!(session.transcript()[1].is_assistant());

        // First exchange carries no prior turns.
        assert!(outbound.prior.is_empty());
        assert_eq!(outbound.user_message, "Hello");
    }

    #[test]
    fn submit_trims_and_rejects_blank_input() {
        let mut session = create_test_session();

        assert!(session.submit_user_message("   ").is_none());
        assert!(session.submit_user_message("").is_none());
        assert!(session.transcript().is_empty());
        assert_eq!(session.view_state(), ViewState::Welcome);

        let outbound = session.submit_user_message("  spaced  ").unwrap();
        assert_eq!(outbound.user_message, "spaced");
        assert_eq!(session.transcript()[0].content, "spaced");
    }

    #[test]
    fn submit_is_rejected_while_streaming() {
        let mut session = create_test_session();

        session.submit_user_message("first").unwrap();
        assert!(session.is_streaming());
        assert!(session.submit_user_message("second").is_none());
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn chunks_accumulate_into_the_placeholder() {
        let mut session = create_test_session();
        let outbound = session.submit_user_message("Hello").unwrap();

        session.apply_chunk("Hi", outbound.stream_id);
        assert_eq!(session.transcript()[1].content, "Hi");

        session.apply_chunk(" there", outbound.stream_id);
        assert_eq!(session.transcript()[1].content, "Hi there");

        session.finish_stream(outbound.stream_id);
        assert!(!session.is_streaming());
        assert_eq!(session.transcript()[1].content, "Hi there");
    }

    #[test]
    fn stale_stream_chunks_are_dropped() {
        let mut session = create_test_session();
        let outbound = session.submit_user_message("Hello").unwrap();

        session.apply_chunk("kept", outbound.stream_id);
        session.apply_chunk("stale", outbound.stream_id - 1);
        session.finish_stream(outbound.stream_id - 1);

        assert!(session.is_streaming());
        assert_eq!(session.transcript()[1].content, "kept");
    }

    #[test]
    fn stream_error_replaces_the_response() {
        let mut session = create_test_session();
        let outbound = session.submit_user_message("Hello").unwrap();

        session.apply_chunk("partial", outbound.stream_id);
        session.apply_stream_error("API Error: quota exceeded", outbound.stream_id);
        session.finish_stream(outbound.stream_id);

        assert_eq!(session.transcript()[1].content, "API Error: quota exceeded");
        assert!(!session.is_streaming());
    }

    #[test]
    fn rejected_send_explains_in_the_placeholder() {
        let mut session = create_test_session();
        session.submit_user_message(&"x".repeat(MAX_MESSAGE_CHARS + 1)).unwrap();

        session.fail_send(&SendError::MessageTooLong {
            length: MAX_MESSAGE_CHARS + 1,
        });

        assert!(!session.is_streaming());
        assert!(session.transcript()[1]
            .content
            .contains("Message too long"));

        // The session stays usable for the next attempt.
        session.start_new_chat();
        assert!(session.submit_user_message("short one").is_some());
    }

    #[test]
    fn new_chat_archives_once() {
        let mut session = create_test_session();
        finished_exchange(&mut session, "A", "B");

        session.start_new_chat();
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.view_state(), ViewState::Welcome);
        assert!(session.transcript().is_empty());

        // A second new-chat with an empty transcript archives nothing.
        session.start_new_chat();
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn load_compensates_for_the_archive_shift() {
        let mut session = create_test_session();

        finished_exchange(&mut session, "first", "1");
        session.start_new_chat();
        finished_exchange(&mut session, "second", "2");
        session.start_new_chat();
        // history: [second, first]

        finished_exchange(&mut session, "third", "3");
        // Requested index 0 names "second"; the active transcript is
        // archived in front of it before the lookup.
        session.load_chat(0).unwrap();

        assert_eq!(session.history().len(), 3);
        assert_eq!(session.transcript()[0].content, "second");
        assert_eq!(session.view_state(), ViewState::Active);
    }

    #[test]
    fn load_of_an_already_saved_transcript_does_not_shift() {
        let mut session = create_test_session();

        finished_exchange(&mut session, "first", "1");
        session.start_new_chat();
        finished_exchange(&mut session, "second", "2");
        session.start_new_chat();

        // Load "first", then ask for "second" by its visible index. The
        // active transcript equals a saved entry, so no shift happens.
        session.load_chat(1).unwrap();
        assert_eq!(session.transcript()[0].content, "first");

        session.load_chat(0).unwrap();
        assert_eq!(session.transcript()[0].content, "second");
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn load_with_invalid_index_fails_loudly() {
        let mut session = create_test_session();
        finished_exchange(&mut session, "only", "1");
        session.start_new_chat();

        assert!(session.load_chat(5).is_err());
        // The failed load leaves the welcome state alone.
        assert_eq!(session.view_state(), ViewState::Welcome);
    }

    #[test]
    fn loaded_transcript_is_a_copy() {
        let mut session = create_test_session();
        finished_exchange(&mut session, "question", "answer");
        session.start_new_chat();

        session.load_chat(0).unwrap();
        finished_exchange(&mut session, "followup", "more");

        // The saved snapshot still holds the original two messages.
        assert_eq!(session.history().get(0).unwrap().messages.len(), 2);
        assert_eq!(session.transcript().len(), 4);
    }

    #[test]
    fn deleting_the_active_conversation_resets_the_view() {
        let mut session = create_test_session();
        finished_exchange(&mut session, "shared", "reply");
        session.start_new_chat();
        session.load_chat(0).unwrap();
        assert_eq!(session.view_state(), ViewState::Active);

        session.delete_chat(0).unwrap();

        assert!(session.transcript().is_empty());
        assert_eq!(session.view_state(), ViewState::Welcome);
        assert!(session.history().is_empty());
    }

    #[test]
    fn deleting_another_conversation_keeps_the_view() {
        let mut session = create_test_session();
        finished_exchange(&mut session, "old", "1");
        session.start_new_chat();
        finished_exchange(&mut session, "current", "2");

        session.delete_chat(0).unwrap();

        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.view_state(), ViewState::Active);
    }

    #[test]
    fn delete_with_invalid_index_changes_nothing() {
        let mut session = create_test_session();
        finished_exchange(&mut session, "kept", "1");
        session.start_new_chat();

        assert!(session.delete_chat(3).is_err());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn clear_history_keeps_the_active_transcript() {
        let mut session = create_test_session();
        finished_exchange(&mut session, "old", "1");
        session.start_new_chat();
        finished_exchange(&mut session, "current", "2");

        session.clear_all_history();

        assert!(session.history().is_empty());
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.view_state(), ViewState::Active);
    }

    #[test]
    fn history_stays_bounded_across_many_sessions() {
        let mut session = create_test_session();

        for i in 0..HISTORY_CAPACITY + 1 {
            finished_exchange(&mut session, &format!("chat {i}"), "ok");
            session.start_new_chat();
        }

        assert_eq!(session.history().len(), HISTORY_CAPACITY);
        assert_eq!(
            session.history().entries()[0].messages[0].content,
            format!("chat {HISTORY_CAPACITY}")
        );
    }

    #[test]
    fn prior_history_excludes_the_new_pair() {
        let mut session = create_test_session();
        finished_exchange(&mut session, "first", "reply");

        let outbound = session.submit_user_message("second").unwrap();

        // Prior turns are the finished exchange only.
        assert_eq!(outbound.prior.len(), 2);
        assert_eq!(outbound.prior[0].role, "user");
        assert_eq!(outbound.prior[0].parts[0].text, "first");
        assert_eq!(outbound.prior[1].role, "model");
        assert_eq!(outbound.prior[1].parts[0].text, "reply");
    }
}
