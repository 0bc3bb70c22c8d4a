use std::fmt;

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{Content, GenerateContentRequest, GenerateContentResponse, Part};
use crate::core::client::ChatClient;
use crate::utils::url::construct_api_url;

/// Maximum user message length accepted for a single send, in characters.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Clone, Debug)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

/// Pre-flight rejection of a send. Nothing is spawned and no network call is
/// issued when one of these is returned.
#[derive(Debug, PartialEq, Eq)]
pub enum SendError {
    MessageTooLong { length: usize },
    ClientUnavailable,
}

impl SendError {
    /// Text placed in the assistant slot when the send is rejected.
    pub fn user_message(&self) -> String {
        match self {
            SendError::MessageTooLong { .. } => {
                "Error: Message too long. Please keep messages under 10,000 characters."
                    .to_string()
            }
            SendError::ClientUnavailable => {
                "Error: Model not initialized. Please check your API key (set GEMINI_API_KEY) and restart."
                    .to_string()
            }
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::MessageTooLong { length } => {
                write!(
                    f,
                    "message of {length} characters exceeds the {MAX_MESSAGE_CHARS} character limit"
                )
            }
            SendError::ClientUnavailable => write!(f, "no completion client available"),
        }
    }
}

impl std::error::Error for SendError {}

pub(crate) fn exceeds_message_limit(text: &str) -> bool {
    text.chars().count() > MAX_MESSAGE_CHARS
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn chunk_text(response: &GenerateContentResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let content = candidate.content.as_ref()?;

    let mut text = String::new();
    for part in &content.parts {
        if let Some(fragment) = &part.text {
            text.push_str(fragment);
        }
    }

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn handle_data_payload(
    payload: &str,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) -> bool {
    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(response) => {
            if let Some(text) = chunk_text(&response) {
                let _ = tx.send((StreamMessage::Chunk(text), stream_id));
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }

            let formatted_error = format_api_error(payload);
            let _ = tx.send((StreamMessage::Error(formatted_error), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
            true
        }
    }
}

fn process_sse_line(
    line: &str,
    tx: &mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, stream_id))
        .unwrap_or(false)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                serde_json::Value::Object(map) => map
                    .get("status")
                    .and_then(|status| status.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Turn an upstream failure into the diagnostic text shown in place of the
/// assistant response.
fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    let summary = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| extract_error_summary(&value))
        .filter(|s| !s.is_empty());

    let cause = match summary {
        Some(summary) => summary,
        None if trimmed.is_empty() => "<no response body>".to_string(),
        None => trimmed.split_whitespace().collect::<Vec<_>>().join(" "),
    };

    format!(
        "API Error: {cause}\n\nPlease check:\n- Your internet connection\n- API key validity\n- Rate limits"
    )
}

pub struct StreamParams {
    pub client: ChatClient,
    pub contents: Vec<Content>,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub stream_id: u64,
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Validate the outbound message and spawn the streaming request.
    ///
    /// `prior` is the conversation so far; `user_message` becomes the final
    /// user turn of the request. On `Err` nothing was sent.
    pub fn send(
        &self,
        client: Option<&ChatClient>,
        prior: Vec<Content>,
        user_message: &str,
        cancel_token: tokio_util::sync::CancellationToken,
        stream_id: u64,
    ) -> Result<(), SendError> {
        if exceeds_message_limit(user_message) {
            return Err(SendError::MessageTooLong {
                length: user_message.chars().count(),
            });
        }

        let client = match client {
            Some(client) => client.clone(),
            None => return Err(SendError::ClientUnavailable),
        };

        let mut contents = prior;
        contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: user_message.to_string(),
            }],
        });

        self.spawn_stream(StreamParams {
            client,
            contents,
            cancel_token,
            stream_id,
        });
        Ok(())
    }

    fn spawn_stream(&self, params: StreamParams) {
        let tx_clone = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                contents,
                cancel_token,
                stream_id,
            } = params;

            let request = GenerateContentRequest { contents };

            tokio::select! {
                _ = async {
                    let chat_url = construct_api_url(
                        &client.base_url,
                        &format!("models/{}:streamGenerateContent", client.model),
                    );
                    debug!(stream_id, model = %client.model, "starting completion stream");

                    match client
                        .http
                        .post(chat_url)
                        .query(&[("alt", "sse")])
                        .header("Content-Type", "application/json")
                        .header("x-goog-api-key", &client.api_key)
                        .json(&request)
                        .send()
                        .await
                    {
                        Ok(response) => {
                            if !response.status().is_success() {
                                let error_text = response
                                    .text()
                                    .await
                                    .unwrap_or_else(|_| "<no body>".to_string());
                                let formatted_error = format_api_error(&error_text);
                                let _ = tx_clone
                                    .send((StreamMessage::Error(formatted_error), stream_id));
                                let _ = tx_clone.send((StreamMessage::End, stream_id));
                                return;
                            }

                            let mut stream = response.bytes_stream();
                            let mut buffer: Vec<u8> = Vec::new();

                            while let Some(chunk) = stream.next().await {
                                if cancel_token.is_cancelled() {
                                    return;
                                }

                                if let Ok(chunk_bytes) = chunk {
                                    buffer.extend_from_slice(&chunk_bytes);

                                    while let Some(newline_pos) = memchr(b'\n', &buffer) {
                                        let line_str = match std::str::from_utf8(&buffer[..newline_pos]) {
                                            Ok(s) => s.trim(),
                                            Err(e) => {
                                                debug!(stream_id, "invalid UTF-8 in stream: {}", e);
                                                buffer.drain(..=newline_pos);
                                                continue;
                                            }
                                        };

                                        let should_end = process_sse_line(
                                            line_str,
                                            &tx_clone,
                                            stream_id,
                                        );
                                        buffer.drain(..=newline_pos);
                                        if should_end {
                                            return;
                                        }
                                    }
                                }
                            }

                            let _ = tx_clone.send((StreamMessage::End, stream_id));
                        }
                        Err(e) => {
                            let formatted_error = format_api_error(&e.to_string());
                            let _ = tx_clone
                                .send((StreamMessage::Error(formatted_error), stream_id));
                            let _ = tx_clone.send((StreamMessage::End, stream_id));
                        }
                    }
                } => {}
                _ = cancel_token.cancelled() => {}
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}
