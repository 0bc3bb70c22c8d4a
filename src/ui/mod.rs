//! TUI-less console front-end.
//!
//! Presents the welcome view with starter prompts, the history panel, and a
//! read-eval loop that forwards everything to the session controller. All
//! conversation state lives in [`ChatSession`]; this layer only renders it.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::chat_stream::{ChatStreamService, StreamMessage};
use crate::core::client::ChatClient;
use crate::core::session::{ChatSession, ViewState};

/// How many saved conversations the history panel shows. The store behind it
/// holds more; older entries become visible as newer ones are deleted.
pub const VISIBLE_HISTORY: usize = 10;

/// Canned prompts offered on the welcome view. Submitting one behaves
/// exactly like typing it.
pub const STARTER_PROMPTS: &[&str] = &[
    "Explain quantum computing in simple terms",
    "Got any creative ideas for a 10 year old's birthday?",
    "How do I make an HTTP request in JavaScript?",
    "Write a poem about artificial intelligence",
];

pub async fn run_chat(
    client: Option<ChatClient>,
    mut session: ChatSession,
) -> Result<(), Box<dyn Error>> {
    let (stream_service, mut rx) = ChatStreamService::new();

    print_welcome(&session);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            if !handle_command(command, &mut session) {
                break;
            }
            continue;
        }

        let text = resolve_starter_prompt(&session, input);

        let Some(outbound) = session.submit_user_message(&text) else {
            continue;
        };
        println!("You: {}", outbound.user_message);

        match stream_service.send(
            client.as_ref(),
            outbound.prior,
            &outbound.user_message,
            outbound.cancel_token.clone(),
            outbound.stream_id,
        ) {
            Ok(()) => drain_stream(&mut session, &mut rx, outbound.stream_id).await?,
            Err(err) => {
                session.fail_send(&err);
                if let Some(last) = session.transcript().last() {
                    println!("{}", last.content);
                }
            }
        }
    }

    Ok(())
}

/// On the welcome view a bare number picks the matching starter prompt.
fn resolve_starter_prompt(session: &ChatSession, input: &str) -> String {
    if session.view_state() == ViewState::Welcome {
        if let Ok(n) = input.parse::<usize>() {
            if (1..=STARTER_PROMPTS.len()).contains(&n) {
                return STARTER_PROMPTS[n - 1].to_string();
            }
        }
    }
    input.to_string()
}

async fn drain_stream(
    session: &mut ChatSession,
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    stream_id: u64,
) -> Result<(), Box<dyn Error>> {
    loop {
        match rx.recv().await {
            Some((StreamMessage::Chunk(content), id)) => {
                session.apply_chunk(&content, id);
                if id == stream_id {
                    print!("{content}");
                    io::stdout().flush()?;
                }
            }
            Some((StreamMessage::Error(text), id)) => {
                session.apply_stream_error(&text, id);
                if id == stream_id {
                    println!();
                    println!("{text}");
                }
            }
            Some((StreamMessage::End, id)) => {
                session.finish_stream(id);
                if id == stream_id {
                    println!();
                    break;
                }
            }
            None => break,
        }
    }

    Ok(())
}

/// Returns false when the loop should exit.
fn handle_command(command: &str, session: &mut ChatSession) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("new") => {
            session.start_new_chat();
            print_welcome(session);
        }
        Some("history") => print_history(session),
        Some("load") => match parse_index(parts.next()) {
            Some(index) => match session.load_chat(index) {
                Ok(()) => print_transcript(session),
                Err(e) => println!("{e}"),
            },
            None => println!("Usage: /load <number>"),
        },
        Some("delete") => match parse_index(parts.next()) {
            Some(index) => match session.delete_chat(index) {
                Ok(removed) => {
                    println!("Deleted: {}", removed.title);
                    if session.view_state() == ViewState::Welcome {
                        print_welcome(session);
                    }
                }
                Err(e) => println!("{e}"),
            },
            None => println!("Usage: /delete <number>"),
        },
        Some("clear") => {
            session.clear_all_history();
            println!("All chat history cleared.");
        }
        Some("help") => print_help(),
        Some("quit") | Some("exit") => return false,
        _ => println!("Unknown command. Type /help for the command list."),
    }
    true
}

/// History panel entries are numbered from 1; the store counts from 0.
fn parse_index(arg: Option<&str>) -> Option<usize> {
    arg.and_then(|s| s.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
}

fn print_welcome(session: &ChatSession) {
    println!();
    println!("Welcome to Parley");
    println!("Choose a starter prompt below or type your own message.");
    println!();
    for (i, prompt) in STARTER_PROMPTS.iter().enumerate() {
        println!("  {}) {prompt}", i + 1);
    }
    println!();
    if !session.history().is_empty() {
        print_history(session);
    }
    println!("Type /help for commands.");
}

fn print_history(session: &ChatSession) {
    let entries = session.history().entries();
    if entries.is_empty() {
        println!("No saved chats yet.");
        return;
    }

    println!("Chat history:");
    for (i, entry) in entries.iter().take(VISIBLE_HISTORY).enumerate() {
        println!("  {}) {}", i + 1, entry.title);
    }
    println!();
}

fn print_transcript(session: &ChatSession) {
    println!();
    for msg in session.transcript() {
        if msg.is_user() {
            println!("You: {}", msg.content);
        } else {
            println!("{}", msg.content);
        }
        println!();
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /new           Start a new chat (saves the current one)");
    println!("  /history       Show saved chats");
    println!("  /load <n>      Load a saved chat");
    println!("  /delete <n>    Delete a saved chat");
    println!("  /clear         Delete all saved chats");
    println!("  /quit          Exit");
    println!();
    println!("On the welcome view, a bare number picks a starter prompt.");
}
