//! Parley is a console chatbot front-end for streaming Gemini conversations.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session/history state machine and streaming
//!   orchestration: the active transcript, the saved-conversation history,
//!   and the service that drives one completion stream at a time.
//! - [`api`] defines the wire payloads and the model listing used by the
//!   completion client.
//! - [`ui`] runs the console front-end that renders the welcome view, the
//!   history panel, and streamed responses.
//! - [`cli`] parses arguments and bootstraps credentials, model selection,
//!   and the session.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
