pub mod chat_stream;
pub mod client;
pub mod config;
pub mod credentials;
pub mod history;
pub mod message;
pub mod session;
