#![deny(unsafe_code)]

/// Conversation presenter and the contracts it renders through.
pub mod chat;
/// Settings persistence.
pub mod settings;
/// Line-oriented terminal front end.
pub mod terminal;
