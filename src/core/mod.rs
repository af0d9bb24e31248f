pub mod chat_stream;
pub mod config;
pub mod conversation;
pub mod events;
pub mod message;
pub mod system_prompt;
