//! cardchat is a terminal chat client in which the model can answer with
//! interactive Adaptive Cards.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`cards`] owns card documents: the builtin template catalog, extraction
//!   of card payloads from assistant text, and the rendering boundary.
//! - [`actions`] validates and dispatches the payloads card controls emit,
//!   and submits them in-process or over HTTP.
//! - [`core`] runs the conversation loop, streams model replies, relays card
//!   feedback between sessions, and loads configuration.
//! - [`server`] exposes the action dispatcher as an HTTP endpoint.
//! - [`api`] defines the chat completion payloads.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod actions;
pub mod api;
pub mod cards;
pub mod cli;
pub mod core;
pub mod logging;
pub mod server;
pub mod utils;
