//! Card action handling: payload validation, dispatch, and submission.
//!
//! A rendered card emits an [`ActionPayload`] when the user triggers a submit
//! control. [`ActionDispatcher::dispatch`] validates it into a typed
//! [`CardAction`] and answers with one [`ActionResult`]. Clients reach the
//! dispatcher either in-process or over HTTP through [`ActionSubmitter`].

pub mod client;
pub mod dispatcher;
pub mod inventory;
pub mod payload;
pub mod request;

pub use client::{ActionSubmitter, HttpActionClient, LocalActionClient, SubmitError};
pub use dispatcher::ActionDispatcher;
pub use payload::{ActionPayload, ActionResult, TodoItem, ACTION_KEY};
pub use request::{ActionError, CardAction};
