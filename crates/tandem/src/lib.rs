//! Tandem backend library.
//!
//! Two-party shared chat rooms with an AI mediator: room lifecycle, an
//! append-only transcript store, streamed completions, and push/poll
//! delivery of remote inserts.

pub mod api;
pub mod chat;
pub mod completion;
pub mod coordinator;
pub mod db;
pub mod notify;
pub mod room;
pub mod settings;
