//! Conversation state management.
//!
//! This module owns the local copy of the chat history and applies
//! optimistic updates and server reconciliation to it.

pub mod store;

pub use store::{ConversationStore, Reconciled, SessionSnapshot, TRANSPORT_FAILURE_NOTICE};
