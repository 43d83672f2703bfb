//! User intents: sending messages, switching conversations and adjusting
//! narration preferences.

pub mod dispatcher;

pub use dispatcher::{DispatchOutcome, MessageDispatcher, NarrationSettings};
