//! In-memory session state: conversations, active pointer, transcript and
//! the pending flag.
//!
//! Reconciliation trusts the server: a full conversation list replaces local
//! state wholesale, so optimistic messages never end up duplicated.
//!
//! The session epoch changes whenever the user leaves the current context
//! (sign-out, switching or starting a conversation). A response captured
//! under an older epoch must not be applied.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::ids::ConversationId;
use crate::core::message::{Conversation, Message};
use crate::transport::types::ServerReply;

/// Notice appended to the transcript when the service cannot be reached.
pub const TRANSPORT_FAILURE_NOTICE: &str = "❌ Failed to connect to AI.";

/// Visible effect of a reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// Conversation list replaced; the first entry is now active.
    Replaced,
    /// Assistant reply appended to the active transcript.
    Appended,
    /// Service error to show outside the transcript.
    Notice(String),
    /// Nothing to apply.
    Nothing,
}

impl Reconciled {
    /// Whether the transcript may have gained an assistant message.
    #[must_use]
    pub const fn has_new_reply(&self) -> bool {
        matches!(self, Self::Replaced | Self::Appended)
    }
}

/// Serializable view of the session, for hosts that render it.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    /// Conversations, most recent first.
    pub conversations: Vec<Conversation>,
    /// Active conversation, `None` for a draft.
    pub active_id: Option<ConversationId>,
    /// Displayed transcript.
    pub transcript: Vec<Message>,
    /// Whether a send awaits its response.
    pub pending: bool,
}

/// Owner of the session state.
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active_id: Option<ConversationId>,
    transcript: Vec<Message>,
    pending: bool,
    epoch: u64,
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversations, most recent first.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Active conversation id, `None` while drafting.
    #[must_use]
    pub const fn active_id(&self) -> Option<&ConversationId> {
        self.active_id.as_ref()
    }

    /// Messages of the active (or draft) conversation.
    #[must_use]
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Whether a send awaits its response.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Current session epoch.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Most recent assistant message of the active transcript.
    #[must_use]
    pub fn latest_assistant_message(&self) -> Option<&Message> {
        self.transcript.iter().rev().find(|m| m.is_assistant())
    }

    /// Owned copy of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            conversations: self.conversations.clone(),
            active_id: self.active_id.clone(),
            transcript: self.transcript.clone(),
            pending: self.pending,
        }
    }

    /// Append a user message ahead of server confirmation.
    pub fn append_optimistic(&mut self, content: impl Into<String>) -> Message {
        let message = Message::user(content);
        self.transcript.push(message.clone());
        self.pending = true;
        debug!(
            active = ?self.active_id,
            len = self.transcript.len(),
            "Optimistic message appended"
        );
        message
    }

    /// Apply a service response.
    pub fn reconcile(&mut self, reply: ServerReply) -> Reconciled {
        self.pending = false;
        match reply {
            ServerReply::Conversations(list) => {
                if self.replace_all(list) {
                    Reconciled::Replaced
                } else {
                    Reconciled::Nothing
                }
            }
            ServerReply::Reply(text) => {
                self.transcript.push(Message::assistant(text));
                Reconciled::Appended
            }
            ServerReply::Error(notice) => Reconciled::Notice(notice),
            ServerReply::Empty => {
                warn!("Response carried no conversations, reply or error");
                Reconciled::Nothing
            }
        }
    }

    /// Record a failed exchange as a synthetic assistant notice.
    pub fn reconcile_failure(&mut self, reason: &str) -> Message {
        warn!(%reason, "Dispatch failed");
        let notice = Message::assistant(TRANSPORT_FAILURE_NOTICE);
        self.transcript.push(notice.clone());
        self.pending = false;
        notice
    }

    /// Install history fetched at session start.
    ///
    /// An empty history leaves no active conversation.
    pub fn load_history(&mut self, list: Vec<Conversation>) {
        if !self.replace_all(list) {
            self.conversations.clear();
            self.active_id = None;
            self.transcript.clear();
        }
    }

    /// Close out a dispatch whose caller went away before the response.
    ///
    /// Only applies while `epoch` is still current and a send is pending.
    /// Returns whether a failure notice was recorded.
    pub fn abandon_dispatch(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || !self.pending {
            return false;
        }
        self.reconcile_failure("send cancelled before a response arrived");
        true
    }

    /// Make `id` the active conversation. Returns `false` if unknown.
    ///
    /// A pending send is abandoned: its response will be discarded.
    pub fn select_conversation(&mut self, id: &ConversationId) -> bool {
        let Some(conversation) = self.conversations.iter().find(|c| &c.id == id) else {
            debug!(%id, "Ignoring selection of unknown conversation");
            return false;
        };
        self.transcript = conversation.messages.clone();
        self.active_id = Some(conversation.id.clone());
        self.next_epoch();
        true
    }

    /// Switch to an empty draft conversation, abandoning any pending send.
    pub fn start_new_conversation(&mut self) {
        self.active_id = None;
        self.transcript.clear();
        self.next_epoch();
    }

    /// Drop all state, e.g. on sign-out.
    ///
    /// The epoch keeps increasing so in-flight responses stay stale.
    pub fn reset(&mut self) {
        let epoch = self.epoch;
        *self = Self::default();
        self.epoch = epoch;
        self.next_epoch();
    }

    fn next_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.pending = false;
    }

    /// Replace the list wholesale and activate its first entry.
    /// Returns `false` and changes nothing if `list` is empty.
    ///
    /// Duplicate ids keep their first, most recent, occurrence.
    fn replace_all(&mut self, mut list: Vec<Conversation>) -> bool {
        let mut seen = HashSet::with_capacity(list.len());
        let before = list.len();
        list.retain(|c| seen.insert(c.id.clone()));
        if list.len() < before {
            warn!(dropped = before - list.len(), "Conversation list had duplicate ids");
        }

        let Some(first) = list.first() else {
            return false;
        };
        self.active_id = Some(first.id.clone());
        self.transcript = first.messages.clone();
        self.conversations = list;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;

    fn conversation(id: &str, messages: Vec<Message>) -> Conversation {
        Conversation {
            id: ConversationId::new(id),
            title: format!("title {id}"),
            created_at: None,
            messages,
        }
    }

    /// Invariant: an active id always names exactly one conversation.
    fn assert_active_invariant(store: &ConversationStore) {
        if let Some(id) = store.active_id() {
            let count = store.conversations().iter().filter(|c| &c.id == id).count();
            assert_eq!(count, 1, "active id {id} must match exactly one conversation");
        }
    }

    #[test]
    fn test_append_creates_draft() {
        let mut store = ConversationStore::new();
        let msg = store.append_optimistic("hi");
        assert_eq!(msg.role, Role::User);
        assert!(store.is_pending());
        assert!(store.active_id().is_none());
        assert_eq!(store.transcript(), &[Message::user("hi")]);
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn test_full_list_reconcile_does_not_duplicate() {
        let mut store = ConversationStore::new();
        store.append_optimistic("hi");
        let echoed = conversation("chat_0", vec![Message::user("hi"), Message::assistant("hello")]);

        let effect = store.reconcile(ServerReply::Conversations(vec![echoed]));

        assert_eq!(effect, Reconciled::Replaced);
        assert!(!store.is_pending());
        assert_eq!(store.active_id(), Some(&ConversationId::new("chat_0")));
        let users = store.transcript().iter().filter(|m| m.content == "hi").count();
        assert_eq!(users, 1);
        assert_eq!(store.transcript().len(), 2);
        assert_active_invariant(&store);
    }

    #[test]
    fn test_full_list_supersedes_unechoed_optimistic() {
        let mut store = ConversationStore::new();
        store.append_optimistic("lost");
        store.reconcile(ServerReply::Conversations(vec![conversation("chat_9", Vec::new())]));
        assert!(store.transcript().is_empty());
    }

    #[test]
    fn test_single_reply_on_empty_store() {
        let mut store = ConversationStore::new();
        store.append_optimistic("hey");
        let effect = store.reconcile(ServerReply::Reply("hello".to_string()));

        assert_eq!(effect, Reconciled::Appended);
        assert!(store.conversations().is_empty());
        assert!(store.active_id().is_none());
        assert_eq!(store.latest_assistant_message(), Some(&Message::assistant("hello")));
        assert!(!store.is_pending());
    }

    #[test]
    fn test_error_reply_leaves_transcript() {
        let mut store = ConversationStore::new();
        store.append_optimistic("hey");
        let effect = store.reconcile(ServerReply::Error("rate limited".to_string()));

        assert_eq!(effect, Reconciled::Notice("rate limited".to_string()));
        assert_eq!(store.transcript(), &[Message::user("hey")]);
        assert!(!store.is_pending());
    }

    #[test]
    fn test_empty_reply_only_clears_pending() {
        let mut store = ConversationStore::new();
        store.append_optimistic("hey");
        let before = store.transcript().to_vec();
        assert_eq!(store.reconcile(ServerReply::Empty), Reconciled::Nothing);
        assert_eq!(store.transcript(), before.as_slice());
        assert!(!store.is_pending());
    }

    #[test]
    fn test_failure_appends_one_notice() {
        let mut store = ConversationStore::new();
        store.load_history(vec![conversation("chat_0", Vec::new())]);
        store.append_optimistic("hey");
        store.reconcile_failure("connection refused");

        assert_eq!(store.conversations().len(), 1);
        assert!(!store.is_pending());
        let notices: Vec<_> = store.transcript().iter().filter(|m| m.is_assistant()).collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].content, TRANSPORT_FAILURE_NOTICE);
    }

    #[test]
    fn test_select_and_new() {
        let mut store = ConversationStore::new();
        store.load_history(vec![
            conversation("chat_1", vec![Message::user("b")]),
            conversation("chat_0", vec![Message::user("a")]),
        ]);
        assert_eq!(store.active_id(), Some(&ConversationId::new("chat_1")));

        assert!(store.select_conversation(&ConversationId::new("chat_0")));
        assert_eq!(store.transcript(), &[Message::user("a")]);
        assert!(!store.select_conversation(&ConversationId::new("missing")));
        assert_eq!(store.active_id(), Some(&ConversationId::new("chat_0")));
        assert_active_invariant(&store);

        store.start_new_conversation();
        assert!(store.active_id().is_none());
        assert!(store.transcript().is_empty());
        assert_eq!(store.conversations().len(), 2);
    }

    #[test]
    fn test_empty_history_and_reset() {
        let mut store = ConversationStore::new();
        store.load_history(vec![conversation("chat_0", vec![Message::user("a")])]);
        store.load_history(Vec::new());
        assert!(store.conversations().is_empty());
        assert!(store.active_id().is_none());

        store.append_optimistic("x");
        store.reset();
        assert!(!store.is_pending());
        assert!(store.transcript().is_empty());
    }

    #[test]
    fn test_duplicate_ids_keep_first_occurrence() {
        let mut store = ConversationStore::new();
        store.append_optimistic("hi");
        let effect = store.reconcile(ServerReply::Conversations(vec![
            conversation("chat_0", vec![Message::user("hi"), Message::assistant("new")]),
            conversation("chat_0", vec![Message::user("old")]),
            conversation("chat_1", Vec::new()),
        ]));

        assert_eq!(effect, Reconciled::Replaced);
        assert_eq!(store.conversations().len(), 2);
        assert_eq!(store.transcript().len(), 2);
        assert_active_invariant(&store);
    }

    #[test]
    fn test_context_changes_advance_epoch() {
        let mut store = ConversationStore::new();
        store.load_history(vec![conversation("chat_0", Vec::new())]);
        let start = store.epoch();

        store.append_optimistic("hi");
        store.start_new_conversation();
        assert!(!store.is_pending());
        assert!(store.epoch() > start);

        let after_new = store.epoch();
        assert!(store.select_conversation(&ConversationId::new("chat_0")));
        assert!(store.epoch() > after_new);

        let after_select = store.epoch();
        store.reset();
        assert!(store.epoch() > after_select);
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn test_abandon_dispatch_only_for_current_epoch() {
        let mut store = ConversationStore::new();
        store.append_optimistic("hi");
        let epoch = store.epoch();
        assert!(!store.abandon_dispatch(epoch + 1));
        assert!(store.is_pending());

        assert!(store.abandon_dispatch(epoch));
        assert!(!store.is_pending());
        assert_eq!(
            store.transcript(),
            &[Message::user("hi"), Message::assistant(TRANSPORT_FAILURE_NOTICE)]
        );
        assert!(!store.abandon_dispatch(epoch));
    }

    #[test]
    fn test_invariant_holds_across_operations() {
        let mut store = ConversationStore::new();
        let lists = [
            vec![conversation("chat_0", Vec::new())],
            vec![conversation("chat_1", Vec::new()), conversation("chat_0", Vec::new())],
        ];
        for list in lists {
            store.append_optimistic("m");
            store.reconcile(ServerReply::Conversations(list));
            assert_active_invariant(&store);
            store.select_conversation(&ConversationId::new("chat_0"));
            assert_active_invariant(&store);
            store.reconcile(ServerReply::Reply("r".to_string()));
            assert_active_invariant(&store);
            store.start_new_conversation();
            assert_active_invariant(&store);
        }
    }
}
