use crate::{ConversationItem, PinIndex, ThreadId, ThreadStatus, ThreadSummary, WorkspaceId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LastAgentMessage {
    pub text: String,
    pub timestamp: u64,
}

/// The assistant item a thread's auto-derived name came from, and the name it produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct AutoName {
    pub(crate) item_id: String,
    pub(crate) name: String,
}

/// One immutable snapshot of every workspace's threads.
///
/// Each store sits behind an `Arc` and is updated copy-on-write, so a snapshot produced by
/// [`crate::reduce`] shares every store (and every thread's item list) it did not touch with
/// its predecessor. Consumers can compare stores with `Arc::ptr_eq` to skip recomputation.
#[derive(Clone, Debug, Default)]
pub struct ThreadState {
    pub(crate) active_thread_by_workspace: Arc<HashMap<WorkspaceId, ThreadId>>,
    pub(crate) threads_by_workspace: Arc<HashMap<WorkspaceId, Arc<Vec<ThreadSummary>>>>,
    pub(crate) thread_parents: Arc<HashMap<ThreadId, ThreadId>>,
    pub(crate) items_by_thread: Arc<HashMap<ThreadId, Arc<Vec<ConversationItem>>>>,
    pub(crate) status_by_thread: Arc<HashMap<ThreadId, ThreadStatus>>,
    pub(crate) last_agent_message_by_thread: Arc<HashMap<ThreadId, LastAgentMessage>>,
    pub(crate) pins: PinIndex,
    pub(crate) auto_named_from: Arc<HashMap<ThreadId, AutoName>>,
    /// Threads removed by `DeleteThread`. Late events for them are dropped until the thread is
    /// ensured or listed again.
    pub(crate) deleted_threads: Arc<HashSet<ThreadId>>,
}

impl ThreadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from pins restored by the persistence layer.
    pub fn with_pins(pins: PinIndex) -> Self {
        Self {
            pins,
            ..Self::default()
        }
    }

    /// Workspace ids with a thread listing, sorted for stable iteration.
    pub fn workspace_ids(&self) -> Vec<&WorkspaceId> {
        let mut ids: Vec<&WorkspaceId> = self.threads_by_workspace.keys().collect();
        ids.sort();
        ids
    }

    pub fn threads(&self, workspace_id: &WorkspaceId) -> &[ThreadSummary] {
        self.threads_by_workspace
            .get(workspace_id)
            .map(|threads| threads.as_slice())
            .unwrap_or(&[])
    }

    pub fn thread(&self, workspace_id: &WorkspaceId, thread_id: &ThreadId) -> Option<&ThreadSummary> {
        self.threads(workspace_id).iter().find(|t| &t.id == thread_id)
    }

    pub fn active_thread_id(&self, workspace_id: &WorkspaceId) -> Option<&ThreadId> {
        self.active_thread_by_workspace.get(workspace_id)
    }

    pub fn items(&self, thread_id: &ThreadId) -> &[ConversationItem] {
        self.items_by_thread
            .get(thread_id)
            .map(|items| items.as_slice())
            .unwrap_or(&[])
    }

    /// The shared item list of a thread, for identity comparison between snapshots.
    pub fn items_shared(&self, thread_id: &ThreadId) -> Option<&Arc<Vec<ConversationItem>>> {
        self.items_by_thread.get(thread_id)
    }

    pub fn status(&self, thread_id: &ThreadId) -> Option<&ThreadStatus> {
        self.status_by_thread.get(thread_id)
    }

    pub fn thread_parents(&self) -> &HashMap<ThreadId, ThreadId> {
        &self.thread_parents
    }

    pub fn last_agent_message(&self, thread_id: &ThreadId) -> Option<&LastAgentMessage> {
        self.last_agent_message_by_thread.get(thread_id)
    }

    pub fn pins(&self) -> &PinIndex {
        &self.pins
    }

    pub fn is_deleted(&self, thread_id: &ThreadId) -> bool {
        self.deleted_threads.contains(thread_id)
    }
}
