use crate::{ConversationItem, ThreadId, ThreadSummary, WorkspaceId};

#[derive(Clone, Debug)]
pub enum Action {
    EnsureThread {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
    },
    SetActiveThread {
        workspace_id: WorkspaceId,
        thread_id: Option<ThreadId>,
    },
    SetThreads {
        workspace_id: WorkspaceId,
        threads: Vec<ThreadSummary>,
    },
    RenameThread {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
        name: String,
    },
    SetThreadParent {
        thread_id: ThreadId,
        parent_id: ThreadId,
    },
    SetThreadTimestamp {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
        timestamp: u64,
    },
    DeleteThread {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
    },

    AddUserMessage {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
        text: String,
        has_custom_name: bool,
        timestamp: u64,
    },
    AppendAgentDelta {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
        item_id: String,
        delta: String,
        has_custom_name: bool,
    },
    CompleteAgentMessage {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
        item_id: String,
        text: String,
        has_custom_name: bool,
        timestamp: u64,
    },
    AppendReasoningSummary {
        thread_id: ThreadId,
        item_id: String,
        delta: String,
    },
    AppendReasoningContent {
        thread_id: ThreadId,
        item_id: String,
        delta: String,
    },
    AppendToolOutput {
        thread_id: ThreadId,
        item_id: String,
        delta: String,
    },
    UpsertItem {
        thread_id: ThreadId,
        item: ConversationItem,
    },
    SetThreadItems {
        thread_id: ThreadId,
        items: Vec<ConversationItem>,
    },
    SetLastAgentMessage {
        thread_id: ThreadId,
        text: String,
        timestamp: u64,
    },

    MarkProcessing {
        thread_id: ThreadId,
        is_processing: bool,
        timestamp: u64,
    },
    MarkReviewing {
        thread_id: ThreadId,
        is_reviewing: bool,
    },
    MarkUnread {
        thread_id: ThreadId,
        has_unread: bool,
    },

    PinThread {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
        timestamp: u64,
    },
    UnpinThread {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::EnsureThread { .. } => "ensure_thread",
            Action::SetActiveThread { .. } => "set_active_thread",
            Action::SetThreads { .. } => "set_threads",
            Action::RenameThread { .. } => "rename_thread",
            Action::SetThreadParent { .. } => "set_thread_parent",
            Action::SetThreadTimestamp { .. } => "set_thread_timestamp",
            Action::DeleteThread { .. } => "delete_thread",
            Action::AddUserMessage { .. } => "add_user_message",
            Action::AppendAgentDelta { .. } => "append_agent_delta",
            Action::CompleteAgentMessage { .. } => "complete_agent_message",
            Action::AppendReasoningSummary { .. } => "append_reasoning_summary",
            Action::AppendReasoningContent { .. } => "append_reasoning_content",
            Action::AppendToolOutput { .. } => "append_tool_output",
            Action::UpsertItem { .. } => "upsert_item",
            Action::SetThreadItems { .. } => "set_thread_items",
            Action::SetLastAgentMessage { .. } => "set_last_agent_message",
            Action::MarkProcessing { .. } => "mark_processing",
            Action::MarkReviewing { .. } => "mark_reviewing",
            Action::MarkUnread { .. } => "mark_unread",
            Action::PinThread { .. } => "pin_thread",
            Action::UnpinThread { .. } => "unpin_thread",
        }
    }

    /// The thread an action targets, used for log fields by the engine.
    pub fn thread_id(&self) -> Option<&ThreadId> {
        match self {
            Action::SetThreads { .. } => None,
            Action::SetActiveThread { thread_id, .. } => thread_id.as_ref(),
            Action::EnsureThread { thread_id, .. }
            | Action::RenameThread { thread_id, .. }
            | Action::SetThreadParent { thread_id, .. }
            | Action::SetThreadTimestamp { thread_id, .. }
            | Action::DeleteThread { thread_id, .. }
            | Action::AddUserMessage { thread_id, .. }
            | Action::AppendAgentDelta { thread_id, .. }
            | Action::CompleteAgentMessage { thread_id, .. }
            | Action::AppendReasoningSummary { thread_id, .. }
            | Action::AppendReasoningContent { thread_id, .. }
            | Action::AppendToolOutput { thread_id, .. }
            | Action::UpsertItem { thread_id, .. }
            | Action::SetThreadItems { thread_id, .. }
            | Action::SetLastAgentMessage { thread_id, .. }
            | Action::MarkProcessing { thread_id, .. }
            | Action::MarkReviewing { thread_id, .. }
            | Action::MarkUnread { thread_id, .. }
            | Action::PinThread { thread_id, .. }
            | Action::UnpinThread { thread_id, .. } => Some(thread_id),
        }
    }
}
