use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// Review items whose id carries this prefix and no explicit origin are optimistic
/// placeholders created by the client.
pub const LOCAL_REVIEW_START_PREFIX: &str = "review-start-";

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub String);

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummarySnapshot {
    pub id: ThreadId,
    pub name: String,
    #[serde(default)]
    pub updated_at: u64,
    #[serde(default)]
    pub has_custom_name: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Started,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSource {
    Local,
    Remote,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ItemOriginSnapshot {
    pub source: ItemSource,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationItemSnapshot {
    Message {
        id: String,
        role: MessageRole,
        text: String,
    },
    Reasoning {
        id: String,
        #[serde(default)]
        summary: String,
        #[serde(default)]
        content: String,
    },
    Tool {
        id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        detail: String,
        status: ToolStatus,
        #[serde(default)]
        output: String,
    },
    Review {
        id: String,
        state: ReviewState,
        #[serde(default)]
        text: String,
        #[serde(default)]
        origin: Option<ItemOriginSnapshot>,
    },
    Diff {
        id: String,
        #[serde(default)]
        title: String,
        diff: String,
        status: ToolStatus,
    },
}

impl ConversationItemSnapshot {
    pub fn id(&self) -> &str {
        match self {
            ConversationItemSnapshot::Message { id, .. }
            | ConversationItemSnapshot::Reasoning { id, .. }
            | ConversationItemSnapshot::Tool { id, .. }
            | ConversationItemSnapshot::Review { id, .. }
            | ConversationItemSnapshot::Diff { id, .. } => id,
        }
    }

    /// The origin a review item should carry. Producers that predate explicit origins mark
    /// local placeholders only through the id prefix.
    pub fn effective_origin(&self) -> Option<ItemOriginSnapshot> {
        match self {
            ConversationItemSnapshot::Review {
                origin: Some(origin),
                ..
            } => Some(origin.clone()),
            ConversationItemSnapshot::Review { id, .. } => Some(ItemOriginSnapshot {
                source: if id.starts_with(LOCAL_REVIEW_START_PREFIX) {
                    ItemSource::Local
                } else {
                    ItemSource::Remote
                },
                correlation_id: None,
            }),
            _ => None,
        }
    }
}

/// One event from a producer. Timestamps left out are stamped by the engine at dispatch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    EnsureThread {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
    },
    SetActiveThread {
        workspace_id: WorkspaceId,
        #[serde(default)]
        thread_id: Option<ThreadId>,
    },
    SetThreads {
        workspace_id: WorkspaceId,
        threads: Vec<ThreadSummarySnapshot>,
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
        #[serde(default)]
        has_custom_name: bool,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    AppendAgentDelta {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
        item_id: String,
        delta: String,
        #[serde(default)]
        has_custom_name: bool,
    },
    CompleteAgentMessage {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
        item_id: String,
        text: String,
        #[serde(default)]
        has_custom_name: bool,
        #[serde(default)]
        timestamp: Option<u64>,
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
        item: ConversationItemSnapshot,
    },
    SetThreadItems {
        thread_id: ThreadId,
        items: Vec<ConversationItemSnapshot>,
    },
    SetLastAgentMessage {
        thread_id: ThreadId,
        text: String,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    MarkProcessing {
        thread_id: ThreadId,
        is_processing: bool,
        #[serde(default)]
        timestamp: Option<u64>,
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
    },
    UnpinThread {
        workspace_id: WorkspaceId,
        thread_id: ThreadId,
    },
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ThreadStatusSnapshot {
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default)]
    pub has_unread: bool,
    #[serde(default)]
    pub is_reviewing: bool,
    #[serde(default)]
    pub processing_started_at: Option<u64>,
    #[serde(default)]
    pub last_duration_ms: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ThreadRowSnapshot {
    pub thread: ThreadSummarySnapshot,
    pub depth: usize,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub activity_at: Option<u64>,
    #[serde(default)]
    pub status: ThreadStatusSnapshot,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceThreadsSnapshot {
    pub workspace_id: WorkspaceId,
    #[serde(default)]
    pub active_thread_id: Option<ThreadId>,
    pub rows: Vec<ThreadRowSnapshot>,
    /// Unpinned roots before the collapsed view truncates them.
    pub total_roots: usize,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PinnedThreadSnapshot {
    pub workspace_id: WorkspaceId,
    pub thread: ThreadSummarySnapshot,
    pub depth: usize,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AgentRunSnapshot {
    pub workspace_id: WorkspaceId,
    pub thread_id: ThreadId,
    pub message: String,
    pub timestamp: u64,
    pub is_processing: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LastAgentMessageSnapshot {
    pub text: String,
    pub timestamp: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub rev: u64,
    pub thread_id: ThreadId,
    pub items: Vec<ConversationItemSnapshot>,
    #[serde(default)]
    pub status: ThreadStatusSnapshot,
    #[serde(default)]
    pub last_agent_message: Option<LastAgentMessageSnapshot>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AppSnapshot {
    pub rev: u64,
    pub workspaces: Vec<WorkspaceThreadsSnapshot>,
    #[serde(default)]
    pub pinned: Vec<PinnedThreadSnapshot>,
    #[serde(default)]
    pub latest_runs: Vec<AgentRunSnapshot>,
}
