mod ids;
pub use ids::{ThreadId, WorkspaceId};

mod items;
pub use items::{
    ConversationItem, ItemKind, ItemOrigin, MessageRole, ReasoningField, ReviewState, ToolStatus,
};

mod threads;
pub use threads::{THREAD_NAME_MAX_CHARS, ThreadSummary, derive_thread_name};

mod status;
pub use status::ThreadStatus;

mod pins;
pub use pins::{PinIndex, PinRecord};

mod actions;
pub use actions::Action;

mod state;
pub use state::{LastAgentMessage, ThreadState};

mod reducer;
pub use reducer::reduce;

mod selectors;
pub use selectors::{
    COLLAPSED_THREAD_ROOTS, LatestAgentRun, PinnedThreadRow, ThreadRow, ThreadRows,
    latest_agent_runs, pinned_thread_rows, thread_activity_time, thread_rows,
};

mod usage;
pub use usage::{
    ModelUsage, SessionUsageTracker, TokenCounts, UsageDay, UsageLedger, UsageSummary,
    UsageTotals,
};
