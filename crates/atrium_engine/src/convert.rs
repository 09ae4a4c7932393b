use atrium_api::{
    AgentRunSnapshot, AppSnapshot, ConversationItemSnapshot, ConversationSnapshot, InboundEvent,
    ItemOriginSnapshot, ItemSource, LastAgentMessageSnapshot, PinnedThreadSnapshot,
    ThreadRowSnapshot, ThreadStatusSnapshot, ThreadSummarySnapshot, WorkspaceThreadsSnapshot,
};
use atrium_domain::{
    Action, ConversationItem, ItemOrigin, MessageRole, ReviewState, ThreadId, ThreadState,
    ThreadStatus, ThreadSummary, ToolStatus, WorkspaceId, latest_agent_runs, pinned_thread_rows,
    thread_activity_time, thread_rows,
};

const LATEST_RUNS_LIMIT: usize = 8;

fn workspace_id(id: atrium_api::WorkspaceId) -> WorkspaceId {
    WorkspaceId::new(id.0)
}

fn thread_id(id: atrium_api::ThreadId) -> ThreadId {
    ThreadId::new(id.0)
}

fn api_workspace_id(id: &WorkspaceId) -> atrium_api::WorkspaceId {
    atrium_api::WorkspaceId(id.as_str().to_owned())
}

fn api_thread_id(id: &ThreadId) -> atrium_api::ThreadId {
    atrium_api::ThreadId(id.as_str().to_owned())
}

/// Maps a wire event to a reducer action, stamping `now` wherever the producer left the
/// time out. Pins always take `now`.
pub fn action_from_event(event: InboundEvent, now: u64) -> Action {
    match event {
        InboundEvent::EnsureThread {
            workspace_id: w,
            thread_id: t,
        } => Action::EnsureThread {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
        },
        InboundEvent::SetActiveThread {
            workspace_id: w,
            thread_id: t,
        } => Action::SetActiveThread {
            workspace_id: workspace_id(w),
            thread_id: t.map(thread_id),
        },
        InboundEvent::SetThreads {
            workspace_id: w,
            threads,
        } => Action::SetThreads {
            workspace_id: workspace_id(w),
            threads: threads.into_iter().map(map_thread_summary).collect(),
        },
        InboundEvent::RenameThread {
            workspace_id: w,
            thread_id: t,
            name,
        } => Action::RenameThread {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
            name,
        },
        InboundEvent::SetThreadParent {
            thread_id: t,
            parent_id,
        } => Action::SetThreadParent {
            thread_id: thread_id(t),
            parent_id: thread_id(parent_id),
        },
        InboundEvent::SetThreadTimestamp {
            workspace_id: w,
            thread_id: t,
            timestamp,
        } => Action::SetThreadTimestamp {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
            timestamp,
        },
        InboundEvent::DeleteThread {
            workspace_id: w,
            thread_id: t,
        } => Action::DeleteThread {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
        },
        InboundEvent::AddUserMessage {
            workspace_id: w,
            thread_id: t,
            text,
            has_custom_name,
            timestamp,
        } => Action::AddUserMessage {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
            text,
            has_custom_name,
            timestamp: timestamp.unwrap_or(now),
        },
        InboundEvent::AppendAgentDelta {
            workspace_id: w,
            thread_id: t,
            item_id,
            delta,
            has_custom_name,
        } => Action::AppendAgentDelta {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
            item_id,
            delta,
            has_custom_name,
        },
        InboundEvent::CompleteAgentMessage {
            workspace_id: w,
            thread_id: t,
            item_id,
            text,
            has_custom_name,
            timestamp,
        } => Action::CompleteAgentMessage {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
            item_id,
            text,
            has_custom_name,
            timestamp: timestamp.unwrap_or(now),
        },
        InboundEvent::AppendReasoningSummary {
            thread_id: t,
            item_id,
            delta,
        } => Action::AppendReasoningSummary {
            thread_id: thread_id(t),
            item_id,
            delta,
        },
        InboundEvent::AppendReasoningContent {
            thread_id: t,
            item_id,
            delta,
        } => Action::AppendReasoningContent {
            thread_id: thread_id(t),
            item_id,
            delta,
        },
        InboundEvent::AppendToolOutput {
            thread_id: t,
            item_id,
            delta,
        } => Action::AppendToolOutput {
            thread_id: thread_id(t),
            item_id,
            delta,
        },
        InboundEvent::UpsertItem { thread_id: t, item } => Action::UpsertItem {
            thread_id: thread_id(t),
            item: map_item(item),
        },
        InboundEvent::SetThreadItems {
            thread_id: t,
            items,
        } => Action::SetThreadItems {
            thread_id: thread_id(t),
            items: items.into_iter().map(map_item).collect(),
        },
        InboundEvent::SetLastAgentMessage {
            thread_id: t,
            text,
            timestamp,
        } => Action::SetLastAgentMessage {
            thread_id: thread_id(t),
            text,
            timestamp: timestamp.unwrap_or(now),
        },
        InboundEvent::MarkProcessing {
            thread_id: t,
            is_processing,
            timestamp,
        } => Action::MarkProcessing {
            thread_id: thread_id(t),
            is_processing,
            timestamp: timestamp.unwrap_or(now),
        },
        InboundEvent::MarkReviewing {
            thread_id: t,
            is_reviewing,
        } => Action::MarkReviewing {
            thread_id: thread_id(t),
            is_reviewing,
        },
        InboundEvent::MarkUnread {
            thread_id: t,
            has_unread,
        } => Action::MarkUnread {
            thread_id: thread_id(t),
            has_unread,
        },
        InboundEvent::PinThread {
            workspace_id: w,
            thread_id: t,
        } => Action::PinThread {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
            timestamp: now,
        },
        InboundEvent::UnpinThread {
            workspace_id: w,
            thread_id: t,
        } => Action::UnpinThread {
            workspace_id: workspace_id(w),
            thread_id: thread_id(t),
        },
    }
}

fn map_thread_summary(summary: ThreadSummarySnapshot) -> ThreadSummary {
    ThreadSummary {
        id: thread_id(summary.id),
        name: summary.name,
        updated_at: summary.updated_at,
        has_custom_name: summary.has_custom_name,
    }
}

fn map_role(role: atrium_api::MessageRole) -> MessageRole {
    match role {
        atrium_api::MessageRole::User => MessageRole::User,
        atrium_api::MessageRole::Assistant => MessageRole::Assistant,
    }
}

fn map_tool_status(status: atrium_api::ToolStatus) -> ToolStatus {
    match status {
        atrium_api::ToolStatus::InProgress => ToolStatus::InProgress,
        atrium_api::ToolStatus::Completed => ToolStatus::Completed,
        atrium_api::ToolStatus::Failed => ToolStatus::Failed,
    }
}

fn map_review_state(state: atrium_api::ReviewState) -> ReviewState {
    match state {
        atrium_api::ReviewState::Started => ReviewState::Started,
        atrium_api::ReviewState::Completed => ReviewState::Completed,
        atrium_api::ReviewState::Failed => ReviewState::Failed,
    }
}

fn map_origin(origin: ItemOriginSnapshot) -> ItemOrigin {
    match origin.source {
        ItemSource::Local => ItemOrigin::Local {
            correlation_id: origin.correlation_id,
        },
        ItemSource::Remote => ItemOrigin::Remote {
            correlation_id: origin.correlation_id,
        },
    }
}

fn map_item(item: ConversationItemSnapshot) -> ConversationItem {
    let origin = item.effective_origin();
    match item {
        ConversationItemSnapshot::Message { id, role, text } => ConversationItem::Message {
            id,
            role: map_role(role),
            text,
        },
        ConversationItemSnapshot::Reasoning {
            id,
            summary,
            content,
        } => ConversationItem::Reasoning {
            id,
            summary,
            content,
        },
        ConversationItemSnapshot::Tool {
            id,
            title,
            detail,
            status,
            output,
        } => ConversationItem::Tool {
            id,
            title,
            detail,
            status: map_tool_status(status),
            output,
        },
        ConversationItemSnapshot::Review { id, state, text, .. } => ConversationItem::Review {
            id,
            state: map_review_state(state),
            text,
            origin: origin.map(map_origin).unwrap_or_default(),
        },
        ConversationItemSnapshot::Diff {
            id,
            title,
            diff,
            status,
        } => ConversationItem::Diff {
            id,
            title,
            diff,
            status: map_tool_status(status),
        },
    }
}

fn api_thread_summary(summary: &ThreadSummary) -> ThreadSummarySnapshot {
    ThreadSummarySnapshot {
        id: api_thread_id(&summary.id),
        name: summary.name.clone(),
        updated_at: summary.updated_at,
        has_custom_name: summary.has_custom_name,
    }
}

fn api_status(status: Option<&ThreadStatus>) -> ThreadStatusSnapshot {
    let Some(status) = status else {
        return ThreadStatusSnapshot::default();
    };
    ThreadStatusSnapshot {
        is_processing: status.is_processing,
        has_unread: status.has_unread,
        is_reviewing: status.is_reviewing,
        processing_started_at: status.processing_started_at,
        last_duration_ms: status.last_duration_ms,
    }
}

fn api_item(item: &ConversationItem) -> ConversationItemSnapshot {
    match item {
        ConversationItem::Message { id, role, text } => ConversationItemSnapshot::Message {
            id: id.clone(),
            role: match role {
                MessageRole::User => atrium_api::MessageRole::User,
                MessageRole::Assistant => atrium_api::MessageRole::Assistant,
            },
            text: text.clone(),
        },
        ConversationItem::Reasoning {
            id,
            summary,
            content,
        } => ConversationItemSnapshot::Reasoning {
            id: id.clone(),
            summary: summary.clone(),
            content: content.clone(),
        },
        ConversationItem::Tool {
            id,
            title,
            detail,
            status,
            output,
        } => ConversationItemSnapshot::Tool {
            id: id.clone(),
            title: title.clone(),
            detail: detail.clone(),
            status: api_tool_status(*status),
            output: output.clone(),
        },
        ConversationItem::Review {
            id,
            state,
            text,
            origin,
        } => ConversationItemSnapshot::Review {
            id: id.clone(),
            state: match state {
                ReviewState::Started => atrium_api::ReviewState::Started,
                ReviewState::Completed => atrium_api::ReviewState::Completed,
                ReviewState::Failed => atrium_api::ReviewState::Failed,
            },
            text: text.clone(),
            origin: Some(ItemOriginSnapshot {
                source: if origin.is_local() {
                    ItemSource::Local
                } else {
                    ItemSource::Remote
                },
                correlation_id: origin.correlation_id().map(str::to_owned),
            }),
        },
        ConversationItem::Diff {
            id,
            title,
            diff,
            status,
        } => ConversationItemSnapshot::Diff {
            id: id.clone(),
            title: title.clone(),
            diff: diff.clone(),
            status: api_tool_status(*status),
        },
    }
}

fn api_tool_status(status: ToolStatus) -> atrium_api::ToolStatus {
    match status {
        ToolStatus::InProgress => atrium_api::ToolStatus::InProgress,
        ToolStatus::Completed => atrium_api::ToolStatus::Completed,
        ToolStatus::Failed => atrium_api::ToolStatus::Failed,
    }
}

/// Builds the sidebar view of every workspace. Unpinned roots are truncated unless
/// `expanded`.
pub fn app_snapshot(state: &ThreadState, rev: u64, expanded: bool) -> AppSnapshot {
    let workspace_ids = state.workspace_ids();
    let lookup = state.pins().lookup();

    let workspaces = workspace_ids
        .iter()
        .map(|&workspace_id| {
            let rows = thread_rows(
                state.threads(workspace_id),
                state.thread_parents(),
                expanded,
                workspace_id,
                &lookup,
            );
            let to_row = |pinned: bool| {
                move |row: atrium_domain::ThreadRow<'_>| ThreadRowSnapshot {
                    thread: api_thread_summary(row.thread),
                    depth: row.depth,
                    pinned,
                    activity_at: thread_activity_time(state, row.thread),
                    status: api_status(state.status(&row.thread.id)),
                }
            };
            let mut out: Vec<ThreadRowSnapshot> =
                rows.pinned_rows.into_iter().map(to_row(true)).collect();
            out.extend(rows.unpinned_rows.into_iter().map(to_row(false)));
            WorkspaceThreadsSnapshot {
                workspace_id: api_workspace_id(workspace_id),
                active_thread_id: state.active_thread_id(workspace_id).map(api_thread_id),
                rows: out,
                total_roots: rows.total_roots,
            }
        })
        .collect();

    let pinned = pinned_thread_rows(state, &workspace_ids)
        .into_iter()
        .map(|row| PinnedThreadSnapshot {
            workspace_id: api_workspace_id(row.workspace_id),
            thread: api_thread_summary(row.thread),
            depth: row.depth,
        })
        .collect();

    let latest_runs = latest_agent_runs(state, LATEST_RUNS_LIMIT)
        .into_iter()
        .map(|run| AgentRunSnapshot {
            workspace_id: api_workspace_id(run.workspace_id),
            thread_id: api_thread_id(run.thread_id),
            message: run.message.to_owned(),
            timestamp: run.timestamp,
            is_processing: run.is_processing,
        })
        .collect();

    AppSnapshot {
        rev,
        workspaces,
        pinned,
        latest_runs,
    }
}

/// The conversation of one thread, or `None` when the state has never seen it.
pub fn conversation_snapshot(
    state: &ThreadState,
    rev: u64,
    thread: &ThreadId,
) -> Option<ConversationSnapshot> {
    let known = state.items_shared(thread).is_some() || state.status(thread).is_some();
    if !known {
        return None;
    }
    Some(ConversationSnapshot {
        rev,
        thread_id: api_thread_id(thread),
        items: state.items(thread).iter().map(api_item).collect(),
        status: api_status(state.status(thread)),
        last_agent_message: state
            .last_agent_message(thread)
            .map(|last| LastAgentMessageSnapshot {
                text: last.text.clone(),
                timestamp: last.timestamp,
            }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_domain::reduce;
    use std::sync::Arc;

    fn ws(id: &str) -> atrium_api::WorkspaceId {
        atrium_api::WorkspaceId(id.to_owned())
    }

    fn th(id: &str) -> atrium_api::ThreadId {
        atrium_api::ThreadId(id.to_owned())
    }

    #[test]
    fn missing_timestamps_are_stamped_with_now() {
        let action = action_from_event(
            InboundEvent::MarkProcessing {
                thread_id: th("t"),
                is_processing: true,
                timestamp: None,
            },
            77,
        );
        match action {
            Action::MarkProcessing { timestamp, .. } => assert_eq!(timestamp, 77),
            other => panic!("unexpected action: {other:?}"),
        }

        let action = action_from_event(
            InboundEvent::AddUserMessage {
                workspace_id: ws("w"),
                thread_id: th("t"),
                text: "hi".to_owned(),
                has_custom_name: false,
                timestamp: Some(5),
            },
            77,
        );
        match action {
            Action::AddUserMessage { timestamp, .. } => assert_eq!(timestamp, 5),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn pin_events_use_dispatch_time() {
        let action = action_from_event(
            InboundEvent::PinThread {
                workspace_id: ws("w"),
                thread_id: th("t"),
            },
            1234,
        );
        match action {
            Action::PinThread { timestamp, .. } => assert_eq!(timestamp, 1234),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn prefixed_review_placeholder_maps_to_local_origin() {
        let action = action_from_event(
            InboundEvent::UpsertItem {
                thread_id: th("t"),
                item: ConversationItemSnapshot::Review {
                    id: "review-start-1".to_owned(),
                    state: atrium_api::ReviewState::Started,
                    text: String::new(),
                    origin: None,
                },
            },
            0,
        );
        match action {
            Action::UpsertItem {
                item: ConversationItem::Review { origin, .. },
                ..
            } => assert!(origin.is_local()),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn app_snapshot_lists_pinned_rows_first() {
        let mut state = Arc::new(ThreadState::new());
        for (id, now) in [("a", 1), ("b", 2)] {
            state = reduce(
                &state,
                action_from_event(
                    InboundEvent::EnsureThread {
                        workspace_id: ws("w"),
                        thread_id: th(id),
                    },
                    now,
                ),
            );
        }
        state = reduce(
            &state,
            action_from_event(
                InboundEvent::PinThread {
                    workspace_id: ws("w"),
                    thread_id: th("a"),
                },
                10,
            ),
        );

        let snapshot = app_snapshot(&state, 3, false);
        assert_eq!(snapshot.rev, 3);
        assert_eq!(snapshot.workspaces.len(), 1);
        let rows: Vec<(&str, bool)> = snapshot.workspaces[0]
            .rows
            .iter()
            .map(|row| (row.thread.id.0.as_str(), row.pinned))
            .collect();
        assert_eq!(rows, vec![("a", true), ("b", false)]);
        assert_eq!(snapshot.workspaces[0].total_roots, 1);
        assert_eq!(snapshot.pinned.len(), 1);
        assert_eq!(snapshot.pinned[0].thread.id, th("a"));
    }

    #[test]
    fn conversation_snapshot_is_none_for_unknown_thread() {
        let state = ThreadState::new();
        assert!(conversation_snapshot(&state, 0, &ThreadId::new("nope")).is_none());
    }
}
