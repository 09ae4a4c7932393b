use crate::items::{
    ReasoningField, append_message_delta, append_reasoning, append_tool_output, complete_message,
    dedupe_items, find_item, has_user_message, push_item, unique_item_id, upsert_item,
};
use crate::state::{AutoName, LastAgentMessage};
use crate::threads::default_thread_name;
use crate::{
    Action, ConversationItem, ItemKind, MessageRole, ThreadId, ThreadState, ThreadStatus,
    ThreadSummary, WorkspaceId, derive_thread_name,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Applies one action. Returns `state` itself (same `Arc`) when the action changes nothing.
pub fn reduce(state: &Arc<ThreadState>, action: Action) -> Arc<ThreadState> {
    match state.apply(action) {
        Some(next) => Arc::new(next),
        None => Arc::clone(state),
    }
}

impl ThreadState {
    /// Returns the next snapshot, or `None` when the action is inapplicable or redundant.
    pub fn apply(&self, action: Action) -> Option<Self> {
        let mut next = self.clone();
        let changed = match action {
            Action::EnsureThread {
                workspace_id,
                thread_id,
            } => next.ensure_thread(workspace_id, thread_id),
            Action::SetActiveThread {
                workspace_id,
                thread_id,
            } => next.set_active_thread(workspace_id, thread_id),
            Action::SetThreads {
                workspace_id,
                threads,
            } => next.set_threads(workspace_id, threads),
            Action::RenameThread {
                workspace_id,
                thread_id,
                name,
            } => next.rename_thread(&workspace_id, &thread_id, &name),
            Action::SetThreadParent {
                thread_id,
                parent_id,
            } => next.set_thread_parent(thread_id, parent_id),
            Action::SetThreadTimestamp {
                workspace_id,
                thread_id,
                timestamp,
            } => next.edit_thread(&workspace_id, &thread_id, |summary| {
                bump_updated_at(summary, timestamp)
            }),
            Action::DeleteThread {
                workspace_id,
                thread_id,
            } => next.delete_thread(&workspace_id, &thread_id),

            Action::AddUserMessage {
                workspace_id,
                thread_id,
                text,
                has_custom_name,
                timestamp,
            } => next.add_user_message(&workspace_id, thread_id, &text, has_custom_name, timestamp),
            Action::AppendAgentDelta {
                workspace_id,
                thread_id,
                item_id,
                delta,
                has_custom_name,
            } => next.append_agent_delta(&workspace_id, thread_id, &item_id, &delta, has_custom_name),
            Action::CompleteAgentMessage {
                workspace_id,
                thread_id,
                item_id,
                text,
                has_custom_name,
                timestamp,
            } => next.complete_agent_message(
                &workspace_id,
                thread_id,
                &item_id,
                text,
                has_custom_name,
                timestamp,
            ),
            Action::AppendReasoningSummary {
                thread_id,
                item_id,
                delta,
            } => next.edit_items(thread_id, |items| {
                append_reasoning(items, &item_id, ReasoningField::Summary, &delta)
            }),
            Action::AppendReasoningContent {
                thread_id,
                item_id,
                delta,
            } => next.edit_items(thread_id, |items| {
                append_reasoning(items, &item_id, ReasoningField::Content, &delta)
            }),
            Action::AppendToolOutput {
                thread_id,
                item_id,
                delta,
            } => next.edit_items(thread_id, |items| {
                append_tool_output(items, &item_id, &delta)
            }),
            Action::UpsertItem { thread_id, item } => {
                next.edit_items(thread_id, |items| upsert_item(items, item))
            }
            Action::SetThreadItems { thread_id, items } => next.set_thread_items(thread_id, items),
            Action::SetLastAgentMessage {
                thread_id,
                text,
                timestamp,
            } => next.record_last_agent_message(thread_id, text, timestamp),

            Action::MarkProcessing {
                thread_id,
                is_processing,
                timestamp,
            } => next.edit_status(thread_id, |status| {
                status.mark_processing(is_processing, timestamp)
            }),
            Action::MarkReviewing {
                thread_id,
                is_reviewing,
            } => next.edit_status(thread_id, |status| status.mark_reviewing(is_reviewing)),
            Action::MarkUnread {
                thread_id,
                has_unread,
            } => next.edit_status(thread_id, |status| status.mark_unread(has_unread)),

            Action::PinThread {
                workspace_id,
                thread_id,
                timestamp,
            } => match next.pins.pin(&workspace_id, &thread_id, timestamp) {
                Some(pins) => {
                    next.pins = pins;
                    true
                }
                None => false,
            },
            Action::UnpinThread {
                workspace_id,
                thread_id,
            } => match next.pins.unpin(&workspace_id, &thread_id) {
                Some(pins) => {
                    next.pins = pins;
                    true
                }
                None => false,
            },
        };
        changed.then_some(next)
    }

    fn ensure_thread(&mut self, workspace_id: WorkspaceId, thread_id: ThreadId) -> bool {
        let mut changed = self.revive(&thread_id);
        if self.thread(&workspace_id, &thread_id).is_none() {
            let name = default_thread_name(self.threads(&workspace_id).len());
            let threads = Arc::make_mut(&mut self.threads_by_workspace)
                .entry(workspace_id.clone())
                .or_default();
            Arc::make_mut(threads).insert(0, ThreadSummary::new(thread_id.clone(), name));
            changed = true;
        }
        if !self.status_by_thread.contains_key(&thread_id) {
            Arc::make_mut(&mut self.status_by_thread)
                .insert(thread_id.clone(), ThreadStatus::default());
            changed = true;
        }
        self.set_active_thread(workspace_id, Some(thread_id)) || changed
    }

    fn set_active_thread(&mut self, workspace_id: WorkspaceId, thread_id: Option<ThreadId>) -> bool {
        if self.active_thread_by_workspace.get(&workspace_id) == thread_id.as_ref() {
            return false;
        }
        let active = Arc::make_mut(&mut self.active_thread_by_workspace);
        match thread_id {
            Some(thread_id) => {
                active.insert(workspace_id, thread_id);
            }
            None => {
                active.remove(&workspace_id);
            }
        }
        true
    }

    fn set_threads(&mut self, workspace_id: WorkspaceId, threads: Vec<ThreadSummary>) -> bool {
        let current = self.threads(&workspace_id);
        let mut seen = HashSet::with_capacity(threads.len());
        let merged: Vec<ThreadSummary> = threads
            .into_iter()
            .filter(|thread| seen.insert(thread.id.clone()))
            .map(|mut thread| {
                if let Some(existing) = current.iter().find(|t| t.id == thread.id) {
                    if existing.has_custom_name && !thread.has_custom_name {
                        thread.name = existing.name.clone();
                        thread.has_custom_name = true;
                    }
                    thread.updated_at = thread.updated_at.max(existing.updated_at);
                }
                thread
            })
            .collect();

        let unchanged = match self.threads_by_workspace.get(&workspace_id) {
            Some(current) => current.as_slice() == merged.as_slice(),
            None => merged.is_empty(),
        };
        let mut changed = false;
        for thread in &merged {
            changed |= self.revive(&thread.id);
        }
        if unchanged {
            return changed;
        }
        Arc::make_mut(&mut self.threads_by_workspace).insert(workspace_id, Arc::new(merged));
        true
    }

    fn revive(&mut self, thread_id: &ThreadId) -> bool {
        if !self.deleted_threads.contains(thread_id) {
            return false;
        }
        Arc::make_mut(&mut self.deleted_threads).remove(thread_id);
        true
    }

    fn rename_thread(&mut self, workspace_id: &WorkspaceId, thread_id: &ThreadId, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.edit_thread(workspace_id, thread_id, |summary| {
            if summary.has_custom_name && summary.name == name {
                return false;
            }
            summary.name = name.to_owned();
            summary.has_custom_name = true;
            true
        })
    }

    fn set_thread_parent(&mut self, thread_id: ThreadId, parent_id: ThreadId) -> bool {
        if thread_id == parent_id
            || self.is_deleted(&thread_id)
            || self.is_deleted(&parent_id)
            || self.thread_parents.get(&thread_id) == Some(&parent_id)
        {
            return false;
        }
        Arc::make_mut(&mut self.thread_parents).insert(thread_id, parent_id);
        true
    }

    fn delete_thread(&mut self, workspace_id: &WorkspaceId, thread_id: &ThreadId) -> bool {
        let mut changed = false;

        if self.thread(workspace_id, thread_id).is_some() {
            if let Some(threads) = Arc::make_mut(&mut self.threads_by_workspace).get_mut(workspace_id)
            {
                Arc::make_mut(threads).retain(|t| &t.id != thread_id);
            }
            changed = true;
        }
        if self.items_by_thread.contains_key(thread_id) {
            Arc::make_mut(&mut self.items_by_thread).remove(thread_id);
            changed = true;
        }
        if self.status_by_thread.contains_key(thread_id) {
            Arc::make_mut(&mut self.status_by_thread).remove(thread_id);
            changed = true;
        }
        if self.last_agent_message_by_thread.contains_key(thread_id) {
            Arc::make_mut(&mut self.last_agent_message_by_thread).remove(thread_id);
            changed = true;
        }
        if self
            .thread_parents
            .iter()
            .any(|(child, parent)| child == thread_id || parent == thread_id)
        {
            Arc::make_mut(&mut self.thread_parents)
                .retain(|child, parent| child != thread_id && parent != thread_id);
            changed = true;
        }
        if self.active_thread_by_workspace.get(workspace_id) == Some(thread_id) {
            Arc::make_mut(&mut self.active_thread_by_workspace).remove(workspace_id);
            changed = true;
        }
        if let Some(pins) = self.pins.unpin(workspace_id, thread_id) {
            self.pins = pins;
            changed = true;
        }
        if self.auto_named_from.contains_key(thread_id) {
            Arc::make_mut(&mut self.auto_named_from).remove(thread_id);
            changed = true;
        }
        if changed {
            Arc::make_mut(&mut self.deleted_threads).insert(thread_id.clone());
        }
        changed
    }

    fn add_user_message(
        &mut self,
        workspace_id: &WorkspaceId,
        thread_id: ThreadId,
        text: &str,
        has_custom_name: bool,
        timestamp: u64,
    ) -> bool {
        let added = self.edit_items(thread_id.clone(), |items| {
            let id = unique_item_id(items, &format!("{timestamp}-user"));
            push_item(
                items,
                ConversationItem::Message {
                    id,
                    role: MessageRole::User,
                    text: text.to_owned(),
                },
            );
            true
        });
        if !added {
            return false;
        }

        let derived = (!has_custom_name).then(|| derive_thread_name(text)).flatten();
        self.edit_thread(workspace_id, &thread_id, |summary| {
            let mut touched = bump_updated_at(summary, timestamp);
            if let Some(name) = derived {
                if !summary.has_custom_name {
                    summary.name = name;
                    summary.has_custom_name = true;
                    touched = true;
                }
            }
            touched
        });
        true
    }

    fn append_agent_delta(
        &mut self,
        workspace_id: &WorkspaceId,
        thread_id: ThreadId,
        item_id: &str,
        delta: &str,
        has_custom_name: bool,
    ) -> bool {
        let mut accumulated = None;
        let mut user_spoke = false;
        let changed = self.edit_items(thread_id.clone(), |items| {
            accumulated = append_message_delta(items, item_id, delta);
            user_spoke = has_user_message(items);
            accumulated.is_some()
        });
        if !changed {
            return false;
        }

        // Agent output names a thread only while the user has not spoken.
        if !has_custom_name && !user_spoke {
            if let Some(name) = accumulated.as_deref().and_then(derive_thread_name) {
                self.auto_name(workspace_id, &thread_id, item_id, name);
            }
        }
        true
    }

    fn complete_agent_message(
        &mut self,
        workspace_id: &WorkspaceId,
        thread_id: ThreadId,
        item_id: &str,
        text: String,
        has_custom_name: bool,
        timestamp: u64,
    ) -> bool {
        let items = self.items(&thread_id);
        match find_item(items, item_id) {
            Some(existing) if existing.kind() != ItemKind::Message => return false,
            None if text.trim().is_empty() => return false,
            _ => {}
        }
        let lock_name = !has_custom_name && !has_user_message(items);

        let mut changed =
            self.edit_items(thread_id.clone(), |items| complete_message(items, item_id, &text));

        changed |= self.edit_thread(workspace_id, &thread_id, |summary| {
            bump_updated_at(summary, timestamp)
        });
        if let Some(name) = lock_name.then(|| derive_thread_name(&text)).flatten() {
            changed |= self.auto_name(workspace_id, &thread_id, item_id, name);
        }
        changed |= self.record_last_agent_message(thread_id, text, timestamp);
        changed
    }

    /// Names a thread from assistant output and locks the name. A locked name is only replaced
    /// when it was derived from the same item and nobody has changed it since.
    fn auto_name(
        &mut self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
        item_id: &str,
        name: String,
    ) -> bool {
        let refreshable = self
            .auto_named_from
            .get(thread_id)
            .filter(|from| from.item_id == item_id)
            .map(|from| from.name.clone());
        let renamed = self.edit_thread(workspace_id, thread_id, |summary| {
            if summary.has_custom_name
                && (summary.name == name || refreshable.as_deref() != Some(summary.name.as_str()))
            {
                return false;
            }
            summary.name = name.clone();
            summary.has_custom_name = true;
            true
        });
        if renamed {
            Arc::make_mut(&mut self.auto_named_from).insert(
                thread_id.clone(),
                AutoName {
                    item_id: item_id.to_owned(),
                    name,
                },
            );
        }
        renamed
    }

    fn record_last_agent_message(&mut self, thread_id: ThreadId, text: String, timestamp: u64) -> bool {
        if text.trim().is_empty() || self.is_deleted(&thread_id) {
            return false;
        }
        if let Some(existing) = self.last_agent_message_by_thread.get(&thread_id) {
            if timestamp < existing.timestamp
                || (timestamp == existing.timestamp && existing.text == text)
            {
                return false;
            }
        }
        Arc::make_mut(&mut self.last_agent_message_by_thread)
            .insert(thread_id, LastAgentMessage { text, timestamp });
        true
    }

    fn set_thread_items(&mut self, thread_id: ThreadId, items: Vec<ConversationItem>) -> bool {
        if self.is_deleted(&thread_id) {
            return false;
        }
        let items = dedupe_items(items);
        let unchanged = match self.items_by_thread.get(&thread_id) {
            Some(current) => current.as_slice() == items.as_slice(),
            None => items.is_empty(),
        };
        if unchanged {
            return false;
        }
        Arc::make_mut(&mut self.items_by_thread).insert(thread_id, Arc::new(items));
        true
    }

    /// Runs `edit` against a thread's item list and stores the result only when it reports a
    /// change. Item lists shared with earlier snapshots are copied on first write. Deleted
    /// threads are left alone.
    fn edit_items(
        &mut self,
        thread_id: ThreadId,
        edit: impl FnOnce(&mut Arc<Vec<ConversationItem>>) -> bool,
    ) -> bool {
        if self.is_deleted(&thread_id) {
            return false;
        }
        let mut items = self
            .items_by_thread
            .get(&thread_id)
            .cloned()
            .unwrap_or_default();
        if !edit(&mut items) {
            return false;
        }
        Arc::make_mut(&mut self.items_by_thread).insert(thread_id, items);
        true
    }

    fn edit_thread(
        &mut self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
        edit: impl FnOnce(&mut ThreadSummary) -> bool,
    ) -> bool {
        let threads = self.threads(workspace_id);
        let Some(idx) = threads.iter().position(|t| &t.id == thread_id) else {
            return false;
        };
        let mut summary = threads[idx].clone();
        if !edit(&mut summary) {
            return false;
        }
        if let Some(threads) = Arc::make_mut(&mut self.threads_by_workspace).get_mut(workspace_id) {
            Arc::make_mut(threads)[idx] = summary;
        }
        true
    }

    fn edit_status(
        &mut self,
        thread_id: ThreadId,
        edit: impl FnOnce(&ThreadStatus) -> Option<ThreadStatus>,
    ) -> bool {
        if self.is_deleted(&thread_id) {
            return false;
        }
        let current = self
            .status_by_thread
            .get(&thread_id)
            .cloned()
            .unwrap_or_default();
        let Some(next) = edit(&current) else {
            return false;
        };
        Arc::make_mut(&mut self.status_by_thread).insert(thread_id, next);
        true
    }
}

fn bump_updated_at(summary: &mut ThreadSummary, timestamp: u64) -> bool {
    if timestamp <= summary.updated_at {
        return false;
    }
    summary.updated_at = timestamp;
    true
}
