use crate::{ThreadId, ThreadState, ThreadSummary, WorkspaceId};
use std::collections::{HashMap, HashSet};

/// Unpinned roots shown per workspace before "show more".
pub const COLLAPSED_THREAD_ROOTS: usize = 3;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadRow<'a> {
    pub thread: &'a ThreadSummary,
    pub depth: usize,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ThreadRows<'a> {
    pub pinned_rows: Vec<ThreadRow<'a>>,
    pub unpinned_rows: Vec<ThreadRow<'a>>,
    /// Unpinned root count before truncation.
    pub total_roots: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PinnedThreadRow<'a> {
    pub workspace_id: &'a WorkspaceId,
    pub thread: &'a ThreadSummary,
    pub depth: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LatestAgentRun<'a> {
    pub workspace_id: &'a WorkspaceId,
    pub thread_id: &'a ThreadId,
    pub message: &'a str,
    pub timestamp: u64,
    pub is_processing: bool,
}

/// The parent of `thread` within `threads`, ignoring parents outside the list and parent
/// chains that loop back to `thread`.
fn visible_parent<'a>(
    thread: &ThreadSummary,
    ids: &HashSet<&ThreadId>,
    parents: &'a HashMap<ThreadId, ThreadId>,
) -> Option<&'a ThreadId> {
    let parent = parents.get(&thread.id)?;
    if parent == &thread.id || !ids.contains(parent) {
        return None;
    }
    let mut cursor = parent;
    for _ in 0..ids.len() {
        match parents.get(cursor) {
            Some(next) if next == &thread.id => return None,
            Some(next) if ids.contains(next) => cursor = next,
            _ => break,
        }
    }
    Some(parent)
}

fn push_subtree<'a>(
    thread: &'a ThreadSummary,
    depth: usize,
    children: &HashMap<&ThreadId, Vec<&'a ThreadSummary>>,
    visited: &mut HashSet<&'a ThreadId>,
    rows: &mut Vec<ThreadRow<'a>>,
) {
    if !visited.insert(&thread.id) {
        return;
    }
    rows.push(ThreadRow { thread, depth });
    if let Some(kids) = children.get(&thread.id) {
        for child in kids {
            push_subtree(child, depth + 1, children, visited, rows);
        }
    }
}

/// Splits one workspace's threads into pinned and unpinned row trees.
///
/// Pinned roots are ordered by ascending pin time; unpinned roots keep list order and are
/// truncated to [`COLLAPSED_THREAD_ROOTS`] unless `is_expanded`.
pub fn thread_rows<'a>(
    threads: &'a [ThreadSummary],
    parents: &HashMap<ThreadId, ThreadId>,
    is_expanded: bool,
    workspace_id: &WorkspaceId,
    pin_lookup: impl Fn(&WorkspaceId, &ThreadId) -> Option<u64>,
) -> ThreadRows<'a> {
    let ids: HashSet<&ThreadId> = threads.iter().map(|t| &t.id).collect();
    let mut children: HashMap<&ThreadId, Vec<&ThreadSummary>> = HashMap::new();
    let mut roots = Vec::new();
    for thread in threads {
        match visible_parent(thread, &ids, parents) {
            Some(parent) => children.entry(parent).or_default().push(thread),
            None => roots.push(thread),
        }
    }

    let mut pinned_roots = Vec::new();
    let mut unpinned_roots = Vec::new();
    for root in roots {
        match pin_lookup(workspace_id, &root.id) {
            Some(pinned_at) => pinned_roots.push((pinned_at, root)),
            None => unpinned_roots.push(root),
        }
    }
    pinned_roots.sort_by_key(|(pinned_at, _)| *pinned_at);

    let mut visited = HashSet::new();
    let mut pinned_rows = Vec::new();
    for (_, root) in pinned_roots {
        push_subtree(root, 0, &children, &mut visited, &mut pinned_rows);
    }

    let total_roots = unpinned_roots.len();
    let visible = if is_expanded {
        total_roots
    } else {
        total_roots.min(COLLAPSED_THREAD_ROOTS)
    };
    let mut unpinned_rows = Vec::new();
    for root in unpinned_roots.into_iter().take(visible) {
        push_subtree(root, 0, &children, &mut visited, &mut unpinned_rows);
    }

    ThreadRows {
        pinned_rows,
        unpinned_rows,
        total_roots,
    }
}

/// Pinned rows across every workspace, one cluster per pinned root (the root followed by
/// its descendants), clusters ordered by ascending pin time.
pub fn pinned_thread_rows<'a>(
    state: &'a ThreadState,
    workspace_ids: &[&'a WorkspaceId],
) -> Vec<PinnedThreadRow<'a>> {
    let lookup = state.pins().lookup();
    let mut clusters: Vec<(u64, &'a WorkspaceId, Vec<ThreadRow<'a>>)> = Vec::new();

    for &workspace_id in workspace_ids {
        let threads = state.threads(workspace_id);
        if threads.is_empty() {
            continue;
        }
        let rows = thread_rows(threads, state.thread_parents(), true, workspace_id, &lookup);
        for row in rows.pinned_rows {
            if row.depth == 0 {
                if let Some(pinned_at) = lookup(workspace_id, &row.thread.id) {
                    clusters.push((pinned_at, workspace_id, vec![row]));
                    continue;
                }
            }
            if let Some((_, _, cluster)) = clusters.last_mut() {
                cluster.push(row);
            }
        }
    }

    clusters.sort_by_key(|(pinned_at, _, _)| *pinned_at);
    clusters
        .into_iter()
        .flat_map(|(_, workspace_id, rows)| {
            rows.into_iter().map(move |row| PinnedThreadRow {
                workspace_id,
                thread: row.thread,
                depth: row.depth,
            })
        })
        .collect()
}

/// Threads with a recorded agent message, newest first.
pub fn latest_agent_runs(state: &ThreadState, limit: usize) -> Vec<LatestAgentRun<'_>> {
    let mut runs: Vec<LatestAgentRun<'_>> = state
        .workspace_ids()
        .into_iter()
        .flat_map(|workspace_id| {
            state.threads(workspace_id).iter().filter_map(move |thread| {
                let last = state.last_agent_message(&thread.id)?;
                Some(LatestAgentRun {
                    workspace_id,
                    thread_id: &thread.id,
                    message: &last.text,
                    timestamp: last.timestamp,
                    is_processing: state
                        .status(&thread.id)
                        .is_some_and(|status| status.is_processing),
                })
            })
        })
        .collect();
    runs.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.workspace_id.cmp(b.workspace_id))
            .then_with(|| a.thread_id.cmp(b.thread_id))
    });
    runs.truncate(limit);
    runs
}

/// The time a thread row should show: its last agent message, else its last update.
pub fn thread_activity_time(state: &ThreadState, thread: &ThreadSummary) -> Option<u64> {
    state
        .last_agent_message(&thread.id)
        .map(|last| last.timestamp)
        .or((thread.updated_at > 0).then_some(thread.updated_at))
}
