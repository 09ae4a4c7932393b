use crate::{ThreadId, WorkspaceId};
use std::sync::Arc;

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PinRecord {
    pub workspace_id: WorkspaceId,
    pub thread_id: ThreadId,
    pub pinned_at: u64,
}

/// Insertion-ordered pins across all workspaces. Pin times are strictly increasing in
/// insertion order, even across unpins.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PinIndex {
    records: Arc<Vec<PinRecord>>,
    last_pinned_at: Option<u64>,
}

impl PinIndex {
    /// Rebuilds an index from externally persisted records, ordered by pin time.
    pub fn from_records(mut records: Vec<PinRecord>) -> Self {
        records.sort_by_key(|record| record.pinned_at);
        let mut out = Self::default();
        for record in records {
            if out.position(&record.workspace_id, &record.thread_id).is_some() {
                continue;
            }
            out.last_pinned_at = Some(record.pinned_at);
            Arc::make_mut(&mut out.records).push(record);
        }
        out
    }

    pub fn records(&self) -> &[PinRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn pinned_at(&self, workspace_id: &WorkspaceId, thread_id: &ThreadId) -> Option<u64> {
        self.position(workspace_id, thread_id)
            .map(|idx| self.records[idx].pinned_at)
    }

    pub fn is_pinned(&self, workspace_id: &WorkspaceId, thread_id: &ThreadId) -> bool {
        self.position(workspace_id, thread_id).is_some()
    }

    /// A pin-time lookup in the shape the row selectors take.
    pub fn lookup(&self) -> impl Fn(&WorkspaceId, &ThreadId) -> Option<u64> + '_ {
        move |workspace_id, thread_id| self.pinned_at(workspace_id, thread_id)
    }

    fn position(&self, workspace_id: &WorkspaceId, thread_id: &ThreadId) -> Option<usize> {
        self.records
            .iter()
            .position(|r| &r.workspace_id == workspace_id && &r.thread_id == thread_id)
    }

    pub(crate) fn pin(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
        timestamp: u64,
    ) -> Option<Self> {
        if self.is_pinned(workspace_id, thread_id) {
            return None;
        }
        let pinned_at = match self.last_pinned_at {
            Some(last) if timestamp <= last => last.saturating_add(1),
            _ => timestamp,
        };
        let mut next = self.clone();
        Arc::make_mut(&mut next.records).push(PinRecord {
            workspace_id: workspace_id.clone(),
            thread_id: thread_id.clone(),
            pinned_at,
        });
        next.last_pinned_at = Some(pinned_at);
        Some(next)
    }

    pub(crate) fn unpin(&self, workspace_id: &WorkspaceId, thread_id: &ThreadId) -> Option<Self> {
        let idx = self.position(workspace_id, thread_id)?;
        let mut next = self.clone();
        Arc::make_mut(&mut next.records).remove(idx);
        Some(next)
    }
}
