use crate::{EngineConfig, action_from_event, app_snapshot, conversation_snapshot, now_unix_ms};
use anyhow::Context as _;
use atrium_api::{AppSnapshot, ConversationSnapshot, InboundEvent};
use atrium_domain::{Action, ThreadId, ThreadState, reduce};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineEvent {
    StateChanged { rev: u64, action: &'static str },
}

#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub async fn current_rev(&self) -> anyhow::Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::GetRev { reply: tx })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")
    }

    /// Applies one wire event and returns the revision after it.
    pub async fn dispatch(&self, event: InboundEvent) -> anyhow::Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::Dispatch { event, reply: tx })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")
    }

    pub async fn dispatch_action(&self, action: Action) -> anyhow::Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::DispatchAction { action, reply: tx })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")
    }

    pub async fn state(&self) -> anyhow::Result<Arc<ThreadState>> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::GetState { reply: tx })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")
    }

    pub async fn app_snapshot(&self, expanded: bool) -> anyhow::Result<AppSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::GetAppSnapshot {
                expanded,
                reply: tx,
            })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")
    }

    pub async fn conversation_snapshot(
        &self,
        thread_id: atrium_api::ThreadId,
    ) -> anyhow::Result<ConversationSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(EngineCommand::GetConversationSnapshot {
                thread_id,
                reply: tx,
            })
            .await
            .context("engine unavailable")?;
        rx.await.context("engine stopped")?
    }
}

pub enum EngineCommand {
    GetRev {
        reply: oneshot::Sender<u64>,
    },
    Dispatch {
        event: InboundEvent,
        reply: oneshot::Sender<u64>,
    },
    DispatchAction {
        action: Action,
        reply: oneshot::Sender<u64>,
    },
    GetState {
        reply: oneshot::Sender<Arc<ThreadState>>,
    },
    GetAppSnapshot {
        expanded: bool,
        reply: oneshot::Sender<AppSnapshot>,
    },
    GetConversationSnapshot {
        thread_id: atrium_api::ThreadId,
        reply: oneshot::Sender<anyhow::Result<ConversationSnapshot>>,
    },
}

/// Owns the thread state. Commands are handled one at a time in arrival order.
pub struct Engine {
    state: Arc<ThreadState>,
    rev: u64,
    events: broadcast::Sender<EngineEvent>,
}

impl Engine {
    pub fn start(config: &EngineConfig) -> (EngineHandle, broadcast::Sender<EngineEvent>) {
        Self::start_with_state(config, ThreadState::new())
    }

    /// Starts from an existing state, such as one carrying restored pins.
    pub fn start_with_state(
        config: &EngineConfig,
        state: ThreadState,
    ) -> (EngineHandle, broadcast::Sender<EngineEvent>) {
        let (tx, mut rx) = mpsc::channel::<EngineCommand>(config.command_buffer);
        let (events, _) = broadcast::channel::<EngineEvent>(config.event_buffer);

        let mut engine = Self {
            state: Arc::new(state),
            rev: 0,
            events: events.clone(),
        };

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                engine.handle(cmd);
            }
            tracing::debug!(rev = engine.rev, "engine command channel closed");
        });

        (EngineHandle { tx }, events)
    }

    fn handle(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::GetRev { reply } => {
                let _ = reply.send(self.rev);
            }
            EngineCommand::Dispatch { event, reply } => {
                let action = action_from_event(event, now_unix_ms());
                let _ = reply.send(self.apply(action));
            }
            EngineCommand::DispatchAction { action, reply } => {
                let _ = reply.send(self.apply(action));
            }
            EngineCommand::GetState { reply } => {
                let _ = reply.send(Arc::clone(&self.state));
            }
            EngineCommand::GetAppSnapshot { expanded, reply } => {
                let _ = reply.send(app_snapshot(&self.state, self.rev, expanded));
            }
            EngineCommand::GetConversationSnapshot { thread_id, reply } => {
                let id = ThreadId::new(thread_id.0);
                let snapshot = conversation_snapshot(&self.state, self.rev, &id)
                    .with_context(|| format!("thread not found: {id}"));
                let _ = reply.send(snapshot);
            }
        }
    }

    fn apply(&mut self, action: Action) -> u64 {
        let name = action.name();
        let thread_id = action.thread_id().map(ToString::to_string);

        let next = reduce(&self.state, action);
        if Arc::ptr_eq(&next, &self.state) {
            tracing::trace!(action = name, thread_id = ?thread_id, "action was a no-op");
            return self.rev;
        }

        self.state = next;
        self.rev = self.rev.saturating_add(1);
        tracing::debug!(action = name, thread_id = ?thread_id, rev = self.rev, "state changed");
        let _ = self.events.send(EngineEvent::StateChanged {
            rev: self.rev,
            action: name,
        });
        self.rev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_api::{ConversationItemSnapshot, WorkspaceId};

    fn ws(id: &str) -> WorkspaceId {
        WorkspaceId(id.to_owned())
    }

    fn th(id: &str) -> atrium_api::ThreadId {
        atrium_api::ThreadId(id.to_owned())
    }

    fn ensure(thread: &str) -> InboundEvent {
        InboundEvent::EnsureThread {
            workspace_id: ws("w"),
            thread_id: th(thread),
        }
    }

    #[tokio::test]
    async fn dispatch_bumps_rev_and_broadcasts_change() {
        let (handle, events) = Engine::start(&EngineConfig::default());
        let mut rx = events.subscribe();

        let rev = handle.dispatch(ensure("t1")).await.expect("dispatch");
        assert_eq!(rev, 1);

        match rx.recv().await.expect("event") {
            EngineEvent::StateChanged { rev, action } => {
                assert_eq!(rev, 1);
                assert_eq!(action, "ensure_thread");
            }
        }
    }

    #[tokio::test]
    async fn no_op_dispatch_keeps_rev_and_state_identity() {
        let (handle, events) = Engine::start(&EngineConfig::default());
        let mut rx = events.subscribe();

        handle.dispatch(ensure("t1")).await.expect("dispatch");
        let before = handle.state().await.expect("state");

        let rev = handle.dispatch(ensure("t1")).await.expect("dispatch");
        assert_eq!(rev, 1);
        assert_eq!(handle.current_rev().await.expect("rev"), 1);

        let after = handle.state().await.expect("state");
        assert!(Arc::ptr_eq(&before, &after));

        rx.recv().await.expect("first change");
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn concurrent_producers_are_serialized() {
        let (handle, _events) = Engine::start(&EngineConfig::default());

        let mut tasks = Vec::new();
        for n in 0..10 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .dispatch(InboundEvent::AddUserMessage {
                        workspace_id: ws("w"),
                        thread_id: th(&format!("t{n}")),
                        text: format!("hello {n}"),
                        has_custom_name: false,
                        timestamp: Some(100 + n),
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.expect("join").expect("dispatch");
        }

        assert_eq!(handle.current_rev().await.expect("rev"), 10);
        let state = handle.state().await.expect("state");
        for n in 0..10 {
            let items = state.items(&ThreadId::new(format!("t{n}")));
            assert_eq!(items.len(), 1, "thread t{n}");
        }
    }

    #[tokio::test]
    async fn conversation_snapshot_reports_items_and_missing_threads() {
        let (handle, _events) = Engine::start(&EngineConfig::default());
        handle.dispatch(ensure("t1")).await.expect("dispatch");
        handle
            .dispatch(InboundEvent::AppendAgentDelta {
                workspace_id: ws("w"),
                thread_id: th("t1"),
                item_id: "a1".to_owned(),
                delta: "Hi".to_owned(),
                has_custom_name: false,
            })
            .await
            .expect("dispatch");

        let snapshot = handle
            .conversation_snapshot(th("t1"))
            .await
            .expect("snapshot");
        assert_eq!(snapshot.rev, 2);
        match snapshot.items.as_slice() {
            [ConversationItemSnapshot::Message { id, text, .. }] => {
                assert_eq!(id, "a1");
                assert_eq!(text, "Hi");
            }
            other => panic!("unexpected items: {other:?}"),
        }

        let err = handle
            .conversation_snapshot(th("missing"))
            .await
            .expect_err("unknown thread should fail");
        assert!(
            err.to_string().contains("thread not found"),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn pins_are_stamped_at_dispatch() {
        let (handle, _events) = Engine::start(&EngineConfig::default());
        handle.dispatch(ensure("t1")).await.expect("dispatch");
        handle
            .dispatch(InboundEvent::PinThread {
                workspace_id: ws("w"),
                thread_id: th("t1"),
            })
            .await
            .expect("dispatch");

        let state = handle.state().await.expect("state");
        let pinned_at = state
            .pins()
            .pinned_at(&atrium_domain::WorkspaceId::new("w"), &ThreadId::new("t1"))
            .expect("pinned");
        assert!(pinned_at > 0);

        let snapshot = handle.app_snapshot(false).await.expect("snapshot");
        assert_eq!(snapshot.pinned.len(), 1);
    }
}
