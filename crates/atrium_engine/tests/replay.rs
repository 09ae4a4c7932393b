use atrium_api::{ConversationItemSnapshot, ReviewState, ThreadId};
use atrium_engine::EngineConfig;
use atrium_engine::engine::Engine;

const LOG: &str = r#"
{"type":"ensure_thread","workspace_id":"w1","thread_id":"t1"}
{"type":"add_user_message","workspace_id":"w1","thread_id":"t1","text":"Fix the flaky login test","timestamp":1000}
{"type":"mark_processing","thread_id":"t1","is_processing":true,"timestamp":1000}
{"type":"upsert_item","thread_id":"t1","item":{"kind":"review","id":"review-start-1","state":"started"}}
this line is not json
{"type":"upsert_item","thread_id":"t1","item":{"kind":"review","id":"rv-1","state":"started","text":"Reviewing"}}
{"type":"append_agent_delta","workspace_id":"w1","thread_id":"t1","item_id":"a1","delta":"Looking"}
{"type":"complete_agent_message","workspace_id":"w1","thread_id":"t1","item_id":"a1","text":"Looking into it","timestamp":2500}
{"type":"mark_processing","thread_id":"t1","is_processing":false,"timestamp":2500}
{"type":"ensure_thread","workspace_id":"w1","thread_id":"t2"}
{"type":"pin_thread","workspace_id":"w1","thread_id":"t1"}
"#;

#[tokio::test]
async fn replay_applies_events_and_skips_bad_lines() {
    let (handle, _events) = Engine::start(&EngineConfig::default());
    let report = atrium_engine::replay_lines(&handle, LOG)
        .await
        .expect("replay");

    assert_eq!(report.applied, 10);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.rev, handle.current_rev().await.expect("rev"));

    let conversation = handle
        .conversation_snapshot(ThreadId("t1".to_owned()))
        .await
        .expect("conversation");
    let ids: Vec<&str> = conversation.items.iter().map(|item| item.id()).collect();
    assert_eq!(ids, vec!["1000-user", "rv-1", "a1"]);
    match &conversation.items[1] {
        ConversationItemSnapshot::Review { state, .. } => assert_eq!(*state, ReviewState::Started),
        other => panic!("unexpected item: {other:?}"),
    }
    assert!(!conversation.status.is_processing);
    assert_eq!(conversation.status.last_duration_ms, Some(1500));
    assert_eq!(
        conversation
            .last_agent_message
            .as_ref()
            .map(|last| last.text.as_str()),
        Some("Looking into it")
    );

    let app = handle.app_snapshot(false).await.expect("app snapshot");
    let workspace = &app.workspaces[0];
    assert_eq!(workspace.active_thread_id, Some(ThreadId("t2".to_owned())));
    let rows: Vec<(&str, &str, bool)> = workspace
        .rows
        .iter()
        .map(|row| (row.thread.id.0.as_str(), row.thread.name.as_str(), row.pinned))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("t1", "Fix the flaky login test", true),
            ("t2", "Agent 2", false),
        ]
    );
    assert_eq!(app.pinned.len(), 1);
    assert_eq!(app.latest_runs.len(), 1);
    assert_eq!(app.latest_runs[0].timestamp, 2500);
}
