use crate::engine::EngineHandle;
use atrium_api::InboundEvent;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReplayReport {
    pub applied: usize,
    pub skipped: usize,
    pub rev: u64,
}

/// Feeds a JSON-lines event log through the engine. Blank lines are ignored and lines that
/// do not parse as an event are logged and skipped.
pub async fn replay_lines(handle: &EngineHandle, input: &str) -> anyhow::Result<ReplayReport> {
    let mut report = ReplayReport::default();
    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match serde_json::from_str::<InboundEvent>(line) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(line = index + 1, %err, "skipping malformed event");
                report.skipped += 1;
                continue;
            }
        };
        report.rev = handle.dispatch(event).await?;
        report.applied += 1;
    }
    Ok(report)
}
