use crate::{EngineConfig, now_unix_ms};
use anyhow::Context as _;
use atrium_domain::{SessionUsageTracker, TokenCounts, UsageLedger, UsageSummary};
use chrono::{Duration, Local, NaiveDate};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead as _, BufReader};
use std::path::{Path, PathBuf};

pub const DEFAULT_USAGE_DAYS: u32 = 30;
pub const MAX_USAGE_DAYS: u32 = 90;
const MAX_LINE_BYTES: usize = 512_000;

/// Summarizes token usage recorded in local Codex session logs over the last `days` days.
pub async fn local_usage_snapshot(
    config: &EngineConfig,
    days: Option<u32>,
) -> anyhow::Result<UsageSummary> {
    let days = days
        .or(config.usage_days)
        .unwrap_or(DEFAULT_USAGE_DAYS)
        .clamp(1, MAX_USAGE_DAYS);
    let root = config
        .codex_home
        .clone()
        .or_else(default_codex_home)
        .map(|home| home.join("sessions"));

    tokio::task::spawn_blocking(move || {
        let day_keys = make_day_keys(Local::now().date_naive(), days);
        scan_sessions(root.as_deref(), &day_keys, now_unix_ms())
    })
    .await
    .context("usage scan task panicked")?
}

fn default_codex_home() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
        .map(|home| PathBuf::from(home).join(".codex"))
}

/// `days` day keys ending at `today`, oldest first.
pub fn make_day_keys(today: NaiveDate, days: u32) -> Vec<String> {
    (0..days)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(i64::from(offset));
            day.format("%Y-%m-%d").to_string()
        })
        .collect()
}

fn day_dir(root: &Path, day_key: &str) -> PathBuf {
    day_key
        .split('-')
        .fold(root.to_path_buf(), |dir, part| dir.join(part))
}

pub fn scan_sessions(
    root: Option<&Path>,
    day_keys: &[String],
    updated_at: u64,
) -> anyhow::Result<UsageSummary> {
    let mut ledger = UsageLedger::default();
    let Some(root) = root else {
        return Ok(ledger.summarize(updated_at, day_keys));
    };

    for day_key in day_keys {
        let dir = day_dir(root, day_key);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            scan_file(&path, day_key, &mut ledger)
                .with_context(|| format!("failed to scan {}", path.display()))?;
        }
    }

    Ok(ledger.summarize(updated_at, day_keys))
}

fn scan_file(path: &Path, day_key: &str, ledger: &mut UsageLedger) -> anyhow::Result<()> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "skipping unreadable session log");
            return Ok(());
        }
    };

    let mut tracker = SessionUsageTracker::default();
    let mut current_model: Option<String> = None;

    for line in BufReader::new(file).lines() {
        let Ok(line) = line else {
            continue;
        };
        if line.len() > MAX_LINE_BYTES {
            continue;
        }

        if line.contains("\"type\":\"turn_context\"") {
            if let Some(model) = serde_json::from_str::<Value>(&line)
                .ok()
                .and_then(|value| model_from_turn_context(&value))
            {
                current_model = Some(model);
            }
            continue;
        }
        if !line.contains("\"token_count\"") {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            continue;
        };

        let payload = value.get("payload").and_then(Value::as_object);
        if payload.and_then(|p| p.get("type")).and_then(Value::as_str) != Some("token_count") {
            continue;
        }
        let Some(info) = payload.and_then(|p| p.get("info")).and_then(Value::as_object) else {
            continue;
        };

        let delta = if let Some(total) = usage_map(info, &["total_token_usage", "totalTokenUsage"])
        {
            tracker.total(read_counts(total))
        } else if let Some(last) = usage_map(info, &["last_token_usage", "lastTokenUsage"]) {
            tracker.last(read_counts(last))
        } else {
            continue;
        };

        let model = current_model
            .clone()
            .or_else(|| model_from_token_count(&value));
        ledger.record(day_key, model.as_deref(), delta);
    }

    Ok(())
}

fn model_from_turn_context(value: &Value) -> Option<String> {
    let payload = value.get("payload").and_then(Value::as_object)?;
    payload
        .get("model")
        .or_else(|| {
            payload
                .get("info")
                .and_then(Value::as_object)
                .and_then(|info| info.get("model"))
        })
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn model_from_token_count(value: &Value) -> Option<String> {
    let payload = value.get("payload").and_then(Value::as_object)?;
    let info = payload.get("info").and_then(Value::as_object);
    info.and_then(|info| info.get("model").or_else(|| info.get("model_name")))
        .or_else(|| payload.get("model"))
        .or_else(|| value.get("model"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn usage_map<'a>(info: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    keys.iter()
        .find_map(|key| info.get(*key).and_then(Value::as_object))
}

fn read_counts(map: &Map<String, Value>) -> TokenCounts {
    TokenCounts {
        input: read_i64(map, &["input_tokens", "inputTokens"]),
        cached: read_i64(
            map,
            &[
                "cached_input_tokens",
                "cache_read_input_tokens",
                "cachedInputTokens",
                "cacheReadInputTokens",
            ],
        ),
        output: read_i64(map, &["output_tokens", "outputTokens"]),
    }
}

fn read_i64(map: &Map<String, Value>, keys: &[&str]) -> i64 {
    keys.iter()
        .find_map(|key| map.get(*key))
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|v| v as i64)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;

    const DAY: &str = "2026-01-09";

    fn write_session(root: &Path, lines: &[Value]) {
        let dir = day_dir(root, DAY);
        std::fs::create_dir_all(&dir).expect("create day dir");
        let mut file = File::create(dir.join("rollout.jsonl")).expect("create session");
        for line in lines {
            writeln!(file, "{line}").expect("write line");
        }
    }

    fn token_count(key: &str, input: i64, cached: i64, output: i64) -> Value {
        json!({
            "type": "event_msg",
            "payload": {
                "type": "token_count",
                "info": {
                    key: {
                        "input_tokens": input,
                        "cached_input_tokens": cached,
                        "output_tokens": output,
                    }
                }
            }
        })
    }

    fn turn_context(model: &str) -> Value {
        json!({"type": "turn_context", "payload": {"model": model}})
    }

    fn scan(root: &Path) -> UsageSummary {
        scan_sessions(Some(root), &[DAY.to_owned()], 0).expect("scan")
    }

    #[test]
    fn last_usage_followed_by_equal_total_counts_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_session(
            dir.path(),
            &[
                token_count("last_token_usage", 10, 0, 5),
                token_count("total_token_usage", 10, 0, 5),
            ],
        );

        let day = &scan(dir.path()).days[0];
        assert_eq!(day.input_tokens, 10);
        assert_eq!(day.output_tokens, 5);
        assert_eq!(day.total_tokens, 15);
    }

    #[test]
    fn last_usage_between_totals_is_not_double_counted() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_session(
            dir.path(),
            &[
                token_count("total_token_usage", 10, 0, 5),
                token_count("last_token_usage", 2, 0, 1),
                token_count("total_token_usage", 12, 0, 6),
            ],
        );

        let day = &scan(dir.path()).days[0];
        assert_eq!(day.input_tokens, 12);
        assert_eq!(day.output_tokens, 6);
    }

    #[test]
    fn cached_tokens_are_capped_at_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_session(dir.path(), &[token_count("last_token_usage", 4, 9, 0)]);

        let day = &scan(dir.path()).days[0];
        assert_eq!(day.cached_input_tokens, 4);
    }

    #[test]
    fn models_come_from_turn_context_and_unknown_is_hidden() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_session(
            dir.path(),
            &[
                token_count("last_token_usage", 5, 0, 0),
                turn_context("gpt-5"),
                token_count("last_token_usage", 7, 0, 3),
            ],
        );

        let summary = scan(dir.path());
        assert_eq!(summary.totals.last30_days_tokens, 15);
        let models: Vec<(&str, i64)> = summary
            .top_models
            .iter()
            .map(|m| (m.model.as_str(), m.tokens))
            .collect();
        assert_eq!(models, vec![("gpt-5", 10)]);
    }

    #[test]
    fn oversized_and_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let day_dir = day_dir(dir.path(), DAY);
        std::fs::create_dir_all(&day_dir).expect("create day dir");
        let mut file = File::create(day_dir.join("s.jsonl")).expect("create session");
        writeln!(file, "{{\"token_count\": nope").expect("write");
        let mut huge = token_count("last_token_usage", 1000, 0, 0);
        huge["pad"] = Value::String("x".repeat(MAX_LINE_BYTES));
        writeln!(file, "{huge}").expect("write");
        writeln!(file, "{}", token_count("last_token_usage", 1, 0, 1)).expect("write");
        drop(file);

        let day = &scan(dir.path()).days[0];
        assert_eq!(day.total_tokens, 2);
    }

    #[test]
    fn missing_root_yields_empty_days() {
        let summary =
            scan_sessions(None, &["2026-01-08".to_owned(), DAY.to_owned()], 9).expect("scan");
        assert_eq!(summary.updated_at, 9);
        assert_eq!(summary.days.len(), 2);
        assert!(summary.days.iter().all(|day| day.total_tokens == 0));
    }

    #[test]
    fn day_keys_end_today_oldest_first() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).expect("date");
        assert_eq!(
            make_day_keys(today, 3),
            vec!["2026-02-27", "2026-02-28", "2026-03-01"]
        );
        assert_eq!(
            day_dir(Path::new("/s"), "2026-03-01"),
            PathBuf::from("/s/2026/03/01")
        );
    }

    #[tokio::test]
    async fn snapshot_reads_configured_codex_home() {
        let dir = tempfile::tempdir().expect("tempdir");
        let today = make_day_keys(Local::now().date_naive(), 1).remove(0);
        let day_dir = day_dir(&dir.path().join("sessions"), &today);
        std::fs::create_dir_all(&day_dir).expect("create day dir");
        let mut file = File::create(day_dir.join("s.jsonl")).expect("create session");
        writeln!(file, "{}", token_count("total_token_usage", 3, 1, 2)).expect("write");
        drop(file);

        let config = EngineConfig {
            codex_home: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        };
        let summary = local_usage_snapshot(&config, Some(500))
            .await
            .expect("snapshot");
        assert_eq!(summary.days.len(), MAX_USAGE_DAYS as usize);
        assert_eq!(summary.totals.last7_days_tokens, 5);
        assert!(summary.updated_at > 0);
    }
}
