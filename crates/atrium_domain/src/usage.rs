use std::collections::HashMap;

const TOP_MODELS: usize = 4;
const UNKNOWN_MODEL: &str = "unknown";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TokenCounts {
    pub input: i64,
    pub cached: i64,
    pub output: i64,
}

impl TokenCounts {
    pub fn is_zero(&self) -> bool {
        self.input == 0 && self.cached == 0 && self.output == 0
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UsageDay {
    pub day: String,
    pub input_tokens: i64,
    pub cached_input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UsageTotals {
    pub last7_days_tokens: i64,
    pub last30_days_tokens: i64,
    pub average_daily_tokens: i64,
    pub cache_hit_rate_percent: f64,
    pub peak_day: Option<String>,
    pub peak_day_tokens: i64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub tokens: i64,
    pub share_percent: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UsageSummary {
    pub updated_at: u64,
    pub days: Vec<UsageDay>,
    pub totals: UsageTotals,
    pub top_models: Vec<ModelUsage>,
}

/// Converts a stream of cumulative and per-turn token reports from one session log into
/// non-overlapping deltas.
#[derive(Clone, Debug, Default)]
pub struct SessionUsageTracker {
    running: Option<TokenCounts>,
}

impl SessionUsageTracker {
    /// A cumulative snapshot; returns the part not counted yet.
    pub fn total(&mut self, total: TokenCounts) -> TokenCounts {
        let prev = self.running.unwrap_or_default();
        self.running = Some(total);
        TokenCounts {
            input: (total.input - prev.input).max(0),
            cached: (total.cached - prev.cached).max(0),
            output: (total.output - prev.output).max(0),
        }
    }

    /// A per-turn delta. It advances the running total so the next snapshot does not count
    /// it again.
    pub fn last(&mut self, delta: TokenCounts) -> TokenCounts {
        let mut next = self.running.unwrap_or_default();
        next.input += delta.input;
        next.cached += delta.cached;
        next.output += delta.output;
        self.running = Some(next);
        delta
    }
}

/// Per-day and per-model accumulation of token deltas.
#[derive(Clone, Debug, Default)]
pub struct UsageLedger {
    daily: HashMap<String, TokenCounts>,
    models: HashMap<String, i64>,
}

impl UsageLedger {
    pub fn record(&mut self, day: &str, model: Option<&str>, delta: TokenCounts) {
        if delta.is_zero() {
            return;
        }
        let entry = self.daily.entry(day.to_owned()).or_default();
        entry.input += delta.input;
        entry.cached += delta.cached.min(delta.input);
        entry.output += delta.output;
        *self
            .models
            .entry(model.unwrap_or(UNKNOWN_MODEL).to_owned())
            .or_insert(0) += delta.input + delta.output;
    }

    pub fn day(&self, day: &str) -> TokenCounts {
        self.daily.get(day).copied().unwrap_or_default()
    }

    /// Builds the summary for `day_keys`, oldest first.
    pub fn summarize(&self, updated_at: u64, day_keys: &[String]) -> UsageSummary {
        let days: Vec<UsageDay> = day_keys
            .iter()
            .map(|day| {
                let counts = self.day(day);
                UsageDay {
                    day: day.clone(),
                    input_tokens: counts.input,
                    cached_input_tokens: counts.cached,
                    output_tokens: counts.output,
                    total_tokens: counts.input + counts.output,
                }
            })
            .collect();
        let total_tokens: i64 = days.iter().map(|day| day.total_tokens).sum();

        let last7 = &days[days.len().saturating_sub(7)..];
        let last7_tokens: i64 = last7.iter().map(|day| day.total_tokens).sum();
        let last7_input: i64 = last7.iter().map(|day| day.input_tokens).sum();
        let last7_cached: i64 = last7.iter().map(|day| day.cached_input_tokens).sum();

        let average_daily_tokens = if last7.is_empty() {
            0
        } else {
            ((last7_tokens as f64) / (last7.len() as f64)).round() as i64
        };
        let cache_hit_rate_percent = if last7_input > 0 {
            round_tenth((last7_cached as f64) / (last7_input as f64) * 100.0)
        } else {
            0.0
        };

        // The most recent day wins ties.
        let peak = days
            .iter()
            .filter(|day| day.total_tokens > 0)
            .fold(None::<&UsageDay>, |best, day| match best {
                Some(best) if best.total_tokens > day.total_tokens => Some(best),
                _ => Some(day),
            });

        let mut top_models: Vec<ModelUsage> = self
            .models
            .iter()
            .filter(|(model, tokens)| model.as_str() != UNKNOWN_MODEL && **tokens > 0)
            .map(|(model, tokens)| ModelUsage {
                model: model.clone(),
                tokens: *tokens,
                share_percent: if total_tokens > 0 {
                    round_tenth((*tokens as f64) / (total_tokens as f64) * 100.0)
                } else {
                    0.0
                },
            })
            .collect();
        top_models.sort_by(|a, b| b.tokens.cmp(&a.tokens).then_with(|| a.model.cmp(&b.model)));
        top_models.truncate(TOP_MODELS);

        UsageSummary {
            updated_at,
            totals: UsageTotals {
                last7_days_tokens: last7_tokens,
                last30_days_tokens: total_tokens,
                average_daily_tokens,
                cache_hit_rate_percent,
                peak_day: peak.map(|day| day.day.clone()),
                peak_day_tokens: peak.map(|day| day.total_tokens).unwrap_or(0),
            },
            days,
            top_models,
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(input: i64, cached: i64, output: i64) -> TokenCounts {
        TokenCounts {
            input,
            cached,
            output,
        }
    }

    fn keys(days: &[&str]) -> Vec<String> {
        days.iter().map(|day| (*day).to_owned()).collect()
    }

    #[test]
    fn last_then_equal_total_is_counted_once() {
        let mut tracker = SessionUsageTracker::default();
        let mut ledger = UsageLedger::default();
        let delta = tracker.last(counts(10, 0, 5));
        ledger.record("d", None, delta);
        let delta = tracker.total(counts(10, 0, 5));
        ledger.record("d", None, delta);
        assert_eq!(ledger.day("d"), counts(10, 0, 5));
    }

    #[test]
    fn last_between_totals_is_not_double_counted() {
        let mut tracker = SessionUsageTracker::default();
        let mut ledger = UsageLedger::default();
        for delta in [
            tracker.total(counts(10, 0, 5)),
            tracker.last(counts(2, 0, 1)),
            tracker.total(counts(12, 0, 6)),
        ] {
            ledger.record("d", None, delta);
        }
        assert_eq!(ledger.day("d"), counts(12, 0, 6));
    }

    #[test]
    fn cached_tokens_are_capped_at_input() {
        let mut ledger = UsageLedger::default();
        ledger.record("d", Some("m"), counts(3, 9, 1));
        assert_eq!(ledger.day("d").cached, 3);
    }

    #[test]
    fn summary_reports_windows_peak_and_models() {
        let mut ledger = UsageLedger::default();
        ledger.record("2026-01-01", Some("gpt-5"), counts(100, 0, 0));
        ledger.record("2026-01-08", Some("gpt-5"), counts(40, 20, 10));
        ledger.record("2026-01-09", Some("o3"), counts(10, 0, 0));
        ledger.record("2026-01-09", None, counts(1000, 0, 0));

        let day_keys = keys(&[
            "2026-01-01",
            "2026-01-02",
            "2026-01-03",
            "2026-01-04",
            "2026-01-05",
            "2026-01-06",
            "2026-01-07",
            "2026-01-08",
            "2026-01-09",
        ]);
        let summary = ledger.summarize(42, &day_keys);

        assert_eq!(summary.days.len(), 9);
        assert_eq!(summary.totals.last30_days_tokens, 1160);
        assert_eq!(summary.totals.last7_days_tokens, 1060);
        assert_eq!(summary.totals.average_daily_tokens, 151);
        assert_eq!(summary.totals.cache_hit_rate_percent, 1.9);
        assert_eq!(summary.totals.peak_day.as_deref(), Some("2026-01-09"));
        assert_eq!(summary.totals.peak_day_tokens, 1010);

        let models: Vec<(&str, i64)> = summary
            .top_models
            .iter()
            .map(|m| (m.model.as_str(), m.tokens))
            .collect();
        assert_eq!(models, vec![("gpt-5", 150), ("o3", 10)]);
        assert_eq!(summary.top_models[0].share_percent, 12.9);
    }

    #[test]
    fn empty_ledger_summarizes_to_zeroes() {
        let summary = UsageLedger::default().summarize(0, &keys(&["2026-01-01"]));
        assert_eq!(summary.totals.peak_day, None);
        assert_eq!(summary.totals.cache_hit_rate_percent, 0.0);
        assert!(summary.top_models.is_empty());
    }
}
