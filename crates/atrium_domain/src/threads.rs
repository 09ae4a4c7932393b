use crate::ThreadId;

pub const THREAD_NAME_MAX_CHARS: usize = 40;

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub name: String,
    /// Unix milliseconds of the last known activity, `0` when unknown.
    #[serde(default)]
    pub updated_at: u64,
    /// Once set the name is never rewritten from conversation content.
    #[serde(default)]
    pub has_custom_name: bool,
}

impl ThreadSummary {
    pub fn new(id: ThreadId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            updated_at: 0,
            has_custom_name: false,
        }
    }
}

pub(crate) fn default_thread_name(existing_threads: usize) -> String {
    format!("Agent {}", existing_threads + 1)
}

/// Derives a display name from message text: whitespace collapsed to single spaces and
/// capped at [`THREAD_NAME_MAX_CHARS`] characters with a trailing ellipsis.
pub fn derive_thread_name(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    if collapsed.chars().count() <= THREAD_NAME_MAX_CHARS {
        return Some(collapsed);
    }
    let mut out: String = collapsed.chars().take(THREAD_NAME_MAX_CHARS).collect();
    while out.ends_with(' ') {
        out.pop();
    }
    out.push('…');
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_count_from_one() {
        assert_eq!(default_thread_name(0), "Agent 1");
        assert_eq!(default_thread_name(4), "Agent 5");
    }

    #[test]
    fn derive_thread_name_collapses_whitespace() {
        assert_eq!(
            derive_thread_name("  Fix the\n\nflaky   test ").as_deref(),
            Some("Fix the flaky test")
        );
        assert_eq!(derive_thread_name(" \n\t "), None);
    }

    #[test]
    fn derive_thread_name_truncates_long_text() {
        let text = "a".repeat(THREAD_NAME_MAX_CHARS + 10);
        let name = derive_thread_name(&text).expect("name");
        assert_eq!(name.chars().count(), THREAD_NAME_MAX_CHARS + 1);
        assert!(name.ends_with('…'));
    }

    #[test]
    fn derive_thread_name_counts_characters_not_bytes() {
        let text = "é".repeat(THREAD_NAME_MAX_CHARS);
        assert_eq!(derive_thread_name(&text), Some(text));
    }
}
