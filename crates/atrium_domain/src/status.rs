#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ThreadStatus {
    pub is_processing: bool,
    pub has_unread: bool,
    pub is_reviewing: bool,
    /// Set exactly while `is_processing` is true.
    pub processing_started_at: Option<u64>,
    pub last_duration_ms: Option<u64>,
}

impl ThreadStatus {
    /// Returns the next status, or `None` when the toggle is redundant.
    pub(crate) fn mark_processing(&self, is_processing: bool, timestamp: u64) -> Option<Self> {
        if self.is_processing == is_processing {
            return None;
        }
        let mut next = self.clone();
        next.is_processing = is_processing;
        if is_processing {
            next.processing_started_at = Some(timestamp);
        } else if let Some(started_at) = next.processing_started_at.take() {
            next.last_duration_ms = Some(timestamp.saturating_sub(started_at));
        }
        Some(next)
    }

    pub(crate) fn mark_reviewing(&self, is_reviewing: bool) -> Option<Self> {
        if self.is_reviewing == is_reviewing {
            return None;
        }
        Some(Self {
            is_reviewing,
            ..self.clone()
        })
    }

    pub(crate) fn mark_unread(&self, has_unread: bool) -> Option<Self> {
        if self.has_unread == has_unread {
            return None;
        }
        Some(Self {
            has_unread,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadStatus;

    #[test]
    fn processing_duration_is_measured_between_toggles() {
        let started = ThreadStatus::default()
            .mark_processing(true, 1000)
            .expect("start");
        assert_eq!(started.processing_started_at, Some(1000));

        let stopped = started.mark_processing(false, 1600).expect("stop");
        assert!(!stopped.is_processing);
        assert_eq!(stopped.processing_started_at, None);
        assert_eq!(stopped.last_duration_ms, Some(600));
    }

    #[test]
    fn redundant_toggles_are_ignored() {
        let idle = ThreadStatus::default();
        assert!(idle.mark_processing(false, 10).is_none());
        let running = idle.mark_processing(true, 10).expect("start");
        assert!(running.mark_processing(true, 20).is_none());
        assert_eq!(running.processing_started_at, Some(10));
    }

    #[test]
    fn clock_skew_never_underflows_duration() {
        let running = ThreadStatus::default()
            .mark_processing(true, 2000)
            .expect("start");
        let stopped = running.mark_processing(false, 1500).expect("stop");
        assert_eq!(stopped.last_duration_ms, Some(0));
    }

    #[test]
    fn restart_keeps_previous_duration_until_next_stop() {
        let status = ThreadStatus::default()
            .mark_processing(true, 0)
            .and_then(|s| s.mark_processing(false, 50))
            .and_then(|s| s.mark_processing(true, 100))
            .expect("toggles");
        assert_eq!(status.last_duration_ms, Some(50));
        assert_eq!(status.processing_started_at, Some(100));
    }

    #[test]
    fn flag_toggles_report_changes_only() {
        let status = ThreadStatus::default();
        assert!(status.mark_unread(false).is_none());
        let unread = status.mark_unread(true).expect("unread");
        assert!(unread.has_unread);
        let reviewing = unread.mark_reviewing(true).expect("reviewing");
        assert!(reviewing.is_reviewing && reviewing.has_unread);
        assert!(reviewing.mark_reviewing(true).is_none());
    }
}
