use crate::config::ReminderConfig;
use chrono::{DateTime, Duration, Utc};

/// Decides whether a record with due instant `due` is inside its reminder
/// window at `now`.
///
/// The lower bound compares `now + display_offset` against `due - lead_time`.
/// The offset is a plain shift of the UTC instant, not a zone conversion.
/// The upper bound uses the unshifted `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderWindow {
    pub display_offset: Duration,
    pub lead_time: Duration,
}

impl Default for ReminderWindow {
    fn default() -> Self {
        Self::from_config(&ReminderConfig::default())
    }
}

impl ReminderWindow {
    pub fn new(display_offset: Duration, lead_time: Duration) -> Self {
        Self {
            display_offset,
            lead_time,
        }
    }

    pub fn from_config(config: &ReminderConfig) -> Self {
        Self::new(config.display_offset(), config.lead_time())
    }

    /// Instants whose shifted bounds fall outside chrono's range never match.
    pub fn is_due(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let normalized_now = now.checked_add_signed(self.display_offset);
        let window_start = due.checked_sub_signed(self.lead_time);

        match (normalized_now, window_start) {
            (Some(normalized_now), Some(window_start)) => {
                normalized_now >= window_start && now < due
            }
            _ => false,
        }
    }
}
