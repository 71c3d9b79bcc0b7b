use chrono::{DateTime, Duration, Utc};

/// Age-based eviction rule for stored items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    hours: u32,
}

impl RetentionPolicy {
    pub fn from_hours(hours: u32) -> Self {
        Self { hours }
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    /// Items created at or before this instant are expired. A window
    /// reaching past the earliest representable time expires nothing.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::hours(i64::from(self.hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
