use crate::error::{DigestError, Result};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};

const DAY_MS: i64 = 24 * 3600 * 1000;

/// Valid range for a whole-hour UTC offset.
pub const MIN_OFFSET_HOURS: i32 = -12;
pub const MAX_OFFSET_HOURS: i32 = 14;

/// "Today" in a fixed UTC offset, as epoch-millisecond bounds.
///
/// `start_ms` is local midnight, `end_ms` is local 23:59:59.999. Both are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
    pub offset: FixedOffset,
}

impl TimeWindow {
    /// Resolve the local day containing `now` in the given offset.
    pub fn resolve(offset_hours: i32, now: DateTime<Utc>) -> Result<Self> {
        let offset = fixed_offset(offset_hours)?;
        let local_midnight = now
            .with_timezone(&offset)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| DigestError::Config("cannot compute local midnight".into()))?;
        let start = offset
            .from_local_datetime(&local_midnight)
            .single()
            .ok_or_else(|| DigestError::Config("ambiguous local midnight".into()))?;

        let start_ms = start.timestamp_millis();
        Ok(Self {
            start_ms,
            end_ms: start_ms + DAY_MS - 1,
            offset,
        })
    }

    /// Resolve against the wall clock.
    pub fn today(offset_hours: i32) -> Result<Self> {
        Self::resolve(offset_hours, Utc::now())
    }

    pub fn offset_hours(&self) -> i32 {
        self.offset.local_minus_utc() / 3600
    }

    pub fn contains(&self, ts_ms: i64) -> bool {
        ts_ms >= self.start_ms && ts_ms <= self.end_ms
    }

    /// Local calendar date as `YYYY-MM-DD`.
    pub fn date_label(&self) -> String {
        match self.offset.timestamp_millis_opt(self.start_ms).single() {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => String::new(),
        }
    }

    /// Bounds in epoch seconds, the resolution the message API filters on.
    pub fn bounds_secs(&self) -> (i64, i64) {
        (self.start_ms.div_euclid(1000), self.end_ms.div_euclid(1000))
    }
}

fn fixed_offset(offset_hours: i32) -> Result<FixedOffset> {
    if !(MIN_OFFSET_HOURS..=MAX_OFFSET_HOURS).contains(&offset_hours) {
        return Err(DigestError::Config(format!(
            "timezone offset {} is outside {}..={}",
            offset_hours, MIN_OFFSET_HOURS, MAX_OFFSET_HOURS
        )));
    }
    FixedOffset::east_opt(offset_hours * 3600)
        .ok_or_else(|| DigestError::Config(format!("invalid timezone offset {}", offset_hours)))
}
