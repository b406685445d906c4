use std::sync::{Arc, Mutex};

use time::{Date, Duration, OffsetDateTime, UtcOffset};

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(at: OffsetDateTime) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn set(&self, at: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Maps instants onto the user's local calendar days.
#[derive(Clone)]
pub struct LocalDays {
    clock: Arc<dyn Clock>,
    offset: UtcOffset,
}

impl LocalDays {
    pub fn new(clock: Arc<dyn Clock>, offset: UtcOffset) -> Self {
        Self { clock, offset }
    }

    pub fn system(offset: UtcOffset) -> Self {
        Self::new(Arc::new(SystemClock), offset)
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now_utc().to_offset(self.offset)
    }

    pub fn today(&self) -> Date {
        self.now().date()
    }

    pub fn date_of(&self, at: OffsetDateTime) -> Date {
        at.to_offset(self.offset).date()
    }

    pub fn start_of(&self, date: Date) -> OffsetDateTime {
        date.midnight().assume_offset(self.offset)
    }

    /// Half-open instant range `[from 00:00, to+1 00:00)` in local time.
    pub fn bounds(&self, from: Date, to: Date) -> (OffsetDateTime, OffsetDateTime) {
        (self.start_of(from), self.start_of(to) + Duration::DAY)
    }

    /// First and last date of the trailing `days` calendar days, today included.
    /// `days` must be at least 1.
    pub fn trailing(&self, days: u32) -> (Date, Date) {
        let today = self.today();
        let back = i64::from(days.max(1)) - 1;
        (today - Duration::days(back), today)
    }
}

impl std::fmt::Debug for LocalDays {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDays")
            .field("offset", &self.offset)
            .field("now", &self.now())
            .finish()
    }
}
