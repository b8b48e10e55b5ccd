//! Fixed-width time buckets for one labeling pass
//!
//! Breaks run `start, start + w, ...` strictly below the latest trade
//! timestamp. Buckets are left-closed; the first bucket is open below and the
//! last one open above, so every timestamp lands in exactly one bucket.

use std::fmt;

/// Half-open interval `[lower, upper)`; `None` means unbounded on that side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

impl TimeBucket {
    pub const UNBOUNDED: TimeBucket = TimeBucket {
        lower: None,
        upper: None,
    };

    pub fn contains(&self, ts: i64) -> bool {
        self.lower.map_or(true, |l| ts >= l) && self.upper.map_or(true, |u| ts < u)
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) => write!(f, "[{}, {})", l, u),
            (Some(l), None) => write!(f, "[{}, inf)", l),
            (None, Some(u)) => write!(f, "(-inf, {})", u),
            (None, None) => f.write_str("(-inf, inf)"),
        }
    }
}

/// Bucket boundaries for one window size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketGrid {
    start: i64,
    width: i64,
    breaks: i64,
}

impl BucketGrid {
    /// Grid anchored at `start` covering up to `end` (the latest timestamp)
    pub fn new(start: i64, end: i64, width: u64) -> Self {
        let width = i64::try_from(width).unwrap_or(i64::MAX).max(1);
        let span = end.saturating_sub(start);
        let breaks = if span > 0 {
            // ceil(span / width) without overflow
            span / width + i64::from(span % width != 0)
        } else {
            0
        };
        Self {
            start,
            width,
            breaks,
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    /// Number of break points
    pub fn breaks(&self) -> usize {
        self.breaks as usize
    }

    /// The bucket holding `ts`
    pub fn bucket_of(&self, ts: i64) -> TimeBucket {
        if self.breaks == 0 {
            return TimeBucket::UNBOUNDED;
        }
        if ts < self.start {
            return TimeBucket {
                lower: None,
                upper: Some(self.start),
            };
        }

        let index = (ts - self.start) / self.width;
        let last = self.breaks - 1;
        if index >= last {
            TimeBucket {
                lower: Some(self.start + last * self.width),
                upper: None,
            }
        } else {
            let lower = self.start + index * self.width;
            TimeBucket {
                lower: Some(lower),
                upper: Some(lower + self.width),
            }
        }
    }
}
