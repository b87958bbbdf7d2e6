//! Date-window scheduling for incremental extraction
//!
//! Windows are day-aligned. The schedule starts `lookback_days` before the
//! day of the last bookmark, ends at midnight UTC today, and advances by
//! `window_days`. The loop stops when the cursor is no longer before the
//! end, and the final window is truncated to the end, so the schedule
//! always terminates and never skips a trailing partial window.

use chrono::{DateTime, Duration, Utc};

use crate::timestamp::{days, floor_to_day};

/// A half-open time range `[start, end)` covered by one extraction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Overlap requested from the API before a window's start, in seconds
const FETCH_OVERLAP_SECS: i64 = 1;

impl Window {
    /// Create a window; `None` unless `start < end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Start of the range requested from the API, one unit before `start`
    ///
    /// Records in the overlap were emitted by the previous window and are
    /// filtered out by [`Window::admits`].
    pub fn fetch_start(&self) -> DateTime<Utc> {
        self.start - Duration::seconds(FETCH_OVERLAP_SECS)
    }

    /// Whether a record with replication value `ts` is emitted by this window
    ///
    /// Only the lower bound is checked: `ts` must be strictly after
    /// [`Window::fetch_start`], which at second resolution means
    /// `ts >= start`. Records past `end` are emitted, since the running
    /// maximum, and so the bookmark, already accounts for them.
    pub fn admits(&self, ts: DateTime<Utc>) -> bool {
        ts > self.fetch_start()
    }
}

/// Window sizing and range limits for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSchedule {
    /// Days re-examined before the last bookmark
    pub lookback_days: u32,
    /// Width of each window in days
    pub window_days: u32,
    /// Oldest data the API will serve, in days before today
    pub max_history_days: Option<u32>,
}

impl WindowSchedule {
    /// Compute the windows to sync given the last bookmark and the current time
    pub fn windows(&self, last_bookmark: DateTime<Utc>, now: DateTime<Utc>) -> Windows {
        compute_windows(
            last_bookmark,
            self.lookback_days,
            self.window_days,
            self.max_history_days,
            now,
        )
    }
}

/// Compute the contiguous sequence of windows from the bookmark to today
///
/// `window_days` of zero is treated as one day.
pub fn compute_windows(
    last_bookmark: DateTime<Utc>,
    lookback_days: u32,
    window_days: u32,
    max_history_days: Option<u32>,
    now: DateTime<Utc>,
) -> Windows {
    let end = floor_to_day(now);
    let mut start = floor_to_day(last_bookmark) - days(lookback_days);

    if let Some(max_days) = max_history_days {
        let earliest = end - days(max_days);
        if start < earliest {
            log::info!(
                "Start {} exceeds the maximum history, clamping to {}",
                start,
                earliest
            );
            start = earliest;
        }
    }

    Windows {
        cursor: start,
        end,
        step: days(window_days.max(1)),
    }
}

/// Iterator over scheduled windows
#[derive(Debug, Clone)]
pub struct Windows {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.cursor >= self.end {
            return None;
        }
        let window_end = (self.cursor + self.step).min(self.end);
        let window = Window::new(self.cursor, window_end)?;
        self.cursor = window_end;
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_lookback_and_floor() {
        let windows: Vec<_> =
            compute_windows(at(2024, 3, 10, 15), 2, 1, None, at(2024, 3, 12, 9)).collect();

        assert_eq!(
            windows,
            vec![
                Window::new(at(2024, 3, 8, 0), at(2024, 3, 9, 0)).unwrap(),
                Window::new(at(2024, 3, 9, 0), at(2024, 3, 10, 0)).unwrap(),
                Window::new(at(2024, 3, 10, 0), at(2024, 3, 11, 0)).unwrap(),
                Window::new(at(2024, 3, 11, 0), at(2024, 3, 12, 0)).unwrap(),
            ]
        );
    }

    #[test]
    fn test_windows_are_contiguous() {
        let windows: Vec<_> =
            compute_windows(at(2024, 1, 1, 0), 0, 7, None, at(2024, 2, 15, 12)).collect();

        assert_eq!(windows.first().unwrap().start, at(2024, 1, 1, 0));
        assert_eq!(windows.last().unwrap().end, at(2024, 2, 15, 0));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
    }

    #[test]
    fn test_trailing_partial_window_is_truncated() {
        // 10 days with 4-day windows: 4 + 4 + 2
        let windows: Vec<_> =
            compute_windows(at(2024, 5, 1, 0), 0, 4, None, at(2024, 5, 11, 6)).collect();

        let widths: Vec<_> = windows.iter().map(|w| (w.end - w.start).num_days()).collect();
        assert_eq!(widths, vec![4, 4, 2]);
        assert_eq!(windows.last().unwrap().end, at(2024, 5, 11, 0));
    }

    #[test]
    fn test_bookmark_today_yields_nothing() {
        let now = at(2024, 5, 11, 6);
        assert_eq!(compute_windows(at(2024, 5, 11, 1), 0, 1, None, now).count(), 0);
    }

    #[test]
    fn test_future_bookmark_terminates() {
        let now = at(2024, 5, 11, 6);
        assert_eq!(compute_windows(at(2024, 6, 1, 0), 0, 1, None, now).count(), 0);
    }

    #[test]
    fn test_max_history_clamps_start() {
        let windows: Vec<_> =
            compute_windows(at(2010, 1, 1, 0), 1, 31, Some(40), at(2024, 5, 11, 6)).collect();

        assert_eq!(windows.first().unwrap().start, at(2024, 4, 1, 0));
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn test_zero_window_size_still_terminates() {
        let count = compute_windows(at(2024, 5, 8, 0), 0, 0, None, at(2024, 5, 11, 0)).count();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_overlap_record_left_to_previous_window() {
        let first = Window::new(at(2024, 5, 1, 0), at(2024, 5, 2, 0)).unwrap();
        let second = Window::new(at(2024, 5, 2, 0), at(2024, 5, 3, 0)).unwrap();
        let boundary = at(2024, 5, 2, 0);
        let overlap = boundary - Duration::seconds(1);

        assert_eq!(second.fetch_start(), overlap);
        assert!(second.admits(boundary));
        assert!(!second.admits(overlap));
        assert!(first.admits(overlap));
    }

    #[test]
    fn test_records_past_window_end_are_admitted() {
        let window = Window::new(at(2024, 5, 1, 0), at(2024, 5, 2, 0)).unwrap();
        assert!(window.admits(at(2024, 5, 2, 0)));
        assert!(window.admits(at(2024, 5, 9, 13)));
        assert!(!window.admits(at(2024, 4, 30, 12)));
    }

    #[test]
    fn test_window_new_requires_order() {
        assert!(Window::new(at(2024, 5, 2, 0), at(2024, 5, 2, 0)).is_none());
        assert!(Window::new(at(2024, 5, 3, 0), at(2024, 5, 2, 0)).is_none());
    }
}
