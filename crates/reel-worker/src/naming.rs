//! Sequential output naming with a per-day quota.
//!
//! Output files are named `<prefix>-<N>.mp4`, where the prefix is a day of
//! the month (or a fixed custom token) and `N` counts up from 1. When a
//! day's quota is used up the prefix rolls over to the next calendar day.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};

/// Upper bound on day rollovers for a single allocation.
pub const MAX_ROLLOVER_DAYS: u32 = 366;

const DEFAULT_EXTENSION: &str = "mp4";

/// The token in front of the sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePrefix {
    /// Day-of-month token; rolls over to the following day.
    Day(NaiveDate),
    /// Custom token with no successor.
    Fixed(String),
}

impl NamePrefix {
    /// Interpret a user-supplied prefix.
    ///
    /// A number from 1 to 31 becomes a day prefix in `today`'s month, or the
    /// next month that has that day. Anything else is a fixed token.
    pub fn from_custom(custom: &str, today: NaiveDate) -> Self {
        let custom = custom.trim();
        let day = match custom.parse::<u32>() {
            Ok(day) if (1..=31).contains(&day) => day,
            _ => return NamePrefix::Fixed(custom.to_string()),
        };

        let month_start = today.with_day(1).unwrap_or(today);
        (0..12)
            .filter_map(|offset| month_start.checked_add_months(Months::new(offset)))
            .find_map(|start| start.with_day(day))
            .map(NamePrefix::Day)
            .unwrap_or_else(|| NamePrefix::Fixed(custom.to_string()))
    }

    pub fn token(&self) -> String {
        match self {
            NamePrefix::Day(date) => date.day().to_string(),
            NamePrefix::Fixed(token) => token.clone(),
        }
    }

    /// The prefix used once this one is full.
    pub fn next(&self) -> Option<NamePrefix> {
        match self {
            NamePrefix::Day(date) => date.succ_opt().map(NamePrefix::Day),
            NamePrefix::Fixed(_) => None,
        }
    }
}

/// A reserved output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub prefix: String,
    pub index: u32,
    pub file_name: String,
    pub path: PathBuf,
}

/// Allocates output names inside one directory.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    output_dir: PathBuf,
    extension: String,
}

impl NameAllocator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Sequence numbers already present for `token`.
    pub fn existing_indices(&self, token: &str) -> WorkerResult<Vec<u32>> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            r"^{}-(\d+)\.{}$",
            regex::escape(token),
            regex::escape(&self.extension)
        );
        let re = Regex::new(&pattern).map_err(|e| WorkerError::config_error(e.to_string()))?;

        let mut indices = Vec::new();
        for entry in std::fs::read_dir(&self.output_dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(n) = re
                .captures(&name)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            {
                indices.push(n);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    /// Slots left for `prefix` today, never negative.
    ///
    /// Numbering continues after the highest existing index, so gaps left
    /// by deleted files are not free slots.
    pub fn remaining_slots(&self, prefix: &NamePrefix, daily_limit: u32) -> WorkerResult<u32> {
        let highest = self.existing_indices(&prefix.token())?.last().copied().unwrap_or(0);
        Ok(daily_limit.saturating_sub(highest))
    }

    /// Reserve the next free name, rolling over to later days as needed.
    ///
    /// The name is claimed by creating an empty file, so a name that
    /// appeared since the scan is skipped rather than overwritten.
    pub fn allocate(&self, prefix: &NamePrefix, daily_limit: u32) -> WorkerResult<Allocation> {
        if daily_limit == 0 {
            return Err(WorkerError::config_error("Daily limit must be greater than 0"));
        }
        std::fs::create_dir_all(&self.output_dir)?;

        let mut current = prefix.clone();
        for _ in 0..=MAX_ROLLOVER_DAYS {
            let token = current.token();
            if let Some(allocation) = self.reserve_within(&token, daily_limit)? {
                debug!(file = %allocation.file_name, "Reserved output name");
                return Ok(allocation);
            }

            match current.next() {
                Some(next) => {
                    info!(
                        from = %token,
                        to = %next.token(),
                        daily_limit,
                        "Daily limit reached, rolling over to next day"
                    );
                    current = next;
                }
                None => {
                    return Err(WorkerError::QuotaExhausted {
                        prefix: token,
                        limit: daily_limit,
                    })
                }
            }
        }

        Err(WorkerError::QuotaExhausted {
            prefix: current.token(),
            limit: daily_limit,
        })
    }

    fn reserve_within(&self, token: &str, daily_limit: u32) -> WorkerResult<Option<Allocation>> {
        let mut index = self.existing_indices(token)?.last().copied().unwrap_or(0) + 1;

        while index <= daily_limit {
            let file_name = format!("{}-{}.{}", token, index, self.extension);
            let path = self.output_dir.join(&file_name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    return Ok(Some(Allocation {
                        prefix: token.to_string(),
                        index,
                        file_name,
                        path,
                    }))
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(file = %file_name, "Name taken since scan, trying next");
                    index += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Give back a reservation that was never filled.
    pub fn release(&self, allocation: &Allocation) {
        match std::fs::remove_file(&allocation.path) {
            Ok(()) => debug!(file = %allocation.file_name, "Released output name"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(file = %allocation.file_name, error = %e, "Failed to release output name"),
        }
    }
}

/// Caption file written next to a video: `<stem>_caption.txt`.
pub fn caption_path(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    video_path.with_file_name(format!("{}_caption.txt", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_first_allocation_starts_at_one() {
        let dir = TempDir::new().unwrap();
        let allocator = NameAllocator::new(dir.path());

        let allocation = allocator.allocate(&NamePrefix::Day(date(2024, 3, 5)), 50).unwrap();
        assert_eq!(allocation.file_name, "5-1.mp4");
        assert!(allocation.path.exists());
    }

    #[test]
    fn test_allocation_is_max_plus_one() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "5-1.mp4");
        touch(dir.path(), "5-4.mp4");
        touch(dir.path(), "15-9.mp4");
        touch(dir.path(), "5-2_caption.txt");
        let allocator = NameAllocator::new(dir.path());

        assert_eq!(allocator.existing_indices("5").unwrap(), vec![1, 4]);
        let allocation = allocator.allocate(&NamePrefix::Day(date(2024, 3, 5)), 50).unwrap();
        assert_eq!(allocation.index, 5);
    }

    #[test]
    fn test_names_increase_monotonically() {
        let dir = TempDir::new().unwrap();
        let allocator = NameAllocator::new(dir.path());
        let prefix = NamePrefix::Fixed("promo".into());

        let names: Vec<u32> = (0..4)
            .map(|_| allocator.allocate(&prefix, 10).unwrap().index)
            .collect();
        assert_eq!(names, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rollover_to_next_day() {
        let dir = TempDir::new().unwrap();
        let allocator = NameAllocator::new(dir.path());
        let prefix = NamePrefix::Day(date(2024, 3, 5));

        for expected in ["5-1.mp4", "5-2.mp4", "5-3.mp4", "6-1.mp4"] {
            assert_eq!(allocator.allocate(&prefix, 3).unwrap().file_name, expected);
        }
    }

    #[test]
    fn test_rollover_skips_days_left_full_by_earlier_runs() {
        let dir = TempDir::new().unwrap();
        for name in ["5-1.mp4", "6-1.mp4", "6-2.mp4", "7-1.mp4"] {
            touch(dir.path(), name);
        }
        let allocator = NameAllocator::new(dir.path());

        let allocation = allocator.allocate(&NamePrefix::Day(date(2024, 3, 5)), 2).unwrap();
        assert_eq!(allocation.file_name, "5-2.mp4");
        let allocation = allocator.allocate(&NamePrefix::Day(date(2024, 3, 5)), 2).unwrap();
        assert_eq!(allocation.file_name, "7-2.mp4");
    }

    #[test]
    fn test_month_end_rolls_to_first() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "31-1.mp4");
        let allocator = NameAllocator::new(dir.path());

        let allocation = allocator.allocate(&NamePrefix::Day(date(2024, 1, 31)), 1).unwrap();
        assert_eq!(allocation.file_name, "1-1.mp4");
    }

    #[test]
    fn test_fixed_prefix_exhausts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "promo-1.mp4");
        let allocator = NameAllocator::new(dir.path());

        let err = allocator.allocate(&NamePrefix::Fixed("promo".into()), 1).unwrap_err();
        assert!(matches!(err, WorkerError::QuotaExhausted { limit: 1, .. }));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let dir = TempDir::new().unwrap();
        let allocator = NameAllocator::new(dir.path());
        let err = allocator.allocate(&NamePrefix::Fixed("a".into()), 0).unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
    }

    #[test]
    fn test_prefix_is_escaped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "axb-1.mp4");
        let allocator = NameAllocator::new(dir.path());

        assert!(allocator.existing_indices("a.b").unwrap().is_empty());
    }

    #[test]
    fn test_release_removes_reservation() {
        let dir = TempDir::new().unwrap();
        let allocator = NameAllocator::new(dir.path());
        let prefix = NamePrefix::Fixed("x".into());

        let first = allocator.allocate(&prefix, 5).unwrap();
        allocator.release(&first);
        assert!(!first.path.exists());
        assert_eq!(allocator.allocate(&prefix, 5).unwrap().index, 1);
    }

    #[test]
    fn test_remaining_slots_saturate() {
        let dir = TempDir::new().unwrap();
        for name in ["9-1.mp4", "9-2.mp4", "9-3.mp4"] {
            touch(dir.path(), name);
        }
        let allocator = NameAllocator::new(dir.path());
        let prefix = NamePrefix::Day(date(2024, 6, 9));

        assert_eq!(allocator.remaining_slots(&prefix, 5).unwrap(), 2);
        assert_eq!(allocator.remaining_slots(&prefix, 2).unwrap(), 0);
    }

    #[test]
    fn test_remaining_slots_count_from_highest_index() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "promo-1.mp4");
        touch(dir.path(), "promo-3.mp4");
        let allocator = NameAllocator::new(dir.path());
        let prefix = NamePrefix::Fixed("promo".into());

        assert_eq!(allocator.remaining_slots(&prefix, 3).unwrap(), 0);
        assert_eq!(allocator.remaining_slots(&prefix, 5).unwrap(), 2);
        assert!(matches!(
            allocator.allocate(&prefix, 3),
            Err(WorkerError::QuotaExhausted { .. })
        ));
    }

    #[test]
    fn test_missing_output_dir_has_no_names() {
        let dir = TempDir::new().unwrap();
        let allocator = NameAllocator::new(dir.path().join("later"));
        assert_eq!(allocator.remaining_slots(&NamePrefix::Fixed("a".into()), 3).unwrap(), 3);
    }

    #[test]
    fn test_custom_prefix_parsing() {
        let today = date(2024, 2, 10);
        assert_eq!(NamePrefix::from_custom("24", today), NamePrefix::Day(date(2024, 2, 24)));
        // February has no 30th
        assert_eq!(NamePrefix::from_custom("30", today), NamePrefix::Day(date(2024, 3, 30)));
        assert_eq!(NamePrefix::from_custom("promo", today), NamePrefix::Fixed("promo".into()));
        assert_eq!(NamePrefix::from_custom("0", today), NamePrefix::Fixed("0".into()));
    }

    #[test]
    fn test_caption_path() {
        assert_eq!(
            caption_path(Path::new("/out/5-3.mp4")),
            PathBuf::from("/out/5-3_caption.txt")
        );
    }
}
