use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::config::SchedulerConfig;
use crate::error::{Result, StudyError};
use crate::models::{DueStatus, Quality, ReviewRecord, ReviewStatus, ReviewSummary};

/// Level-based spaced review.
///
/// Levels index the interval table. Hard steps down, Good stays, Easy steps
/// up; both ends saturate and there is no terminal level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduler {
    intervals: Vec<u32>,
    mature_interval_days: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        let config = SchedulerConfig::default();
        Self {
            intervals: config.intervals,
            mature_interval_days: config.mature_interval_days,
        }
    }
}

impl Scheduler {
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        if config.intervals.is_empty() {
            return Err(StudyError::InvalidConfig(
                "interval table must not be empty".into(),
            ));
        }
        Ok(Self {
            intervals: config.intervals.clone(),
            mature_interval_days: config.mature_interval_days,
        })
    }

    pub fn max_level(&self) -> usize {
        self.intervals.len() - 1
    }

    pub fn clamp_level(&self, level: usize) -> usize {
        level.min(self.max_level())
    }

    pub fn interval_for(&self, level: usize) -> u32 {
        self.intervals[self.clamp_level(level)]
    }

    pub fn due_status(&self, record: &ReviewRecord, today: NaiveDate) -> DueStatus {
        let level = self.clamp_level(record.level);
        let interval = self.intervals[level];

        match record.last_reviewed_at {
            None => DueStatus {
                is_due: true,
                level,
                interval,
                days_since: None,
                due_in: 0,
            },
            Some(last) => {
                let days_since = (today - last).num_days();
                let due_in = interval as i64 - days_since;
                DueStatus {
                    is_due: due_in <= 0,
                    level,
                    interval,
                    days_since: Some(days_since),
                    due_in,
                }
            }
        }
    }

    pub fn mark_reviewed(
        &self,
        record: &ReviewRecord,
        quality: Quality,
        today: NaiveDate,
    ) -> ReviewRecord {
        let level = self.clamp_level(record.level);
        let level = match quality {
            Quality::Hard => level.saturating_sub(1),
            Quality::Good => level,
            Quality::Easy => (level + 1).min(self.max_level()),
        };

        ReviewRecord {
            level,
            last_reviewed_at: Some(today),
            review_count: record.review_count.saturating_add(1),
            wrong_count: record.wrong_count,
        }
    }

    pub fn is_mature(&self, record: &ReviewRecord) -> bool {
        !record.is_new() && self.interval_for(record.level) >= self.mature_interval_days
    }

    /// Orders statuses for study: due before not due, most overdue first,
    /// never-reviewed ahead of reviewed items with the same `due_in`.
    pub fn review_queue(&self, mut statuses: Vec<ReviewStatus>) -> Vec<ReviewStatus> {
        statuses.sort_by(|a, b| match (a.due.is_due, b.due.is_due) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a
                .due
                .due_in
                .cmp(&b.due.due_in)
                .then_with(|| b.record.is_new().cmp(&a.record.is_new()))
                .then_with(|| a.item.cmp(&b.item)),
        });
        statuses
    }

    pub fn summarize<'a, I>(&self, records: I, today: NaiveDate) -> ReviewSummary
    where
        I: IntoIterator<Item = &'a ReviewRecord>,
    {
        let mut summary = ReviewSummary::default();
        for record in records {
            summary.total += 1;
            summary.total_reviews += record.review_count as u64;
            if record.is_new() {
                summary.new += 1;
            } else if self.is_mature(record) {
                summary.mature += 1;
            } else {
                summary.learning += 1;
            }
            if self.due_status(record, today).is_due {
                summary.due += 1;
            }
        }
        summary
    }
}
