use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use crate::models::{ActivityLogEntry, ActivityStats, Streak};

/// Daily study-action counts. Days without an entry count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityLog {
    days: BTreeMap<NaiveDate, u32>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I: IntoIterator<Item = ActivityLogEntry>>(entries: I) -> Self {
        let mut log = Self::new();
        for entry in entries {
            log.add(entry.date, entry.count);
        }
        log
    }

    pub fn add(&mut self, date: NaiveDate, count: u32) {
        let slot = self.days.entry(date).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    pub fn count(&self, date: NaiveDate) -> u32 {
        self.days.get(&date).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> Vec<ActivityLogEntry> {
        self.days
            .iter()
            .map(|(&date, &count)| ActivityLogEntry { date, count })
            .collect()
    }

    pub fn streak(&self, today: NaiveDate) -> Streak {
        let mut current = 0;
        let mut cursor = Some(today);
        while let Some(day) = cursor.filter(|&d| self.count(d) >= 1) {
            current += 1;
            cursor = day.pred_opt();
        }

        let mut longest = 0;
        let mut run = 0;
        let mut prev: Option<NaiveDate> = None;
        for (&date, _) in self.days.iter().filter(|(_, &c)| c >= 1) {
            run = match prev {
                Some(p) if p.succ_opt() == Some(date) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            prev = Some(date);
        }

        Streak { current, longest }
    }

    /// Counts for the `days` days ending at `today`, oldest first.
    /// Days before the earliest representable date count as zero.
    pub fn bucket(&self, days: usize, today: NaiveDate) -> Vec<u32> {
        (0..days)
            .rev()
            .map(|back| {
                today
                    .checked_sub_days(Days::new(back as u64))
                    .map_or(0, |day| self.count(day))
            })
            .collect()
    }

    pub fn stats(&self, today: NaiveDate) -> ActivityStats {
        let active_days = self.days.values().filter(|&&c| c > 0).count();
        let total_activities: u64 = self.days.values().map(|&c| c as u64).sum();
        let average_daily = if active_days == 0 {
            0.0
        } else {
            total_activities as f64 / active_days as f64
        };

        ActivityStats {
            active_days,
            total_activities,
            average_daily,
            streak: self.streak(today),
        }
    }
}
