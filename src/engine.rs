use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::activity::ActivityLog;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::mastery::MasteryAggregator;
use crate::matcher::Matcher;
use crate::models::{
    ActivityLogEntry, ActivityStats, AnswerCheck, DueStatus, ItemKind, MasteryReport,
    PracticeCandidate, Quality, ReviewRecord, ReviewStatus, ReviewSummary, Streak, StudyItem,
    TopicContent, TopicCounters, TopicProgress, WeakPointReport,
};
use crate::scheduler::Scheduler;
use crate::selector::Selector;
use crate::store::{Field, Medium, ProgressStore};
use crate::weak_points;

// wrong_count lives in its own counter so a review write can't lower it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredReview {
    level: usize,
    last_reviewed_at: Option<NaiveDate>,
    review_count: u32,
}

fn saturating_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// One learner's study engine: a store handle plus the tuned components.
///
/// Every date-dependent call takes `today` from the caller.
pub struct StudyEngine<M: Medium> {
    store: ProgressStore<M>,
    config: EngineConfig,
    scheduler: Scheduler,
    selector: Selector,
    matcher: Matcher,
    mastery: MasteryAggregator,
}

impl<M: Medium> StudyEngine<M> {
    pub fn new(store: ProgressStore<M>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scheduler: Scheduler::new(&config.scheduler)?,
            selector: Selector::new(config.selector),
            matcher: Matcher::new(config.matcher),
            mastery: MasteryAggregator::new(config.mastery),
            store,
            config,
        })
    }

    pub fn with_defaults(store: ProgressStore<M>) -> Result<Self> {
        Self::new(store, EngineConfig::default())
    }

    pub fn store(&self) -> &ProgressStore<M> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // Spaced review

    pub fn review_record(&self, item: &StudyItem) -> Result<ReviewRecord> {
        let stored: StoredReview = self
            .store
            .get(&self.store.item_key(item, Field::Review)?)
            .unwrap_or_default();
        let wrong = self.store.counter(&self.store.item_key(item, Field::Wrong)?);

        Ok(ReviewRecord {
            level: self.scheduler.clamp_level(stored.level),
            last_reviewed_at: stored.last_reviewed_at,
            review_count: stored.review_count,
            wrong_count: saturating_u32(wrong),
        })
    }

    pub fn due_status(&self, item: &StudyItem, today: NaiveDate) -> Result<DueStatus> {
        let record = self.review_record(item)?;
        Ok(self.scheduler.due_status(&record, today))
    }

    pub fn mark_reviewed(
        &self,
        item: &StudyItem,
        quality: Quality,
        today: NaiveDate,
    ) -> Result<ReviewRecord> {
        let record = self.review_record(item)?;
        let updated = self.scheduler.mark_reviewed(&record, quality, today);

        let stored = StoredReview {
            level: updated.level,
            last_reviewed_at: updated.last_reviewed_at,
            review_count: updated.review_count,
        };
        self.store
            .set(&self.store.item_key(item, Field::Review)?, &stored)?;
        self.note_activity(today);

        Ok(updated)
    }

    pub fn review_status(&self, item: &StudyItem, today: NaiveDate) -> Result<ReviewStatus> {
        let record = self.review_record(item)?;
        Ok(ReviewStatus {
            item: item.clone(),
            due: self.scheduler.due_status(&record, today),
            record,
        })
    }

    pub fn review_queue(&self, items: &[StudyItem], today: NaiveDate) -> Result<Vec<ReviewStatus>> {
        let statuses = items
            .iter()
            .map(|item| self.review_status(item, today))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.scheduler.review_queue(statuses))
    }

    pub fn review_summary(&self, items: &[StudyItem], today: NaiveDate) -> Result<ReviewSummary> {
        let records = items
            .iter()
            .map(|item| self.review_record(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.scheduler.summarize(&records, today))
    }

    // Answers and practice

    /// Records one answer. Returns the item's miss count afterwards.
    ///
    /// The miss counter is the only non-idempotent write and goes last, so
    /// an `Err` never leaves a counted miss behind.
    pub fn record_answer(&self, item: &StudyItem, correct: bool, today: NaiveDate) -> Result<u32> {
        let wrong_key = self.store.item_key(item, Field::Wrong)?;

        if item.kind == ItemKind::QuizQuestion {
            self.store
                .set(&self.store.item_key(item, Field::LastAnswer)?, &correct)?;
        }

        let wrong = if correct {
            self.store.counter(&wrong_key)
        } else {
            self.store.increment(&wrong_key, 1)?.max(0) as u64
        };
        self.note_activity(today);

        Ok(saturating_u32(wrong))
    }

    /// Fuzzy comparison without touching the store.
    pub fn check_text(&self, given: &str, canonical: &str) -> AnswerCheck {
        self.matcher.check(given, canonical)
    }

    pub fn check_answer(
        &self,
        item: &StudyItem,
        given: &str,
        canonical: &str,
        today: NaiveDate,
    ) -> Result<AnswerCheck> {
        let check = self.matcher.check(given, canonical);
        self.record_answer(item, check.is_match, today)?;
        Ok(check)
    }

    pub fn practice_pool(&self, items: &[StudyItem]) -> Result<Vec<PracticeCandidate>> {
        items
            .iter()
            .map(|item| {
                let wrong = self.store.counter(&self.store.item_key(item, Field::Wrong)?);
                Ok(PracticeCandidate {
                    item: item.clone(),
                    wrong_count: saturating_u32(wrong),
                })
            })
            .collect()
    }

    /// Picks the next practice item. `Ok(None)` for an empty pool.
    pub fn select_next<R: Rng + ?Sized>(
        &self,
        items: &[StudyItem],
        last_shown: Option<&StudyItem>,
        rng: &mut R,
    ) -> Result<Option<StudyItem>> {
        let pool = self.practice_pool(items)?;
        Ok(self
            .selector
            .select_next(&pool, last_shown, rng)
            .map(|c| c.item.clone()))
    }

    // Topic signals

    pub fn mark_section_read(&self, topic_id: &str, section: &str, today: NaiveDate) -> Result<()> {
        let item = StudyItem::new(topic_id, ItemKind::Section, section);
        self.store
            .set(&self.store.item_key(&item, Field::Visited)?, &true)?;
        self.note_activity(today);
        Ok(())
    }

    /// Adds study time to a topic. Returns the topic's total seconds.
    pub fn add_study_time(&self, topic_id: &str, seconds: u64, today: NaiveDate) -> Result<u64> {
        let key = self.store.topic_key(topic_id, Field::SecondsSpent)?;
        if seconds == 0 {
            return Ok(self.store.counter(&key));
        }

        let delta = i64::try_from(seconds).unwrap_or(i64::MAX);
        let total = self.store.increment(&key, delta)?;
        self.note_activity(today);
        Ok(total.max(0) as u64)
    }

    pub fn topic_counters(&self, content: &TopicContent) -> Result<TopicCounters> {
        let topic = content.topic_id.as_str();
        let mut counters = TopicCounters::default();

        for section in &content.sections {
            let item = StudyItem::new(topic, ItemKind::Section, section.as_str());
            counters.sections_total += 1;
            if self
                .store
                .get::<bool>(&self.store.item_key(&item, Field::Visited)?)
                .unwrap_or(false)
            {
                counters.sections_read += 1;
            }
        }

        for question in &content.quiz_questions {
            let item = StudyItem::new(topic, ItemKind::QuizQuestion, question.as_str());
            if let Some(correct) = self
                .store
                .get::<bool>(&self.store.item_key(&item, Field::LastAnswer)?)
            {
                counters.quiz_answered += 1;
                if correct {
                    counters.quiz_correct += 1;
                }
            }
        }

        for item in &content.practice_items {
            counters.practice_total += 1;
            if self.scheduler.is_mature(&self.review_record(item)?) {
                counters.practice_mature += 1;
            }
        }

        counters.seconds_spent = self
            .store
            .counter(&self.store.topic_key(topic, Field::SecondsSpent)?);
        let minutes = content
            .target_minutes
            .unwrap_or_else(|| self.config.target_minutes());
        counters.target_seconds = minutes as u64 * 60;

        Ok(counters)
    }

    pub fn topic_progress(&self, content: &TopicContent) -> Result<TopicProgress> {
        Ok(crate::mastery::progress_from_counters(
            &self.topic_counters(content)?,
        ))
    }

    pub fn topic_mastery(&self, content: &TopicContent) -> Result<MasteryReport> {
        let counters = self.topic_counters(content)?;
        self.mastery.report(&content.topic_id, counters)
    }

    /// Quiz questions of the topic whose latest recorded answer was wrong,
    /// in content order.
    pub fn missed_questions(&self, content: &TopicContent) -> Result<Vec<StudyItem>> {
        let mut missed = Vec::new();
        for question in &content.quiz_questions {
            let item = StudyItem::new(
                content.topic_id.as_str(),
                ItemKind::QuizQuestion,
                question.as_str(),
            );
            let last = self
                .store
                .get::<bool>(&self.store.item_key(&item, Field::LastAnswer)?);
            if last == Some(false) {
                missed.push(item);
            }
        }
        Ok(missed)
    }

    /// Knowledge gaps across topics: weakest topics and severest gaps first.
    pub fn weak_topics(&self, contents: &[TopicContent]) -> Result<WeakPointReport> {
        let scored = contents
            .iter()
            .map(|c| Ok((c.topic_id.clone(), self.topic_counters(c)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(weak_points::analyze(scored))
    }

    // Activity

    /// Counts one study action for `today`. Returns the day's new total.
    pub fn record_activity(&self, today: NaiveDate) -> Result<u32> {
        let count = self.store.increment(&self.store.activity_key(today), 1)?;
        Ok(saturating_u32(count.max(0) as u64))
    }

    // Follow-up to an item write that already landed. Failing here must not
    // turn into an Err, or a retry would apply the item write twice.
    fn note_activity(&self, today: NaiveDate) {
        if let Err(e) = self.record_activity(today) {
            warn!(date = %today, error = %e, "activity not recorded");
        }
    }

    pub fn activity_log(&self) -> ActivityLog {
        let entries = self
            .store
            .scan::<u32>(&self.store.activity_prefix())
            .into_iter()
            .filter_map(|(suffix, count)| {
                let date = NaiveDate::parse_from_str(&suffix, "%Y-%m-%d").ok()?;
                Some(ActivityLogEntry { date, count })
            });
        ActivityLog::from_entries(entries)
    }

    pub fn streak(&self, today: NaiveDate) -> Streak {
        self.activity_log().streak(today)
    }

    pub fn activity_bucket(&self, days: usize, today: NaiveDate) -> Vec<u32> {
        self.activity_log().bucket(days, today)
    }

    pub fn activity_stats(&self, today: NaiveDate) -> ActivityStats {
        self.activity_log().stats(today)
    }

    /// Clears everything stored for this learner.
    pub fn reset(&self) -> Result<usize> {
        self.store.reset()
    }
}
