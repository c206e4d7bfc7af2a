use crate::config::MasteryWeights;
use crate::error::{Result, StudyError};
use crate::models::{MasteryReport, TopicCounters, TopicProgress};

const SIGNAL_NAMES: [&str; 4] = [
    "sections_read",
    "quiz_accuracy",
    "practice_maturity",
    "time_invested",
];

fn fraction(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        (numerator as f64 / denominator as f64).min(1.0)
    }
}

/// Derives the four signals from raw tallies. Empty denominators give 0.
pub fn progress_from_counters(counters: &TopicCounters) -> TopicProgress {
    TopicProgress {
        sections_read: fraction(counters.sections_read as u64, counters.sections_total as u64),
        quiz_accuracy: fraction(counters.quiz_correct as u64, counters.quiz_answered as u64),
        practice_maturity: fraction(
            counters.practice_mature as u64,
            counters.practice_total as u64,
        ),
        time_invested: fraction(counters.seconds_spent, counters.target_seconds),
    }
}

/// Combines topic signals into one 0-100 mastery score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MasteryAggregator {
    weights: MasteryWeights,
}

impl MasteryAggregator {
    pub fn new(weights: MasteryWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, progress: &TopicProgress) -> Result<u8> {
        let fractions = progress.as_array();
        for (name, value) in SIGNAL_NAMES.into_iter().zip(fractions) {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(StudyError::InvalidFraction { name, value });
            }
        }

        let combined: f64 = self
            .weights
            .as_array()
            .iter()
            .zip(fractions)
            .map(|(w, f)| w * f)
            .sum();

        Ok((combined * 100.0).round().clamp(0.0, 100.0) as u8)
    }

    pub fn report(&self, topic_id: &str, counters: TopicCounters) -> Result<MasteryReport> {
        let progress = progress_from_counters(&counters);
        let mastery = self.score(&progress)?;
        Ok(MasteryReport {
            topic_id: topic_id.to_string(),
            counters,
            progress,
            mastery,
        })
    }
}
