use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// Review intervals in days, indexed by review level.
pub const DEFAULT_INTERVALS: [u32; 5] = [1, 3, 7, 14, 30];

/// Items whose current interval reaches this many days count as mature.
pub const MATURE_INTERVAL_DAYS: u32 = 21;

pub const DEFAULT_BASE_WEIGHT: f64 = 1.0;
pub const DEFAULT_STRUGGLE_PER_WRONG: f64 = 2.0;
pub const DEFAULT_WEIGHT_CAP: f64 = 10.0;

pub const DEFAULT_MIN_TOLERANCE: usize = 2;
pub const DEFAULT_TOLERANCE_RATIO: f64 = 0.2;

/// Sections read, quiz accuracy, practice maturity, time invested.
pub const DEFAULT_MASTERY_WEIGHTS: MasteryWeights = MasteryWeights {
    sections_read: 0.30,
    quiz_accuracy: 0.30,
    practice_maturity: 0.20,
    time_invested: 0.20,
};

/// Reading time goal used when a topic doesn't declare its own.
pub const DEFAULT_TARGET_MINUTES: u32 = 30;

const WEIGHT_SUM_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub intervals: Vec<u32>,
    pub mature_interval_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            intervals: DEFAULT_INTERVALS.to_vec(),
            mature_interval_days: MATURE_INTERVAL_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub base_weight: f64,
    pub struggle_per_wrong: f64,
    pub weight_cap: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            base_weight: DEFAULT_BASE_WEIGHT,
            struggle_per_wrong: DEFAULT_STRUGGLE_PER_WRONG,
            weight_cap: DEFAULT_WEIGHT_CAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub min_tolerance: usize,
    pub tolerance_ratio: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_tolerance: DEFAULT_MIN_TOLERANCE,
            tolerance_ratio: DEFAULT_TOLERANCE_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasteryWeights {
    pub sections_read: f64,
    pub quiz_accuracy: f64,
    pub practice_maturity: f64,
    pub time_invested: f64,
}

impl MasteryWeights {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.sections_read,
            self.quiz_accuracy,
            self.practice_maturity,
            self.time_invested,
        ]
    }
}

impl Default for MasteryWeights {
    fn default() -> Self {
        DEFAULT_MASTERY_WEIGHTS
    }
}

/// Every tunable constant of the engine in one place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub selector: SelectorConfig,
    pub matcher: MatcherConfig,
    pub mastery: MasteryWeights,
    pub target_minutes: Option<u32>,
}

impl EngineConfig {
    pub fn target_minutes(&self) -> u32 {
        self.target_minutes.unwrap_or(DEFAULT_TARGET_MINUTES)
    }

    pub fn validate(&self) -> Result<()> {
        let intervals = &self.scheduler.intervals;
        if intervals.is_empty() {
            return Err(StudyError::InvalidConfig(
                "interval table must not be empty".into(),
            ));
        }
        if intervals[0] == 0 || intervals.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StudyError::InvalidConfig(format!(
                "interval table must be positive and strictly ascending: {:?}",
                intervals
            )));
        }

        let s = &self.selector;
        if !(s.base_weight.is_finite() && s.struggle_per_wrong.is_finite() && s.weight_cap.is_finite())
            || s.base_weight < 0.0
            || s.struggle_per_wrong < 0.0
            || s.weight_cap < 0.0
        {
            return Err(StudyError::InvalidConfig(
                "selector weights must be finite and non-negative".into(),
            ));
        }

        let ratio = self.matcher.tolerance_ratio;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(StudyError::InvalidConfig(format!(
                "tolerance ratio must be non-negative, got {}",
                ratio
            )));
        }

        let weights = self.mastery.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(StudyError::InvalidConfig(
                "mastery weights must be non-negative".into(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(StudyError::InvalidConfig(format!(
                "mastery weights must sum to 1, got {}",
                sum
            )));
        }

        if self.target_minutes == Some(0) {
            return Err(StudyError::InvalidConfig(
                "target minutes must be positive".into(),
            ));
        }

        Ok(())
    }
}
