use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::StudyError;

// What sort of learning unit an item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Section,
    QuizQuestion,
    VocabTerm,
    FlashCard,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Section => "section",
            ItemKind::QuizQuestion => "quiz",
            ItemKind::VocabTerm => "vocab",
            ItemKind::FlashCard => "flashcard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "section" | "sec" => Some(ItemKind::Section),
            "quiz" | "question" | "quiz_question" => Some(ItemKind::QuizQuestion),
            "vocab" | "term" | "vocab_term" => Some(ItemKind::VocabTerm),
            "flashcard" | "card" | "fc" => Some(ItemKind::FlashCard),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Section => "Section",
            ItemKind::QuizQuestion => "Quiz question",
            ItemKind::VocabTerm => "Vocabulary term",
            ItemKind::FlashCard => "Flashcard",
        }
    }
}

/// An addressable unit of learning. Identity is the whole triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudyItem {
    pub topic_id: String,
    pub kind: ItemKind,
    pub item_key: String,
}

impl StudyItem {
    pub fn new(topic_id: impl Into<String>, kind: ItemKind, item_key: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            kind,
            item_key: item_key.into(),
        }
    }
}

impl fmt::Display for StudyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.topic_id, self.kind.as_str(), self.item_key)
    }
}

// Learner feedback after a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Hard,
    Good,
    Easy,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Hard => "hard",
            Quality::Good => "good",
            Quality::Easy => "easy",
        }
    }
}

impl FromStr for Quality {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hard" | "h" | "1" => Ok(Quality::Hard),
            "good" | "g" | "2" => Ok(Quality::Good),
            "easy" | "e" | "3" => Ok(Quality::Easy),
            _ => Err(StudyError::InvalidQuality(s.to_string())),
        }
    }
}

/// Spaced-review history of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub level: usize,
    pub last_reviewed_at: Option<NaiveDate>,
    pub review_count: u32,
    pub wrong_count: u32,
}

impl ReviewRecord {
    pub fn is_new(&self) -> bool {
        self.last_reviewed_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueStatus {
    pub is_due: bool,
    pub level: usize,
    pub interval: u32,
    pub days_since: Option<i64>,
    pub due_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStatus {
    pub item: StudyItem,
    pub record: ReviewRecord,
    pub due: DueStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub total: usize,
    pub new: usize,
    pub learning: usize,
    pub mature: usize,
    pub due: usize,
    pub total_reviews: u64,
}

/// A practice pool entry with its historical miss count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeCandidate {
    pub item: StudyItem,
    pub wrong_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCheck {
    pub is_match: bool,
    pub distance: usize,
    pub tolerance: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub active_days: usize,
    pub total_activities: u64,
    pub average_daily: f64,
    pub streak: Streak,
}

/// The four mastery signals, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub sections_read: f64,
    pub quiz_accuracy: f64,
    pub practice_maturity: f64,
    pub time_invested: f64,
}

impl TopicProgress {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.sections_read,
            self.quiz_accuracy,
            self.practice_maturity,
            self.time_invested,
        ]
    }
}

/// Raw per-topic tallies the fractions are derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCounters {
    pub sections_read: u32,
    pub sections_total: u32,
    pub quiz_correct: u32,
    pub quiz_answered: u32,
    pub practice_mature: u32,
    pub practice_total: u32,
    pub seconds_spent: u64,
    pub target_seconds: u64,
}

/// What the content layer knows about a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicContent {
    pub topic_id: String,
    pub sections: Vec<String>,
    pub quiz_questions: Vec<String>,
    pub practice_items: Vec<StudyItem>,
    pub target_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryReport {
    pub topic_id: String,
    pub counters: TopicCounters,
    pub progress: TopicProgress,
    pub mastery: u8,
}

impl MasteryReport {
    pub fn label(&self) -> &'static str {
        mastery_label(self.mastery)
    }
}

pub fn mastery_label(mastery: u8) -> &'static str {
    match mastery {
        80.. => "Mastered",
        60..=79 => "Proficient",
        30..=59 => "Developing",
        1..=29 => "Beginning",
        0 => "Not Started",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeakPointKind {
    NotStarted,
    LowQuizScore,
    IncompleteReading,
    QuizNotTaken,
}

impl WeakPointKind {
    pub fn label(&self) -> &'static str {
        match self {
            WeakPointKind::NotStarted => "Not started",
            WeakPointKind::LowQuizScore => "Low quiz score",
            WeakPointKind::IncompleteReading => "Sections unread",
            WeakPointKind::QuizNotTaken => "Quiz not taken",
        }
    }
}

/// One detected gap in a topic. `percent` is the quiz or reading share
/// that triggered it, where there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakPoint {
    pub topic_id: String,
    pub kind: WeakPointKind,
    pub severity: Severity,
    pub percent: Option<u8>,
}

/// Knowledge score of a topic: the mean of its reading and quiz percentages,
/// counting only the signals the learner has produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicScore {
    pub topic_id: String,
    pub score: u8,
    pub counters: TopicCounters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakPointReport {
    /// Most severe first.
    pub weak_points: Vec<WeakPoint>,
    /// Weakest first.
    pub topics: Vec<TopicScore>,
    /// Mean score over topics with a non-zero score.
    pub overall_score: u8,
    pub has_data: bool,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod item_kind_tests {
        use super::*;

        #[test]
        fn as_str_round_trips_through_from_str() {
            for kind in [
                ItemKind::Section,
                ItemKind::QuizQuestion,
                ItemKind::VocabTerm,
                ItemKind::FlashCard,
            ] {
                assert_eq!(ItemKind::from_str(kind.as_str()), Some(kind));
            }
        }

        #[test]
        fn from_str_aliases() {
            assert_eq!(ItemKind::from_str("card"), Some(ItemKind::FlashCard));
            assert_eq!(ItemKind::from_str("TERM"), Some(ItemKind::VocabTerm));
            assert_eq!(ItemKind::from_str("question"), Some(ItemKind::QuizQuestion));
        }

        #[test]
        fn from_str_invalid() {
            assert_eq!(ItemKind::from_str("video"), None);
            assert_eq!(ItemKind::from_str(""), None);
        }

        #[test]
        fn labels_fit_due_table_column() {
            for kind in [
                ItemKind::Section,
                ItemKind::QuizQuestion,
                ItemKind::VocabTerm,
                ItemKind::FlashCard,
            ] {
                assert!(!kind.label().is_empty());
                assert!(kind.label().len() <= 16);
            }
            assert_eq!(ItemKind::QuizQuestion.label(), "Quiz question");
        }
    }

    mod quality_tests {
        use super::*;

        #[test]
        fn parses_names_and_shortcuts() {
            assert_eq!("hard".parse::<Quality>().unwrap(), Quality::Hard);
            assert_eq!("G".parse::<Quality>().unwrap(), Quality::Good);
            assert_eq!(" Easy ".parse::<Quality>().unwrap(), Quality::Easy);
            assert_eq!("3".parse::<Quality>().unwrap(), Quality::Easy);
        }

        #[test]
        fn rejects_out_of_range() {
            for v in ["", "4", "0", "again", "medium"] {
                assert!(
                    matches!(v.parse::<Quality>(), Err(StudyError::InvalidQuality(_))),
                    "Expected error for '{}'",
                    v
                );
            }
        }

        #[test]
        fn serializes_lowercase() {
            assert_eq!(serde_json::to_string(&Quality::Easy).unwrap(), "\"easy\"");
        }
    }

    mod mastery_label_tests {
        use super::*;

        #[test]
        fn bands() {
            assert_eq!(mastery_label(0), "Not Started");
            assert_eq!(mastery_label(1), "Beginning");
            assert_eq!(mastery_label(29), "Beginning");
            assert_eq!(mastery_label(30), "Developing");
            assert_eq!(mastery_label(59), "Developing");
            assert_eq!(mastery_label(60), "Proficient");
            assert_eq!(mastery_label(79), "Proficient");
            assert_eq!(mastery_label(80), "Mastered");
            assert_eq!(mastery_label(100), "Mastered");
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn serializes_ok_correctly() {
            let output = JsonOutput::ok("test");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":true"));
            assert!(json.contains("\"data\":\"test\""));
            assert!(json.contains("\"error\":null"));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }

    #[test]
    fn study_item_display() {
        let item = StudyItem::new("editing", ItemKind::VocabTerm, "Cas9");
        assert_eq!(item.to_string(), "editing/vocab/Cas9");
    }

    #[test]
    fn review_record_default_is_new() {
        let r = ReviewRecord::default();
        assert!(r.is_new());
        assert_eq!(r.level, 0);
        assert_eq!(r.wrong_count, 0);
    }
}
