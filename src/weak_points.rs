use crate::models::{Severity, TopicCounters, TopicScore, WeakPoint, WeakPointKind, WeakPointReport};

const HIGH_QUIZ_BELOW: u8 = 50;
const MEDIUM_QUIZ_BELOW: u8 = 70;
const LOW_READING_BELOW: u8 = 60;
// Reading this many sections without answering anything flags the quiz
const QUIZ_NOT_TAKEN_AFTER: u32 = 2;

fn percent(numerator: u32, denominator: u32) -> u8 {
    if denominator == 0 {
        return 0;
    }
    let pct = (numerator as f64 / denominator as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

fn started(c: &TopicCounters) -> bool {
    c.sections_read > 0 || c.quiz_answered > 0
}

pub fn topic_score(c: &TopicCounters) -> u8 {
    let mut total = 0u32;
    let mut factors = 0u32;
    if c.sections_read > 0 {
        total += percent(c.sections_read, c.sections_total) as u32;
        factors += 1;
    }
    if c.quiz_answered > 0 {
        total += percent(c.quiz_correct, c.quiz_answered) as u32;
        factors += 1;
    }
    if factors == 0 {
        0
    } else {
        (total as f64 / factors as f64).round() as u8
    }
}

/// Gaps found in one topic, in detection order.
pub fn detect(topic_id: &str, c: &TopicCounters) -> Vec<WeakPoint> {
    let point = |kind, severity, pct| WeakPoint {
        topic_id: topic_id.to_string(),
        kind,
        severity,
        percent: pct,
    };

    if !started(c) {
        return vec![point(WeakPointKind::NotStarted, Severity::Medium, None)];
    }

    let mut found = Vec::new();

    if c.quiz_answered > 0 {
        let pct = percent(c.quiz_correct, c.quiz_answered);
        if pct < HIGH_QUIZ_BELOW {
            found.push(point(WeakPointKind::LowQuizScore, Severity::High, Some(pct)));
        } else if pct < MEDIUM_QUIZ_BELOW {
            found.push(point(WeakPointKind::LowQuizScore, Severity::Medium, Some(pct)));
        }
    }

    if c.sections_total > 0 && c.sections_read > 0 && c.sections_read < c.sections_total {
        let pct = percent(c.sections_read, c.sections_total);
        if pct < LOW_READING_BELOW {
            found.push(point(WeakPointKind::IncompleteReading, Severity::Low, Some(pct)));
        }
    }

    if c.quiz_answered == 0 && c.sections_read > QUIZ_NOT_TAKEN_AFTER {
        found.push(point(WeakPointKind::QuizNotTaken, Severity::Low, None));
    }

    found
}

/// Ranks topics weakest first and collects their gaps, most severe first.
/// Both sorts are stable, so ties keep the input order.
pub fn analyze<I, S>(topics: I) -> WeakPointReport
where
    I: IntoIterator<Item = (S, TopicCounters)>,
    S: Into<String>,
{
    let mut report = WeakPointReport::default();

    for (topic_id, counters) in topics {
        let topic_id = topic_id.into();
        report.has_data |= started(&counters);
        report.weak_points.extend(detect(&topic_id, &counters));
        report.topics.push(TopicScore {
            score: topic_score(&counters),
            topic_id,
            counters,
        });
    }

    report.weak_points.sort_by_key(|w| w.severity);
    report.topics.sort_by_key(|t| t.score);

    let scored: Vec<u32> = report
        .topics
        .iter()
        .filter(|t| t.score > 0)
        .map(|t| t.score as u32)
        .collect();
    if !scored.is_empty() {
        let mean = scored.iter().sum::<u32>() as f64 / scored.len() as f64;
        report.overall_score = mean.round() as u8;
    }

    report
}
