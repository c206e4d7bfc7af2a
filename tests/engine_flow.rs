use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use htgaa_study::models::Streak;
use htgaa_study::{
    Database, ItemKind, ProgressStore, Quality, StudyEngine, StudyItem, TopicContent,
};

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 14).unwrap() + Duration::days(offset)
}

fn open_engine(dir: &TempDir, learner: &str) -> StudyEngine<Database> {
    let db = Database::open(dir.path().join("study.db")).unwrap();
    db.init().unwrap();
    StudyEngine::with_defaults(ProgressStore::new(db, learner).unwrap()).unwrap()
}

fn pcr_content() -> TopicContent {
    TopicContent {
        topic_id: "pcr".into(),
        sections: vec!["intro".into(), "cycling".into()],
        quiz_questions: vec!["q1".into()],
        practice_items: vec![StudyItem::new("pcr", ItemKind::VocabTerm, "polymerase")],
        target_minutes: Some(2),
    }
}

#[test]
fn progress_survives_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let term = StudyItem::new("pcr", ItemKind::VocabTerm, "polymerase");

    {
        let engine = open_engine(&dir, "default");
        engine.mark_section_read("pcr", "intro", day(0)).unwrap();
        engine.mark_section_read("pcr", "cycling", day(0)).unwrap();
        engine
            .record_answer(&StudyItem::new("pcr", ItemKind::QuizQuestion, "q1"), true, day(0))
            .unwrap();
        engine.add_study_time("pcr", 120, day(0)).unwrap();
        engine
            .check_answer(&term, "polymerse", "polymerase", day(0))
            .unwrap();
        engine.check_answer(&term, "ligase", "polymerase", day(0)).unwrap();
        for offset in 0..4 {
            engine.mark_reviewed(&term, Quality::Easy, day(offset)).unwrap();
        }
    }

    let engine = open_engine(&dir, "default");
    let record = engine.review_record(&term).unwrap();
    assert_eq!(record.level, 4);
    assert_eq!(record.review_count, 4);
    assert_eq!(record.wrong_count, 1);

    let report = engine.topic_mastery(&pcr_content()).unwrap();
    assert_eq!(report.mastery, 100);
    assert_eq!(report.label(), "Mastered");

    assert_eq!(
        engine.streak(day(3)),
        Streak {
            current: 4,
            longest: 4
        }
    );
    assert_eq!(engine.activity_bucket(4, day(3)), vec![7, 1, 1, 1]);
}

#[test]
fn learners_do_not_see_each_other() {
    let dir = TempDir::new().unwrap();
    let card = StudyItem::new("gels", ItemKind::FlashCard, "agarose");

    let ana = open_engine(&dir, "ana");
    ana.mark_reviewed(&card, Quality::Easy, day(0)).unwrap();

    let ben = open_engine(&dir, "ben");
    assert!(ben.review_record(&card).unwrap().is_new());
    ben.mark_reviewed(&card, Quality::Good, day(0)).unwrap();

    assert!(ana.reset().unwrap() > 0);
    assert!(ana.review_record(&card).unwrap().is_new());
    assert_eq!(ben.review_record(&card).unwrap().review_count, 1);
}

#[test]
fn practice_session_walks_the_pool() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, "default");
    let pool: Vec<StudyItem> = ["ligase", "primer", "plasmid", "codon"]
        .iter()
        .map(|k| StudyItem::new("editing", ItemKind::VocabTerm, *k))
        .collect();

    let mut rng = StdRng::seed_from_u64(2026);
    let mut last: Option<StudyItem> = None;
    for _ in 0..200 {
        let item = engine
            .select_next(&pool, last.as_ref(), &mut rng)
            .unwrap()
            .unwrap();
        assert_ne!(Some(&item), last.as_ref());

        // "primer" is always missed
        let given = if item.item_key == "primer" { "xyz" } else { item.item_key.as_str() };
        engine.check_answer(&item, given, &item.item_key, day(0)).unwrap();
        last = Some(item);
    }

    let pool_state = engine.practice_pool(&pool).unwrap();
    let primer = pool_state
        .iter()
        .find(|c| c.item.item_key == "primer")
        .unwrap();
    assert!(primer.wrong_count > 0);
    assert!(pool_state
        .iter()
        .filter(|c| c.item.item_key != "primer")
        .all(|c| c.wrong_count == 0));
    assert_eq!(engine.activity_stats(day(0)).total_activities, 200);
}

#[test]
fn overdue_item_comes_first() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir, "default");
    let old = StudyItem::new("gels", ItemKind::FlashCard, "tae");
    let recent = StudyItem::new("gels", ItemKind::FlashCard, "tbe");

    // Level 2 reviewed 10 days ago
    engine.mark_reviewed(&old, Quality::Easy, day(-12)).unwrap();
    engine.mark_reviewed(&old, Quality::Easy, day(-10)).unwrap();
    engine.mark_reviewed(&recent, Quality::Good, day(0)).unwrap();

    let status = engine.due_status(&old, day(0)).unwrap();
    assert!(status.is_due);
    assert_eq!(status.due_in, -3);

    let queue = engine.review_queue(&[recent.clone(), old.clone()], day(0)).unwrap();
    assert_eq!(queue[0].item, old);
    assert!(!queue[1].due.is_due);
}
