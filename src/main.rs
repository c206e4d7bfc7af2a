use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use htgaa_study::models::{mastery_label, JsonOutput};
use htgaa_study::{
    Database, ItemKind, ProgressStore, Quality, StudyEngine, StudyError, StudyItem, TopicContent,
};

const DEFAULT_DB_NAME: &str = "study.db";
const MAX_ACTIVITY_DAYS: i64 = 3660;

#[derive(Parser)]
#[command(name = "htgaa-study")]
#[command(about = "Spaced review, weighted practice and mastery tracking for HTGAA course material")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Treat this date (YYYY-MM-DD) as today
    #[arg(long, global = true, value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Learner whose progress is read and written
    #[arg(long, global = true, default_value = "default")]
    learner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// List items in review order (items as topic/kind/key)
    Due {
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Record a review with hard/good/easy feedback
    Mark {
        item: String,

        #[arg(long, short)]
        quality: String,
    },

    /// Check a typed answer and record the outcome
    Answer {
        item: String,

        given: String,

        /// Canonical answer
        #[arg(long, short)]
        expect: String,
    },

    /// Compare two answers without recording anything
    Check { given: String, canonical: String },

    /// Pick the next practice item, favouring struggled ones
    Next {
        #[arg(required = true)]
        items: Vec<String>,

        /// Item shown last (never picked twice in a row)
        #[arg(long, short)]
        last: Option<String>,

        /// Seed for a reproducible pick
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Mark a section as read
    Read { topic: String, section: String },

    /// Add study time to a topic
    Time {
        topic: String,

        /// Seconds studied
        seconds: u64,
    },

    /// Show a topic's mastery score
    Mastery {
        topic: String,

        /// Comma-separated section keys
        #[arg(long, short)]
        sections: Option<String>,

        /// Comma-separated quiz question keys
        #[arg(long, short = 'Q')]
        questions: Option<String>,

        /// Comma-separated practice items (topic/kind/key)
        #[arg(long, short)]
        practice: Option<String>,

        /// Expected study time in minutes
        #[arg(long, short)]
        target: Option<u32>,
    },

    /// List quiz questions whose latest answer was wrong
    Mistakes {
        topic: String,

        /// Comma-separated quiz question keys
        #[arg(long, short = 'Q')]
        questions: String,
    },

    /// Summarize review state for a set of items
    Summary {
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Show the current and longest study streak
    Streak,

    /// Show daily activity counts
    Activity {
        /// Number of days, ending today
        #[arg(
            long,
            short,
            default_value_t = 7,
            value_parser = clap::value_parser!(u32).range(1..=MAX_ACTIVITY_DAYS)
        )]
        days: u32,
    },

    /// Show activity statistics
    Stats,

    /// Erase all progress for the learner
    Reset,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", s, e))
}

fn parse_item(s: &str) -> Result<StudyItem, String> {
    let mut parts = s.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(topic), Some(kind), Some(key)) if !topic.is_empty() && !key.is_empty() => {
            let kind = ItemKind::from_str(kind).ok_or_else(|| {
                format!(
                    "Invalid kind '{}'. Use: section, quiz, vocab, or flashcard",
                    kind
                )
            })?;
            Ok(StudyItem::new(topic, kind, key))
        }
        _ => Err(format!("Invalid item '{}'. Expected topic/kind/key", s)),
    }
}

fn parse_items(raw: &[String]) -> Result<Vec<StudyItem>, String> {
    raw.iter().map(|s| parse_item(s)).collect()
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn get_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("HTGAA_STUDY_DB") {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("htgaa-study");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

fn print_json<T: serde::Serialize>(data: T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    if let Err(e) = run(cli) {
        if json {
            match serde_json::to_string(&JsonOutput::<()>::err(e.to_string())) {
                Ok(line) => println!("{}", line),
                Err(_) => eprintln!("Error: {}", e),
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(exit_code(e.as_ref()));
    }
}

/// 2 for bad input from the caller, 1 for everything else.
fn exit_code(e: &(dyn std::error::Error + 'static)) -> i32 {
    match e.downcast_ref::<StudyError>() {
        Some(err) if err.is_invalid_input() => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_db_path();
    let db = Database::open(&db_path)?;
    db.init()?;

    let today = cli
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let engine = StudyEngine::with_defaults(ProgressStore::new(db, &cli.learner)?)?;

    match cli.command {
        Commands::Init => {
            debug!(path = %db_path.display(), "database ready");
            if cli.json {
                print_json(())?;
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Due { items } => {
            let queue = engine.review_queue(&parse_items(&items)?, today)?;
            if cli.json {
                print_json(&queue)?;
            } else {
                println!(
                    "{:<40} {:<16} {:<6} {:<9} DUE",
                    "ITEM", "KIND", "LEVEL", "INTERVAL"
                );
                println!("{}", "-".repeat(86));
                for status in queue {
                    let due = if status.record.is_new() {
                        "new".to_string()
                    } else if status.due.is_due {
                        format!("now ({}d overdue)", -status.due.due_in)
                    } else {
                        format!("in {}d", status.due.due_in)
                    };
                    println!(
                        "{:<40} {:<16} {:<6} {:<9} {}",
                        truncate(&status.item.to_string(), 38),
                        status.item.kind.label(),
                        status.due.level,
                        format!("{}d", status.due.interval),
                        due
                    );
                }
            }
        }

        Commands::Mark { item, quality } => {
            let item = parse_item(&item)?;
            let quality: Quality = quality.parse()?;
            let record = engine.mark_reviewed(&item, quality, today)?;
            let status = engine.due_status(&item, today)?;

            if cli.json {
                print_json(serde_json::json!({
                    "item": item,
                    "record": record,
                    "due": status
                }))?;
            } else {
                println!("Marked {} as {}.", item, quality.as_str());
                println!(
                    "Level {} ({}d interval), next review in {}d.",
                    record.level, status.interval, status.due_in
                );
            }
        }

        Commands::Answer {
            item,
            given,
            expect,
        } => {
            let item = parse_item(&item)?;
            let check = engine.check_answer(&item, &given, &expect, today)?;

            if cli.json {
                print_json(&check)?;
            } else if check.is_match && check.distance == 0 {
                println!("Correct.");
            } else if check.is_match {
                println!(
                    "Close enough ({} edit(s), {} allowed). Answer: {}",
                    check.distance, check.tolerance, expect
                );
            } else {
                println!("Not quite. Answer: {}", expect);
            }
        }

        Commands::Check { given, canonical } => {
            let check = engine.check_text(&given, &canonical);
            if cli.json {
                print_json(&check)?;
            } else {
                println!(
                    "{} (distance {}, tolerance {})",
                    if check.is_match { "match" } else { "no match" },
                    check.distance,
                    check.tolerance
                );
            }
        }

        Commands::Next { items, last, seed } => {
            let items = parse_items(&items)?;
            let last = last.as_deref().map(parse_item).transpose()?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let picked = engine.select_next(&items, last.as_ref(), &mut rng)?;
            if cli.json {
                print_json(&picked)?;
            } else if let Some(item) = picked {
                println!("{}", item);
            } else {
                println!("Nothing to practice.");
            }
        }

        Commands::Read { topic, section } => {
            engine.mark_section_read(&topic, &section, today)?;
            if cli.json {
                print_json(())?;
            } else {
                println!("Marked section '{}' of {} as read.", section, topic);
            }
        }

        Commands::Time { topic, seconds } => {
            let total = engine.add_study_time(&topic, seconds, today)?;
            if cli.json {
                print_json(serde_json::json!({ "topic": topic, "seconds_spent": total }))?;
            } else {
                println!("{}: {} min studied in total.", topic, total / 60);
            }
        }

        Commands::Mastery {
            topic,
            sections,
            questions,
            practice,
            target,
        } => {
            let content = TopicContent {
                practice_items: parse_items(&split_list(practice))?,
                sections: split_list(sections),
                quiz_questions: split_list(questions),
                target_minutes: target,
                topic_id: topic,
            };
            let report = engine.topic_mastery(&content)?;

            if cli.json {
                print_json(&report)?;
            } else {
                let c = &report.counters;
                println!("Topic: {}", report.topic_id);
                println!("Mastery: {}% ({})", report.mastery, mastery_label(report.mastery));
                println!();
                println!("Sections read:  {}/{}", c.sections_read, c.sections_total);
                println!("Quiz correct:   {}/{}", c.quiz_correct, c.quiz_answered);
                println!("Mature items:   {}/{}", c.practice_mature, c.practice_total);
                println!(
                    "Time studied:   {}/{} min",
                    c.seconds_spent / 60,
                    c.target_seconds / 60
                );
            }
        }

        Commands::Mistakes { topic, questions } => {
            let content = TopicContent {
                quiz_questions: split_list(Some(questions)),
                topic_id: topic,
                ..TopicContent::default()
            };
            let missed = engine.missed_questions(&content)?;

            if cli.json {
                print_json(&missed)?;
            } else if missed.is_empty() {
                println!("No missed questions in {}.", content.topic_id);
            } else {
                println!("Missed in {} ({}):", content.topic_id, missed.len());
                for item in missed {
                    println!("  {}", item.item_key);
                }
            }
        }

        Commands::Summary { items } => {
            let summary = engine.review_summary(&parse_items(&items)?, today)?;
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("=== Review Summary ===");
                println!("Items: {}", summary.total);
                println!("New: {}", summary.new);
                println!("Learning: {}", summary.learning);
                println!("Mature: {}", summary.mature);
                println!("Due now: {}", summary.due);
                println!("Total reviews: {}", summary.total_reviews);
            }
        }

        Commands::Streak => {
            let streak = engine.streak(today);
            if cli.json {
                print_json(&streak)?;
            } else {
                println!("Current streak: {} day(s)", streak.current);
                println!("Longest streak: {} day(s)", streak.longest);
            }
        }

        Commands::Activity { days } => {
            let counts = engine.activity_bucket(days as usize, today);
            if cli.json {
                print_json(&counts)?;
            } else {
                for (offset, count) in counts.iter().enumerate() {
                    let back = (counts.len() - 1 - offset) as u64;
                    let date = today
                        .checked_sub_days(Days::new(back))
                        .map_or_else(|| "-".to_string(), |d| d.to_string());
                    println!("{:<10}  {:>3} {}", date, count, "#".repeat((*count).min(40) as usize));
                }
            }
        }

        Commands::Stats => {
            let stats = engine.activity_stats(today);
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("=== Study Statistics ===");
                println!("Active days: {}", stats.active_days);
                println!("Total activities: {}", stats.total_activities);
                println!("Average per active day: {:.1}", stats.average_daily);
                println!(
                    "Streak: {} current, {} longest",
                    stats.streak.current, stats.streak.longest
                );
            }
        }

        Commands::Reset => {
            let removed = engine.reset()?;
            debug!(learner = cli.learner.as_str(), removed, "progress reset");
            if cli.json {
                print_json(serde_json::json!({ "removed": removed }))?;
            } else {
                println!("Cleared {} entries for learner '{}'.", removed, cli.learner);
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod truncate_tests {
        use super::*;

        #[test]
        fn truncate_short_string() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn truncate_exact_length() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn truncate_long_string() {
            assert_eq!(truncate("hello world", 8), "hello...");
        }

        #[test]
        fn truncate_multibyte() {
            assert_eq!(truncate("β-lactamase", 6), "β-l...");
        }
    }

    mod item_parsing_tests {
        use super::*;

        #[test]
        fn parse_full_item() {
            let item = parse_item("editing/vocab/restriction").unwrap();
            assert_eq!(item, StudyItem::new("editing", ItemKind::VocabTerm, "restriction"));
        }

        #[test]
        fn key_may_contain_slashes() {
            let item = parse_item("gels/card/TAE/TBE").unwrap();
            assert_eq!(item.kind, ItemKind::FlashCard);
            assert_eq!(item.item_key, "TAE/TBE");
        }

        #[test]
        fn rejects_bad_items() {
            assert!(parse_item("editing").is_err());
            assert!(parse_item("editing/vocab").is_err());
            assert!(parse_item("editing/poem/x").is_err());
            assert!(parse_item("/vocab/x").is_err());
        }

        #[test]
        fn split_list_trims_and_drops_empties() {
            assert_eq!(
                split_list(Some("a, b,,c ".into())),
                vec!["a".to_string(), "b".to_string(), "c".to_string()]
            );
            assert!(split_list(None).is_empty());
        }

        #[test]
        fn parse_date_iso() {
            assert_eq!(
                parse_date("2026-10-14").unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
            );
            assert!(parse_date("14/10/2026").is_err());
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_command() {
            let cli = Cli::try_parse_from(["htgaa-study", "init"]).unwrap();
            assert!(!cli.json);
            assert!(!cli.verbose);
            assert_eq!(cli.learner, "default");
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_global_flags() {
            let cli = Cli::try_parse_from([
                "htgaa-study",
                "streak",
                "--json",
                "--today",
                "2026-01-31",
                "--learner",
                "ana",
            ])
            .unwrap();
            assert!(cli.json);
            assert_eq!(cli.today, NaiveDate::from_ymd_opt(2026, 1, 31));
            assert_eq!(cli.learner, "ana");
            assert!(matches!(cli.command, Commands::Streak));
        }

        #[test]
        fn parse_invalid_today_fails() {
            assert!(Cli::try_parse_from(["htgaa-study", "--today", "soon", "streak"]).is_err());
        }

        #[test]
        fn parse_mark_command() {
            let cli =
                Cli::try_parse_from(["htgaa-study", "mark", "pcr/card/taq", "-q", "easy"]).unwrap();
            match cli.command {
                Commands::Mark { item, quality } => {
                    assert_eq!(item, "pcr/card/taq");
                    assert_eq!(quality, "easy");
                }
                _ => panic!("Expected Mark command"),
            }
        }

        #[test]
        fn parse_answer_command() {
            let cli = Cli::try_parse_from([
                "htgaa-study",
                "answer",
                "editing/vocab/ligase",
                "ligse",
                "--expect",
                "ligase",
            ])
            .unwrap();
            match cli.command {
                Commands::Answer {
                    item,
                    given,
                    expect,
                } => {
                    assert_eq!(item, "editing/vocab/ligase");
                    assert_eq!(given, "ligse");
                    assert_eq!(expect, "ligase");
                }
                _ => panic!("Expected Answer command"),
            }
        }

        #[test]
        fn parse_next_command() {
            let cli = Cli::try_parse_from([
                "htgaa-study",
                "next",
                "t/vocab/a",
                "t/vocab/b",
                "--last",
                "t/vocab/a",
                "--seed",
                "7",
            ])
            .unwrap();
            match cli.command {
                Commands::Next { items, last, seed } => {
                    assert_eq!(items.len(), 2);
                    assert_eq!(last.as_deref(), Some("t/vocab/a"));
                    assert_eq!(seed, Some(7));
                }
                _ => panic!("Expected Next command"),
            }
        }

        #[test]
        fn parse_mastery_command() {
            let cli = Cli::try_parse_from([
                "htgaa-study",
                "mastery",
                "pcr",
                "-s",
                "intro,cycling",
                "-Q",
                "q1",
                "--target",
                "45",
            ])
            .unwrap();
            match cli.command {
                Commands::Mastery {
                    topic,
                    sections,
                    questions,
                    practice,
                    target,
                } => {
                    assert_eq!(topic, "pcr");
                    assert_eq!(sections.as_deref(), Some("intro,cycling"));
                    assert_eq!(questions.as_deref(), Some("q1"));
                    assert!(practice.is_none());
                    assert_eq!(target, Some(45));
                }
                _ => panic!("Expected Mastery command"),
            }
        }

        #[test]
        fn parse_mistakes_command() {
            let cli =
                Cli::try_parse_from(["htgaa-study", "mistakes", "pcr", "-Q", "q1,q2"]).unwrap();
            match cli.command {
                Commands::Mistakes { topic, questions } => {
                    assert_eq!(topic, "pcr");
                    assert_eq!(split_list(Some(questions)), vec!["q1", "q2"]);
                }
                _ => panic!("Expected Mistakes command"),
            }
        }

        #[test]
        fn parse_activity_default_days() {
            let cli = Cli::try_parse_from(["htgaa-study", "activity"]).unwrap();
            match cli.command {
                Commands::Activity { days } => assert_eq!(days, 7),
                _ => panic!("Expected Activity command"),
            }
        }

        #[test]
        fn parse_activity_rejects_oversized_window() {
            assert!(Cli::try_parse_from(["htgaa-study", "activity", "--days", "200000000"]).is_err());
            assert!(Cli::try_parse_from(["htgaa-study", "activity", "--days", "0"]).is_err());
            let cli = Cli::try_parse_from(["htgaa-study", "activity", "-d", "3660"]).unwrap();
            assert!(matches!(cli.command, Commands::Activity { days: 3660 }));
        }

        #[test]
        fn parse_due_requires_items() {
            assert!(Cli::try_parse_from(["htgaa-study", "due"]).is_err());
        }

        #[test]
        fn parse_invalid_command_fails() {
            assert!(Cli::try_parse_from(["htgaa-study", "invalid"]).is_err());
        }
    }

    mod exit_code_tests {
        use super::*;

        #[test]
        fn invalid_input_exits_with_two() {
            let err: Box<dyn std::error::Error> = Box::new(StudyError::InvalidQuality("meh".into()));
            assert_eq!(exit_code(err.as_ref()), 2);
        }

        #[test]
        fn storage_and_plain_errors_exit_with_one() {
            let err: Box<dyn std::error::Error> =
                Box::new(StudyError::MediumUnavailable("gone".into()));
            assert_eq!(exit_code(err.as_ref()), 1);

            let err: Box<dyn std::error::Error> = "Invalid item 'x'".into();
            assert_eq!(exit_code(err.as_ref()), 1);
        }
    }

    mod db_path_tests {
        use super::*;
        use std::env;

        // One test so the env var is not raced by a parallel test
        #[test]
        fn get_db_path_env_var_and_default() {
            let test_path = "/tmp/test_htgaa_study.db";
            env::set_var("HTGAA_STUDY_DB", test_path);
            assert_eq!(get_db_path().to_str().unwrap(), test_path);

            env::remove_var("HTGAA_STUDY_DB");
            let path = get_db_path();
            let path_str = path.to_str().unwrap();
            assert!(path_str.ends_with("study.db"));
            assert!(path_str.contains("htgaa-study"));
        }
    }
}
