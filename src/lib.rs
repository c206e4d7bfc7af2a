//! Adaptive study scheduling and mastery tracking.
//!
//! The pure pieces ([`Scheduler`], [`Selector`], [`Matcher`],
//! [`MasteryAggregator`], [`ActivityLog`]) take the current date and any
//! randomness from the caller. [`StudyEngine`] ties them to a
//! [`ProgressStore`] over a pluggable [`Medium`]. [`weak_points`] ranks
//! topics by the gaps their stored signals reveal.

pub mod activity;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod mastery;
pub mod matcher;
pub mod models;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod weak_points;

pub use activity::ActivityLog;
pub use config::EngineConfig;
pub use db::Database;
pub use engine::StudyEngine;
pub use error::{Result, StudyError};
pub use mastery::MasteryAggregator;
pub use matcher::Matcher;
pub use models::{ItemKind, Quality, StudyItem, TopicContent};
pub use scheduler::Scheduler;
pub use selector::Selector;
pub use store::{Medium, MemoryMedium, ProgressStore};
