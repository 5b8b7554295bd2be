//! A library for ranking users by their best submissions to competitions.

pub mod error;
pub mod memory_store;
pub mod ranking;
pub mod store;

#[cfg(feature = "database")]
pub mod db_util;

pub use error::{RankingError, StoreError};
pub use ranking::{RankingConfig, RankingEngine};
pub use store::{SubmissionSnapshot, SubmissionStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Users with fewer submissions than this are left off the leaderboard.
pub const DEFAULT_MIN_SUBMISSIONS: u32 = 3;
/// Only this many of a user's best submissions count towards their total.
pub const DEFAULT_TOP_N: u32 = 24;
/// The lowest score a submission can receive.
pub const MIN_SCORE: u32 = 100;
/// The highest score a submission can receive.
pub const MAX_SCORE: u32 = 10000;

/// A user of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A competition users can enter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionRecord {
    pub competition_id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A scored entry made by a user to a competition.
/// The name is unique within its competition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission_id: u64,
    pub user_id: u64,
    pub competition_id: u64,
    pub name: String,
    pub score: u32,
    pub created_at: DateTime<Utc>,
}

/// A user who met the submission threshold, with their submission count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSubmissionCount {
    pub user_id: u64,
    pub username: String,
    pub submission_count: u64,
}

/// One row of the leaderboard. Built fresh on every ranking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedUser {
    #[serde(rename = "id")]
    pub user_id: u64,
    pub username: String,
    pub total_score: u64,
    pub rank: u32,
}

/// Check a score falls within the allowed range.
///
/// # Errors
/// Returns a validation error if the score is below [`MIN_SCORE`] or above [`MAX_SCORE`].
pub fn validate_score(score: u32) -> Result<u32, StoreError> {
    if score < MIN_SCORE {
        Err(StoreError::Validation(format!(
            "The minimum score allowed is {MIN_SCORE}, got {score}"
        )))
    } else if score > MAX_SCORE {
        Err(StoreError::Validation(format!(
            "The maximum score allowed is {MAX_SCORE}, got {score}"
        )))
    } else {
        Ok(score)
    }
}

/// Usernames are unique and looked up without regard to case.
pub fn usernames_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Order usernames ignoring case, then exactly.
/// Matches `ORDER BY lower(username), username` in the database.
pub fn compare_usernames(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_score_bounds() {
        assert_eq!(validate_score(100).unwrap(), 100);
        assert_eq!(validate_score(10000).unwrap(), 10000);
        assert!(matches!(validate_score(99), Err(StoreError::Validation(_))));
        assert!(matches!(
            validate_score(10001),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_usernames_match_ignores_case() {
        assert!(usernames_match("Jane.Doe", "jane.doe"));
        assert!(!usernames_match("jane.doe", "jane.doe2"));
    }

    #[test]
    fn test_compare_usernames_ignores_case_first() {
        assert_eq!(compare_usernames("alice", "Bob"), Ordering::Less);
        assert_eq!(compare_usernames("Zoe", "adam"), Ordering::Greater);
        assert_eq!(compare_usernames("Amy", "amy"), Ordering::Less);
        assert_eq!(compare_usernames("amy", "amy"), Ordering::Equal);
    }

    #[test]
    fn test_ranked_user_serializes_as_api_entry() {
        let entry = RankedUser {
            user_id: 7,
            username: "jane.doe".to_string(),
            total_score: 1700,
            rank: 1,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id": 7, "username": "jane.doe", "total_score": 1700, "rank": 1})
        );
    }
}
